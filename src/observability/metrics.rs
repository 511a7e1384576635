use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub quote_requests_total: IntCounter,
    pub provider_checks_total: IntCounterVec,
    pub dispatches_total: IntCounterVec,
    pub pickup_verifications_total: IntCounterVec,
    pub provider_call_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let quote_requests_total =
            IntCounter::new("quote_requests_total", "Total delivery quote requests")
                .expect("valid quote_requests_total metric");

        let provider_checks_total = IntCounterVec::new(
            Opts::new(
                "provider_checks_total",
                "Provider availability checks by provider and outcome",
            ),
            &["provider", "outcome"],
        )
        .expect("valid provider_checks_total metric");

        let dispatches_total = IntCounterVec::new(
            Opts::new("dispatches_total", "Dispatch attempts by provider and outcome"),
            &["provider", "outcome"],
        )
        .expect("valid dispatches_total metric");

        let pickup_verifications_total = IntCounterVec::new(
            Opts::new(
                "pickup_verifications_total",
                "Pickup QR verifications by outcome",
            ),
            &["outcome"],
        )
        .expect("valid pickup_verifications_total metric");

        let provider_call_seconds = HistogramVec::new(
            HistogramOpts::new(
                "provider_call_seconds",
                "Latency of outbound provider calls in seconds",
            ),
            &["provider"],
        )
        .expect("valid provider_call_seconds metric");

        registry
            .register(Box::new(quote_requests_total.clone()))
            .expect("register quote_requests_total");
        registry
            .register(Box::new(provider_checks_total.clone()))
            .expect("register provider_checks_total");
        registry
            .register(Box::new(dispatches_total.clone()))
            .expect("register dispatches_total");
        registry
            .register(Box::new(pickup_verifications_total.clone()))
            .expect("register pickup_verifications_total");
        registry
            .register(Box::new(provider_call_seconds.clone()))
            .expect("register provider_call_seconds");

        Self {
            registry,
            quote_requests_total,
            provider_checks_total,
            dispatches_total,
            pickup_verifications_total,
            provider_call_seconds,
        }
    }

    pub fn record_check(&self, provider: &str, outcome: &str) {
        self.provider_checks_total
            .with_label_values(&[provider, outcome])
            .inc();
    }

    pub fn record_dispatch(&self, provider: &str, success: bool) {
        let outcome = if success { "success" } else { "error" };
        self.dispatches_total
            .with_label_values(&[provider, outcome])
            .inc();
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
