use std::collections::HashMap;

use crate::models::geo::GeoPoint;
use crate::providers::normalize_postal_code;

/// Resolves a postal code to an approximate point for distance checks.
pub trait PostalLocator: Send + Sync {
    fn locate(&self, postal_code: &str) -> Option<GeoPoint>;
}

/// Centroids keyed by three digit ZIP prefix (sectional center).
///
/// Coarse on purpose: it only has to decide whether a destination is inside
/// a radius of tens of miles around a farm.
pub struct ZipPrefixLocator {
    centroids: HashMap<String, GeoPoint>,
}

impl ZipPrefixLocator {
    pub fn new(centroids: HashMap<String, GeoPoint>) -> Self {
        Self { centroids }
    }
}

impl Default for ZipPrefixLocator {
    fn default() -> Self {
        let table: [(&str, f64, f64); 24] = [
            ("900", 34.0522, -118.2437),
            ("902", 33.8958, -118.2201),
            ("906", 33.9617, -118.0340),
            ("910", 34.1478, -118.1445),
            ("913", 34.1808, -118.3090),
            ("917", 34.0633, -117.6509),
            ("920", 32.9595, -117.2653),
            ("921", 32.7157, -117.1611),
            ("925", 33.9806, -117.3755),
            ("926", 33.6846, -117.8265),
            ("930", 34.2805, -119.2945),
            ("932", 35.3733, -119.0187),
            ("936", 36.7378, -119.7871),
            ("940", 37.5630, -122.3255),
            ("941", 37.7749, -122.4194),
            ("943", 37.4419, -122.1430),
            ("945", 37.8044, -122.2712),
            ("946", 37.8044, -122.2712),
            ("947", 37.8715, -122.2730),
            ("949", 38.0834, -122.7633),
            ("950", 37.3382, -121.8863),
            ("954", 38.4404, -122.7141),
            ("956", 38.5816, -121.4944),
            ("958", 38.5816, -121.4944),
        ];

        Self::new(
            table
                .iter()
                .map(|(prefix, lat, lng)| (prefix.to_string(), GeoPoint::new(*lat, *lng)))
                .collect(),
        )
    }
}

impl PostalLocator for ZipPrefixLocator {
    fn locate(&self, postal_code: &str) -> Option<GeoPoint> {
        let code = normalize_postal_code(postal_code)?;
        let prefix = code.get(..3)?;
        self.centroids.get(prefix).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locates_san_francisco() {
        let locator = ZipPrefixLocator::default();
        let point = locator.locate("94102").unwrap();
        assert!((point.lat - 37.7749).abs() < 1e-6);
    }

    #[test]
    fn unknown_or_short_codes_are_unlocated() {
        let locator = ZipPrefixLocator::default();
        assert_eq!(locator.locate("10001"), None);
        assert_eq!(locator.locate("94"), None);
        assert_eq!(locator.locate(""), None);
    }
}
