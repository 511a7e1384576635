use crate::models::geo::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;
const KM_PER_MILE: f64 = 1.609_344;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

pub fn haversine_miles(a: &GeoPoint, b: &GeoPoint) -> f64 {
    haversine_km(a, b) / KM_PER_MILE
}

#[cfg(test)]
mod tests {
    use super::{haversine_km, haversine_miles};
    use crate::models::geo::GeoPoint;

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint::new(37.7749, -122.4194);
        assert!(haversine_km(&p, &p) < 1e-9);
    }

    #[test]
    fn san_francisco_to_oakland_is_around_8_miles() {
        let sf = GeoPoint::new(37.7749, -122.4194);
        let oakland = GeoPoint::new(37.8044, -122.2712);
        let distance = haversine_miles(&sf, &oakland);
        assert!((distance - 8.3).abs() < 1.0);
    }

    #[test]
    fn san_francisco_to_los_angeles_is_around_347_miles() {
        let sf = GeoPoint::new(37.7749, -122.4194);
        let la = GeoPoint::new(34.0522, -118.2437);
        let distance = haversine_miles(&sf, &la);
        assert!((distance - 347.0).abs() < 10.0);
    }
}
