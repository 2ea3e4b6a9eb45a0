use serde::Serialize;

/// Mean Earth radius in miles; every distance in the pipeline uses it.
pub const EARTH_RADIUS_MILES: f64 = 3958.8;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// Great-circle distance between two coordinates in miles (haversine).
///
/// Inputs are degrees. Out-of-range values still produce a numeric result;
/// there is no validation here.
pub fn distance_miles(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    EARTH_RADIUS_MILES * 2.0 * h.sqrt().asin()
}
