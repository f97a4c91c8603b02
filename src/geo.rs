/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;


#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        LatLng { lat, lng }
    }

    pub fn distance_to(&self, lat: f64, lng: f64) -> f64 {
        distance_meters(self.lat, self.lng, lat, lng)
    }
}


/// Great-circle distance in meters between two points given in degrees,
/// using the haversine formula on a spherical Earth.
pub fn distance_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);

    EARTH_RADIUS_M * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}

pub fn is_valid_coordinate(lat: f64, lng: f64) -> bool {
    lat >= -90.0 && lat <= 90.0 && lng >= -180.0 && lng <= 180.0
}
