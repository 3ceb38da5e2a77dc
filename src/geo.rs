//! Great-circle distance and the bounding-box prefilter for radius queries.

use crate::models::GeoPoint;

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

// Kilometers per degree of latitude; slightly under the true value so the
// derived box is never smaller than the circle it covers.
const KM_PER_DEGREE: f64 = 111.0;

// ---

/// Haversine distance between two points, in kilometers.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    // ---
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// A degree-space box around a search circle.
///
/// Conservative: every point within `radius_km` of the center lies inside
/// the box, so callers can reject on the cheap comparison and reserve the
/// exact Haversine check for the survivors.
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    min_latitude: f64,
    max_latitude: f64,
    min_longitude: f64,
    max_longitude: f64,
}

impl BoundingBox {
    // ---
    pub fn around(center: GeoPoint, radius_km: f64) -> Self {
        // ---
        let dlat = radius_km / KM_PER_DEGREE;

        // Longitude degrees shrink with latitude; near the poles the box
        // widens to the full circle instead of dividing by ~zero.
        let lat_cos = center.latitude.to_radians().cos().abs();
        let dlon = if lat_cos < 1e-6 {
            180.0
        } else {
            (radius_km / (KM_PER_DEGREE * lat_cos)).min(180.0)
        };

        Self {
            min_latitude: (center.latitude - dlat).max(-90.0),
            max_latitude: (center.latitude + dlat).min(90.0),
            min_longitude: center.longitude - dlon,
            max_longitude: center.longitude + dlon,
        }
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        // ---
        point.latitude >= self.min_latitude
            && point.latitude <= self.max_latitude
            && point.longitude >= self.min_longitude
            && point.longitude <= self.max_longitude
    }
}
