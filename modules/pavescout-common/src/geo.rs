//! Geographic helpers shared across the pipeline: great-circle distance,
//! centroids, geodesic polygon area, and area-ring validation.

use ::geo::{Centroid, GeodesicArea, LineString, Polygon};

use crate::error::DiscoveryError;
use crate::types::GeoPoint;

/// Square feet per square meter.
pub const SQFT_PER_M2: f64 = 10.764;

/// Area assigned to a lot whose cluster carries no polygon geometry —
/// a typical unmeasured suburban lot.
pub const DEFAULT_UNMEASURED_AREA_M2: f64 = 2_000.0;

/// Haversine great-circle distance in meters between two lat/lng points.
pub fn haversine_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let r = 6_371_000.0; // Earth radius in meters
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    r * c
}

/// Haversine distance in meters between two points.
pub fn distance_meters(a: &GeoPoint, b: &GeoPoint) -> f64 {
    haversine_meters(a.lat, a.lng, b.lat, b.lng)
}

/// Arithmetic mean of a set of points. `None` for an empty slice.
pub fn mean_centroid(points: &[GeoPoint]) -> Option<GeoPoint> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let lat = points.iter().map(|p| p.lat).sum::<f64>() / n;
    let lng = points.iter().map(|p| p.lng).sum::<f64>() / n;
    Some(GeoPoint::new(lat, lng))
}

/// Centroid of a polygon, if the polygon is non-degenerate.
pub fn polygon_centroid(poly: &Polygon<f64>) -> Option<GeoPoint> {
    poly.centroid().map(GeoPoint::from)
}

/// Polygon surface area in m² on the WGS84 ellipsoid.
pub fn geodesic_area_m2(poly: &Polygon<f64>) -> f64 {
    poly.geodesic_area_unsigned()
}

/// Build a polygon from an exterior ring of lat/lng points. The ring is
/// closed implicitly; it must contain at least 3 points with coordinates in
/// valid WGS84 ranges.
pub fn area_polygon(ring: &[GeoPoint]) -> Result<Polygon<f64>, DiscoveryError> {
    validate_ring(ring)?;
    let exterior: Vec<(f64, f64)> = ring.iter().map(|p| (p.lng, p.lat)).collect();
    Ok(Polygon::new(LineString::from(exterior), vec![]))
}

/// Validate an area ring: at least 3 points, all coordinates finite and in
/// range.
pub fn validate_ring(ring: &[GeoPoint]) -> Result<(), DiscoveryError> {
    if ring.len() < 3 {
        return Err(DiscoveryError::Validation(format!(
            "area polygon needs at least 3 points, got {}",
            ring.len()
        )));
    }
    for (i, p) in ring.iter().enumerate() {
        if !p.lat.is_finite() || !p.lng.is_finite() {
            return Err(DiscoveryError::Validation(format!(
                "area point {i} has non-finite coordinates"
            )));
        }
        if !(-90.0..=90.0).contains(&p.lat) {
            return Err(DiscoveryError::Validation(format!(
                "area point {i} latitude {} out of range",
                p.lat
            )));
        }
        if !(-180.0..=180.0).contains(&p.lng) {
            return Err(DiscoveryError::Validation(format!(
                "area point {i} longitude {} out of range",
                p.lng
            )));
        }
    }
    Ok(())
}
