//! Geographic to UTM conversion.
//!
//! Uses the transverse Mercator series expansion on a WGS84-like ellipsoid.
//! Northing carries no false-northing offset, so points south of the equator
//! get negative northings; only the northern hemisphere is meaningful here.
//! There is no inverse transform.

use crate::models::{GeoPoint, ProjectedPoint};

/// Semi-major axis in meters.
pub const SEMI_MAJOR_AXIS_M: f64 = 6_378_137.0;
pub const ECCENTRICITY: f64 = 0.081_819_2;
pub const SCALE_FACTOR: f64 = 0.9996;
pub const FALSE_EASTING_M: f64 = 500_000.0;

const ZONE_WIDTH_DEG: f64 = 6.0;

/// UTM zone for a longitude. A longitude on a zone boundary belongs to the
/// zone east of it, so 180° yields 61.
pub fn zone_for(lon: f64) -> u8 {
    ((lon + 180.0) / ZONE_WIDTH_DEG).floor() as u8 + 1
}

pub fn central_meridian(zone: u8) -> f64 {
    (zone as f64 - 1.0) * ZONE_WIDTH_DEG - 180.0 + ZONE_WIDTH_DEG / 2.0
}

pub fn project(point: GeoPoint) -> ProjectedPoint {
    let zone = zone_for(point.lon);
    let lon0 = central_meridian(zone).to_radians();
    let phi = point.lat.to_radians();
    let lambda = point.lon.to_radians();

    let e2 = ECCENTRICITY * ECCENTRICITY;
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    let ep2 = e2 / (1.0 - e2);

    let (sin_phi, cos_phi) = phi.sin_cos();
    let tan_phi = phi.tan();

    let n = SEMI_MAJOR_AXIS_M / (1.0 - e2 * sin_phi * sin_phi).sqrt();
    let t = tan_phi * tan_phi;
    let c = ep2 * cos_phi * cos_phi;
    let a = cos_phi * (lambda - lon0);

    let m = SEMI_MAJOR_AXIS_M
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin());

    let a2 = a * a;
    let a3 = a2 * a;
    let a4 = a3 * a;
    let a5 = a4 * a;
    let a6 = a5 * a;

    let easting = SCALE_FACTOR
        * n
        * (a + (1.0 - t + c) * a3 / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a5 / 120.0)
        + FALSE_EASTING_M;

    let northing = SCALE_FACTOR
        * (m + n
            * tan_phi
            * (a2 / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a6 / 720.0));

    ProjectedPoint {
        easting,
        northing,
        zone,
    }
}
