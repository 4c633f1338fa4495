use chrono::{DateTime, Utc};
use serde::Serialize;

/// WGS84 equatorial radius (km).
pub const WGS84_A_KM: f64 = 6378.137;
/// WGS84 flattening.
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// J2000 epoch, 2000-01-01 12:00:00 UTC, in Unix milliseconds.
const J2000_UNIX_MILLIS: i64 = 946_728_000_000;

/// Point on (or above) the WGS84 ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Geodetic {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_km: f64,
}

/// Compute GMST (radians) from UTC time using a simplified expression.
pub fn gmst(t: DateTime<Utc>) -> f64 {
    let millis = (t.timestamp_millis() - J2000_UNIX_MILLIS) as f64;
    let days = millis / 86_400_000.0;
    let gmst_deg = 280.46061837 + 360.98564736629 * days;
    gmst_deg.rem_euclid(360.0).to_radians()
}

/// Rotate a TEME position about Z by GMST into the Earth-fixed frame.
pub fn teme_to_earth_fixed(pos_teme_km: &[f64; 3], gmst_rad: f64) -> [f64; 3] {
    let (sin_t, cos_t) = gmst_rad.sin_cos();
    [
        cos_t * pos_teme_km[0] + sin_t * pos_teme_km[1],
        -sin_t * pos_teme_km[0] + cos_t * pos_teme_km[1],
        pos_teme_km[2],
    ]
}

/// Earth-fixed Cartesian position to WGS84 latitude/longitude/altitude (Bowring).
pub fn earth_fixed_to_geodetic(pos_km: &[f64; 3]) -> Geodetic {
    let [x, y, z] = *pos_km;
    let a = WGS84_A_KM;
    let b = a * (1.0 - WGS84_F);
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let ep2 = (a * a - b * b) / (b * b);

    let p = (x * x + y * y).sqrt();
    let th = (a * z).atan2(b * p);
    let (sin_th, cos_th) = th.sin_cos();
    let lat = (z + ep2 * b * sin_th.powi(3)).atan2(p - e2 * a * cos_th.powi(3));
    let lon = y.atan2(x);

    // Stable at the poles, unlike p / cos(lat) - N
    let (sin_lat, cos_lat) = lat.sin_cos();
    let alt = p * cos_lat + z * sin_lat - a * (1.0 - e2 * sin_lat * sin_lat).sqrt();

    Geodetic {
        latitude_deg: lat.to_degrees(),
        longitude_deg: lon.to_degrees(),
        altitude_km: alt,
    }
}

/// Straight-line separation of two Cartesian positions (km).
pub fn distance_km(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

pub fn norm(v: &[f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}
