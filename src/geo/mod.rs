//! Geohash bucketing for offers and rider zones.
//!
//! Precision 4 (cells roughly 39x20 km) buckets pickup offers; precision 5
//! (roughly 5x5 km) is the granularity riders subscribe at.

use crate::error::AppError;

pub const OFFER_CELL_PRECISION: usize = 4;
pub const RIDER_ZONE_PRECISION: usize = 5;

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Rectangle covered by a geohash cell, degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellBounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lng_min: f64,
    pub lng_max: f64,
}

impl CellBounds {
    pub fn center(&self) -> (f64, f64) {
        (
            (self.lat_min + self.lat_max) / 2.0,
            (self.lng_min + self.lng_max) / 2.0,
        )
    }

    pub fn lat_span(&self) -> f64 {
        self.lat_max - self.lat_min
    }

    pub fn lng_span(&self) -> f64 {
        self.lng_max - self.lng_min
    }
}

/// Rejects coordinates outside [-90,90] x [-180,180]. Callers must run this
/// at the API boundary; `encode` assumes valid input.
pub fn validate(lat: f64, lng: f64) -> Result<(), AppError> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(AppError::BadRequest(format!("latitude {lat} out of range")));
    }
    if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
        return Err(AppError::BadRequest(format!(
            "longitude {lng} out of range"
        )));
    }
    Ok(())
}

/// Standard base-32 geohash: bits alternate longitude/latitude, longitude
/// first, five bits per output character.
pub fn encode(lat: f64, lng: f64, precision: usize) -> String {
    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lng_range = (-180.0_f64, 180.0_f64);
    let mut hash = String::with_capacity(precision);
    let mut bits: u8 = 0;
    let mut bit_count = 0;
    let mut even_bit = true;

    while hash.len() < precision {
        if even_bit {
            let mid = (lng_range.0 + lng_range.1) / 2.0;
            if lng >= mid {
                bits = (bits << 1) | 1;
                lng_range.0 = mid;
            } else {
                bits <<= 1;
                lng_range.1 = mid;
            }
        } else {
            let mid = (lat_range.0 + lat_range.1) / 2.0;
            if lat >= mid {
                bits = (bits << 1) | 1;
                lat_range.0 = mid;
            } else {
                bits <<= 1;
                lat_range.1 = mid;
            }
        }
        even_bit = !even_bit;
        bit_count += 1;

        if bit_count == 5 {
            hash.push(BASE32[bits as usize] as char);
            bits = 0;
            bit_count = 0;
        }
    }

    hash
}

/// Decodes a geohash back to the rectangle it names. Callers only ever pass
/// `encode` output, so an out-of-alphabet character is a bug upstream: it
/// trips a debug assertion and is otherwise ignored.
pub fn cell_bounds(hash: &str) -> CellBounds {
    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lng_range = (-180.0_f64, 180.0_f64);
    let mut even_bit = true;

    for ch in hash.bytes() {
        let Some(value) = BASE32.iter().position(|b| *b == ch.to_ascii_lowercase()) else {
            debug_assert!(false, "out-of-alphabet geohash byte {ch:#04x} in {hash:?}");
            continue;
        };
        for shift in (0..5).rev() {
            let bit = (value >> shift) & 1;
            if even_bit {
                let mid = (lng_range.0 + lng_range.1) / 2.0;
                if bit == 1 {
                    lng_range.0 = mid;
                } else {
                    lng_range.1 = mid;
                }
            } else {
                let mid = (lat_range.0 + lat_range.1) / 2.0;
                if bit == 1 {
                    lat_range.0 = mid;
                } else {
                    lat_range.1 = mid;
                }
            }
            even_bit = !even_bit;
        }
    }

    CellBounds {
        lat_min: lat_range.0,
        lat_max: lat_range.1,
        lng_min: lng_range.0,
        lng_max: lng_range.1,
    }
}

/// The up-to-8 cells adjacent to `hash` at the same precision: decode the
/// cell, step the center one cell span in each direction, re-encode.
/// Longitude wraps at the antimeridian; rows past the poles are skipped, so
/// polar cells return fewer than 8 neighbors. Deduplicated, origin excluded.
pub fn neighbors(hash: &str) -> Vec<String> {
    let bounds = cell_bounds(hash);
    let (lat, lng) = bounds.center();
    let lat_step = bounds.lat_span();
    let lng_step = bounds.lng_span();

    let mut out = Vec::with_capacity(8);
    for d_lat in [-1.0, 0.0, 1.0] {
        for d_lng in [-1.0, 0.0, 1.0] {
            if d_lat == 0.0 && d_lng == 0.0 {
                continue;
            }
            let n_lat = lat + d_lat * lat_step;
            if !(-90.0..=90.0).contains(&n_lat) {
                continue;
            }
            let mut n_lng = lng + d_lng * lng_step;
            if n_lng >= 180.0 {
                n_lng -= 360.0;
            } else if n_lng < -180.0 {
                n_lng += 360.0;
            }
            let neighbor = encode(n_lat, n_lng, hash.len());
            if neighbor != hash && !out.contains(&neighbor) {
                out.push(neighbor);
            }
        }
    }
    out
}

/// The broadcast fan-out for a pickup point: the rider-zone cell containing
/// it plus that cell's neighbors, so riders just across a cell boundary
/// still see the offer.
pub fn broadcast_cells(lat: f64, lng: f64) -> Vec<String> {
    let origin = encode(lat, lng, RIDER_ZONE_PRECISION);
    let mut cells = neighbors(&origin);
    cells.insert(0, origin);
    cells
}
