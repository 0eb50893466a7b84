//! Branch Model

use serde::{Deserialize, Serialize};

/// Geohash precision stored with branch locations (~150 m cells)
pub const GEOHASH_PRECISION: usize = 7;

const GEOHASH_BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Branch activation status, kept in step with [`Branch::active`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BranchStatus {
    #[default]
    Active,
    Inactive,
}

/// Postal address as entered in the road-address search form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default)]
    pub road_addr: String,
    #[serde(default)]
    pub zip_no: String,
    #[serde(default)]
    pub detail: String,
}

/// Raw coordinate pair supplied by an operator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Stored location with its geohash for proximity queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub lat: f64,
    pub lng: f64,
    pub geohash: String,
}

impl From<GeoPoint> for GeoLocation {
    fn from(p: GeoPoint) -> Self {
        Self {
            lat: p.lat,
            lng: p.lng,
            geohash: geohash(p.lat, p.lng, GEOHASH_PRECISION),
        }
    }
}

/// Branch (store) record, keyed by branch id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub branch_id: String,
    pub name: String,
    pub active: bool,
    #[serde(default)]
    pub status: BranchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoLocation>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Branch {
    /// Flip activation, keeping `status` in step
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
        self.status = if active {
            BranchStatus::Active
        } else {
            BranchStatus::Inactive
        };
    }
}

/// HQ profile edit payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchUpdate {
    pub name: Option<String>,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Address>,
    pub location: Option<GeoPoint>,
}

/// Encode a coordinate as a base32 geohash of `precision` characters
pub fn geohash(lat: f64, lng: f64, precision: usize) -> String {
    let (mut lat_lo, mut lat_hi) = (-90.0_f64, 90.0_f64);
    let (mut lng_lo, mut lng_hi) = (-180.0_f64, 180.0_f64);
    let mut out = String::with_capacity(precision);
    let mut bits = 0usize;
    let mut bit_count = 0;
    let mut even = true;

    while out.len() < precision {
        // Even bits refine longitude, odd bits latitude
        let (value, lo, hi) = if even {
            (lng, &mut lng_lo, &mut lng_hi)
        } else {
            (lat, &mut lat_lo, &mut lat_hi)
        };
        let mid = (*lo + *hi) / 2.0;
        if value >= mid {
            bits = (bits << 1) | 1;
            *lo = mid;
        } else {
            bits <<= 1;
            *hi = mid;
        }
        even = !even;
        bit_count += 1;

        if bit_count == 5 {
            out.push(GEOHASH_BASE32[bits] as char);
            bits = 0;
            bit_count = 0;
        }
    }
    out
}
