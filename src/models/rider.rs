use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::GeoPoint;

/// A courier account. Owned by exactly one user; offers hold a weak
/// reference, so deactivating a rider never touches their past deliveries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rider {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    /// Online/offline toggle, client-driven.
    pub is_active: bool,
    /// Ephemeral, client-reported; never transactionally coupled to offers.
    pub location: Option<GeoPoint>,
    pub suspended_until: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Rider {
    pub fn suspended(&self, now: DateTime<Utc>) -> bool {
        self.suspended_until.is_some_and(|until| now < until)
    }

    /// May claim offers: online and not inside a suspension window.
    pub fn can_accept(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.suspended(now)
    }
}
