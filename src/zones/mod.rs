//! Geographically-scoped pub/sub. One broadcast topic per rider-zone
//! geohash cell, created lazily and pruned once the last subscriber is
//! gone. Publishing is fire-and-forget; a topic with no subscribers drops
//! the payload.

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

use crate::models::events::OfferBroadcast;

pub struct ZoneBroadcaster {
    topics: DashMap<String, broadcast::Sender<OfferBroadcast>>,
    capacity: usize,
}

impl ZoneBroadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: DashMap::new(),
            capacity,
        }
    }

    /// Join a zone topic, creating it on first subscription.
    pub fn subscribe(&self, cell: &str) -> broadcast::Receiver<OfferBroadcast> {
        self.topics
            .entry(cell.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publish an offer to every listed cell. Returns the number of
    /// subscribers reached across all topics.
    pub fn publish(&self, cells: &[String], offer: &OfferBroadcast) -> usize {
        let mut reached = 0;
        for cell in cells {
            let Some(topic) = self.topics.get(cell) else {
                continue;
            };
            if let Ok(count) = topic.send(offer.clone()) {
                reached += count;
            }
        }
        debug!(offer_id = %offer.offer_id, cells = cells.len(), reached, "offer published");
        self.prune();
        reached
    }

    /// Drop topics whose last receiver has disconnected.
    fn prune(&self) {
        self.topics.retain(|_, tx| tx.receiver_count() > 0);
    }

    #[cfg(test)]
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}

/// Subscription delta when a rider session's position moves between cells.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ZoneChange {
    pub unsubscribe: Option<String>,
    pub subscribe: Option<String>,
}

impl ZoneChange {
    pub fn is_noop(&self) -> bool {
        self.unsubscribe.is_none() && self.subscribe.is_none()
    }
}

/// Pure transition function for a session's zone membership: given the
/// currently subscribed cell and the cell of the latest position, what to
/// leave and what to join.
pub fn zone_transition(current: Option<&str>, next: &str) -> ZoneChange {
    match current {
        Some(cell) if cell == next => ZoneChange::default(),
        Some(cell) => ZoneChange {
            unsubscribe: Some(cell.to_string()),
            subscribe: Some(next.to_string()),
        },
        None => ZoneChange {
            unsubscribe: None,
            subscribe: Some(next.to_string()),
        },
    }
}
