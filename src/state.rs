use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::config::{Config, DispatchSettings};
use crate::models::events::OfferEvent;
use crate::models::offer::DeliveryOffer;
use crate::models::order::OrderItem;
use crate::models::rider::Rider;
use crate::observability::metrics::Metrics;
use crate::zones::ZoneBroadcaster;

/// Shared service state. The `offers` map is the system of record for
/// dispatch: a `get_mut`/`entry` guard on it is the row lock, and every
/// state-changing operation on an offer runs start-to-finish inside one
/// guard. `offers_by_item` indexes the latest offer per order item and is
/// only written under its own entry guard (offer creation), so at most one
/// active offer can exist per item. Lock ordering: the index guard may be
/// held while touching `offers`; never the reverse.
pub struct AppState {
    pub order_items: DashMap<Uuid, OrderItem>,
    pub offers: DashMap<Uuid, DeliveryOffer>,
    /// order_item_id -> id of the latest offer for that item.
    pub offers_by_item: DashMap<Uuid, Uuid>,
    pub riders: DashMap<Uuid, Rider>,
    /// user_id -> rider_id; one rider account per user.
    pub riders_by_user: DashMap<Uuid, Uuid>,
    pub zones: ZoneBroadcaster,
    pub events_tx: broadcast::Sender<OfferEvent>,
    pub metrics: Metrics,
    pub settings: DispatchSettings,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);

        Self {
            order_items: DashMap::new(),
            offers: DashMap::new(),
            offers_by_item: DashMap::new(),
            riders: DashMap::new(),
            riders_by_user: DashMap::new(),
            zones: ZoneBroadcaster::new(config.zone_buffer_size),
            events_tx,
            metrics: Metrics::new(),
            settings: config.dispatch.clone(),
        }
    }

    /// The latest offer recorded for an order item, if any.
    pub fn latest_offer_for_item(&self, order_item_id: Uuid) -> Option<DeliveryOffer> {
        let offer_id = *self.offers_by_item.get(&order_item_id)?;
        self.offers.get(&offer_id).map(|entry| entry.value().clone())
    }

    /// Best-effort post-commit event publication. Lagging or absent
    /// subscribers never affect the committed state change.
    pub fn publish_event(&self, event: OfferEvent) {
        if self.events_tx.send(event).is_err() {
            debug!("no event subscribers connected");
        }
    }
}
