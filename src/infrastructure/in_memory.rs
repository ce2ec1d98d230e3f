use crate::domain::ports::ShipmentStore;
use crate::domain::shipment::{ShipmentRecord, TrackingNumber};
use crate::error::{ConflictError, Result, TrackingError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for shipment aggregates.
///
/// Uses `Arc<RwLock<HashMap<TrackingNumber, ShipmentRecord>>>` so clones share state.
/// The version check and the write happen under one write lock.
#[derive(Default, Clone)]
pub struct InMemoryShipmentStore {
    shipments: Arc<RwLock<HashMap<TrackingNumber, ShipmentRecord>>>,
}

impl InMemoryShipmentStore {
    /// Creates a new, empty in-memory shipment store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ShipmentStore for InMemoryShipmentStore {
    async fn insert(&self, record: ShipmentRecord) -> Result<()> {
        let mut shipments = self.shipments.write().await;
        if shipments.contains_key(&record.tracking_number) {
            return Err(TrackingError::Validation(format!(
                "tracking number {} already exists",
                record.tracking_number
            )));
        }
        shipments.insert(record.tracking_number.clone(), record);
        Ok(())
    }

    async fn load(&self, tracking_number: &TrackingNumber) -> Result<Option<ShipmentRecord>> {
        let shipments = self.shipments.read().await;
        Ok(shipments.get(tracking_number).cloned())
    }

    async fn save(&self, record: ShipmentRecord, expected_version: u64) -> Result<()> {
        let mut shipments = self.shipments.write().await;
        let stored = shipments.get_mut(&record.tracking_number).ok_or_else(|| {
            TrackingError::NotFound(format!("shipment {}", record.tracking_number))
        })?;

        if stored.version != expected_version {
            return Err(ConflictError {
                tracking_number: record.tracking_number.to_string(),
                expected: expected_version,
                found: stored.version,
            }
            .into());
        }

        *stored = record;
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<ShipmentRecord>> {
        let shipments = self.shipments.read().await;
        let mut all: Vec<ShipmentRecord> = shipments.values().cloned().collect();
        all.sort_by(|a, b| a.tracking_number.cmp(&b.tracking_number));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::Amount;
    use crate::domain::shipment::NewShipment;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn record(tracking: &str) -> ShipmentRecord {
        let new = NewShipment::new(
            TrackingNumber::new(tracking).unwrap(),
            Amount::new(dec!(25)).unwrap(),
        );
        ShipmentRecord::new(new, "admin", Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn test_in_memory_insert_and_load() {
        let store = InMemoryShipmentStore::new();
        let shipment = record("TRK-1");

        store.insert(shipment.clone()).await.unwrap();
        let retrieved = store.load(&shipment.tracking_number).await.unwrap().unwrap();
        assert_eq!(retrieved, shipment);

        let missing = TrackingNumber::new("TRK-2").unwrap();
        assert!(store.load(&missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_in_memory_rejects_duplicate_insert() {
        let store = InMemoryShipmentStore::new();
        store.insert(record("TRK-1")).await.unwrap();
        let result = store.insert(record("TRK-1")).await;
        assert!(matches!(result, Err(TrackingError::Validation(_))));
    }

    #[tokio::test]
    async fn test_in_memory_save_compares_versions() {
        let store = InMemoryShipmentStore::new();
        let shipment = record("TRK-1");
        store.insert(shipment.clone()).await.unwrap();

        let mut first = shipment.clone();
        first.version = 1;
        store.save(first, 0).await.unwrap();

        let mut stale = shipment.clone();
        stale.version = 1;
        let result = store.save(stale, 0).await;
        assert!(matches!(
            result,
            Err(TrackingError::Conflict(ConflictError {
                expected: 0,
                found: 1,
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn test_in_memory_save_unknown_is_not_found() {
        let store = InMemoryShipmentStore::new();
        let result = store.save(record("TRK-404"), 0).await;
        assert!(matches!(result, Err(TrackingError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_in_memory_get_all_is_sorted() {
        let store = InMemoryShipmentStore::new();
        store.insert(record("TRK-B")).await.unwrap();
        store.insert(record("TRK-A")).await.unwrap();

        let all = store.get_all().await.unwrap();
        let numbers: Vec<_> = all.iter().map(|r| r.tracking_number.as_str()).collect();
        assert_eq!(numbers, vec!["TRK-A", "TRK-B"]);
    }
}
