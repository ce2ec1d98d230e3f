use crate::domain::ports::ShipmentStore;
use crate::domain::shipment::{ShipmentRecord, TrackingNumber};
use crate::error::{ConflictError, Result, TrackingError};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Options};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Column Family for storing shipment aggregates.
pub const CF_SHIPMENTS: &str = "shipments";

/// A persistent store implementation using RocksDB.
///
/// Each shipment aggregate (record, event log and ledger) is one JSON value keyed by
/// tracking number. Writes go through a mutex so the version check and the put are atomic.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

fn internal(message: String) -> TrackingError {
    TrackingError::Internal(Box::new(std::io::Error::other(message)))
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the "shipments" column family exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_shipments = ColumnFamilyDescriptor::new(CF_SHIPMENTS, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_shipments])?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(CF_SHIPMENTS)
            .ok_or_else(|| internal("Shipments column family not found".to_string()))
    }

    fn read(&self, tracking_number: &TrackingNumber) -> Result<Option<ShipmentRecord>> {
        let cf = self.cf()?;
        match self.db.get_cf(cf, tracking_number.as_str().as_bytes())? {
            Some(bytes) => {
                let record = serde_json::from_slice(&bytes)
                    .map_err(|e| internal(format!("Deserialization error: {e}")))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn write(&self, record: &ShipmentRecord) -> Result<()> {
        let cf = self.cf()?;
        let value = serde_json::to_vec(record)
            .map_err(|e| internal(format!("Serialization error: {e}")))?;
        self.db
            .put_cf(cf, record.tracking_number.as_str().as_bytes(), value)?;
        Ok(())
    }
}

#[async_trait]
impl ShipmentStore for RocksDBStore {
    async fn insert(&self, record: ShipmentRecord) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| internal("RocksDB write lock poisoned".to_string()))?;
        if self.read(&record.tracking_number)?.is_some() {
            return Err(TrackingError::Validation(format!(
                "tracking number {} already exists",
                record.tracking_number
            )));
        }
        self.write(&record)
    }

    async fn load(&self, tracking_number: &TrackingNumber) -> Result<Option<ShipmentRecord>> {
        self.read(tracking_number)
    }

    async fn save(&self, record: ShipmentRecord, expected_version: u64) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| internal("RocksDB write lock poisoned".to_string()))?;
        let stored = self.read(&record.tracking_number)?.ok_or_else(|| {
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
        self.write(&record)
    }

    async fn get_all(&self) -> Result<Vec<ShipmentRecord>> {
        let cf = self.cf()?;
        let mut shipments = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) =
                item.map_err(|e| internal(format!("RocksDB iteration error: {e}")))?;
            let record: ShipmentRecord = serde_json::from_slice(&value)
                .map_err(|e| internal(format!("Failed to deserialize shipment: {e}")))?;
            shipments.push(record);
        }
        Ok(shipments)
    }
}
