use super::payment::{PaymentMethod, PaymentType};
use super::shipment::{ShipmentRecord, TrackingNumber};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Persistence for shipment aggregates.
///
/// `save` is a compare-and-swap on [`ShipmentRecord::version`]: it must fail with
/// [`crate::error::ConflictError`] when the stored version differs from `expected_version`.
#[async_trait]
pub trait ShipmentStore: Send + Sync {
    async fn insert(&self, record: ShipmentRecord) -> Result<()>;
    async fn load(&self, tracking_number: &TrackingNumber) -> Result<Option<ShipmentRecord>>;
    async fn save(&self, record: ShipmentRecord, expected_version: u64) -> Result<()>;
    async fn get_all(&self) -> Result<Vec<ShipmentRecord>>;
}

pub type ShipmentStoreBox = Box<dyn ShipmentStore>;
pub type ShipmentStoreFactory = Box<dyn Fn() -> ShipmentStoreBox + Send + Sync>;

/// What a customer needs to pay for a shipment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentContext {
    pub tracking_number: TrackingNumber,
    pub amount_due: Decimal,
    pub currency: String,
    pub payment_type: PaymentType,
    pub allowed_methods: Vec<PaymentMethod>,
    pub preferred_method: Option<PaymentMethod>,
    pub message: Option<String>,
    pub contact: String,
}

/// Outbound delivery of payment instructions. Failures are logged by the caller.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_payment_instructions(&self, email: &str, context: &ShipmentContext)
    -> Result<()>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
