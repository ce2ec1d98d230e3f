use crate::domain::payment::{Amount, PaymentMethod, PaymentRecord, PaymentType};
use crate::domain::status::ShipmentStatus;
use crate::error::{TrackingError, TransitionError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, immutable shipment identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TrackingNumber(String);

impl TrackingNumber {
    pub fn new(value: impl AsRef<str>) -> Result<Self, TrackingError> {
        let value = value.as_ref().trim();
        if value.is_empty() {
            return Err(TrackingError::Validation(
                "tracking number is required".to_string(),
            ));
        }
        if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(TrackingError::Validation(format!(
                "tracking number '{value}' contains invalid characters"
            )));
        }
        Ok(Self(value.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TrackingNumber {
    type Error = TrackingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TrackingNumber> for String {
    fn from(value: TrackingNumber) -> Self {
        value.0
    }
}

impl fmt::Display for TrackingNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Facility or landmark, e.g. a depot name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub city: String,
    pub state: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

impl Location {
    pub fn new(
        city: impl Into<String>,
        state: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            name: None,
            city: city.into(),
            state: state.into(),
            country: country.into(),
            coordinates: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = Some(name).filter(|n| !n.trim().is_empty());
        self
    }
}

/// A courier update as submitted, before it is stamped and appended.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrackingEvent {
    pub status: ShipmentStatus,
    pub location: Location,
    pub description: String,
    /// Defaults to the engine clock when absent.
    pub timestamp: Option<DateTime<Utc>>,
}

/// An appended courier update. Immutable once in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEvent {
    pub status: ShipmentStatus,
    pub location: Location,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub updated_by: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusInfo {
    pub current: ShipmentStatus,
    pub last_updated: DateTime<Utc>,
}

/// Parameters for opening a shipment and its ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct NewShipment {
    pub tracking_number: TrackingNumber,
    pub base_amount: Amount,
    pub payment_type: PaymentType,
    pub currency: String,
    /// All methods are accepted when empty.
    pub allowed_methods: Vec<PaymentMethod>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl NewShipment {
    pub fn new(tracking_number: TrackingNumber, base_amount: Amount) -> Self {
        Self {
            tracking_number,
            base_amount,
            payment_type: PaymentType::default(),
            currency: "USD".to_string(),
            allowed_methods: Vec::new(),
            estimated_delivery: None,
            notes: None,
        }
    }

    pub fn with_payment_type(mut self, payment_type: PaymentType) -> Self {
        self.payment_type = payment_type;
        self
    }

    pub fn with_allowed_methods(mut self, methods: impl IntoIterator<Item = PaymentMethod>) -> Self {
        self.allowed_methods = methods.into_iter().collect();
        self
    }

    pub fn with_estimated_delivery(mut self, estimated_delivery: DateTime<Utc>) -> Self {
        self.estimated_delivery = Some(estimated_delivery);
        self
    }
}

/// A shipment aggregate: delivery status, its append-only event log and its ledger.
///
/// `version` is the optimistic concurrency counter checked by stores on save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentRecord {
    pub tracking_number: TrackingNumber,
    pub status: StatusInfo,
    pub tracking: Vec<TrackingEvent>,
    pub payment: PaymentRecord,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub version: u64,
}

impl ShipmentRecord {
    pub fn new(
        shipment: NewShipment,
        created_by: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, TrackingError> {
        let methods = if shipment.allowed_methods.is_empty() {
            PaymentMethod::ALL.to_vec()
        } else {
            shipment.allowed_methods
        };
        let payment = PaymentRecord::new(
            shipment.base_amount,
            shipment.payment_type,
            shipment.currency,
            methods,
        )?;

        Ok(Self {
            tracking_number: shipment.tracking_number,
            status: StatusInfo {
                current: ShipmentStatus::Created,
                last_updated: created_at,
            },
            tracking: Vec::new(),
            payment,
            created_by: created_by.into(),
            created_at,
            estimated_delivery: shipment.estimated_delivery,
            notes: shipment.notes.filter(|n| !n.trim().is_empty()),
            is_active: true,
            version: 0,
        })
    }

    pub fn current_status(&self) -> ShipmentStatus {
        self.status.current
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.status.last_updated
    }

    /// Location of the most recent event, if any.
    pub fn current_location(&self) -> Option<&Location> {
        self.tracking.last().map(|event| &event.location)
    }

    /// Checks whether an event with `status` at `timestamp` may be appended.
    ///
    /// Only time travel and the partial-payment hold are rejected; delivery states
    /// may otherwise be skipped or revisited in any order.
    pub fn check_transition(
        &self,
        status: ShipmentStatus,
        timestamp: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if timestamp < self.status.last_updated {
            return Err(TransitionError::NonMonotonicTimestamp {
                last_updated: self.status.last_updated,
                attempted: timestamp,
            });
        }

        if status.is_payment_gated() && self.payment.holds_delivery() {
            return Err(TransitionError::GatingViolation {
                required_amount: self.payment.amount_due(),
                paid_amount: self.payment.paid_amount(),
            });
        }

        Ok(())
    }

    /// Status transition engine: validates, then appends the event and moves the status.
    pub fn append_tracking_event(
        &mut self,
        event: NewTrackingEvent,
        recorded_by: &str,
        now: DateTime<Utc>,
    ) -> Result<&TrackingEvent, TransitionError> {
        let timestamp = event.timestamp.unwrap_or(now);
        self.check_transition(event.status, timestamp)?;

        let description = match event.description.trim() {
            "" => event.status.default_description().to_string(),
            text => text.to_string(),
        };

        self.tracking.push(TrackingEvent {
            status: event.status,
            location: event.location,
            description,
            timestamp,
            updated_by: recorded_by.to_string(),
        });
        self.status = StatusInfo {
            current: event.status,
            last_updated: timestamp,
        };

        Ok(&self.tracking[self.tracking.len() - 1])
    }
}
