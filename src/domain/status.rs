use crate::error::TransitionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Physical delivery state of a shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Created,
    PickedUp,
    InTransit,
    OutForDelivery,
    Delivered,
    Exception,
    Returned,
}

impl ShipmentStatus {
    /// The happy path, in order. `Exception` and `Returned` sit outside it.
    pub const CANONICAL: [ShipmentStatus; 5] = [
        ShipmentStatus::Created,
        ShipmentStatus::PickedUp,
        ShipmentStatus::InTransit,
        ShipmentStatus::OutForDelivery,
        ShipmentStatus::Delivered,
    ];

    pub const ALL: [ShipmentStatus; 7] = [
        ShipmentStatus::Created,
        ShipmentStatus::PickedUp,
        ShipmentStatus::InTransit,
        ShipmentStatus::OutForDelivery,
        ShipmentStatus::Delivered,
        ShipmentStatus::Exception,
        ShipmentStatus::Returned,
    ];

    /// Position on the canonical path, `None` for operational failure states.
    pub fn rank(self) -> Option<usize> {
        Self::CANONICAL.iter().position(|s| *s == self)
    }

    /// Exception and return are reported regardless of payment.
    pub fn is_operational_failure(self) -> bool {
        matches!(self, ShipmentStatus::Exception | ShipmentStatus::Returned)
    }

    /// Whether reaching this status requires an outstanding partial payment to be settled.
    pub fn is_payment_gated(self) -> bool {
        matches!(
            self,
            ShipmentStatus::InTransit | ShipmentStatus::OutForDelivery | ShipmentStatus::Delivered
        )
    }

    /// No further canonical progress is expected once one of these is reached.
    pub fn is_terminal(self) -> bool {
        self == ShipmentStatus::Delivered || self.is_operational_failure()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ShipmentStatus::Created => "created",
            ShipmentStatus::PickedUp => "picked_up",
            ShipmentStatus::InTransit => "in_transit",
            ShipmentStatus::OutForDelivery => "out_for_delivery",
            ShipmentStatus::Delivered => "delivered",
            ShipmentStatus::Exception => "exception",
            ShipmentStatus::Returned => "returned",
        }
    }

    /// Description used when an event is recorded without one.
    pub fn default_description(self) -> &'static str {
        match self {
            ShipmentStatus::Created => "Shipment created and ready for pickup",
            ShipmentStatus::PickedUp => "Package picked up from sender",
            ShipmentStatus::InTransit => "Package is in transit to destination",
            ShipmentStatus::OutForDelivery => "Package is out for delivery",
            ShipmentStatus::Delivered => "Package delivered successfully",
            ShipmentStatus::Exception => "Delivery exception occurred",
            ShipmentStatus::Returned => "Package returned to sender",
        }
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShipmentStatus {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| TransitionError::InvalidStatus(s.to_string()))
    }
}
