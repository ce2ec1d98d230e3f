//! Timeline synthesis.
//!
//! Merges the tracking log and the payment ledger of one shipment into the ordered,
//! annotated list shown to customers. The projection is pure: identical inputs give
//! identical output, and no wall-clock time is read.

use crate::domain::payment::{PaymentRecord, PaymentStatus};
use crate::domain::shipment::{Location, ShipmentRecord};
use crate::domain::status::ShipmentStatus;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineStatus {
    Shipment(ShipmentStatus),
    PaymentPending,
    PaymentReceived,
}

impl TimelineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimelineStatus::Shipment(status) => status.as_str(),
            TimelineStatus::PaymentPending => "payment_pending",
            TimelineStatus::PaymentReceived => "payment_received",
        }
    }

    /// Entries from here on are only reachable once a partial balance is settled.
    fn is_payment_gated(&self) -> bool {
        matches!(self, TimelineStatus::Shipment(status) if status.is_payment_gated())
    }
}

impl Serialize for TimelineStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineCategory {
    Shipment,
    Payment,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub status: TimelineStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub is_completed: bool,
    pub category: TimelineCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub entries: Vec<TimelineEntry>,
    pub completed_count: usize,
    pub progress_percent: u8,
}

impl Timeline {
    fn from_entries(entries: Vec<TimelineEntry>) -> Self {
        let completed_count = entries.iter().filter(|e| e.is_completed).count();
        let progress_percent = progress_percent(completed_count, entries.len());
        Self {
            entries,
            completed_count,
            progress_percent,
        }
    }
}

/// `round(100 * completed / total)`, halves rounded up.
fn progress_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((200 * completed + total) / (2 * total)) as u8
}

fn shipment_entry(
    status: ShipmentStatus,
    location: Option<Location>,
    description: String,
    timestamp: Option<DateTime<Utc>>,
    is_completed: bool,
) -> TimelineEntry {
    TimelineEntry {
        status: TimelineStatus::Shipment(status),
        location,
        description,
        timestamp,
        is_completed,
        category: TimelineCategory::Shipment,
    }
}

fn payment_entry(payment: &PaymentRecord) -> TimelineEntry {
    let amount = payment.amount_due().normalize();
    let (status, description) = match payment.status {
        PaymentStatus::Paid => {
            let via = payment
                .payment_method
                .map(|m| format!(" via {m}"))
                .unwrap_or_default();
            (
                TimelineStatus::PaymentReceived,
                format!("Payment of {amount} {} received{via}", payment.currency),
            )
        }
        PaymentStatus::Pending => (
            TimelineStatus::PaymentPending,
            format!("Awaiting payment of {amount} {}", payment.currency),
        ),
        PaymentStatus::Failed => (
            TimelineStatus::PaymentPending,
            format!("Payment of {amount} {} failed", payment.currency),
        ),
        PaymentStatus::Refunded => (
            TimelineStatus::PaymentPending,
            format!("Payment of {amount} {} was refunded", payment.currency),
        ),
    };

    TimelineEntry {
        status,
        location: None,
        description,
        timestamp: payment.paid_at.filter(|_| payment.is_paid()),
        is_completed: payment.is_paid(),
        category: TimelineCategory::Payment,
    }
}

/// Builds the merged timeline for a shipment and its ledger.
///
/// Order: the creation entry, every recorded event in log order, one pending entry per
/// canonical step not yet reached. The payment entry follows the first pickup that comes
/// before any gated entry; without one it sits right before the first gated entry, or
/// last when nothing is gated.
pub fn synthesize(shipment: &ShipmentRecord, payment: &PaymentRecord) -> Timeline {
    let mut entries = Vec::with_capacity(shipment.tracking.len() + 6);

    entries.push(shipment_entry(
        ShipmentStatus::Created,
        None,
        ShipmentStatus::Created.default_description().to_string(),
        Some(shipment.created_at),
        true,
    ));

    for event in &shipment.tracking {
        entries.push(shipment_entry(
            event.status,
            Some(event.location.clone()),
            event.description.clone(),
            Some(event.timestamp),
            true,
        ));
    }

    let current = shipment.current_status();
    if let Some(rank) = current.rank()
        && !current.is_terminal()
    {
        for status in &ShipmentStatus::CANONICAL[rank + 1..] {
            entries.push(shipment_entry(
                *status,
                None,
                status.default_description().to_string(),
                None,
                false,
            ));
        }
    }

    let gate = entries
        .iter()
        .position(|e| e.status.is_payment_gated())
        .unwrap_or(entries.len());
    let slot = entries[..gate]
        .iter()
        .position(|e| e.status == TimelineStatus::Shipment(ShipmentStatus::PickedUp))
        .map_or(gate, |pickup| pickup + 1);
    entries.insert(slot, payment_entry(payment));

    Timeline::from_entries(entries)
}
