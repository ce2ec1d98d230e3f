//! Read models returned by the engine's queries.
//!
//! Field names follow the public JSON contract (`status.current`, `payment.status`,
//! `payment.paymentType`, ...).

use crate::config::EngineConfig;
use crate::domain::payment::{PaymentMethod, PaymentRecord, PaymentStatus, PaymentType};
use crate::domain::shipment::{Location, ShipmentRecord, StatusInfo, TrackingEvent, TrackingNumber};
use crate::domain::status::ShipmentStatus;
use crate::domain::timeline::{TimelineEntry, synthesize};
use crate::domain::verification::VerificationRequest;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

fn payment_message(payment: &PaymentRecord) -> String {
    let due = payment.amount_due().normalize();
    let currency = &payment.currency;
    match (payment.status, payment.payment_type) {
        (PaymentStatus::Pending, PaymentType::Partial) => format!(
            "The sender has paid 50% of the total amount ({} {currency}). Please pay the remaining {due} {currency} to proceed with the shipment.",
            payment.base_amount.value().normalize()
        ),
        (PaymentStatus::Pending, PaymentType::Full) => {
            format!("Payment of {due} {currency} is pending.")
        }
        (PaymentStatus::Paid, _) => "Payment received. Thank you!".to_string(),
        (PaymentStatus::Failed, _) => {
            "Payment failed. Please contact support to arrange a new payment.".to_string()
        }
        (PaymentStatus::Refunded, _) => "Payment has been refunded.".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicPayment {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub payment_type: PaymentType,
    #[serde(with = "rust_decimal::serde::float")]
    pub base_amount: Decimal,
    pub allowed_methods: Vec<PaymentMethod>,
    pub message: String,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInstructions {
    pub message: String,
    pub contact_info: String,
    pub support_message: String,
}

/// Shipment as shown on the public tracking page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicShipment {
    pub tracking_number: TrackingNumber,
    pub status: StatusInfo,
    pub tracking: Vec<TrackingEvent>,
    pub payment: PublicPayment,
    pub payment_instructions: PaymentInstructions,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub current_location: Option<Location>,
}

impl PublicShipment {
    pub fn from_record(record: &ShipmentRecord, config: &EngineConfig) -> Self {
        let payment = &record.payment;
        Self {
            tracking_number: record.tracking_number.clone(),
            status: record.status,
            tracking: record.tracking.clone(),
            payment: PublicPayment {
                amount: payment.amount_due(),
                currency: payment.currency.clone(),
                status: payment.status,
                payment_type: payment.payment_type,
                base_amount: payment.base_amount.value(),
                allowed_methods: payment.allowed_methods.clone(),
                message: payment_message(payment),
                paid_at: payment.paid_at,
            },
            payment_instructions: PaymentInstructions {
                message: config.payment_instructions(),
                contact_info: config.payment_contact.clone(),
                support_message: config.support_message.clone(),
            },
            estimated_delivery: record.estimated_delivery,
            created_at: record.created_at,
            current_location: record.current_location().cloned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePaymentInfo {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: String,
    pub payment_type: PaymentType,
    pub status: PaymentStatus,
    pub allowed_methods: Vec<PaymentMethod>,
    pub instructions: String,
}

/// Merged shipment and payment timeline with progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingTimeline {
    pub tracking_number: TrackingNumber,
    pub current_status: ShipmentStatus,
    pub payment_status: PaymentStatus,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub timeline: Vec<TimelineEntry>,
    pub completed_count: usize,
    pub progress_percent: u8,
    pub payment_info: TimelinePaymentInfo,
}

impl TrackingTimeline {
    pub fn from_record(record: &ShipmentRecord, config: &EngineConfig) -> Self {
        let payment = &record.payment;
        let timeline = synthesize(record, payment);
        Self {
            tracking_number: record.tracking_number.clone(),
            current_status: record.current_status(),
            payment_status: payment.status,
            estimated_delivery: record.estimated_delivery,
            timeline: timeline.entries,
            completed_count: timeline.completed_count,
            progress_percent: timeline.progress_percent,
            payment_info: TimelinePaymentInfo {
                amount: payment.amount_due(),
                currency: payment.currency.clone(),
                payment_type: payment.payment_type,
                status: payment.status,
                allowed_methods: payment.allowed_methods.clone(),
                instructions: config.payment_instructions(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSummary {
    #[serde(with = "rust_decimal::serde::float")]
    pub base_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub payment_type: PaymentType,
    pub currency: String,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfo {
    pub tracking_number: TrackingNumber,
    pub payment: PaymentSummary,
    pub allowed_methods: Vec<PaymentMethod>,
    pub shipment_status: ShipmentStatus,
    /// True while an unpaid partial balance holds the shipment at pickup.
    pub on_hold: bool,
    pub payment_instructions: String,
}

impl PaymentInfo {
    pub fn from_record(record: &ShipmentRecord, config: &EngineConfig) -> Self {
        let payment = &record.payment;
        Self {
            tracking_number: record.tracking_number.clone(),
            payment: PaymentSummary {
                base_amount: payment.base_amount.value(),
                amount: payment.amount_due(),
                payment_type: payment.payment_type,
                currency: payment.currency.clone(),
                status: payment.status,
                paid_at: payment.paid_at,
                payment_method: payment.payment_method,
            },
            allowed_methods: payment.allowed_methods.clone(),
            shipment_status: record.current_status(),
            on_hold: payment.holds_delivery(),
            payment_instructions: config.payment_instructions(),
        }
    }
}

/// A verification request together with the shipment it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingVerification {
    pub tracking_number: TrackingNumber,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount_due: Decimal,
    pub currency: String,
    pub request: VerificationRequest,
}

pub const RECENT_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_shipments: usize,
    pub active_shipments: usize,
    /// Created within [`RECENT_WINDOW_DAYS`] of the time the stats were taken.
    pub recent_shipments: usize,
    /// Sum of amounts collected on paid ledgers.
    #[serde(with = "rust_decimal::serde::float")]
    pub total_revenue: Decimal,
    pub status_breakdown: BTreeMap<ShipmentStatus, usize>,
    pub payment_breakdown: BTreeMap<PaymentStatus, usize>,
    pub payment_method_breakdown: BTreeMap<PaymentMethod, usize>,
}

impl DashboardStats {
    pub fn from_records<'a>(
        records: impl IntoIterator<Item = &'a ShipmentRecord>,
        now: DateTime<Utc>,
    ) -> Self {
        let recent_since = now - Duration::days(RECENT_WINDOW_DAYS);
        let mut stats = DashboardStats::default();
        for record in records {
            stats.total_shipments += 1;
            if record.is_active {
                stats.active_shipments += 1;
            }
            if record.created_at >= recent_since {
                stats.recent_shipments += 1;
            }
            *stats
                .status_breakdown
                .entry(record.current_status())
                .or_default() += 1;
            *stats
                .payment_breakdown
                .entry(record.payment.status)
                .or_default() += 1;
            if record.payment.is_paid() {
                stats.total_revenue += record.payment.amount_due();
                if let Some(method) = record.payment.payment_method {
                    *stats.payment_method_breakdown.entry(method).or_default() += 1;
                }
            }
        }
        stats
    }
}
