use crate::domain::verification::VerificationRequest;
use crate::error::{LedgerError, TrackingError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Share of the base amount collected upfront for partial payments.
pub const PARTIAL_SHARE: Decimal = dec!(0.5);

/// Represents a positive monetary amount.
///
/// Wraps `rust_decimal::Decimal` so invoiced amounts can never be zero or negative.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, TrackingError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(TrackingError::Validation(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = TrackingError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    #[default]
    Full,
    Partial,
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentType::Full => f.write_str("full"),
            PaymentType::Partial => f.write_str("partial"),
        }
    }
}

impl FromStr for PaymentType {
    type Err = TrackingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(PaymentType::Full),
            "partial" => Ok(PaymentType::Partial),
            other => Err(TrackingError::Validation(format!(
                "unknown payment type '{other}'"
            ))),
        }
    }
}

/// Payment state machine: `pending -> paid`, `pending -> failed`, `paid -> refunded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 4] = [
        PaymentStatus::Pending,
        PaymentStatus::Paid,
        PaymentStatus::Failed,
        PaymentStatus::Refunded,
    ];

    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Paid)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
                | (PaymentStatus::Paid, PaymentStatus::Refunded)
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Crypto,
    Cashapp,
    Etransfer,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 3] = [
        PaymentMethod::Crypto,
        PaymentMethod::Cashapp,
        PaymentMethod::Etransfer,
    ];
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaymentMethod::Crypto => "crypto",
            PaymentMethod::Cashapp => "cashapp",
            PaymentMethod::Etransfer => "etransfer",
        };
        f.write_str(name)
    }
}

impl FromStr for PaymentMethod {
    type Err = TrackingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "crypto" => Ok(PaymentMethod::Crypto),
            "cashapp" => Ok(PaymentMethod::Cashapp),
            "etransfer" => Ok(PaymentMethod::Etransfer),
            other => Err(TrackingError::Validation(format!(
                "unknown payment method '{other}'"
            ))),
        }
    }
}

/// The payment ledger of a single shipment.
///
/// Owns the invoiced amount, the payment policy and the verification history.
/// `status` only reaches `paid` through [`PaymentRecord::apply_verified_payment`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    /// The full invoiced amount, fixed at creation.
    pub base_amount: Amount,
    pub payment_type: PaymentType,
    pub currency: String,
    pub status: PaymentStatus,
    pub allowed_methods: Vec<PaymentMethod>,
    pub transaction_id: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub verification_requests: Vec<VerificationRequest>,
    pub admin_notes: Option<String>,
}

impl PaymentRecord {
    /// Opens a pending ledger. Methods are deduplicated and kept in a stable order.
    pub fn new(
        base_amount: Amount,
        payment_type: PaymentType,
        currency: impl Into<String>,
        allowed_methods: impl IntoIterator<Item = PaymentMethod>,
    ) -> Result<Self, TrackingError> {
        let mut allowed_methods: Vec<PaymentMethod> = allowed_methods.into_iter().collect();
        allowed_methods.sort();
        allowed_methods.dedup();
        if allowed_methods.is_empty() {
            return Err(TrackingError::Validation(
                "At least one payment method must be allowed".to_string(),
            ));
        }

        let currency = currency.into().trim().to_ascii_uppercase();
        if currency.is_empty() {
            return Err(TrackingError::Validation(
                "Currency must not be empty".to_string(),
            ));
        }

        Ok(Self {
            base_amount,
            payment_type,
            currency,
            status: PaymentStatus::Pending,
            allowed_methods,
            transaction_id: None,
            payment_method: None,
            paid_at: None,
            verification_requests: Vec::new(),
            admin_notes: None,
        })
    }

    /// Amount the customer owes under the payment policy.
    pub fn amount_due(&self) -> Decimal {
        match self.payment_type {
            PaymentType::Full => self.base_amount.value(),
            PaymentType::Partial => self.base_amount.value() * PARTIAL_SHARE,
        }
    }

    /// Amount settled through the ledger so far.
    pub fn paid_amount(&self) -> Decimal {
        if self.status == PaymentStatus::Paid {
            self.amount_due()
        } else {
            Decimal::ZERO
        }
    }

    pub fn is_paid(&self) -> bool {
        self.status == PaymentStatus::Paid
    }

    /// True while an unpaid partial balance holds the shipment at pickup.
    pub fn holds_delivery(&self) -> bool {
        self.payment_type == PaymentType::Partial && !self.is_paid()
    }

    pub fn allows(&self, method: PaymentMethod) -> bool {
        self.allowed_methods.contains(&method)
    }

    /// Records a verified payment. Calling it again once paid is a no-op.
    pub fn apply_verified_payment(
        &mut self,
        transaction_id: &str,
        method: PaymentMethod,
        paid_at: DateTime<Utc>,
    ) -> Result<&PaymentRecord, LedgerError> {
        if self.status == PaymentStatus::Paid {
            return Ok(self);
        }
        self.transition(PaymentStatus::Paid)?;
        self.transaction_id = Some(transaction_id.to_string());
        self.payment_method = Some(method);
        self.paid_at = Some(paid_at);
        Ok(self)
    }

    pub fn mark_failed(&mut self) -> Result<(), LedgerError> {
        self.transition(PaymentStatus::Failed)
    }

    pub fn mark_refunded(&mut self) -> Result<(), LedgerError> {
        self.transition(PaymentStatus::Refunded)
    }

    fn transition(&mut self, next: PaymentStatus) -> Result<(), LedgerError> {
        if self.status.can_transition_to(next) {
            self.status = next;
            Ok(())
        } else {
            Err(LedgerError::InvalidStateTransition {
                from: self.status,
                to: next,
            })
        }
    }
}
