//! Customer payment claims and their adjudication.
//!
//! Proof of payment is evidence only: a submitted [`VerificationRequest`] waits in
//! `pending_review` until an administrator approves or rejects it. Approval is the
//! single path that settles the ledger.

use crate::domain::payment::{PaymentMethod, PaymentRecord};
use crate::error::{TrackingError, VerificationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sequential identifier of a verification request within one shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerificationRequestId(u32);

impl VerificationRequestId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// The id following `existing` requests; ids start at 1.
    pub fn next(existing: usize) -> Result<Self, TrackingError> {
        u32::try_from(existing)
            .ok()
            .and_then(|n| n.checked_add(1))
            .map(Self)
            .ok_or_else(|| {
                TrackingError::Validation("too many verification requests".to_string())
            })
    }
}

impl fmt::Display for VerificationRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    #[default]
    PendingReview,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl std::str::FromStr for Decision {
    type Err = TrackingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" | "approved" => Ok(Decision::Approve),
            "reject" | "rejected" => Ok(Decision::Reject),
            other => Err(TrackingError::Validation(format!(
                "unknown decision '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    pub id: VerificationRequestId,
    pub transaction_id: String,
    pub payment_method: PaymentMethod,
    pub customer_email: String,
    pub notes: Option<String>,
    pub submitted_at: DateTime<Utc>,
    #[serde(rename = "status")]
    pub review_status: ReviewStatus,
    pub processed_at: Option<DateTime<Utc>>,
    pub processed_by: Option<String>,
    pub admin_notes: Option<String>,
}

/// A customer asking to be sent payment instructions.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentDetailsRequest {
    pub customer_email: String,
    pub preferred_method: Option<PaymentMethod>,
    pub message: Option<String>,
}

/// A customer claim that payment was sent.
#[derive(Debug, Clone, PartialEq)]
pub struct ProofOfPayment {
    pub customer_email: String,
    pub transaction_id: String,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

/// An administrator's ruling on one verification request.
#[derive(Debug, Clone, PartialEq)]
pub struct Adjudication {
    pub request_id: VerificationRequestId,
    pub decision: Decision,
    pub admin_notes: Option<String>,
}

pub(crate) fn validate_email(email: &str) -> Result<String, TrackingError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {
            Ok(email.to_ascii_lowercase())
        }
        _ => Err(TrackingError::Validation(format!(
            "invalid customer email '{email}'"
        ))),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl PaymentRecord {
    /// Checks a payment-details request against the shipment's policy.
    ///
    /// The ledger is left untouched; the caller hands the request to a notifier.
    pub fn check_details_request(
        &self,
        request: &PaymentDetailsRequest,
    ) -> Result<(), TrackingError> {
        validate_email(&request.customer_email)?;
        if let Some(method) = request.preferred_method
            && !self.allows(method)
        {
            return Err(VerificationError::MethodNotAllowed(method).into());
        }
        Ok(())
    }

    /// Appends a verification request in `pending_review`. Payment status does not change.
    pub fn submit_proof(
        &mut self,
        proof: ProofOfPayment,
        submitted_at: DateTime<Utc>,
    ) -> Result<VerificationRequestId, TrackingError> {
        let customer_email = validate_email(&proof.customer_email)?;
        let transaction_id = proof.transaction_id.trim().to_string();
        if transaction_id.is_empty() {
            return Err(TrackingError::Validation(
                "transaction id is required".to_string(),
            ));
        }
        if !self.allows(proof.payment_method) {
            return Err(VerificationError::MethodNotAllowed(proof.payment_method).into());
        }

        let id = VerificationRequestId::next(self.verification_requests.len())?;
        self.verification_requests.push(VerificationRequest {
            id,
            transaction_id,
            payment_method: proof.payment_method,
            customer_email,
            notes: non_empty(proof.notes),
            submitted_at,
            review_status: ReviewStatus::PendingReview,
            processed_at: None,
            processed_by: None,
            admin_notes: None,
        });
        Ok(id)
    }

    pub fn verification_request(&self, id: VerificationRequestId) -> Option<&VerificationRequest> {
        self.verification_requests.iter().find(|r| r.id == id)
    }

    /// Rules on a pending request. Approval settles the ledger; rejection leaves it alone.
    ///
    /// Each request can be ruled on once. Nothing is modified when an error is returned.
    pub fn adjudicate(
        &mut self,
        adjudication: Adjudication,
        admin: &str,
        now: DateTime<Utc>,
    ) -> Result<ReviewStatus, TrackingError> {
        let index = self
            .verification_requests
            .iter()
            .position(|r| r.id == adjudication.request_id)
            .ok_or_else(|| {
                TrackingError::NotFound(format!(
                    "verification request {}",
                    adjudication.request_id
                ))
            })?;

        let request = &self.verification_requests[index];
        if request.review_status != ReviewStatus::PendingReview {
            return Err(VerificationError::AlreadyProcessed(request.id).into());
        }

        let review_status = match adjudication.decision {
            Decision::Approve => {
                let transaction_id = request.transaction_id.clone();
                let method = request.payment_method;
                self.apply_verified_payment(&transaction_id, method, now)?;
                ReviewStatus::Approved
            }
            Decision::Reject => ReviewStatus::Rejected,
        };

        let request = &mut self.verification_requests[index];
        request.review_status = review_status;
        request.processed_at = Some(now);
        request.processed_by = Some(admin.to_string());
        request.admin_notes = non_empty(adjudication.admin_notes);
        Ok(review_status)
    }
}
