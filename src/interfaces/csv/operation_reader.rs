use crate::application::command::{Command, Operation};
use crate::domain::actor::Actor;
use crate::domain::payment::{Amount, PaymentMethod, PaymentType};
use crate::domain::shipment::{Location, NewShipment, NewTrackingEvent, TrackingNumber};
use crate::domain::status::ShipmentStatus;
use crate::domain::verification::{
    Adjudication, PaymentDetailsRequest, ProofOfPayment, VerificationRequestId,
};
use crate::error::{Result, TrackingError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum OperationType {
    Create,
    Track,
    RequestDetails,
    SubmitProof,
    Adjudicate,
    Fail,
    Refund,
    Deactivate,
}

/// One raw row of the operations feed. Columns not used by an operation may be empty.
#[derive(Debug, Deserialize)]
struct OperationRecord {
    op: OperationType,
    tracking: String,
    actor: Option<String>,
    at: Option<DateTime<Utc>>,
    status: Option<String>,
    city: Option<String>,
    state: Option<String>,
    country: Option<String>,
    description: Option<String>,
    amount: Option<Decimal>,
    payment_type: Option<String>,
    methods: Option<String>,
    email: Option<String>,
    transaction_id: Option<String>,
    method: Option<String>,
    notes: Option<String>,
    request: Option<u32>,
    decision: Option<String>,
    location_name: Option<String>,
    estimated_delivery: Option<DateTime<Utc>>,
}

fn required<T>(value: Option<T>, column: &str) -> Result<T> {
    value.ok_or_else(|| TrackingError::Validation(format!("missing '{column}' column")))
}

impl OperationRecord {
    fn actor(&self) -> Result<Actor> {
        match &self.actor {
            Some(actor) => actor.parse(),
            None => Ok(Actor::System),
        }
    }

    fn location(&self) -> Location {
        let location = Location::new(
            self.city.clone().unwrap_or_default(),
            self.state.clone().unwrap_or_default(),
            self.country.clone().unwrap_or_default(),
        );
        match &self.location_name {
            Some(name) => location.with_name(name.clone()),
            None => location,
        }
    }

    fn methods(&self) -> Result<Vec<PaymentMethod>> {
        self.methods
            .as_deref()
            .unwrap_or_default()
            .split(';')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl TryFrom<OperationRecord> for Operation {
    type Error = TrackingError;

    fn try_from(record: OperationRecord) -> Result<Self> {
        let tracking_number = TrackingNumber::new(&record.tracking)?;
        let actor = record.actor()?;

        let command = match record.op {
            OperationType::Create => {
                // The creation time is the start of the tracking log, so replay needs it.
                required(record.at, "at")?;
                let base_amount = Amount::new(required(record.amount, "amount")?)?;
                let payment_type = match record.payment_type.as_deref() {
                    Some(kind) => kind.parse()?,
                    None => PaymentType::default(),
                };
                let mut shipment = NewShipment::new(tracking_number, base_amount)
                    .with_payment_type(payment_type)
                    .with_allowed_methods(record.methods()?);
                if let Some(eta) = record.estimated_delivery {
                    shipment = shipment.with_estimated_delivery(eta);
                }
                shipment.notes = record.notes.clone();
                Command::CreateShipment { actor, shipment }
            }
            OperationType::Track => {
                let status: ShipmentStatus = required(record.status.as_deref(), "status")?.parse()?;
                Command::AppendTrackingEvent {
                    tracking_number,
                    actor,
                    event: NewTrackingEvent {
                        status,
                        location: record.location(),
                        description: record.description.clone().unwrap_or_default(),
                        timestamp: record.at,
                    },
                }
            }
            OperationType::RequestDetails => Command::RequestPaymentDetails {
                tracking_number,
                request: PaymentDetailsRequest {
                    customer_email: required(record.email.clone(), "email")?,
                    preferred_method: record.method.as_deref().map(str::parse).transpose()?,
                    message: record.notes.clone(),
                },
            },
            OperationType::SubmitProof => Command::SubmitProofOfPayment {
                tracking_number,
                proof: ProofOfPayment {
                    customer_email: required(record.email.clone(), "email")?,
                    transaction_id: required(record.transaction_id.clone(), "transaction_id")?,
                    payment_method: required(record.method.as_deref(), "method")?.parse()?,
                    notes: record.notes.clone(),
                },
            },
            OperationType::Adjudicate => Command::AdjudicatePayment {
                tracking_number,
                actor,
                adjudication: Adjudication {
                    request_id: VerificationRequestId::new(required(record.request, "request")?),
                    decision: required(record.decision.as_deref(), "decision")?.parse()?,
                    admin_notes: record.notes.clone(),
                },
            },
            OperationType::Fail => Command::MarkPaymentFailed {
                tracking_number,
                actor,
                admin_notes: record.notes.clone(),
            },
            OperationType::Refund => Command::RefundPayment {
                tracking_number,
                actor,
                admin_notes: record.notes.clone(),
            },
            OperationType::Deactivate => Command::DeactivateShipment {
                tracking_number,
                actor,
            },
        };

        Ok(Operation {
            at: record.at,
            command,
        })
    }
}

/// Reads operations from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over `Result<Operation>`.
/// Rows may omit trailing columns; whitespace around fields is trimmed.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    /// Creates a new `OperationReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads, deserializes and validates operations.
    pub fn operations(self) -> impl Iterator<Item = Result<Operation>> {
        self.reader
            .into_deserialize::<OperationRecord>()
            .map(|result| result.map_err(TrackingError::from).and_then(Operation::try_from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::verification::Decision;
    use rust_decimal_macros::dec;

    const HEADER: &str = "op,tracking,actor,at,status,city,state,country,description,amount,payment_type,methods,email,transaction_id,method,notes,request,decision,location_name,estimated_delivery";

    fn read(rows: &str) -> Vec<Result<Operation>> {
        let data = format!("{HEADER}\n{rows}");
        OperationReader::new(data.as_bytes()).operations().collect()
    }

    #[test]
    fn test_reader_create_row() {
        let results = read("create, trk-1, admin:ops, 2025-01-01T00:00:00Z,,,,,, 100.0, partial, crypto;cashapp");
        let operation = results[0].as_ref().unwrap();

        assert_eq!(operation.at.unwrap().to_rfc3339(), "2025-01-01T00:00:00+00:00");
        match &operation.command {
            Command::CreateShipment { actor, shipment } => {
                assert_eq!(actor, &Actor::admin("ops"));
                assert_eq!(shipment.tracking_number.as_str(), "TRK-1");
                assert_eq!(shipment.base_amount.value(), dec!(100));
                assert_eq!(shipment.payment_type, PaymentType::Partial);
                assert_eq!(
                    shipment.allowed_methods,
                    vec![PaymentMethod::Crypto, PaymentMethod::Cashapp]
                );
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_reader_create_requires_timestamp() {
        let results = read("create, TRK-1, admin:ops,,,,,,, 100.0, full");
        match &results[0] {
            Err(TrackingError::Validation(message)) => assert!(message.contains("'at'")),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_reader_create_estimated_delivery() {
        let results = read(
            "create, TRK-1, admin:ops, 2025-01-01T00:00:00Z,,,,,, 10, full,,,,,,,,, 2025-01-05T12:00:00Z",
        );
        match &results[0].as_ref().unwrap().command {
            Command::CreateShipment { shipment, .. } => assert_eq!(
                shipment.estimated_delivery.unwrap().to_rfc3339(),
                "2025-01-05T12:00:00+00:00"
            ),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_reader_track_row_location_name() {
        let results = read(
            "track, TRK-1, system, 2025-01-02T10:30:00Z, in_transit, Denver, CO, US,,,,,,,,,,, Central Hub",
        );
        match &results[0].as_ref().unwrap().command {
            Command::AppendTrackingEvent { event, .. } => {
                assert_eq!(event.location.name.as_deref(), Some("Central Hub"));
                assert_eq!(event.location.city, "Denver");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_reader_track_row() {
        let results = read(
            "track, TRK-1, system, 2025-01-02T10:30:00Z, picked_up, Austin, TX, US, Collected at depot",
        );
        match &results[0].as_ref().unwrap().command {
            Command::AppendTrackingEvent { actor, event, .. } => {
                assert_eq!(actor, &Actor::System);
                assert_eq!(event.status, ShipmentStatus::PickedUp);
                assert_eq!(event.location.city, "Austin");
                assert_eq!(event.description, "Collected at depot");
                assert!(event.timestamp.is_some());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_reader_adjudicate_row() {
        let results = read("adjudicate, TRK-1, admin:ops,,,,,,,,,,,,, looks good, 1, approve");
        match &results[0].as_ref().unwrap().command {
            Command::AdjudicatePayment { adjudication, .. } => {
                assert_eq!(adjudication.request_id, VerificationRequestId::new(1));
                assert_eq!(adjudication.decision, Decision::Approve);
                assert_eq!(adjudication.admin_notes.as_deref(), Some("looks good"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_reader_rejects_unknown_status() {
        let results = read("track, TRK-1, system,, teleported");
        assert!(matches!(
            results[0],
            Err(TrackingError::Transition(
                crate::error::TransitionError::InvalidStatus(_)
            ))
        ));
    }

    #[test]
    fn test_reader_malformed_lines() {
        let results = read(
            "launch, TRK-1\ncreate, TRK-2, admin:ops,,,,,,, not_a_number\ncreate, TRK-3, admin:ops",
        );
        assert_eq!(results.len(), 3);
        assert!(matches!(results[0], Err(TrackingError::Csv(_))));
        assert!(matches!(results[1], Err(TrackingError::Csv(_))));
        assert!(matches!(results[2], Err(TrackingError::Validation(_))));
    }
}
