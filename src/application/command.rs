use crate::application::engine::TrackingEngine;
use crate::domain::actor::Actor;
use crate::domain::shipment::{NewShipment, NewTrackingEvent, TrackingNumber};
use crate::domain::verification::{Adjudication, PaymentDetailsRequest, ProofOfPayment};
use crate::error::Result;
use chrono::{DateTime, Utc};

/// One mutation against the engine, as read from an operations feed.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateShipment {
        actor: Actor,
        shipment: NewShipment,
    },
    AppendTrackingEvent {
        tracking_number: TrackingNumber,
        actor: Actor,
        event: NewTrackingEvent,
    },
    RequestPaymentDetails {
        tracking_number: TrackingNumber,
        request: PaymentDetailsRequest,
    },
    SubmitProofOfPayment {
        tracking_number: TrackingNumber,
        proof: ProofOfPayment,
    },
    AdjudicatePayment {
        tracking_number: TrackingNumber,
        actor: Actor,
        adjudication: Adjudication,
    },
    MarkPaymentFailed {
        tracking_number: TrackingNumber,
        actor: Actor,
        admin_notes: Option<String>,
    },
    RefundPayment {
        tracking_number: TrackingNumber,
        actor: Actor,
        admin_notes: Option<String>,
    },
    DeactivateShipment {
        tracking_number: TrackingNumber,
        actor: Actor,
    },
}

impl Command {
    pub fn tracking_number(&self) -> &TrackingNumber {
        match self {
            Command::CreateShipment { shipment, .. } => &shipment.tracking_number,
            Command::AppendTrackingEvent {
                tracking_number, ..
            }
            | Command::RequestPaymentDetails {
                tracking_number, ..
            }
            | Command::SubmitProofOfPayment {
                tracking_number, ..
            }
            | Command::AdjudicatePayment {
                tracking_number, ..
            }
            | Command::MarkPaymentFailed {
                tracking_number, ..
            }
            | Command::RefundPayment {
                tracking_number, ..
            }
            | Command::DeactivateShipment {
                tracking_number, ..
            } => tracking_number,
        }
    }
}

/// A command stamped with the instant it happened, when the feed provides one.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub at: Option<DateTime<Utc>>,
    pub command: Command,
}

impl TrackingEngine {
    /// Dispatches a command to the matching engine operation.
    pub async fn execute(&self, command: Command) -> Result<()> {
        match command {
            Command::CreateShipment { actor, shipment } => {
                self.create_shipment(&actor, shipment).await?;
            }
            Command::AppendTrackingEvent {
                tracking_number,
                actor,
                event,
            } => {
                self.append_tracking_event(&tracking_number, &actor, event)
                    .await?;
            }
            Command::RequestPaymentDetails {
                tracking_number,
                request,
            } => {
                self.request_payment_details(&tracking_number, request)
                    .await?;
            }
            Command::SubmitProofOfPayment {
                tracking_number,
                proof,
            } => {
                self.submit_proof_of_payment(&tracking_number, proof)
                    .await?;
            }
            Command::AdjudicatePayment {
                tracking_number,
                actor,
                adjudication,
            } => {
                self.adjudicate_payment(&tracking_number, &actor, adjudication)
                    .await?;
            }
            Command::MarkPaymentFailed {
                tracking_number,
                actor,
                admin_notes,
            } => {
                self.mark_payment_failed(&tracking_number, &actor, admin_notes)
                    .await?;
            }
            Command::RefundPayment {
                tracking_number,
                actor,
                admin_notes,
            } => {
                self.refund_payment(&tracking_number, &actor, admin_notes)
                    .await?;
            }
            Command::DeactivateShipment {
                tracking_number,
                actor,
            } => {
                self.deactivate_shipment(&tracking_number, &actor).await?;
            }
        }
        Ok(())
    }
}
