use crate::application::views::{
    DashboardStats, PaymentInfo, PendingVerification, PublicShipment, TrackingTimeline,
};
use crate::config::EngineConfig;
use crate::domain::actor::Actor;
use crate::domain::ports::{Clock, Notifier, ShipmentContext, ShipmentStoreBox};
use crate::domain::shipment::{NewShipment, NewTrackingEvent, ShipmentRecord, TrackingNumber};
use crate::domain::verification::{
    Adjudication, PaymentDetailsRequest, ProofOfPayment, ReviewStatus, VerificationRequestId,
    validate_email,
};
use crate::error::{Result, TrackingError};
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::notifier::LogNotifier;
use std::sync::Arc;

/// The entry point for shipment tracking and payment operations.
///
/// `TrackingEngine` owns the storage backend and applies every mutation as a
/// read-modify-write on one shipment aggregate. Saves are compare-and-swap on the
/// aggregate version; a lost race is replayed against a fresh read up to
/// `max_conflict_retries` times before the conflict is returned.
pub struct TrackingEngine {
    store: ShipmentStoreBox,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl TrackingEngine {
    /// Creates an engine with the system clock, a log-only notifier and default settings.
    ///
    /// # Arguments
    ///
    /// * `store` - The store for shipment aggregates.
    pub fn new(store: ShipmentStoreBox) -> Self {
        Self {
            store,
            notifier: Arc::new(LogNotifier),
            clock: Arc::new(SystemClock),
            config: EngineConfig::default(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Opens a shipment together with its pending payment ledger.
    pub async fn create_shipment(
        &self,
        actor: &Actor,
        shipment: NewShipment,
    ) -> Result<ShipmentRecord> {
        let admin = actor.require_admin("create shipments")?;
        let record = ShipmentRecord::new(shipment, admin, self.clock.now())?;
        self.store.insert(record.clone()).await?;
        tracing::info!(
            tracking_number = %record.tracking_number,
            payment_type = %record.payment.payment_type,
            amount_due = %record.payment.amount_due().normalize(),
            "shipment created"
        );
        Ok(record)
    }

    /// Full aggregate, including inactive shipments.
    pub async fn get_record(&self, tracking_number: &TrackingNumber) -> Result<ShipmentRecord> {
        self.store
            .load(tracking_number)
            .await?
            .ok_or_else(|| TrackingError::NotFound(format!("shipment {tracking_number}")))
    }

    pub async fn get_shipment(&self, tracking_number: &TrackingNumber) -> Result<PublicShipment> {
        let record = self.load_active(tracking_number).await?;
        Ok(PublicShipment::from_record(&record, &self.config))
    }

    pub async fn get_timeline(&self, tracking_number: &TrackingNumber) -> Result<TrackingTimeline> {
        let record = self.load_active(tracking_number).await?;
        Ok(TrackingTimeline::from_record(&record, &self.config))
    }

    pub async fn get_payment_info(&self, tracking_number: &TrackingNumber) -> Result<PaymentInfo> {
        let record = self.load_active(tracking_number).await?;
        Ok(PaymentInfo::from_record(&record, &self.config))
    }

    /// Records a courier event, subject to timestamp monotonicity and payment gating.
    pub async fn append_tracking_event(
        &self,
        tracking_number: &TrackingNumber,
        actor: &Actor,
        event: NewTrackingEvent,
    ) -> Result<ShipmentRecord> {
        if !actor.can_record_events() {
            return Err(TrackingError::Forbidden(format!(
                "{actor} may not record tracking events"
            )));
        }
        let recorded_by = actor.to_string();
        let clock = &self.clock;

        // The clock is read per attempt so a retried append is stamped after the winner.
        let (record, ()) = self
            .mutate(tracking_number, |record| {
                record.append_tracking_event(event.clone(), &recorded_by, clock.now())?;
                Ok(())
            })
            .await
            .inspect_err(|e| {
                if let TrackingError::Transition(reason) = e {
                    tracing::info!(%tracking_number, %reason, "tracking event rejected");
                }
            })?;

        tracing::info!(
            %tracking_number,
            status = %record.current_status(),
            "tracking event appended"
        );
        Ok(record)
    }

    /// Validates the request and hands it to the notifier without touching the ledger.
    ///
    /// Delivery runs on a background task; its failures are logged and never surface here.
    pub async fn request_payment_details(
        &self,
        tracking_number: &TrackingNumber,
        request: PaymentDetailsRequest,
    ) -> Result<ShipmentContext> {
        let record = self.load_active(tracking_number).await?;
        record.payment.check_details_request(&request)?;

        let email = validate_email(&request.customer_email)?;
        let context = ShipmentContext {
            tracking_number: record.tracking_number.clone(),
            amount_due: record.payment.amount_due(),
            currency: record.payment.currency.clone(),
            payment_type: record.payment.payment_type,
            allowed_methods: record.payment.allowed_methods.clone(),
            preferred_method: request.preferred_method,
            message: request.message.filter(|m| !m.trim().is_empty()),
            contact: self.config.payment_contact.clone(),
        };

        let notifier = Arc::clone(&self.notifier);
        let outbound = context.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.send_payment_instructions(&email, &outbound).await {
                tracing::warn!(
                    tracking_number = %outbound.tracking_number,
                    "failed to send payment instructions: {e}"
                );
            }
        });

        Ok(context)
    }

    /// Files a customer's proof of payment for admin review.
    pub async fn submit_proof_of_payment(
        &self,
        tracking_number: &TrackingNumber,
        proof: ProofOfPayment,
    ) -> Result<VerificationRequestId> {
        let submitted_at = self.clock.now();
        let (_, id) = self
            .mutate(tracking_number, |record| {
                record.payment.submit_proof(proof.clone(), submitted_at)
            })
            .await?;
        tracing::info!(%tracking_number, request_id = %id, "proof of payment submitted");
        Ok(id)
    }

    /// Approves or rejects a verification request. Admin only.
    pub async fn adjudicate_payment(
        &self,
        tracking_number: &TrackingNumber,
        actor: &Actor,
        adjudication: Adjudication,
    ) -> Result<ShipmentRecord> {
        let admin = actor.require_admin("adjudicate payments")?.to_string();
        let now = self.clock.now();
        let (record, review_status) = self
            .mutate(tracking_number, |record| {
                record.payment.adjudicate(adjudication.clone(), &admin, now)
            })
            .await?;
        tracing::info!(
            %tracking_number,
            request_id = %adjudication.request_id,
            ?review_status,
            payment_status = %record.payment.status,
            "verification request adjudicated"
        );
        Ok(record)
    }

    pub async fn mark_payment_failed(
        &self,
        tracking_number: &TrackingNumber,
        actor: &Actor,
        admin_notes: Option<String>,
    ) -> Result<ShipmentRecord> {
        actor.require_admin("mark payments failed")?;
        let (record, ()) = self
            .mutate(tracking_number, |record| {
                record.payment.mark_failed()?;
                record.payment.admin_notes = admin_notes.clone();
                Ok(())
            })
            .await?;
        tracing::info!(%tracking_number, "payment marked failed");
        Ok(record)
    }

    pub async fn refund_payment(
        &self,
        tracking_number: &TrackingNumber,
        actor: &Actor,
        admin_notes: Option<String>,
    ) -> Result<ShipmentRecord> {
        actor.require_admin("refund payments")?;
        let (record, ()) = self
            .mutate(tracking_number, |record| {
                record.payment.mark_refunded()?;
                record.payment.admin_notes = admin_notes.clone();
                Ok(())
            })
            .await?;
        tracing::info!(%tracking_number, "payment refunded");
        Ok(record)
    }

    /// Hides a shipment from public queries and further mutation. Nothing is deleted.
    pub async fn deactivate_shipment(
        &self,
        tracking_number: &TrackingNumber,
        actor: &Actor,
    ) -> Result<ShipmentRecord> {
        actor.require_admin("deactivate shipments")?;
        let (record, ()) = self
            .mutate(tracking_number, |record| {
                record.is_active = false;
                Ok(())
            })
            .await?;
        tracing::info!(%tracking_number, "shipment deactivated");
        Ok(record)
    }

    /// Verification requests across all shipments, optionally filtered by review status.
    pub async fn verification_requests(
        &self,
        filter: Option<ReviewStatus>,
    ) -> Result<Vec<PendingVerification>> {
        let records = self.store.get_all().await?;
        let mut requests: Vec<PendingVerification> = records
            .iter()
            .flat_map(|record| {
                record
                    .payment
                    .verification_requests
                    .iter()
                    .filter(move |r| filter.is_none_or(|status| r.review_status == status))
                    .map(move |request| PendingVerification {
                        tracking_number: record.tracking_number.clone(),
                        amount_due: record.payment.amount_due(),
                        currency: record.payment.currency.clone(),
                        request: request.clone(),
                    })
            })
            .collect();
        requests.sort_by(|a, b| {
            a.request
                .submitted_at
                .cmp(&b.request.submitted_at)
                .then_with(|| a.tracking_number.cmp(&b.tracking_number))
        });
        Ok(requests)
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        let records = self.store.get_all().await?;
        Ok(DashboardStats::from_records(&records, self.clock.now()))
    }

    /// Consumes the engine and returns every stored shipment.
    pub async fn into_results(self) -> Result<Vec<ShipmentRecord>> {
        self.store.get_all().await
    }

    async fn load_active(&self, tracking_number: &TrackingNumber) -> Result<ShipmentRecord> {
        match self.store.load(tracking_number).await? {
            Some(record) if record.is_active => Ok(record),
            _ => Err(TrackingError::NotFound(format!(
                "shipment {tracking_number}"
            ))),
        }
    }

    /// Applies `op` to a fresh copy of the aggregate and saves it with a version check.
    ///
    /// The record is only persisted when `op` succeeds, so a rejected operation leaves
    /// the stored aggregate untouched.
    async fn mutate<T>(
        &self,
        tracking_number: &TrackingNumber,
        mut op: impl FnMut(&mut ShipmentRecord) -> Result<T> + Send,
    ) -> Result<(ShipmentRecord, T)> {
        let mut retries = 0;
        loop {
            let mut record = self.load_active(tracking_number).await?;
            let expected_version = record.version;
            let outcome = op(&mut record)?;
            record.version = expected_version + 1;

            match self.store.save(record.clone(), expected_version).await {
                Ok(()) => return Ok((record, outcome)),
                Err(e) if e.is_retryable() && retries < self.config.max_conflict_retries => {
                    retries += 1;
                    tracing::debug!(%tracking_number, retries, "write conflict, retrying: {e}");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::{Amount, PaymentMethod, PaymentStatus, PaymentType};
    use crate::domain::shipment::Location;
    use crate::domain::status::ShipmentStatus;
    use crate::domain::verification::Decision;
    use crate::error::{ErrorKind, TransitionError};
    use crate::infrastructure::clock::ManualClock;
    use crate::infrastructure::in_memory::InMemoryShipmentStore;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, 8, 0, 0).unwrap()
    }

    fn engine() -> (TrackingEngine, ManualClock) {
        let clock = ManualClock::new(start());
        let engine = TrackingEngine::new(Box::new(InMemoryShipmentStore::new()))
            .with_clock(Arc::new(clock.clone()));
        (engine, clock)
    }

    fn tracking() -> TrackingNumber {
        TrackingNumber::new("TRK-42").unwrap()
    }

    fn admin() -> Actor {
        Actor::admin("alice")
    }

    fn event(status: ShipmentStatus) -> NewTrackingEvent {
        NewTrackingEvent {
            status,
            location: Location::new("Reno", "NV", "US"),
            description: String::new(),
            timestamp: None,
        }
    }

    fn proof() -> ProofOfPayment {
        ProofOfPayment {
            customer_email: "buyer@example.com".to_string(),
            transaction_id: "0xfeed".to_string(),
            payment_method: PaymentMethod::Crypto,
            notes: None,
        }
    }

    async fn create(engine: &TrackingEngine, payment_type: PaymentType) -> ShipmentRecord {
        let new = NewShipment::new(tracking(), Amount::new(dec!(100)).unwrap())
            .with_payment_type(payment_type);
        engine.create_shipment(&admin(), new).await.unwrap()
    }

    #[tokio::test]
    async fn test_partial_payment_scenario() {
        let (engine, clock) = engine();
        let created = create(&engine, PaymentType::Partial).await;
        assert_eq!(created.payment.amount_due(), dec!(50));
        assert_eq!(created.payment.status, PaymentStatus::Pending);

        clock.advance(Duration::hours(1));
        let record = engine
            .append_tracking_event(&tracking(), &admin(), event(ShipmentStatus::PickedUp))
            .await
            .unwrap();
        assert_eq!(record.current_status(), ShipmentStatus::PickedUp);

        clock.advance(Duration::hours(1));
        let blocked = engine
            .append_tracking_event(&tracking(), &admin(), event(ShipmentStatus::InTransit))
            .await
            .unwrap_err();
        assert!(matches!(
            blocked,
            TrackingError::Transition(TransitionError::GatingViolation { .. })
        ));

        let id = engine
            .submit_proof_of_payment(&tracking(), proof())
            .await
            .unwrap();
        let adjudication = Adjudication {
            request_id: id,
            decision: Decision::Approve,
            admin_notes: None,
        };
        let record = engine
            .adjudicate_payment(&tracking(), &admin(), adjudication)
            .await
            .unwrap();
        assert_eq!(record.payment.status, PaymentStatus::Paid);
        assert_eq!(record.payment.paid_at, Some(clock.now()));

        let record = engine
            .append_tracking_event(&tracking(), &admin(), event(ShipmentStatus::InTransit))
            .await
            .unwrap();
        assert_eq!(record.current_status(), ShipmentStatus::InTransit);
        assert_eq!(record.version, 4);
    }

    #[tokio::test]
    async fn test_full_payment_never_gated() {
        let (engine, _clock) = engine();
        create(&engine, PaymentType::Full).await;
        let record = engine
            .append_tracking_event(&tracking(), &admin(), event(ShipmentStatus::InTransit))
            .await
            .unwrap();
        assert_eq!(record.current_status(), ShipmentStatus::InTransit);
        assert_eq!(record.payment.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_rejected_event_is_not_persisted() {
        let (engine, _clock) = engine();
        create(&engine, PaymentType::Partial).await;
        let _ = engine
            .append_tracking_event(&tracking(), &admin(), event(ShipmentStatus::Delivered))
            .await;

        let stored = engine.get_record(&tracking()).await.unwrap();
        assert!(stored.tracking.is_empty());
        assert_eq!(stored.version, 0);
    }

    #[tokio::test]
    async fn test_adjudicate_twice_is_already_processed() {
        let (engine, _clock) = engine();
        create(&engine, PaymentType::Partial).await;
        let id = engine
            .submit_proof_of_payment(&tracking(), proof())
            .await
            .unwrap();
        let reject = Adjudication {
            request_id: id,
            decision: Decision::Reject,
            admin_notes: Some("no such transfer".to_string()),
        };
        engine
            .adjudicate_payment(&tracking(), &admin(), reject.clone())
            .await
            .unwrap();
        let before = engine.get_record(&tracking()).await.unwrap();

        let err = engine
            .adjudicate_payment(
                &tracking(),
                &admin(),
                Adjudication {
                    decision: Decision::Approve,
                    ..reject
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyProcessed);
        assert_eq!(engine.get_record(&tracking()).await.unwrap(), before);
        assert_eq!(before.payment.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_actor_permissions() {
        let (engine, _clock) = engine();
        let customer = Actor::customer("buyer@example.com");
        let new = NewShipment::new(tracking(), Amount::new(dec!(10)).unwrap());
        let err = engine.create_shipment(&customer, new).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        create(&engine, PaymentType::Full).await;
        let err = engine
            .append_tracking_event(&tracking(), &customer, event(ShipmentStatus::PickedUp))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        engine
            .append_tracking_event(&tracking(), &Actor::System, event(ShipmentStatus::PickedUp))
            .await
            .unwrap();

        let err = engine
            .refund_payment(&tracking(), &Actor::System, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_unknown_shipment_is_not_found() {
        let (engine, _clock) = engine();
        let err = engine.get_timeline(&tracking()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = engine
            .submit_proof_of_payment(&tracking(), proof())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_deactivated_shipment_hidden_from_public() {
        let (engine, _clock) = engine();
        create(&engine, PaymentType::Full).await;
        engine.deactivate_shipment(&tracking(), &admin()).await.unwrap();

        let err = engine.get_shipment(&tracking()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!engine.get_record(&tracking()).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn test_failed_and_refunded_payments() {
        let (engine, _clock) = engine();
        create(&engine, PaymentType::Full).await;

        let err = engine
            .refund_payment(&tracking(), &admin(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);

        let record = engine
            .mark_payment_failed(&tracking(), &admin(), Some("chargeback".to_string()))
            .await
            .unwrap();
        assert_eq!(record.payment.status, PaymentStatus::Failed);
        assert_eq!(record.payment.admin_notes.as_deref(), Some("chargeback"));
    }

    #[tokio::test]
    async fn test_timeline_progress_tracks_payment() {
        let (engine, clock) = engine();
        create(&engine, PaymentType::Partial).await;
        clock.advance(Duration::minutes(5));
        engine
            .append_tracking_event(&tracking(), &admin(), event(ShipmentStatus::PickedUp))
            .await
            .unwrap();

        let before = engine.get_timeline(&tracking()).await.unwrap();
        let id = engine
            .submit_proof_of_payment(&tracking(), proof())
            .await
            .unwrap();
        engine
            .adjudicate_payment(
                &tracking(),
                &admin(),
                Adjudication {
                    request_id: id,
                    decision: Decision::Approve,
                    admin_notes: None,
                },
            )
            .await
            .unwrap();
        let after = engine.get_timeline(&tracking()).await.unwrap();

        assert_eq!(after.completed_count, before.completed_count + 1);
        assert!(after.progress_percent > before.progress_percent);
        assert_eq!(after.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_verification_requests_filter() {
        let (engine, _clock) = engine();
        create(&engine, PaymentType::Partial).await;
        engine
            .submit_proof_of_payment(&tracking(), proof())
            .await
            .unwrap();
        let second = engine
            .submit_proof_of_payment(&tracking(), proof())
            .await
            .unwrap();
        engine
            .adjudicate_payment(
                &tracking(),
                &admin(),
                Adjudication {
                    request_id: second,
                    decision: Decision::Reject,
                    admin_notes: None,
                },
            )
            .await
            .unwrap();

        let pending = engine
            .verification_requests(Some(ReviewStatus::PendingReview))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].amount_due, dec!(50));
        assert_eq!(engine.verification_requests(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_payment_info_and_dashboard() {
        let (engine, _clock) = engine();
        create(&engine, PaymentType::Partial).await;

        let info = engine.get_payment_info(&tracking()).await.unwrap();
        assert!(info.on_hold);
        assert_eq!(info.payment.amount, dec!(50));
        assert!(info.payment_instructions.contains(&engine.config().payment_contact));

        let id = engine
            .submit_proof_of_payment(&tracking(), proof())
            .await
            .unwrap();
        engine
            .adjudicate_payment(
                &tracking(),
                &admin(),
                Adjudication {
                    request_id: id,
                    decision: Decision::Approve,
                    admin_notes: None,
                },
            )
            .await
            .unwrap();

        let info = engine.get_payment_info(&tracking()).await.unwrap();
        assert!(!info.on_hold);
        assert_eq!(info.payment.payment_method, Some(PaymentMethod::Crypto));

        let stats = engine.dashboard_stats().await.unwrap();
        assert_eq!(stats.total_shipments, 1);
        assert_eq!(stats.recent_shipments, 1);
        assert_eq!(stats.total_revenue, dec!(50));
        assert_eq!(stats.payment_breakdown[&PaymentStatus::Paid], 1);
    }
}
