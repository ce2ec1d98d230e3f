use crate::domain::ports::{Notifier, ShipmentContext};
use crate::error::Result;
use async_trait::async_trait;

/// Notifier that only records the instruction request in the log.
///
/// Used where no mail transport is configured; an operator follows up manually.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_payment_instructions(
        &self,
        email: &str,
        context: &ShipmentContext,
    ) -> Result<()> {
        tracing::info!(
            tracking_number = %context.tracking_number,
            amount_due = %context.amount_due.normalize(),
            currency = %context.currency,
            preferred_method = ?context.preferred_method,
            "payment instructions requested by {email}"
        );
        Ok(())
    }
}
