/// Runtime settings for [`crate::application::engine::TrackingEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Extra attempts after a lost optimistic-concurrency race before the conflict surfaces.
    pub max_conflict_retries: u32,
    /// Where customers are told to send payment questions.
    pub payment_contact: String,
    pub support_message: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 3,
            payment_contact: "payments@shiptrack.example".to_string(),
            support_message: "Contact our support team for assistance with your shipment or payment."
                .to_string(),
        }
    }
}

impl EngineConfig {
    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    pub fn with_payment_contact(mut self, contact: impl Into<String>) -> Self {
        self.payment_contact = contact.into();
        self
    }

    /// Message shown to customers while a payment is outstanding.
    pub fn payment_instructions(&self) -> String {
        format!(
            "Contact our admin team at {} to receive specific payment details and wallet addresses.",
            self.payment_contact
        )
    }
}
