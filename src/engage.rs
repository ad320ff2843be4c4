//! Outreach channel selection and message composition

use rayon::prelude::*;

use crate::error::StageError;
use crate::pipeline::{PipelineState, Stage};
use crate::record::{Channel, Record};

/// Errors from the generative-text collaborator. These never leave the
/// engagement stage: every failure is absorbed by the fallback message.
#[derive(Debug, thiserror::Error)]
pub enum TextGenError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response shape: {0}")]
    Malformed(String),
}

/// External generative-text collaborator.
pub trait TextGenerator: Send + Sync {
    /// Produce outreach copy for a customer described by `context`, promoting
    /// `offer`.
    fn generate(&self, context: &str, offer: &str) -> Result<String, TextGenError>;
}

/// Pipeline stage assigning `channel` and `message` to every record.
pub struct EngagementComposer {
    generator: Box<dyn TextGenerator>,
}

impl EngagementComposer {
    pub fn new(generator: Box<dyn TextGenerator>) -> Self {
        EngagementComposer { generator }
    }

    /// Deterministic message used whenever the collaborator fails, built from
    /// what the pipeline already knows about the customer.
    fn fallback_message(record: &Record, offer: &str) -> String {
        match record.persona_label.as_deref() {
            Some(persona) => format!(
                "Hi {}, we picked our {} for {} customers like you. Don't miss out!",
                record.display_name(),
                offer,
                persona
            ),
            None => format!(
                "Hi {}, don't miss out on our {} just for you!",
                record.display_name(),
                offer
            ),
        }
    }

    fn compose_one(&self, record: &mut Record) {
        let risk = record
            .churn_risk
            .unwrap_or(crate::record::RiskTier::Low);
        record.channel = Some(Channel::for_risk(risk));

        let offer = record.offer.clone().unwrap_or_default();
        let context = record
            .persona_label
            .clone()
            .unwrap_or_else(|| format!("{} churn risk", risk.as_str()));

        let message = match self.generator.generate(&context, &offer) {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                log::warn!(
                    "empty generated message for {}, using fallback",
                    record.customer_id
                );
                Self::fallback_message(record, &offer)
            }
            Err(e) => {
                log::warn!(
                    "text generation failed for {} ({}), using fallback",
                    record.customer_id,
                    e
                );
                Self::fallback_message(record, &offer)
            }
        };
        record.message = Some(message);
    }
}

impl Stage for EngagementComposer {
    fn name(&self) -> &'static str {
        "engagement_composer"
    }

    fn state(&self) -> PipelineState {
        PipelineState::Engaging
    }

    fn required_inputs(&self) -> &'static [&'static str] {
        &["churn_risk", "offer"]
    }

    fn run(&self, mut batch: Vec<Record>) -> Result<Vec<Record>, StageError> {
        batch
            .par_iter_mut()
            .for_each(|record| self.compose_one(record));

        log::info!("composed outreach for {} customers", batch.len());
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{AttrValue, RiskTier};

    struct CannedGenerator(String);

    impl TextGenerator for CannedGenerator {
        fn generate(&self, _context: &str, _offer: &str) -> Result<String, TextGenError> {
            Ok(self.0.clone())
        }
    }

    struct FailingGenerator;

    impl TextGenerator for FailingGenerator {
        fn generate(&self, _context: &str, _offer: &str) -> Result<String, TextGenError> {
            Err(TextGenError::Malformed("service offline".to_string()))
        }
    }

    fn ready(id: &str, risk: RiskTier, offer: &str) -> Record {
        let mut r = Record::new(id, 1.0, 10.0, 5.0, 100.0);
        r.churn_score = Some(0.5);
        r.churn_risk = Some(risk);
        r.persona = Some(2);
        r.persona_label = Some("persona_2".to_string());
        r.offer = Some(offer.to_string());
        r
    }

    #[test]
    fn test_channel_follows_risk() {
        let composer = EngagementComposer::new(Box::new(CannedGenerator("hi".to_string())));
        let batch = vec![
            ready("c1", RiskTier::High, "A"),
            ready("c2", RiskTier::Medium, "B"),
            ready("c3", RiskTier::Low, "C"),
        ];

        let result = composer.run(batch).unwrap();
        assert_eq!(result[0].channel, Some(Channel::PhoneCall));
        assert_eq!(result[1].channel, Some(Channel::Email));
        assert_eq!(result[2].channel, Some(Channel::Sms));
    }

    #[test]
    fn test_generated_message_is_used() {
        let composer =
            EngagementComposer::new(Box::new(CannedGenerator("Come back soon!".to_string())));
        let result = composer.run(vec![ready("c1", RiskTier::High, "A")]).unwrap();
        assert_eq!(result[0].message.as_deref(), Some("Come back soon!"));
    }

    #[test]
    fn test_collaborator_failure_uses_fallback() {
        let composer = EngagementComposer::new(Box::new(FailingGenerator));
        let mut record = ready("c1", RiskTier::High, "Win-back Coupon");
        record
            .extras
            .insert("name".to_string(), AttrValue::Text("Priya".to_string()));

        let result = composer.run(vec![record]).unwrap();
        let message = result[0].message.as_deref().unwrap();
        assert!(message.contains("Priya"));
        assert!(message.contains("Win-back Coupon"));
        assert!(message.contains("persona_2"));
        // The failure stayed inside the stage
        assert_eq!(result[0].channel, Some(Channel::PhoneCall));
    }

    #[test]
    fn test_empty_generation_uses_fallback() {
        let composer = EngagementComposer::new(Box::new(CannedGenerator("   ".to_string())));
        let result = composer.run(vec![ready("c1", RiskTier::Low, "C")]).unwrap();
        let message = result[0].message.as_deref().unwrap();
        assert!(!message.trim().is_empty());
        assert!(message.contains("C"));
    }

    #[test]
    fn test_compose_preserves_count() {
        let composer = EngagementComposer::new(Box::new(FailingGenerator));
        let batch: Vec<Record> = (0..7)
            .map(|i| ready(&format!("c{}", i), RiskTier::Medium, "B"))
            .collect();

        let result = composer.run(batch).unwrap();
        assert_eq!(result.len(), 7);
        assert!(result.iter().all(|r| r.message.is_some() && r.channel.is_some()));
    }
}
