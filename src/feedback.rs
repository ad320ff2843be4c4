//! Response feedback collection, closing the pipeline loop

use crate::error::StageError;
use crate::pipeline::{PipelineState, Stage};
use crate::record::{Record, RiskTier};

/// An observed or simulated response to an outreach message.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackSignal {
    pub responded: bool,
    pub feedback: String,
}

/// Source of response signals. The natural seam for wiring in real campaign
/// results later; the pipeline itself only attaches the signal.
pub trait FeedbackSource: Send + Sync {
    fn observe(&self, record: &Record) -> FeedbackSignal;
}

/// Deterministic stand-in used when no observed feedback exists: high-risk
/// customers stay lukewarm, everyone else responds positively.
pub struct SimulatedFeedback;

impl FeedbackSource for SimulatedFeedback {
    fn observe(&self, record: &Record) -> FeedbackSignal {
        match record.churn_risk {
            Some(RiskTier::High) => FeedbackSignal {
                responded: false,
                feedback: "neutral".to_string(),
            },
            _ => FeedbackSignal {
                responded: true,
                feedback: "positive".to_string(),
            },
        }
    }
}

/// Pipeline stage attaching `responded` and `feedback` to every record.
pub struct FeedbackRecorder {
    source: Box<dyn FeedbackSource>,
}

impl FeedbackRecorder {
    pub fn new(source: Box<dyn FeedbackSource>) -> Self {
        FeedbackRecorder { source }
    }
}

impl Stage for FeedbackRecorder {
    fn name(&self) -> &'static str {
        "feedback_recorder"
    }

    fn state(&self) -> PipelineState {
        PipelineState::FeedbackCollecting
    }

    fn required_inputs(&self) -> &'static [&'static str] {
        &["churn_risk", "message"]
    }

    fn run(&self, mut batch: Vec<Record>) -> Result<Vec<Record>, StageError> {
        for record in batch.iter_mut() {
            let signal = self.source.observe(record);
            record.responded = Some(signal.responded);
            record.feedback = Some(signal.feedback);
        }
        log::info!("recorded feedback for {} customers", batch.len());
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engaged(id: &str, risk: RiskTier) -> Record {
        let mut r = Record::new(id, 1.0, 10.0, 5.0, 100.0);
        r.churn_risk = Some(risk);
        r.message = Some("hello".to_string());
        r
    }

    #[test]
    fn test_simulated_feedback_by_risk() {
        let source = SimulatedFeedback;

        let high = source.observe(&engaged("c1", RiskTier::High));
        assert!(!high.responded);
        assert_eq!(high.feedback, "neutral");

        let medium = source.observe(&engaged("c2", RiskTier::Medium));
        assert!(medium.responded);
        assert_eq!(medium.feedback, "positive");

        let low = source.observe(&engaged("c3", RiskTier::Low));
        assert!(low.responded);
        assert_eq!(low.feedback, "positive");
    }

    #[test]
    fn test_recorder_attaches_both_attributes() {
        let recorder = FeedbackRecorder::new(Box::new(SimulatedFeedback));
        let batch = vec![engaged("c1", RiskTier::High), engaged("c2", RiskTier::Low)];

        let result = recorder.run(batch).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].responded, Some(false));
        assert_eq!(result[0].feedback.as_deref(), Some("neutral"));
        assert_eq!(result[1].responded, Some(true));
        assert_eq!(result[1].feedback.as_deref(), Some("positive"));
    }
}
