//! RetainForge: a staged customer-retention decision pipeline
//!
//! Customer records ingested from CSV flow through a fixed stage sequence:
//! churn scoring, persona clustering, offer selection, outreach composition,
//! and feedback recording. The orchestrator validates the record contract at
//! every stage boundary and fails fast on the first fatal condition.

pub mod churn;
pub mod cli;
pub mod engage;
pub mod error;
pub mod features;
pub mod feedback;
pub mod ingest;
pub mod llm;
pub mod offers;
pub mod persona;
pub mod pipeline;
pub mod record;

// Re-export public items for easier access
pub use churn::{ChurnModel, ChurnScorer};
pub use cli::Args;
pub use engage::{EngagementComposer, TextGenerator};
pub use error::StageError;
pub use feedback::{FeedbackRecorder, FeedbackSource, SimulatedFeedback};
pub use ingest::{load_customers, IngestStage};
pub use llm::OpenAiGenerator;
pub use offers::{OfferMap, OfferSelector, DEFAULT_OFFER};
pub use persona::PersonaSegmenter;
pub use pipeline::{Pipeline, PipelineError, PipelineState, Stage};
pub use record::{AttrValue, Channel, Record, RiskTier};

/// Common result type used at the configuration and binary boundary
pub type Result<T> = anyhow::Result<T>;
