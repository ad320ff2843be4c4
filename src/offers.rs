//! Retention offer selection from an external offer map

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::StageError;
use crate::pipeline::{PipelineState, Stage};
use crate::record::Record;

/// Offer assigned when no key in the map matches a customer.
pub const DEFAULT_OFFER: &str = "Standard Offer";

/// External mapping from a segment key to a retention offer identifier.
///
/// Keys may be persona labels (`"persona_2"`), raw persona indices (`"2"`),
/// or risk tiers (`"high"`); lookup tries them in that order.
#[derive(Debug, Clone, Default)]
pub struct OfferMap {
    offers: BTreeMap<String, String>,
}

impl OfferMap {
    pub fn new(offers: BTreeMap<String, String>) -> Self {
        OfferMap { offers }
    }

    /// Load the map from a JSON object of string keys to offer identifiers.
    /// Tolerates a UTF-8 BOM, which exported mapping documents often carry.
    pub fn load(path: &Path) -> crate::Result<OfferMap> {
        let raw = std::fs::read_to_string(path)?;
        let offers: BTreeMap<String, String> =
            serde_json::from_str(raw.trim_start_matches('\u{feff}'))?;
        Ok(OfferMap { offers })
    }

    /// Resolve the offer for a record. Total: unmatched records get
    /// [`DEFAULT_OFFER`].
    pub fn offer_for(&self, record: &Record) -> String {
        if let Some(label) = &record.persona_label {
            if let Some(offer) = self.offers.get(label) {
                return offer.clone();
            }
        }
        if let Some(persona) = record.persona {
            if let Some(offer) = self.offers.get(&persona.to_string()) {
                return offer.clone();
            }
        }
        if let Some(risk) = record.churn_risk {
            if let Some(offer) = self.offers.get(risk.as_str()) {
                return offer.clone();
            }
        }
        DEFAULT_OFFER.to_string()
    }

    pub fn len(&self) -> usize {
        self.offers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }
}

/// Pipeline stage assigning `offer` to every record. Pure and total.
pub struct OfferSelector {
    offers: OfferMap,
}

impl OfferSelector {
    pub fn new(offers: OfferMap) -> Self {
        OfferSelector { offers }
    }
}

impl Stage for OfferSelector {
    fn name(&self) -> &'static str {
        "offer_selector"
    }

    fn state(&self) -> PipelineState {
        PipelineState::OfferSelecting
    }

    fn required_inputs(&self) -> &'static [&'static str] {
        &["churn_risk"]
    }

    fn run(&self, mut batch: Vec<Record>) -> Result<Vec<Record>, StageError> {
        for record in batch.iter_mut() {
            record.offer = Some(self.offers.offer_for(record));
        }
        log::info!("assigned offers to {} customers", batch.len());
        Ok(batch)
    }
}
