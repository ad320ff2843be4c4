//! The customer record flowing through the pipeline and its attribute types

use std::collections::BTreeMap;

use serde::Serialize;

/// A passthrough attribute value from a source column the pipeline does not
/// interpret itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Number(f64),
    Text(String),
    Bool(bool),
}

/// Churn risk tier derived from the churn probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        }
    }
}

/// Outreach channel, ordered from lowest to highest touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Sms,
    Email,
    PhoneCall,
}

impl Channel {
    /// Channel policy: the riskier the customer, the higher-touch the channel.
    pub fn for_risk(risk: RiskTier) -> Channel {
        match risk {
            RiskTier::High => Channel::PhoneCall,
            RiskTier::Medium => Channel::Email,
            RiskTier::Low => Channel::Sms,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Sms => "sms",
            Channel::Email => "email",
            Channel::PhoneCall => "phone_call",
        }
    }
}

/// One customer flowing through the pipeline.
///
/// Raw behavioral fields are assigned at ingestion and never change. Each
/// `Option` field is owned by exactly one stage: it is `None` until that
/// stage runs and is not touched by any later stage. Source columns beyond
/// the required five ride along in `extras`.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub customer_id: String,
    pub visit_freq: f64,
    pub avg_basket: f64,
    pub last_coupon_days: f64,
    pub reward_points: f64,
    #[serde(flatten)]
    pub extras: BTreeMap<String, AttrValue>,

    // Churn scorer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub churn_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub churn_risk: Option<RiskTier>,

    // Persona segmenter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona_label: Option<String>,

    // Offer selector
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer: Option<String>,

    // Engagement composer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    // Feedback recorder
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl Record {
    pub fn new(
        customer_id: impl Into<String>,
        visit_freq: f64,
        avg_basket: f64,
        last_coupon_days: f64,
        reward_points: f64,
    ) -> Self {
        Record {
            customer_id: customer_id.into(),
            visit_freq,
            avg_basket,
            last_coupon_days,
            reward_points,
            extras: BTreeMap::new(),
            churn_score: None,
            churn_risk: None,
            persona: None,
            persona_label: None,
            offer: None,
            channel: None,
            message: None,
            responded: None,
            feedback: None,
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: AttrValue) -> Self {
        self.extras.insert(key.into(), value);
        self
    }

    /// Look up a numeric attribute by name across raw fields, derived fields,
    /// and extras. Non-numeric extras resolve to `None`.
    pub fn numeric_attr(&self, name: &str) -> Option<f64> {
        match name {
            "visit_freq" => Some(self.visit_freq),
            "avg_basket" => Some(self.avg_basket),
            "last_coupon_days" => Some(self.last_coupon_days),
            "reward_points" => Some(self.reward_points),
            "churn_score" => self.churn_score,
            _ => match self.extras.get(name) {
                Some(AttrValue::Number(v)) => Some(*v),
                _ => None,
            },
        }
    }

    /// Whether a named attribute is present on this record. Used by the
    /// orchestrator to validate stage input contracts.
    pub fn has_attr(&self, name: &str) -> bool {
        match name {
            "customer_id" | "visit_freq" | "avg_basket" | "last_coupon_days"
            | "reward_points" => true,
            "churn_score" => self.churn_score.is_some(),
            "churn_risk" => self.churn_risk.is_some(),
            "persona" => self.persona.is_some(),
            "persona_label" => self.persona_label.is_some(),
            "offer" => self.offer.is_some(),
            "channel" => self.channel.is_some(),
            "message" => self.message.is_some(),
            "responded" => self.responded.is_some(),
            "feedback" => self.feedback.is_some(),
            _ => self.extras.contains_key(name),
        }
    }

    /// Display name for outreach copy: a `name` passthrough column when the
    /// source provides one, otherwise a generic salutation.
    pub fn display_name(&self) -> &str {
        match self.extras.get("name") {
            Some(AttrValue::Text(name)) if !name.is_empty() => name,
            _ => "Customer",
        }
    }
}

/// Attribute names the pipeline assigns itself. Source columns with these
/// names are dropped at ingestion so stage ownership stays unambiguous.
pub const RESERVED_ATTRS: [&str; 10] = [
    "churn_score",
    "churn_risk",
    "persona",
    "persona_label",
    "offer",
    "channel",
    "message",
    "responded",
    "feedback",
    "customer_id",
];
