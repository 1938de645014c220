use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::OrganizationId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntakeEventId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Sms,
    Email,
    Upload,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sms => "sms",
            Self::Email => "email",
            Self::Upload => "upload",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sms" => Some(Self::Sms),
            "email" => Some(Self::Email),
            "upload" => Some(Self::Upload),
            _ => None,
        }
    }
}

/// One inbound message. Created by the intake surface before the pipeline
/// runs; immutable from the pipeline's perspective.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeEvent {
    pub id: IntakeEventId,
    pub organization_id: OrganizationId,
    pub channel: Channel,
    pub raw_content: String,
    pub received_at: DateTime<Utc>,
}
