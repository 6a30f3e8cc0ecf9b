//! Event types for deployment progress

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope wrapping all events with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// The actual event
    pub event: Event,
}

impl EventEnvelope {
    /// Create a new event envelope with auto-generated ID and timestamp
    pub fn new(event: Event) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// All progress events a deployment run can publish
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Invocation moved between lifecycle phases
    #[serde(rename = "invocation.phase_changed")]
    PhaseChanged { from: String, to: String },

    // Resource group events
    #[serde(rename = "container.checked")]
    ContainerChecked { container: String, exists: bool },

    #[serde(rename = "container.created")]
    ContainerCreated { container: String, location: String },

    // Operation events
    /// Deployment or what-if request accepted by the control plane
    #[serde(rename = "operation.submitted")]
    Submitted {
        deployment: String,
        kind: OperationKind,
    },

    /// Polling started for an operation
    #[serde(rename = "operation.polling")]
    PollingStarted {
        deployment: String,
        kind: OperationKind,
        timeout_secs: u64,
        interval_secs: u64,
    },

    /// Provisioning state differs from the last one observed
    #[serde(rename = "operation.status_changed")]
    StatusChanged {
        deployment: String,
        from: Option<String>,
        to: String,
    },

    /// Operation reached a final outcome
    #[serde(rename = "operation.finished")]
    Finished {
        deployment: String,
        kind: OperationKind,
        outcome: String,
        success: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Deployment,
    WhatIf,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deployment => "deployment",
            Self::WhatIf => "what-if",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_envelope_creation() {
        let event = Event::ContainerChecked {
            container: "rg-test".to_string(),
            exists: true,
        };
        let envelope = EventEnvelope::new(event);

        assert!(!envelope.id.is_nil());
        assert!(envelope.timestamp <= Utc::now());
    }

    #[test]
    fn test_event_serialization() {
        let event = Event::StatusChanged {
            deployment: "dep-1".to_string(),
            from: Some("Accepted".to_string()),
            to: "Running".to_string(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("operation.status_changed"));
        assert!(json.contains("\"from\":\"Accepted\""));
        assert!(json.contains("\"to\":\"Running\""));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"operation.submitted","deployment":"dep-1","kind":"what_if"}"#;
        let event: Event = serde_json::from_str(json).unwrap();

        match event {
            Event::Submitted { deployment, kind } => {
                assert_eq!(deployment, "dep-1");
                assert_eq!(kind, OperationKind::WhatIf);
            }
            _ => panic!("Wrong event type"),
        }
    }
}
