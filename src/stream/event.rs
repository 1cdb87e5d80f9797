//! Events pushed to stream subscribers
//!
//! Every event serializes as `{"type": ..., "timestamp": ..., "data": {...}}`.

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Tag-specific payload of a [`StreamEvent`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    Connected {
        message: String,
    },
    PollStart {
        package_count: usize,
    },
    PackageUpdate {
        package_name: String,
        previous_version: Option<String>,
        latest_version: String,
        display_message: String,
        is_first_fetch: bool,
    },
    BreakingChange {
        package_name: String,
        current_version: String,
        latest_version: String,
    },
    PipelineStep {
        step: usize,
        total: usize,
        message: String,
    },
}

impl EventPayload {
    /// Wire name of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            EventPayload::Connected { .. } => "connected",
            EventPayload::PollStart { .. } => "poll_start",
            EventPayload::PackageUpdate { .. } => "package_update",
            EventPayload::BreakingChange { .. } => "breaking_change",
            EventPayload::PipelineStep { .. } => "pipeline_step",
        }
    }
}

/// A timestamped event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl StreamEvent {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn connected() -> Self {
        Self::new(EventPayload::Connected {
            message: "Connected to update stream".to_string(),
        })
    }

    pub fn poll_start(package_count: usize) -> Self {
        Self::new(EventPayload::PollStart { package_count })
    }

    pub fn package_update(
        package_name: &str,
        previous_version: Option<&str>,
        latest_version: &str,
    ) -> Self {
        let display_message = match previous_version {
            Some(prev) => format!("{}: {} -> {}", package_name, prev, latest_version),
            None => format!("{}: {}", package_name, latest_version),
        };
        Self::new(EventPayload::PackageUpdate {
            package_name: package_name.to_string(),
            previous_version: previous_version.map(str::to_string),
            latest_version: latest_version.to_string(),
            display_message,
            is_first_fetch: previous_version.is_none(),
        })
    }

    pub fn breaking_change(package_name: &str, current_version: &str, latest_version: &str) -> Self {
        Self::new(EventPayload::BreakingChange {
            package_name: package_name.to_string(),
            current_version: current_version.to_string(),
            latest_version: latest_version.to_string(),
        })
    }

    pub fn pipeline_step(step: usize, total: usize, message: impl Into<String>) -> Self {
        Self::new(EventPayload::PipelineStep {
            step,
            total,
            message: message.into(),
        })
    }

    pub fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }

    /// Serializes the event as one JSON line
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"type":"error","timestamp":"{}","data":{{"message":"{}"}}}}"#,
                self.timestamp.to_rfc3339(),
                e
            )
        })
    }
}

impl Serialize for StreamEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("StreamEvent", 3)?;
        state.serialize_field("type", self.event_type())?;
        state.serialize_field("timestamp", &self.timestamp)?;
        state.serialize_field("data", &self.payload)?;
        state.end()
    }
}
