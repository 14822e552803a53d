//! Event types for observing pipeline activity
//!
//! Events are sent from executives and the pipeline graph to any consumer
//! (a log, a UI, a test) to report executions, cache hits, failures and
//! invalidation.

use serde::{Deserialize, Serialize};

/// Trait for receiving pipeline events
///
/// This abstracts over the transport mechanism (channel, log, collector).
pub trait EventSink: Send + Sync {
    /// Send an event
    ///
    /// Returns an error if the event could not be delivered (e.g., channel closed)
    fn send(&self, event: PipelineEvent) -> Result<(), EventError>;
}

/// An event could not be delivered
#[derive(Debug, Clone)]
pub struct EventError {
    pub message: String,
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EventError {}

impl EventError {
    pub fn channel_closed() -> Self {
        Self {
            message: "event channel closed".to_string(),
        }
    }
}

/// Events emitted while building and updating a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PipelineEvent {
    /// A node ran its transform
    #[serde(rename_all = "camelCase")]
    NodeExecuted {
        node_id: String,
        version: u64,
        duration_ms: u64,
    },

    /// An update was served from cache
    #[serde(rename_all = "camelCase")]
    CacheHit { node_id: String },

    /// A node's transform failed
    #[serde(rename_all = "camelCase")]
    NodeFailed { node_id: String, error: String },

    /// A node's parameters or array selections changed
    #[serde(rename_all = "camelCase")]
    NodeModified { node_id: String },

    /// An input slot was rebound
    #[serde(rename_all = "camelCase")]
    ConnectionChanged { node_id: String, slot: usize },

    /// The graph was invalidated from a node downward
    #[serde(rename_all = "camelCase")]
    GraphInvalidated {
        pipeline_id: String,
        stale_nodes: Vec<String>,
    },
}

impl PipelineEvent {
    /// Node the event concerns, if any
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::NodeExecuted { node_id, .. }
            | Self::CacheHit { node_id }
            | Self::NodeFailed { node_id, .. }
            | Self::NodeModified { node_id }
            | Self::ConnectionChanged { node_id, .. } => Some(node_id),
            Self::GraphInvalidated { .. } => None,
        }
    }
}

/// Sink that drops every event
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: PipelineEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// Sink that records events in memory for later inspection
pub struct VecEventSink {
    events: parking_lot::Mutex<Vec<PipelineEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self {
            events: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().clone()
    }

    /// Number of executions recorded for a node
    pub fn executions_of(&self, node_id: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, PipelineEvent::NodeExecuted { node_id: id, .. } if id == node_id))
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Default for VecEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: PipelineEvent) -> Result<(), EventError> {
        self.events.lock().push(event);
        Ok(())
    }
}
