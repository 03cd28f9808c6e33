//! Graph engine error types.

use crate::packet::Timestamp;
use crate::side_packet::SidePacketKind;
use thiserror::Error;

/// Errors raised while configuring or running a [`PacketGraph`](super::PacketGraph).
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Invalid stream spec '{spec}': {reason}")]
    InvalidStreamSpec { spec: String, reason: String },

    #[error("Unknown calculator '{0}'")]
    UnknownCalculator(String),

    #[error("Invalid node '{node}': {reason}")]
    InvalidNode { node: String, reason: String },

    #[error("Node '{node}' names unknown executor '{executor}'")]
    UnknownExecutor { node: String, executor: String },

    #[error("Invalid executor '{name}': {reason}")]
    InvalidExecutor { name: String, reason: String },

    #[error("Failed to start {0}")]
    Executor(String),

    #[error("Stream '{0}' is produced by more than one source")]
    DuplicateOutputStream(String),

    #[error("Input stream '{stream}' of node '{node}' is not produced by any source")]
    UnconnectedInput { node: String, stream: String },

    #[error("Cycle detected in graph")]
    CycleDetected,

    #[error("Side packet '{key}' required by node '{node}' was not provided")]
    MissingSidePacket { node: String, key: String },

    #[error("Side packet '{key}' for node '{node}' is {actual}, expected {expected}")]
    SidePacketTypeMismatch {
        node: String,
        key: String,
        expected: SidePacketKind,
        actual: SidePacketKind,
    },

    #[error("Graph already initialized")]
    AlreadyInitialized,

    #[error("Graph already started")]
    AlreadyStarted,

    #[error("Input side packets were already set")]
    SidePacketsAlreadySet,

    #[error("Graph is not initialized")]
    NotInitialized,

    #[error("Graph is not running")]
    NotRunning,

    #[error("Graph has not finished running")]
    NotDone,

    #[error("Unknown input stream '{0}'")]
    UnknownInputStream(String),

    #[error("Unknown stream '{0}'")]
    UnknownStream(String),

    #[error("Output side packet '{0}' is not available")]
    UnknownOutputSidePacket(String),

    #[error("Timestamp {current} on '{stream}' is not after {previous}")]
    TimestampOutOfOrder {
        stream: String,
        previous: Timestamp,
        current: Timestamp,
    },

    #[error("Timestamp {timestamp} is not allowed on stream '{stream}'")]
    TimestampNotAllowed { stream: String, timestamp: Timestamp },

    #[error("Input stream '{0}' is closed")]
    InputStreamClosed(String),

    #[error("Calculator '{node}' failed: {message}")]
    Calculator { node: String, message: String },

    #[error("Channel send error")]
    ChannelSend,

    #[error("Scheduler thread panicked")]
    ThreadPanicked,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GraphError {
    pub(crate) fn calculator(node: &str, message: impl Into<String>) -> Self {
        GraphError::Calculator {
            node: node.to_string(),
            message: message.into(),
        }
    }

    /// Whether this error was raised by the side-packet check at start.
    pub fn is_side_packet_error(&self) -> bool {
        matches!(
            self,
            GraphError::MissingSidePacket { .. } | GraphError::SidePacketTypeMismatch { .. }
        )
    }
}

pub type GraphResult<T> = std::result::Result<T, GraphError>;
