//! Error types for Xooie core.

use std::fmt;

use crate::dom::NodeId;

/// The main error type for core operations.
#[derive(Debug)]
pub enum CoreError {
    /// DOM-related error.
    Dom(DomError),
    /// Timer-related error.
    Timer(TimerError),
    /// Task queue error.
    Task(TaskError),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dom(err) => write!(f, "DOM error: {err}"),
            Self::Timer(err) => write!(f, "Timer error: {err}"),
            Self::Task(err) => write!(f, "Task error: {err}"),
        }
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Dom(err) => Some(err),
            Self::Timer(err) => Some(err),
            Self::Task(err) => Some(err),
        }
    }
}

/// Errors raised by document tree operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// The node id is invalid or the node has been destroyed.
    InvalidNode(NodeId),
    /// The operation requires an element but the node is a text node.
    NotAnElement(NodeId),
    /// Inserting the node would make it its own ancestor.
    HierarchyRequest,
    /// The reference node for an insertion is not a child of the parent.
    NotAChild,
    /// The event name is empty or malformed.
    InvalidEventName(String),
}

impl fmt::Display for DomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidNode(id) => write!(f, "Invalid or destroyed node {id:?}"),
            Self::NotAnElement(id) => write!(f, "Node {id:?} is not an element"),
            Self::HierarchyRequest => {
                write!(f, "Cannot insert a node into itself or one of its descendants")
            }
            Self::NotAChild => write!(f, "Reference node is not a child of the parent"),
            Self::InvalidEventName(name) => write!(f, "Invalid event name '{name}'"),
        }
    }
}

impl std::error::Error for DomError {}

/// Timer-specific errors.
#[derive(Debug)]
pub enum TimerError {
    /// The timer ID is invalid or has already been removed.
    InvalidTimerId,
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTimerId => write!(f, "Invalid or expired timer ID"),
        }
    }
}

impl std::error::Error for TimerError {}

/// Task queue errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The task was already run or cancelled.
    UnknownTask,
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTask => write!(f, "Task already ran or was cancelled"),
        }
    }
}

impl std::error::Error for TaskError {}

impl From<DomError> for CoreError {
    fn from(err: DomError) -> Self {
        Self::Dom(err)
    }
}

impl From<TimerError> for CoreError {
    fn from(err: TimerError) -> Self {
        Self::Timer(err)
    }
}

impl From<TaskError> for CoreError {
    fn from(err: TaskError) -> Self {
        Self::Task(err)
    }
}

/// Result type for DOM operations.
pub type DomResult<T> = std::result::Result<T, DomError>;

/// A specialized Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
