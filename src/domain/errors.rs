//! Domain errors for the composition core.

use thiserror::Error;

use super::models::template::GoalId;

/// Errors raised while preparing a search space or operating on workflow graphs.
///
/// The first three variants are fatal for the whole run: no valid composition
/// can exist (`UnsatisfiableTask`), the inputs reference concepts the taxonomy
/// does not know (`UnknownConcept`), or the builder/filter contract was broken
/// (`ConstructionStall`).
#[derive(Error, Debug)]
pub enum CompositionError {
    #[error("unknown concept: {0}")]
    UnknownConcept(String),

    #[error("it is impossible to perform a composition using the services and settings provided")]
    UnsatisfiableTask,

    #[error("candidate list exhausted before goal {goal:?} was reached; relevance filter contract violated")]
    ConstructionStall { goal: GoalId },

    #[error("invalid service descriptor {name}: {reason}")]
    InvalidService { name: String, reason: String },

    #[error("invalid task template: {0}")]
    InvalidTemplate(String),

    #[error("workflow graph is missing expected node {0}")]
    MissingNode(String),

    #[error("cycle detected in workflow graph involving {0}")]
    CycleDetected(String),

    #[error("inputs of node {0} are not covered by its incoming edges")]
    UnsatisfiedInputs(String),

    #[error("node {0} has no incoming edges")]
    DisconnectedNode(String),
}

pub type DomainResult<T> = Result<T, CompositionError>;
