pub mod config;
pub mod service;
pub mod taxonomy;
pub mod template;
pub mod workflow;

pub use config::{EvaluationMode, FitnessWeights, SearchConfig};
pub use service::{
    OutputPossibility, OutputsSpec, Qos, ServiceCatalog, ServiceDescriptor, ServiceId, ServiceSpec,
};
pub use taxonomy::{ConceptId, ProducerId, Taxonomy};
pub use template::{GoalId, GoalSpec, TaskTemplate, TemplateNode, TemplateSpec};
pub use workflow::{Fitness, NodeId, WorkflowGraph, WorkflowNode};
