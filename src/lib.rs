//! Weaver - Evolutionary Web-Service Composition
//!
//! Weaver is the computational core of an evolutionary search for QoS-aware
//! web-service composition: it indexes a concept taxonomy and service catalog,
//! grows random branching workflow graphs satisfying an abstract task
//! template, mutates them by excision and regrowth, and scores them with a
//! multi-objective fitness function.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): Pure data models and domain errors
//! - **Service Layer** (`services`): Search-space preparation, relevance
//!   filtering, graph construction, mutation and evaluation
//! - **Infrastructure Layer** (`infrastructure`): Configuration loading
//!
//! # Example
//!
//! ```ignore
//! use rand::SeedableRng;
//! use weaver::{CompositionBuilder, FitnessEvaluator, SearchSpace};
//!
//! let space = SearchSpace::prepare(taxonomy, catalog, template)?;
//! let mut rng = rand::rngs::StdRng::seed_from_u64(42);
//! let mut graph = CompositionBuilder::new(&space).build(&mut rng)?;
//! let fitness = FitnessEvaluator::new(&space, &config).evaluate(&mut graph);
//! ```

pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{CompositionError, DomainResult};
pub use domain::models::{
    ConceptId, EvaluationMode, Fitness, FitnessWeights, GoalId, GoalSpec, NodeId, Qos,
    SearchConfig, ServiceCatalog, ServiceDescriptor, ServiceId, ServiceSpec, TaskTemplate,
    Taxonomy, TemplateSpec, WorkflowGraph,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    relevant_services, CompositionBuilder, FitnessEvaluator, MutationOperator, QosBounds,
    SearchSpace,
};
