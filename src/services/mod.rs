pub mod builder;
pub mod evaluator;
pub mod mutation;
pub mod relevance;
pub mod search_space;

pub use builder::CompositionBuilder;
pub use evaluator::FitnessEvaluator;
pub use mutation::MutationOperator;
pub use relevance::relevant_services;
pub use search_space::{QosBounds, SearchSpace};
