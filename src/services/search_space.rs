//! One-shot search-space preparation.
//!
//! Freezes everything the stochastic operators share: the taxonomy with its
//! subsumption closures and connectivity indices, the resolved catalog, the
//! compiled template, the relevant-service set and the QoS normalisation
//! bounds. A prepared [`SearchSpace`] is immutable and may be shared across
//! however many builds, mutations and evaluations a run performs.

use std::collections::HashSet;

use tracing::{debug, instrument};

use crate::domain::errors::DomainResult;
use crate::domain::models::service::{ServiceCatalog, ServiceId};
use crate::domain::models::taxonomy::{GoalInputKind, ProducerId, Taxonomy};
use crate::domain::models::template::TaskTemplate;
use crate::services::relevance::relevant_services;

/// Min/max attribute bounds over the relevant set, used for normalisation.
#[derive(Debug, Clone, Copy, Default)]
pub struct QosBounds {
    pub min_time: f64,
    /// Scaled by the relevant-set size: the worst case chains every service.
    pub max_time: f64,
    pub min_cost: f64,
    /// Scaled by the relevant-set size, like `max_time`.
    pub max_cost: f64,
    pub min_availability: f64,
    pub max_availability: f64,
    pub min_reliability: f64,
    pub max_reliability: f64,
}

/// The frozen context of one composition search run.
#[derive(Debug, Clone)]
pub struct SearchSpace {
    taxonomy: Taxonomy,
    catalog: ServiceCatalog,
    template: TaskTemplate,
    relevant: HashSet<ServiceId>,
    bounds: QosBounds,
}

impl SearchSpace {
    /// Build the full search space: compute closures, filter the catalog down
    /// to the relevant services, wire the connectivity indices into the
    /// taxonomy and derive the normalisation bounds.
    #[instrument(skip_all, fields(concepts = taxonomy.len(), services = catalog.len()))]
    pub fn prepare(
        mut taxonomy: Taxonomy,
        catalog: ServiceCatalog,
        template: TaskTemplate,
    ) -> DomainResult<Self> {
        taxonomy.compute_closures();

        let relevant = relevant_services(
            &taxonomy,
            &catalog,
            template.provided_inputs(),
            &template.all_required_outputs(),
        )?;

        // Connectivity indices cover the relevant set only.
        let mut sorted: Vec<ServiceId> = relevant.iter().copied().collect();
        sorted.sort_unstable();
        for &id in &sorted {
            let descriptor = catalog.get(id);
            taxonomy.register_producer(descriptor.general_outputs(), ProducerId::Service(id));
            let inputs: Vec<_> = descriptor.inputs.iter().copied().collect();
            taxonomy.register_consumer(inputs.iter(), id);
        }

        let provided: Vec<_> = template.provided_inputs().iter().copied().collect();
        taxonomy.register_producer(&provided, ProducerId::Start);

        for goal in template.output_goals() {
            if let Some(required) = template.required_outputs(goal) {
                for &concept in required {
                    taxonomy.register_goal_input(goal, concept, GoalInputKind::End);
                }
            }
        }
        for goal in template.condition_goals() {
            if let Some((general, specific)) = template.guards(goal) {
                taxonomy.register_goal_input(goal, general, GoalInputKind::CondGeneral);
                taxonomy.register_goal_input(goal, specific, GoalInputKind::CondSpecific);
                // The marker offers its guard concepts; the specific guard is
                // a specialization of the general one, so propagation upward
                // registers the marker for both.
                taxonomy.register_producer(&[specific], ProducerId::Goal(goal));
            }
        }

        let bounds = compute_bounds(&catalog, &relevant);
        debug!(relevant = relevant.len(), "search space prepared");

        Ok(Self {
            taxonomy,
            catalog,
            template,
            relevant,
            bounds,
        })
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    pub fn template(&self) -> &TaskTemplate {
        &self.template
    }

    pub fn relevant(&self) -> &HashSet<ServiceId> {
        &self.relevant
    }

    pub fn is_relevant(&self, id: ServiceId) -> bool {
        self.relevant.contains(&id)
    }

    pub fn bounds(&self) -> &QosBounds {
        &self.bounds
    }
}

/// Attribute bounds over the relevant set. Availability and reliability are
/// normalised against a zero floor, so only their maxima come from the data;
/// the time and cost maxima are scaled by the relevant-set size because a
/// workflow may chain that many services.
fn compute_bounds(catalog: &ServiceCatalog, relevant: &HashSet<ServiceId>) -> QosBounds {
    if relevant.is_empty() {
        return QosBounds {
            max_availability: 1.0,
            max_reliability: 1.0,
            ..QosBounds::default()
        };
    }

    let mut bounds = QosBounds {
        min_time: f64::INFINITY,
        max_time: f64::NEG_INFINITY,
        min_cost: f64::INFINITY,
        max_cost: f64::NEG_INFINITY,
        min_availability: 0.0,
        max_availability: f64::NEG_INFINITY,
        min_reliability: 0.0,
        max_reliability: f64::NEG_INFINITY,
    };
    for &id in relevant {
        let qos = catalog.get(id).qos;
        bounds.min_time = bounds.min_time.min(qos.time);
        bounds.max_time = bounds.max_time.max(qos.time);
        bounds.min_cost = bounds.min_cost.min(qos.cost);
        bounds.max_cost = bounds.max_cost.max(qos.cost);
        bounds.max_availability = bounds.max_availability.max(qos.availability);
        bounds.max_reliability = bounds.max_reliability.max(qos.reliability);
    }
    let scale = relevant.len() as f64;
    bounds.max_time *= scale;
    bounds.max_cost *= scale;
    bounds
}
