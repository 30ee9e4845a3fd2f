//! Service catalog: abstract service descriptors with QoS attributes.
//!
//! Descriptors are resolved once from their raw, name-based form against the
//! taxonomy and are immutable for the life of a search run. Workflow graphs
//! reference them by [`ServiceId`] instead of cloning them.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::errors::{CompositionError, DomainResult};
use crate::domain::models::taxonomy::{ConceptId, Taxonomy};

/// Arena index of a service in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceId(pub(crate) usize);

impl ServiceId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Quality-of-service vector of a single service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Qos {
    pub time: f64,
    pub cost: f64,
    pub availability: f64,
    pub reliability: f64,
}

impl Default for Qos {
    /// Neutral element: contributes nothing to any aggregate. Used for
    /// datasets without per-service QoS attributes and for synthetic markers.
    fn default() -> Self {
        Self {
            time: 0.0,
            cost: 0.0,
            availability: 1.0,
            reliability: 1.0,
        }
    }
}

/// One alternative output set of a service, with its occurrence probability.
///
/// By convention the general possibility comes first; probabilities across a
/// service's alternatives sum to 1.
#[derive(Debug, Clone)]
pub struct OutputPossibility {
    pub outputs: Vec<ConceptId>,
    pub probability: f64,
}

/// An abstract catalog entry, resolved against the taxonomy.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub name: String,
    pub qos: Qos,
    pub inputs: HashSet<ConceptId>,
    pub possibilities: Vec<OutputPossibility>,
}

impl ServiceDescriptor {
    /// Outputs of the general (first) possibility.
    pub fn general_outputs(&self) -> &[ConceptId] {
        &self.possibilities[0].outputs
    }

    /// True iff the service has alternative, probabilistic outcomes.
    pub fn has_branching_outputs(&self) -> bool {
        self.possibilities.len() > 1
    }

    /// Every output concept across all alternatives.
    pub fn all_output_concepts(&self) -> impl Iterator<Item = ConceptId> + '_ {
        self.possibilities
            .iter()
            .flat_map(|p| p.outputs.iter().copied())
    }
}

/// Raw, serde-friendly service description as handed over by the loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    #[serde(default)]
    pub qos: Option<Qos>,
    pub inputs: Vec<String>,
    pub output_possibilities: Vec<OutputsSpec>,
}

/// One raw output alternative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputsSpec {
    pub probability: f64,
    pub outputs: Vec<String>,
}

/// The immutable service catalog.
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
    services: Vec<ServiceDescriptor>,
    by_name: HashMap<String, ServiceId>,
}

impl ServiceCatalog {
    /// Resolve raw specs against the taxonomy.
    ///
    /// Fails on unknown concept references and on descriptors without any
    /// output possibility.
    pub fn resolve(specs: &[ServiceSpec], taxonomy: &Taxonomy) -> DomainResult<Self> {
        let mut catalog = Self::default();
        for spec in specs {
            if spec.output_possibilities.is_empty() {
                return Err(CompositionError::InvalidService {
                    name: spec.name.clone(),
                    reason: "no output possibilities".to_string(),
                });
            }

            let inputs = spec
                .inputs
                .iter()
                .map(|name| taxonomy.resolve(name))
                .collect::<DomainResult<HashSet<_>>>()?;

            let possibilities = spec
                .output_possibilities
                .iter()
                .map(|poss| {
                    let outputs = poss
                        .outputs
                        .iter()
                        .map(|name| taxonomy.resolve(name))
                        .collect::<DomainResult<Vec<_>>>()?;
                    Ok(OutputPossibility {
                        outputs,
                        probability: poss.probability,
                    })
                })
                .collect::<DomainResult<Vec<_>>>()?;

            let id = ServiceId(catalog.services.len());
            catalog.services.push(ServiceDescriptor {
                name: spec.name.clone(),
                qos: spec.qos.unwrap_or_default(),
                inputs,
                possibilities,
            });
            catalog.by_name.insert(spec.name.clone(), id);
        }
        Ok(catalog)
    }

    pub fn get(&self, id: ServiceId) -> &ServiceDescriptor {
        &self.services[id.0]
    }

    pub fn lookup(&self, name: &str) -> Option<ServiceId> {
        self.by_name.get(name).copied()
    }

    pub fn ids(&self) -> impl Iterator<Item = ServiceId> {
        (0..self.services.len()).map(ServiceId)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
