//! Forward-chaining relevance filter.
//!
//! Narrows the catalog down to the services reachable from the task's
//! provided inputs before any graph is built. Everything downstream (candidate
//! seeding, normalisation bounds) operates on the relevant set only.

use std::collections::HashSet;

use tracing::{debug, instrument};

use crate::domain::errors::{CompositionError, DomainResult};
use crate::domain::models::service::{ServiceCatalog, ServiceId};
use crate::domain::models::taxonomy::{ConceptId, Taxonomy};

/// Compute the set of services reachable from `provided` by forward chaining.
///
/// Starting from the provided concepts, repeatedly discover services whose
/// inputs are satisfied by the accumulated concept set and union in every
/// output alternative they may emit, until a fixed point. Fails with
/// [`CompositionError::UnsatisfiableTask`] when the fixed point does not
/// satisfy `required`.
#[instrument(skip_all, fields(services = catalog.len()))]
pub fn relevant_services(
    taxonomy: &Taxonomy,
    catalog: &ServiceCatalog,
    provided: &HashSet<ConceptId>,
    required: &HashSet<ConceptId>,
) -> DomainResult<HashSet<ServiceId>> {
    let mut available: HashSet<ConceptId> = provided.iter().copied().collect();
    let mut relevant: HashSet<ServiceId> = HashSet::new();
    let mut remaining: Vec<ServiceId> = catalog.ids().collect();

    loop {
        let mut discovered = false;
        remaining.retain(|&id| {
            let descriptor = catalog.get(id);
            if taxonomy.satisfies(descriptor.inputs.iter(), &available) {
                available.extend(descriptor.all_output_concepts());
                relevant.insert(id);
                discovered = true;
                false
            } else {
                true
            }
        });
        if !discovered {
            break;
        }
    }

    if !taxonomy.satisfies(required.iter(), &available) {
        return Err(CompositionError::UnsatisfiableTask);
    }

    debug!(relevant = relevant.len(), "relevance filter fixed point");
    Ok(relevant)
}
