//! Concept taxonomy: an ontology DAG over input/output concept names.
//!
//! Concepts live in an arena indexed by [`ConceptId`]. Besides the parent and
//! child links, each concept carries the lookup indices the composition
//! builder relies on: which producers can emit the concept, which services
//! consume it, and per-goal keyed sets answering "which required concepts of
//! goal G does this concept satisfy". All indices are built once during
//! search-space setup and are read-only afterwards.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::domain::errors::{CompositionError, DomainResult};
use crate::domain::models::service::ServiceId;
use crate::domain::models::template::GoalId;

/// Arena index of a concept in the taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConceptId(pub(crate) usize);

impl ConceptId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A producer of a concept: something whose outputs can feed a service input.
///
/// Besides catalog services, the synthetic start marker (emitting the task's
/// provided inputs) and condition markers (emitting their guard concepts)
/// participate in connectivity lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProducerId {
    Start,
    Goal(GoalId),
    Service(ServiceId),
}

#[derive(Debug, Clone, Default)]
struct ConceptData {
    name: String,
    parents: Vec<ConceptId>,
    children: Vec<ConceptId>,
    /// Reflexive-transitive closure over children, filled by `compute_closures`.
    subsumed: HashSet<ConceptId>,
    /// Producers whose output is this concept or one of its descendants.
    producers: Vec<ProducerId>,
    /// Services whose input is this concept or one of its ancestors.
    consumers: Vec<ServiceId>,
    /// Per end goal: which of that goal's required concepts this concept satisfies.
    end_goal_inputs: HashMap<GoalId, HashSet<ConceptId>>,
    /// Per condition goal: general guard concepts this concept satisfies.
    cond_general_inputs: HashMap<GoalId, HashSet<ConceptId>>,
    /// Per condition goal: specific guard concepts this concept satisfies.
    cond_specific_inputs: HashMap<GoalId, HashSet<ConceptId>>,
}

/// The concept taxonomy DAG with its service-reachability indices.
#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    concepts: Vec<ConceptData>,
    by_name: HashMap<String, ConceptId>,
}

impl Taxonomy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a concept by name, returning its id. Idempotent.
    pub fn insert(&mut self, name: &str) -> ConceptId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = ConceptId(self.concepts.len());
        self.concepts.push(ConceptData {
            name: name.to_string(),
            ..ConceptData::default()
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Link `child` beneath `parent`.
    pub fn link(&mut self, parent: ConceptId, child: ConceptId) {
        if !self.concepts[parent.0].children.contains(&child) {
            self.concepts[parent.0].children.push(child);
        }
        if !self.concepts[child.0].parents.contains(&parent) {
            self.concepts[child.0].parents.push(parent);
        }
    }

    /// Look up a concept by name, failing on an unknown reference.
    pub fn resolve(&self, name: &str) -> DomainResult<ConceptId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| CompositionError::UnknownConcept(name.to_string()))
    }

    pub fn name(&self, id: ConceptId) -> &str {
        &self.concepts[id.0].name
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    pub fn children(&self, id: ConceptId) -> &[ConceptId] {
        &self.concepts[id.0].children
    }

    pub fn parents(&self, id: ConceptId) -> &[ConceptId] {
        &self.concepts[id.0].parents
    }

    /// Precompute the subsumption closure of every concept.
    ///
    /// Must run before any call to [`Taxonomy::subsumed`] or
    /// [`Taxonomy::satisfies`]; search-space setup does this once.
    pub fn compute_closures(&mut self) {
        for i in 0..self.concepts.len() {
            let mut closure = HashSet::new();
            let mut stack = vec![ConceptId(i)];
            while let Some(current) = stack.pop() {
                if closure.insert(current) {
                    stack.extend(self.concepts[current.0].children.iter().copied());
                }
            }
            self.concepts[i].subsumed = closure;
        }
    }

    /// All concepts subsumed by `id`: itself plus its transitive descendants.
    pub fn subsumed(&self, id: ConceptId) -> &HashSet<ConceptId> {
        &self.concepts[id.0].subsumed
    }

    /// True iff every required concept is matched by at least one available
    /// concept lying in its subsumed set: an ontological match, not set
    /// containment.
    pub fn satisfies<'a, I>(&self, required: I, available: &HashSet<ConceptId>) -> bool
    where
        I: IntoIterator<Item = &'a ConceptId>,
    {
        required.into_iter().all(|req| {
            let subsumed = self.subsumed(*req);
            available.iter().any(|a| subsumed.contains(a))
        })
    }

    pub fn producers(&self, id: ConceptId) -> &[ProducerId] {
        &self.concepts[id.0].producers
    }

    pub fn consumers(&self, id: ConceptId) -> &[ServiceId] {
        &self.concepts[id.0].consumers
    }

    pub fn end_goal_inputs(&self, id: ConceptId, goal: GoalId) -> Option<&HashSet<ConceptId>> {
        self.concepts[id.0].end_goal_inputs.get(&goal)
    }

    pub fn cond_general_inputs(&self, id: ConceptId, goal: GoalId) -> Option<&HashSet<ConceptId>> {
        self.concepts[id.0].cond_general_inputs.get(&goal)
    }

    pub fn cond_specific_inputs(&self, id: ConceptId, goal: GoalId) -> Option<&HashSet<ConceptId>> {
        self.concepts[id.0].cond_specific_inputs.get(&goal)
    }

    /// Register `producer` for every listed output concept and all of its
    /// ancestors: a producer offering a specific concept also counts as
    /// offering every generalization. A shared seen-set keeps the producer
    /// registered at most once per concept.
    pub(crate) fn register_producer(&mut self, outputs: &[ConceptId], producer: ProducerId) {
        let mut seen = HashSet::new();
        for &out in outputs {
            let mut queue = VecDeque::from([out]);
            while let Some(current) = queue.pop_front() {
                if !seen.insert(current) {
                    continue;
                }
                self.concepts[current.0].producers.push(producer);
                queue.extend(self.concepts[current.0].parents.iter().copied());
            }
        }
    }

    /// Register `service` as a consumer of every listed input concept and all
    /// of its descendants: a service requiring a general concept can be fed
    /// by anything offering a specialization.
    pub(crate) fn register_consumer<'a, I>(&mut self, inputs: I, service: ServiceId)
    where
        I: IntoIterator<Item = &'a ConceptId>,
    {
        let mut seen = HashSet::new();
        for &input in inputs {
            let mut queue = VecDeque::from([input]);
            while let Some(current) = queue.pop_front() {
                if !seen.insert(current) {
                    continue;
                }
                self.concepts[current.0].consumers.push(service);
                queue.extend(self.concepts[current.0].children.iter().copied());
            }
        }
    }

    /// Thread a goal's required concept into the per-goal index: the concept
    /// itself and all of its descendants satisfy `concept` for `goal`.
    pub(crate) fn register_goal_input(&mut self, goal: GoalId, concept: ConceptId, kind: GoalInputKind) {
        let mut queue = VecDeque::from([concept]);
        let mut seen = HashSet::new();
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            let data = &mut self.concepts[current.0];
            let map = match kind {
                GoalInputKind::End => &mut data.end_goal_inputs,
                GoalInputKind::CondGeneral => &mut data.cond_general_inputs,
                GoalInputKind::CondSpecific => &mut data.cond_specific_inputs,
            };
            map.entry(goal).or_default().insert(concept);
            queue.extend(self.concepts[current.0].children.iter().copied());
        }
    }
}

/// Which per-goal keyed index a required concept is threaded into.
#[derive(Debug, Clone, Copy)]
pub(crate) enum GoalInputKind {
    End,
    CondGeneral,
    CondSpecific,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_taxonomy() -> (Taxonomy, ConceptId, ConceptId, ConceptId) {
        // vehicle -> car -> sportscar
        let mut tax = Taxonomy::new();
        let vehicle = tax.insert("Vehicle");
        let car = tax.insert("Car");
        let sports = tax.insert("SportsCar");
        tax.link(vehicle, car);
        tax.link(car, sports);
        tax.compute_closures();
        (tax, vehicle, car, sports)
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut tax = Taxonomy::new();
        let a = tax.insert("A");
        let again = tax.insert("A");
        assert_eq!(a, again);
        assert_eq!(tax.len(), 1);
    }

    #[test]
    fn test_resolve_unknown_concept() {
        let tax = Taxonomy::new();
        assert!(matches!(
            tax.resolve("Missing"),
            Err(CompositionError::UnknownConcept(_))
        ));
    }

    #[test]
    fn test_subsumed_closure_is_reflexive_and_transitive() {
        let (tax, vehicle, car, sports) = small_taxonomy();

        let subsumed = tax.subsumed(vehicle);
        assert!(subsumed.contains(&vehicle));
        assert!(subsumed.contains(&car));
        assert!(subsumed.contains(&sports));
        assert_eq!(subsumed.len(), 3);

        assert_eq!(tax.subsumed(sports).len(), 1);
    }

    #[test]
    fn test_satisfies_matches_descendants() {
        let (tax, vehicle, _car, sports) = small_taxonomy();

        let available: HashSet<ConceptId> = [sports].into_iter().collect();
        // A required general concept is satisfied by an offered specialization.
        assert!(tax.satisfies([vehicle].iter(), &available));

        let available: HashSet<ConceptId> = [vehicle].into_iter().collect();
        // The converse does not hold.
        assert!(!tax.satisfies([sports].iter(), &available));
    }

    #[test]
    fn test_register_producer_propagates_upward() {
        let (mut tax, vehicle, car, sports) = small_taxonomy();
        let svc = ServiceId(0);
        tax.register_producer(&[sports], ProducerId::Service(svc));

        assert!(tax.producers(sports).contains(&ProducerId::Service(svc)));
        assert!(tax.producers(car).contains(&ProducerId::Service(svc)));
        assert!(tax.producers(vehicle).contains(&ProducerId::Service(svc)));
    }

    #[test]
    fn test_register_producer_deduplicates_shared_ancestors() {
        let (mut tax, vehicle, car, sports) = small_taxonomy();
        tax.register_producer(&[car, sports], ProducerId::Start);
        // Vehicle is an ancestor of both outputs but the producer appears once.
        assert_eq!(
            tax.producers(vehicle)
                .iter()
                .filter(|p| **p == ProducerId::Start)
                .count(),
            1
        );
    }

    #[test]
    fn test_register_consumer_propagates_downward() {
        let (mut tax, vehicle, car, sports) = small_taxonomy();
        let svc = ServiceId(3);
        tax.register_consumer([vehicle].iter(), svc);

        assert!(tax.consumers(vehicle).contains(&svc));
        assert!(tax.consumers(car).contains(&svc));
        assert!(tax.consumers(sports).contains(&svc));
    }

    #[test]
    fn test_register_goal_input_keyed_by_goal() {
        let (mut tax, _vehicle, car, sports) = small_taxonomy();
        let goal = GoalId(7);
        tax.register_goal_input(goal, car, GoalInputKind::End);

        let at_leaf = tax.end_goal_inputs(sports, goal).unwrap();
        assert!(at_leaf.contains(&car));
        assert!(tax.end_goal_inputs(sports, GoalId(8)).is_none());
    }
}
