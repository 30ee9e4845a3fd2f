//! Stochastic composition builder.
//!
//! Grows a workflow graph goal by goal: a shuffled candidate list is scanned
//! for the first service whose inputs can all be fed by already-placed
//! ancestors, the service is instantiated for the current goal context, and
//! its outputs seed further candidates. Shuffling is the builder's sole source
//! of randomness; everything else iterates in sorted order so equal seeds
//! yield equal graphs.

use std::collections::{HashMap, HashSet};

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, instrument, trace};

use crate::domain::errors::{CompositionError, DomainResult};
use crate::domain::models::service::ServiceId;
use crate::domain::models::taxonomy::{ConceptId, ProducerId};
use crate::domain::models::template::GoalId;
use crate::domain::models::workflow::{NodeId, WorkflowGraph};
use crate::services::search_space::SearchSpace;

/// Mutable state of one goal-growth pass.
///
/// Each condition branch gets its own state: the allowed-ancestor set is
/// inherited (cloned), while seen services, candidates and accumulated goal
/// inputs start fresh per branch.
#[derive(Debug, Clone, Default)]
pub(crate) struct GrowthState {
    /// Nodes eligible as input producers for the goal being grown.
    pub allowed: HashSet<NodeId>,
    /// Base services already on the candidate list or placed in this context.
    pub seen: HashSet<ServiceId>,
    /// Candidate services, scanned front to back after each shuffle.
    pub candidates: Vec<ServiceId>,
    /// Concepts accumulated toward an output goal's required set.
    pub goal_inputs: HashSet<ConceptId>,
    /// The branching service that satisfies a condition goal, once found.
    pub satisfier: Option<NodeId>,
}

/// Builds random valid workflow graphs over a prepared search space.
#[derive(Debug, Clone, Copy)]
pub struct CompositionBuilder<'a> {
    space: &'a SearchSpace,
}

impl<'a> CompositionBuilder<'a> {
    pub fn new(space: &'a SearchSpace) -> Self {
        Self { space }
    }

    /// Construct a complete random workflow satisfying the task template.
    #[instrument(skip_all)]
    pub fn build(&self, rng: &mut impl Rng) -> DomainResult<WorkflowGraph> {
        let template = self.space.template();
        let mut graph = WorkflowGraph::new();
        graph.add_node(NodeId::Start);

        let mut state = GrowthState {
            allowed: [NodeId::Start].into_iter().collect(),
            ..GrowthState::default()
        };
        let mut provided: Vec<ConceptId> =
            template.provided_inputs().iter().copied().collect();
        provided.sort_unstable();
        self.seed_candidates(provided.iter().copied(), &mut state);

        // Task inputs may already cover part (or all) of the first goal.
        let first = template.first_goal();
        for &concept in &provided {
            if let Some(keyed) = self.space.taxonomy().end_goal_inputs(concept, first) {
                state.goal_inputs.extend(keyed.iter().copied());
            }
        }
        state.candidates.shuffle(rng);

        self.grow(&mut graph, first, state, rng)?;
        self.prune_dangling(&mut graph);
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "workflow constructed"
        );
        Ok(graph)
    }

    /// Grow the subgraph satisfying `goal`, recursing into condition branches.
    ///
    /// Satisfaction is checked before each candidate scan, so a state whose
    /// pre-populated inputs already cover the goal places no service at all.
    /// Exhausting the candidates first is a contract violation: the relevance
    /// filter guaranteed a composition exists.
    pub(crate) fn grow(
        &self,
        graph: &mut WorkflowGraph,
        goal: GoalId,
        mut state: GrowthState,
        rng: &mut impl Rng,
    ) -> DomainResult<()> {
        while !self.goal_satisfied(goal, &state) {
            let placed = state.candidates.iter().enumerate().find_map(|(i, &c)| {
                self.eligible_connections(c, &state.allowed)
                    .map(|connections| (i, c, connections))
            });
            let Some((index, candidate, connections)) = placed else {
                return Err(CompositionError::ConstructionStall { goal });
            };
            state.candidates.remove(index);
            self.place(graph, candidate, goal, connections, &mut state);
            state.candidates.shuffle(rng);
        }

        if self.space.template().is_condition(goal) {
            self.finish_condition(graph, goal, state, rng)
        } else {
            self.wire_end_marker(graph, goal, &state);
            Ok(())
        }
    }

    /// Instantiate `candidate` under `goal`, connect it to its feeding
    /// ancestors and fold its outputs into the growth state.
    fn place(
        &self,
        graph: &mut WorkflowGraph,
        candidate: ServiceId,
        goal: GoalId,
        connections: HashMap<NodeId, HashSet<ConceptId>>,
        state: &mut GrowthState,
    ) {
        let taxonomy = self.space.taxonomy();
        let template = self.space.template();
        let descriptor = self.space.catalog().get(candidate);
        let node = NodeId::Service {
            service: candidate,
            goal,
        };
        trace!(%node, "placing service");

        graph.add_node(node);
        for (ancestor, intersect) in connections {
            graph.connect(ancestor, node, intersect);
        }
        state.allowed.insert(node);
        state.seen.insert(candidate);

        let mut outputs: Vec<ConceptId> = descriptor.general_outputs().to_vec();
        outputs.sort_unstable();
        self.seed_candidates(outputs.iter().copied(), state);

        if template.is_condition(goal) {
            if state.satisfier.is_none() && self.satisfies_condition(candidate, goal) {
                state.satisfier = Some(node);
            }
        } else {
            for &out in &outputs {
                if let Some(keyed) = taxonomy.end_goal_inputs(out, goal) {
                    state.goal_inputs.extend(keyed.iter().copied());
                }
            }
        }
    }

    /// Place the condition marker fed by its satisfying service, then grow
    /// the specific branch and the general branch independently.
    fn finish_condition(
        &self,
        graph: &mut WorkflowGraph,
        goal: GoalId,
        state: GrowthState,
        rng: &mut impl Rng,
    ) -> DomainResult<()> {
        let template = self.space.template();
        let Some(satisfier) = state.satisfier else {
            // goal_satisfied returned true, so the satisfier is set.
            return Err(CompositionError::ConstructionStall { goal });
        };
        let NodeId::Service { service, .. } = satisfier else {
            return Err(CompositionError::ConstructionStall { goal });
        };

        let descriptor = self.space.catalog().get(service);
        let probabilities = (
            descriptor.possibilities[0].probability,
            descriptor.possibilities[1].probability,
        );
        let marker = NodeId::Goal(goal);
        graph.connect(satisfier, marker, HashSet::new());
        if let Some(node) = graph.node_mut(marker) {
            node.branch_probabilities = Some(probabilities);
        }

        let mut allowed = state.allowed;
        allowed.insert(marker);

        let (general_child, specific_child) = match template.children(goal).as_slice() {
            &[general, specific] => (general, specific),
            _ => return Err(CompositionError::ConstructionStall { goal }),
        };
        for child in [specific_child, general_child] {
            let mut branch = GrowthState {
                allowed: allowed.clone(),
                ..GrowthState::default()
            };
            if let Some(guard) = template.branch_guard(goal, child) {
                self.seed_candidates([guard].into_iter(), &mut branch);
                if let Some(keyed) = self.space.taxonomy().end_goal_inputs(guard, child) {
                    branch.goal_inputs.extend(keyed.iter().copied());
                }
            }
            branch.candidates.shuffle(rng);
            self.grow(graph, child, branch, rng)?;
        }
        Ok(())
    }

    /// Connect the end marker of an output goal to the ancestors that jointly
    /// produce its required concepts, each edge labelled with the concepts it
    /// actually contributes.
    fn wire_end_marker(&self, graph: &mut WorkflowGraph, goal: GoalId, state: &GrowthState) {
        let taxonomy = self.space.taxonomy();
        let marker = NodeId::Goal(goal);
        graph.add_node(marker);

        let mut remaining = state.goal_inputs.clone();
        for id in graph.node_ids() {
            if id == marker || !state.allowed.contains(&id) {
                continue;
            }
            let mut intersect = HashSet::new();
            for out in self.producer_outputs(id, goal) {
                if let Some(keyed) = taxonomy.end_goal_inputs(out, goal) {
                    intersect.extend(keyed.iter().filter(|c| remaining.contains(*c)));
                }
            }
            if !intersect.is_empty() {
                for concept in &intersect {
                    remaining.remove(concept);
                }
                graph.connect(id, marker, intersect);
            }
        }
    }

    /// Whether the goal's growth loop can stop.
    fn goal_satisfied(&self, goal: GoalId, state: &GrowthState) -> bool {
        let template = self.space.template();
        if template.is_condition(goal) {
            state.satisfier.is_some()
        } else {
            template
                .required_outputs(goal)
                .is_some_and(|required| required.is_subset(&state.goal_inputs))
        }
    }

    /// A condition goal is satisfied by a branching service whose general
    /// possibility covers the general guard and whose second possibility
    /// covers the specific guard.
    pub(crate) fn satisfies_condition(&self, candidate: ServiceId, goal: GoalId) -> bool {
        let taxonomy = self.space.taxonomy();
        let descriptor = self.space.catalog().get(candidate);
        if !descriptor.has_branching_outputs() {
            return false;
        }
        let Some((general, specific)) = self.space.template().guards(goal) else {
            return false;
        };
        let covers = |outputs: &[ConceptId], guard: ConceptId, specific_kind: bool| {
            outputs.iter().any(|&out| {
                let keyed = if specific_kind {
                    taxonomy.cond_specific_inputs(out, goal)
                } else {
                    taxonomy.cond_general_inputs(out, goal)
                };
                keyed.is_some_and(|set| set.contains(&guard))
            })
        };
        covers(&descriptor.possibilities[0].outputs, general, false)
            && covers(&descriptor.possibilities[1].outputs, specific, true)
    }

    /// Map a candidate's inputs to feeding ancestors in the allowed set.
    ///
    /// Each input concept is assigned the first producer (in index order) with
    /// an allowed instance; concepts fed by the same ancestor merge into one
    /// edge. Returns `None` when any input has no allowed producer.
    fn eligible_connections(
        &self,
        candidate: ServiceId,
        allowed: &HashSet<NodeId>,
    ) -> Option<HashMap<NodeId, HashSet<ConceptId>>> {
        let taxonomy = self.space.taxonomy();
        let descriptor = self.space.catalog().get(candidate);

        let mut inputs: Vec<ConceptId> = descriptor.inputs.iter().copied().collect();
        inputs.sort_unstable();

        let mut connections: HashMap<NodeId, HashSet<ConceptId>> = HashMap::new();
        if inputs.is_empty() {
            // Nothing to feed it; anchor it beneath the start marker.
            connections.insert(NodeId::Start, HashSet::new());
            return Some(connections);
        }
        for input in inputs {
            let ancestor = taxonomy
                .producers(input)
                .iter()
                .find_map(|&producer| self.allowed_instance(producer, allowed))?;
            connections.entry(ancestor).or_default().insert(input);
        }
        Some(connections)
    }

    /// Resolve a producer to an allowed graph node. A base service may be
    /// instantiated under several goal contexts; the smallest instance wins
    /// to keep construction deterministic.
    fn allowed_instance(&self, producer: ProducerId, allowed: &HashSet<NodeId>) -> Option<NodeId> {
        match producer {
            ProducerId::Start => allowed.contains(&NodeId::Start).then_some(NodeId::Start),
            ProducerId::Goal(goal) => {
                let marker = NodeId::Goal(goal);
                allowed.contains(&marker).then_some(marker)
            }
            ProducerId::Service(service) => allowed
                .iter()
                .filter(|id| matches!(id, NodeId::Service { service: s, .. } if *s == service))
                .min()
                .copied(),
        }
    }

    /// Concepts a node offers toward `target`'s goal satisfaction: the task
    /// inputs for the start marker, the general outputs for a service, the
    /// guard concept emitted toward `target` for a condition marker.
    pub(crate) fn producer_outputs(&self, id: NodeId, target: GoalId) -> Vec<ConceptId> {
        let template = self.space.template();
        match id {
            NodeId::Start => {
                let mut out: Vec<ConceptId> =
                    template.provided_inputs().iter().copied().collect();
                out.sort_unstable();
                out
            }
            NodeId::Service { service, .. } => {
                self.space.catalog().get(service).general_outputs().to_vec()
            }
            NodeId::Goal(goal) => template.branch_guard(goal, target).into_iter().collect(),
        }
    }

    /// Add every relevant consumer of each concept to the candidate list,
    /// at most once per base service.
    pub(crate) fn seed_candidates(
        &self,
        concepts: impl Iterator<Item = ConceptId>,
        state: &mut GrowthState,
    ) {
        for concept in concepts {
            for &consumer in self.space.taxonomy().consumers(concept) {
                if self.space.is_relevant(consumer) && state.seen.insert(consumer) {
                    state.candidates.push(consumer);
                }
            }
        }
    }

    /// Remove nodes that feed nothing. Markers and the start node anchor the
    /// graph; everything else with no outgoing edge is excised, repeatedly,
    /// since a removal can strand the node's own ancestors.
    pub(crate) fn prune_dangling(&self, graph: &mut WorkflowGraph) {
        loop {
            let dangling: Vec<NodeId> = graph
                .node_ids()
                .into_iter()
                .filter(|&id| {
                    !id.is_marker()
                        && graph.node(id).is_some_and(|n| n.outgoing.is_empty())
                })
                .collect();
            if dangling.is_empty() {
                break;
            }
            for id in dangling {
                trace!(%id, "pruning dangling node");
                graph.remove_node(id);
            }
        }
    }
}
