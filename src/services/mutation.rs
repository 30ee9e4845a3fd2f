//! Mutation by subgraph excision and regrowth.
//!
//! Picks one node uniformly among those still on a path to their goal marker,
//! cuts away everything the node feeds (plus every node belonging to a goal
//! beneath the target goal in the template), then re-runs the builder's
//! growth procedure over the surviving ancestors. Choosing the start node
//! degenerates into building a fresh individual.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, instrument, trace};

use crate::domain::errors::DomainResult;
use crate::domain::models::template::GoalId;
use crate::domain::models::workflow::{NodeId, WorkflowGraph};
use crate::services::builder::{CompositionBuilder, GrowthState};
use crate::services::search_space::SearchSpace;

/// Applies excision/regrowth mutation to workflow graphs.
#[derive(Debug, Clone, Copy)]
pub struct MutationOperator<'a> {
    space: &'a SearchSpace,
}

impl<'a> MutationOperator<'a> {
    pub fn new(space: &'a SearchSpace) -> Self {
        Self { space }
    }

    /// Mutate `graph`, returning the changed individual with its cached
    /// fitness cleared.
    #[instrument(skip_all)]
    pub fn mutate(
        &self,
        mut graph: WorkflowGraph,
        rng: &mut impl Rng,
    ) -> DomainResult<WorkflowGraph> {
        let builder = CompositionBuilder::new(self.space);

        let eligible = self.eligible_nodes(&graph);
        let Some(&selected) = eligible.choose(rng) else {
            // Nothing to excise; regrowing from scratch is the only move.
            return builder.build(rng);
        };
        trace!(%selected, "mutation point");

        let NodeId::Service { goal, .. } = selected else {
            debug!("start node selected, rebuilding individual");
            return builder.build(rng);
        };

        self.excise(&mut graph, selected, goal);
        let mut state = self.rebuild_state(&graph, goal, &builder);
        state.candidates.shuffle(rng);
        builder.grow(&mut graph, goal, state, rng)?;
        builder.prune_dangling(&mut graph);
        graph.clear_fitness();
        Ok(graph)
    }

    /// Nodes a mutation may target: the start marker, plus every service
    /// instance that still reaches the marker of its own goal.
    fn eligible_nodes(&self, graph: &WorkflowGraph) -> Vec<NodeId> {
        graph
            .node_ids()
            .into_iter()
            .filter(|&id| match id {
                NodeId::Start => true,
                NodeId::Service { goal, .. } => graph.has_path(id, NodeId::Goal(goal)),
                NodeId::Goal(_) => false,
            })
            .collect()
    }

    /// Remove everything downstream of `selected` together with every node
    /// whose goal context lies strictly below `goal` in the template.
    fn excise(&self, graph: &mut WorkflowGraph, selected: NodeId, goal: GoalId) {
        let template = self.space.template();
        let below = template.goals_below(goal);

        let mut doomed = graph.reachable_from(selected);
        doomed.extend(
            graph
                .node_ids()
                .into_iter()
                .filter(|id| !id.is_start() && below.contains(&id.context(template))),
        );
        for id in doomed {
            graph.remove_node(id);
        }
    }

    /// Reconstruct the growth state from the surviving ancestors: nodes whose
    /// context lies on the chain from the target goal up to the template root
    /// stay usable as producers, reseed the candidate list and pre-cover the
    /// goal's required concepts.
    fn rebuild_state(
        &self,
        graph: &WorkflowGraph,
        goal: GoalId,
        builder: &CompositionBuilder<'_>,
    ) -> GrowthState {
        let template = self.space.template();
        let taxonomy = self.space.taxonomy();
        let chain: HashSet<GoalId> = template.ancestor_chain(goal).into_iter().collect();

        let mut state = GrowthState::default();
        for id in graph.node_ids() {
            if !chain.contains(&id.context(template)) {
                continue;
            }
            if let NodeId::Goal(marker_goal) = id {
                // End markers of sibling goals produce nothing here.
                if template.is_output(marker_goal) {
                    continue;
                }
            }
            state.allowed.insert(id);
            if let NodeId::Service { service, goal: context } = id {
                state.seen.insert(service);
                // A surviving branch-deciding service keeps satisfying its
                // condition goal; without this the growth loop would hunt for
                // a second one the seen set forbids.
                if context == goal
                    && state.satisfier.is_none()
                    && template.is_condition(goal)
                    && builder.satisfies_condition(service, goal)
                {
                    state.satisfier = Some(id);
                }
            }

            let outputs = builder.producer_outputs(id, goal);
            builder.seed_candidates(outputs.iter().copied(), &mut state);
            if template.is_output(goal) {
                for out in outputs {
                    if let Some(keyed) = taxonomy.end_goal_inputs(out, goal) {
                        state.goal_inputs.extend(keyed.iter().copied());
                    }
                }
            }
        }
        state
    }
}
