//! Multi-objective fitness evaluation.
//!
//! Two scoring modes share one longest-path machinery: QoS mode aggregates
//! time, cost, availability and reliability into a weighted score normalised
//! against the relevant-set bounds; structural mode rewards short paths and
//! small workflows against configured ideals. Evaluation caches its result on
//! the graph and is idempotent.

use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument};

use crate::domain::models::config::{EvaluationMode, SearchConfig};
use crate::domain::models::service::ServiceId;
use crate::domain::models::template::GoalId;
use crate::domain::models::workflow::{Fitness, NodeId, WorkflowGraph};
use crate::services::search_space::SearchSpace;

/// Scores workflow graphs over a prepared search space.
#[derive(Debug, Clone, Copy)]
pub struct FitnessEvaluator<'a> {
    space: &'a SearchSpace,
    config: &'a SearchConfig,
}

/// One concrete execution outcome: an end goal, the probability of reaching
/// it, and the goal contexts traversed on the way.
struct ExecutionPath {
    end: GoalId,
    probability: f64,
    contexts: Vec<GoalId>,
}

impl<'a> FitnessEvaluator<'a> {
    pub fn new(space: &'a SearchSpace, config: &'a SearchConfig) -> Self {
        Self { space, config }
    }

    /// Score `graph`, caching the fitness on it. Re-evaluating an already
    /// scored graph returns the cached value unchanged.
    #[instrument(skip_all)]
    pub fn evaluate(&self, graph: &mut WorkflowGraph) -> Fitness {
        if let Some(cached) = graph.fitness() {
            return cached.clone();
        }
        let fitness = match self.config.mode {
            EvaluationMode::Qos => self.evaluate_qos(graph),
            EvaluationMode::Structural => self.evaluate_structural(graph),
        };
        debug!(score = fitness.score, ideal = fitness.ideal, "evaluated");
        graph.set_fitness(fitness.clone());
        fitness
    }

    fn evaluate_qos(&self, graph: &WorkflowGraph) -> Fitness {
        let catalog = self.space.catalog();
        let bounds = self.space.bounds();
        let weights = &self.config.weights;

        let by_context = self.services_by_context(graph);
        let (dist, pred) = self.relax(graph, |id| match id {
            NodeId::Service { service, .. } => catalog.get(service).qos.time,
            _ => 0.0,
        });

        let mut expected_time = 0.0;
        let mut expected_cost = 0.0;
        let mut expected_availability = 0.0;
        let mut expected_reliability = 0.0;
        for path in self.execution_paths(graph) {
            let time = self.path_time(NodeId::Goal(path.end), &dist, &pred);

            // Each base service counts once per outcome, however many contexts
            // on the path instantiated it.
            let mut services: HashSet<ServiceId> = HashSet::new();
            for context in &path.contexts {
                if let Some(in_context) = by_context.get(context) {
                    services.extend(in_context.iter().copied());
                }
            }
            let mut cost = 0.0;
            let mut availability = 1.0;
            let mut reliability = 1.0;
            for service in services {
                let qos = catalog.get(service).qos;
                cost += qos.cost;
                availability *= qos.availability;
                reliability *= qos.reliability;
            }

            expected_time += path.probability * time;
            expected_cost += path.probability * cost;
            expected_availability += path.probability * availability;
            expected_reliability += path.probability * reliability;
        }

        let a = normalise_benefit(
            expected_availability,
            bounds.min_availability,
            bounds.max_availability,
        );
        let r = normalise_benefit(
            expected_reliability,
            bounds.min_reliability,
            bounds.max_reliability,
        );
        let t = normalise_penalty(expected_time, bounds.min_time, bounds.max_time);
        let c = normalise_penalty(expected_cost, bounds.min_cost, bounds.max_cost);

        Fitness {
            score: weights.availability * a
                + weights.reliability * r
                + weights.time * (1.0 - t)
                + weights.cost * (1.0 - c),
            ideal: false,
            longest_path_length: None,
            num_atomic_services: None,
        }
    }

    fn evaluate_structural(&self, graph: &WorkflowGraph) -> Fitness {
        let (_, pred) = self.relax(graph, |_| 1.0);

        let longest_path = self
            .space
            .template()
            .output_goals()
            .into_iter()
            .map(|goal| self.path_node_count(NodeId::Goal(goal), &pred).saturating_sub(1))
            .max()
            .unwrap_or(0);
        let num_atomic = graph
            .considered_nodes()
            .filter(|n| n.id.is_service())
            .count();

        if longest_path == 0 || num_atomic == 0 {
            return Fitness {
                score: 0.0,
                ideal: false,
                longest_path_length: Some(longest_path),
                num_atomic_services: Some(num_atomic),
            };
        }
        Fitness {
            score: 0.5 * (1.0 / longest_path as f64) + 0.5 * (1.0 / num_atomic as f64),
            ideal: longest_path == self.config.ideal_longest_path
                && num_atomic == self.config.ideal_num_atomic,
            longest_path_length: Some(longest_path),
            num_atomic_services: Some(num_atomic),
        }
    }

    /// Longest-path relaxation from the start marker. Distances are negated
    /// sums of the destination-node weights, so smaller means longer; with
    /// `node_count - 1` passes over the sorted edge list every path settles.
    fn relax<W: Fn(NodeId) -> f64>(
        &self,
        graph: &WorkflowGraph,
        weight: W,
    ) -> (HashMap<NodeId, f64>, HashMap<NodeId, NodeId>) {
        let mut dist: HashMap<NodeId, f64> = graph
            .node_ids()
            .into_iter()
            .map(|id| (id, if id.is_start() { 0.0 } else { f64::INFINITY }))
            .collect();
        let mut pred: HashMap<NodeId, NodeId> = HashMap::new();

        let mut edges: Vec<(NodeId, NodeId)> =
            graph.edges().map(|(from, to, _)| (from, to)).collect();
        edges.sort_unstable();

        let passes = graph.node_count().saturating_sub(1);
        for _ in 0..passes {
            let mut changed = false;
            for &(from, to) in &edges {
                let relaxed = dist[&from] - weight(to);
                if relaxed < dist[&to] {
                    dist.insert(to, relaxed);
                    pred.insert(to, from);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        (dist, pred)
    }

    /// Total service time along the settled predecessor chain ending at `end`.
    fn path_time(
        &self,
        end: NodeId,
        dist: &HashMap<NodeId, f64>,
        pred: &HashMap<NodeId, NodeId>,
    ) -> f64 {
        if !dist.get(&end).is_some_and(|d| d.is_finite()) {
            return 0.0;
        }
        let catalog = self.space.catalog();
        let mut total = 0.0;
        let mut current = end;
        loop {
            if let NodeId::Service { service, .. } = current {
                total += catalog.get(service).qos.time;
            }
            match pred.get(&current) {
                Some(&previous) => current = previous,
                None => break,
            }
        }
        total
    }

    /// Number of nodes on the settled predecessor chain ending at `end`;
    /// zero when the end marker was never reached.
    fn path_node_count(&self, end: NodeId, pred: &HashMap<NodeId, NodeId>) -> usize {
        if !pred.contains_key(&end) {
            return 0;
        }
        let mut count = 1;
        let mut current = end;
        while let Some(&previous) = pred.get(&current) {
            count += 1;
            current = previous;
        }
        count
    }

    /// Considered service instances grouped by goal context, deduplicated to
    /// base services within each context.
    fn services_by_context(&self, graph: &WorkflowGraph) -> HashMap<GoalId, HashSet<ServiceId>> {
        let mut by_context: HashMap<GoalId, HashSet<ServiceId>> = HashMap::new();
        for (service, goal) in graph.considered_services() {
            by_context.entry(goal).or_default().insert(service);
        }
        by_context
    }

    /// Walk the template from its first goal, splitting at each condition
    /// into both outcomes weighted by the concrete marker's probabilities.
    fn execution_paths(&self, graph: &WorkflowGraph) -> Vec<ExecutionPath> {
        let mut paths = Vec::new();
        self.walk_paths(
            graph,
            self.space.template().first_goal(),
            1.0,
            Vec::new(),
            &mut paths,
        );
        paths
    }

    fn walk_paths(
        &self,
        graph: &WorkflowGraph,
        goal: GoalId,
        probability: f64,
        mut contexts: Vec<GoalId>,
        paths: &mut Vec<ExecutionPath>,
    ) {
        let template = self.space.template();
        contexts.push(goal);
        if !template.is_condition(goal) {
            paths.push(ExecutionPath {
                end: goal,
                probability,
                contexts,
            });
            return;
        }

        let (p_general, p_specific) = graph
            .node(NodeId::Goal(goal))
            .and_then(|n| n.branch_probabilities)
            .unwrap_or((1.0, 1.0));
        if let [general_child, specific_child] = template.children(goal).as_slice() {
            self.walk_paths(
                graph,
                *specific_child,
                probability * p_specific,
                contexts.clone(),
                paths,
            );
            self.walk_paths(graph, *general_child, probability * p_general, contexts, paths);
        }
    }
}

/// Normalise a higher-is-better metric against `[min, max]`; degenerate
/// ranges score full marks.
fn normalise_benefit(value: f64, min: f64, max: f64) -> f64 {
    if max - min <= 0.0 {
        1.0
    } else {
        (value - min) / (max - min)
    }
}

/// Normalise a lower-is-better metric against `[min, max]`; degenerate
/// ranges contribute no penalty.
fn normalise_penalty(value: f64, min: f64, max: f64) -> f64 {
    if max - min <= 0.0 {
        0.0
    } else {
        (value - min) / (max - min)
    }
}
