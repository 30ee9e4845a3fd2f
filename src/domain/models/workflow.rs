//! Workflow graphs: the mutable individuals of the evolutionary search.
//!
//! A graph maps qualified node identities to nodes holding adjacency lists;
//! edge labels (the concept "intersects") live in a parallel edge map. Nodes
//! own nothing beyond their edges: service data stays in the catalog and is
//! referenced through the composite [`NodeId`] key.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use crate::domain::errors::{CompositionError, DomainResult};
use crate::domain::models::service::{ServiceCatalog, ServiceId};
use crate::domain::models::taxonomy::ConceptId;
use crate::domain::models::template::{GoalId, TaskTemplate};

/// Qualified identity of a workflow node.
///
/// The same abstract service may be instantiated independently for different
/// goal contexts; the composite key keeps those instances distinct without
/// any string-suffix convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeId {
    /// The single synthetic start marker, emitting the task's provided inputs.
    Start,
    /// The synthetic marker of a template goal (end or condition).
    Goal(GoalId),
    /// A service instantiated for one goal context.
    Service { service: ServiceId, goal: GoalId },
}

impl NodeId {
    pub fn is_start(self) -> bool {
        matches!(self, NodeId::Start)
    }

    /// Start and goal markers anchor the graph structure; services do not.
    pub fn is_marker(self) -> bool {
        matches!(self, NodeId::Start | NodeId::Goal(_))
    }

    pub fn is_service(self) -> bool {
        matches!(self, NodeId::Service { .. })
    }

    /// The goal context this node belongs to; the start marker belongs to the
    /// template root.
    pub fn context(self, template: &TaskTemplate) -> GoalId {
        match self {
            NodeId::Start => template.root(),
            NodeId::Goal(goal) | NodeId::Service { goal, .. } => goal,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Start => write!(f, "start"),
            NodeId::Goal(goal) => write!(f, "goal{}", goal.index()),
            NodeId::Service { service, goal } => {
                write!(f, "svc{}@goal{}", service.index(), goal.index())
            }
        }
    }
}

/// A node placed into one specific workflow graph.
#[derive(Debug, Clone)]
pub struct WorkflowNode {
    pub id: NodeId,
    pub incoming: Vec<NodeId>,
    pub outgoing: Vec<NodeId>,
    /// For condition markers: (general, specific) branch probabilities copied
    /// from the service that satisfied the condition.
    pub branch_probabilities: Option<(f64, f64)>,
    /// Membership in the considerable subgraph view used by evaluation.
    pub considered: bool,
}

impl WorkflowNode {
    fn new(id: NodeId) -> Self {
        Self {
            id,
            incoming: Vec::new(),
            outgoing: Vec::new(),
            branch_probabilities: None,
            considered: true,
        }
    }
}

/// Fitness of a scored individual.
#[derive(Debug, Clone, PartialEq)]
pub struct Fitness {
    pub score: f64,
    pub ideal: bool,
    /// Structural mode only.
    pub longest_path_length: Option<usize>,
    /// Structural mode only.
    pub num_atomic_services: Option<usize>,
}

/// A directed acyclic workflow graph under construction, mutation or
/// evaluation.
#[derive(Debug, Clone, Default)]
pub struct WorkflowGraph {
    nodes: HashMap<NodeId, WorkflowNode>,
    edges: HashMap<(NodeId, NodeId), HashSet<ConceptId>>,
    fitness: Option<Fitness>,
}

impl WorkflowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node if absent, returning a mutable reference either way.
    pub fn add_node(&mut self, id: NodeId) -> &mut WorkflowNode {
        self.nodes.entry(id).or_insert_with(|| WorkflowNode::new(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&WorkflowNode> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut WorkflowNode> {
        self.nodes.get_mut(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &WorkflowNode> {
        self.nodes.values()
    }

    /// All node ids, sorted for deterministic iteration.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId, &HashSet<ConceptId>)> {
        self.edges.iter().map(|(&(from, to), set)| (from, to, set))
    }

    pub fn intersect(&self, from: NodeId, to: NodeId) -> Option<&HashSet<ConceptId>> {
        self.edges.get(&(from, to))
    }

    /// Connect `from -> to`, merging the intersect into an existing edge.
    /// Both endpoints are created if absent.
    pub fn connect(&mut self, from: NodeId, to: NodeId, intersect: HashSet<ConceptId>) {
        let is_new = !self.edges.contains_key(&(from, to));
        self.edges.entry((from, to)).or_default().extend(intersect);
        if is_new {
            self.add_node(from).outgoing.push(to);
            self.add_node(to).incoming.push(from);
        }
    }

    /// Remove a node and every edge touching it.
    pub fn remove_node(&mut self, id: NodeId) {
        let Some(node) = self.nodes.remove(&id) else {
            return;
        };
        for from in node.incoming {
            self.edges.remove(&(from, id));
            if let Some(n) = self.nodes.get_mut(&from) {
                n.outgoing.retain(|&t| t != id);
            }
        }
        for to in node.outgoing {
            self.edges.remove(&(id, to));
            if let Some(n) = self.nodes.get_mut(&to) {
                n.incoming.retain(|&f| f != id);
            }
        }
    }

    /// Nodes in the considerable subgraph view.
    pub fn considered_nodes(&self) -> impl Iterator<Item = &WorkflowNode> {
        self.nodes.values().filter(|n| n.considered)
    }

    /// Service instances in the considerable view.
    pub fn considered_services(&self) -> impl Iterator<Item = (ServiceId, GoalId)> + '_ {
        self.considered_nodes().filter_map(|n| match n.id {
            NodeId::Service { service, goal } => Some((service, goal)),
            _ => None,
        })
    }

    pub fn fitness(&self) -> Option<&Fitness> {
        self.fitness.as_ref()
    }

    pub fn set_fitness(&mut self, fitness: Fitness) {
        self.fitness = Some(fitness);
    }

    /// Mark the individual as needing re-evaluation.
    pub fn clear_fitness(&mut self) {
        self.fitness = None;
    }

    /// Whether `to` is reachable from `from` along outgoing edges.
    pub fn has_path(&self, from: NodeId, to: NodeId) -> bool {
        let mut queue = VecDeque::from([from]);
        let mut seen = HashSet::new();
        while let Some(current) = queue.pop_front() {
            if current == to {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(node) = self.nodes.get(&current) {
                queue.extend(node.outgoing.iter().copied());
            }
        }
        false
    }

    /// Forward closure of `from`, inclusive.
    pub fn reachable_from(&self, from: NodeId) -> HashSet<NodeId> {
        let mut reached = HashSet::new();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if reached.insert(current) {
                if let Some(node) = self.nodes.get(&current) {
                    stack.extend(node.outgoing.iter().copied());
                }
            }
        }
        reached
    }

    /// DOT rendering, mainly for logs and debugging.
    pub fn to_dot(&self, catalog: &ServiceCatalog) -> String {
        let label = |id: NodeId| match id {
            NodeId::Service { service, goal } => {
                format!("\"{}@goal{}\"", catalog.get(service).name, goal.index())
            }
            other => format!("\"{other}\""),
        };
        let mut edges: Vec<(NodeId, NodeId)> = self.edges.keys().copied().collect();
        edges.sort_unstable();
        let mut out = String::from("digraph g {");
        for (from, to) in edges {
            out.push_str(&format!(" {} -> {};", label(from), label(to)));
        }
        out.push_str(" }");
        out
    }

    /// Check the structural invariants every constructed graph must hold:
    /// a start node, acyclicity, no disconnected non-start node, and input
    /// coverage of every service and end marker by its incoming intersects.
    pub fn validate(&self, catalog: &ServiceCatalog, template: &TaskTemplate) -> DomainResult<()> {
        if !self.contains(NodeId::Start) {
            return Err(CompositionError::MissingNode("start".to_string()));
        }
        self.check_acyclic()?;

        for node in self.nodes.values() {
            if !node.id.is_start() && node.incoming.is_empty() {
                return Err(CompositionError::DisconnectedNode(node.id.to_string()));
            }

            let required: Option<&HashSet<ConceptId>> = match node.id {
                NodeId::Service { service, .. } => Some(&catalog.get(service).inputs),
                NodeId::Goal(goal) => template.required_outputs(goal),
                NodeId::Start => None,
            };
            let Some(required) = required else { continue };

            let mut covered: HashSet<ConceptId> = HashSet::new();
            for &from in &node.incoming {
                if let Some(intersect) = self.edges.get(&(from, node.id)) {
                    covered.extend(intersect.iter().copied());
                }
            }
            if !required.is_subset(&covered) {
                return Err(CompositionError::UnsatisfiedInputs(node.id.to_string()));
            }
        }
        Ok(())
    }

    fn check_acyclic(&self) -> DomainResult<()> {
        // Kahn's algorithm; leftover nodes are on a cycle.
        let mut in_degree: HashMap<NodeId, usize> = self
            .nodes
            .values()
            .map(|n| (n.id, n.incoming.len()))
            .collect();
        let mut queue: VecDeque<NodeId> = in_degree
            .iter()
            .filter(|(_, &d)| d == 0)
            .map(|(&id, _)| id)
            .collect();
        let mut visited = 0usize;
        while let Some(current) = queue.pop_front() {
            visited += 1;
            if let Some(node) = self.nodes.get(&current) {
                for &to in &node.outgoing {
                    if let Some(d) = in_degree.get_mut(&to) {
                        *d -= 1;
                        if *d == 0 {
                            queue.push_back(to);
                        }
                    }
                }
            }
        }
        if visited != self.nodes.len() {
            let on_cycle = self
                .node_ids()
                .into_iter()
                .find(|id| in_degree.get(id).is_some_and(|&d| d > 0))
                .map(|id| id.to_string())
                .unwrap_or_default();
            return Err(CompositionError::CycleDetected(on_cycle));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn svc(service: usize, goal: usize) -> NodeId {
        NodeId::Service {
            service: ServiceId(service),
            goal: GoalId(goal),
        }
    }

    #[test]
    fn test_connect_creates_nodes_and_adjacency() {
        let mut graph = WorkflowGraph::new();
        let a = svc(0, 1);
        graph.connect(NodeId::Start, a, HashSet::new());

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.node(a).unwrap().incoming, vec![NodeId::Start]);
        assert_eq!(graph.node(NodeId::Start).unwrap().outgoing, vec![a]);
    }

    #[test]
    fn test_connect_merges_intersects() {
        let mut graph = WorkflowGraph::new();
        let a = svc(0, 1);
        graph.connect(NodeId::Start, a, [ConceptId(1)].into_iter().collect());
        graph.connect(NodeId::Start, a, [ConceptId(2)].into_iter().collect());

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.intersect(NodeId::Start, a).unwrap().len(), 2);
        // Adjacency lists stay duplicate-free.
        assert_eq!(graph.node(a).unwrap().incoming.len(), 1);
    }

    #[test]
    fn test_remove_node_cleans_edges() {
        let mut graph = WorkflowGraph::new();
        let a = svc(0, 1);
        let b = svc(1, 1);
        graph.connect(NodeId::Start, a, HashSet::new());
        graph.connect(a, b, HashSet::new());

        graph.remove_node(a);
        assert!(!graph.contains(a));
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.node(NodeId::Start).unwrap().outgoing.is_empty());
        assert!(graph.node(b).unwrap().incoming.is_empty());
    }

    #[test]
    fn test_has_path_and_reachability() {
        let mut graph = WorkflowGraph::new();
        let a = svc(0, 1);
        let b = svc(1, 1);
        let c = svc(2, 2);
        graph.connect(NodeId::Start, a, HashSet::new());
        graph.connect(a, b, HashSet::new());
        graph.add_node(c);

        assert!(graph.has_path(NodeId::Start, b));
        assert!(!graph.has_path(b, NodeId::Start));
        assert!(!graph.has_path(NodeId::Start, c));

        let reached = graph.reachable_from(NodeId::Start);
        assert_eq!(reached.len(), 3);
        assert!(!reached.contains(&c));
    }

    #[test]
    fn test_validate_detects_cycle() {
        let mut graph = WorkflowGraph::new();
        let a = svc(0, 1);
        let b = svc(1, 1);
        graph.connect(NodeId::Start, a, HashSet::new());
        graph.connect(a, b, HashSet::new());
        graph.connect(b, a, HashSet::new());

        let catalog = ServiceCatalog::default();
        let template = linear_template();
        // Input coverage would also fail here, so check the error kind.
        assert!(matches!(
            graph.check_acyclic(),
            Err(CompositionError::CycleDetected(_))
        ));
        assert!(graph.validate(&catalog, &template).is_err());
    }

    #[test]
    fn test_validate_detects_disconnected_node() {
        let mut graph = WorkflowGraph::new();
        graph.add_node(NodeId::Start);
        graph.add_node(NodeId::Goal(GoalId(1)));

        let catalog = ServiceCatalog::default();
        let template = linear_template();
        assert!(matches!(
            graph.validate(&catalog, &template),
            Err(CompositionError::DisconnectedNode(_))
        ));
    }

    #[test]
    fn test_fitness_cache_roundtrip() {
        let mut graph = WorkflowGraph::new();
        assert!(graph.fitness().is_none());
        graph.set_fitness(Fitness {
            score: 0.5,
            ideal: false,
            longest_path_length: None,
            num_atomic_services: None,
        });
        assert_eq!(graph.fitness().unwrap().score, 0.5);
        graph.clear_fitness();
        assert!(graph.fitness().is_none());
    }

    #[test]
    fn test_to_dot_lists_edges_in_order() {
        use crate::domain::models::service::{OutputsSpec, ServiceSpec};
        use crate::domain::models::taxonomy::Taxonomy;

        let mut tax = Taxonomy::new();
        tax.insert("In");
        tax.insert("Out");
        let catalog = ServiceCatalog::resolve(
            &[ServiceSpec {
                name: "convert".to_string(),
                qos: None,
                inputs: vec!["In".to_string()],
                output_possibilities: vec![OutputsSpec {
                    probability: 1.0,
                    outputs: vec!["Out".to_string()],
                }],
            }],
            &tax,
        )
        .unwrap();

        let mut graph = WorkflowGraph::new();
        let node = svc(0, 1);
        graph.connect(NodeId::Start, node, HashSet::new());
        graph.connect(node, NodeId::Goal(GoalId(1)), HashSet::new());

        assert_eq!(
            graph.to_dot(&catalog),
            "digraph g { \"start\" -> \"convert@goal1\"; \"convert@goal1\" -> \"goal1\"; }"
        );
    }

    fn linear_template() -> TaskTemplate {
        use crate::domain::models::template::{GoalSpec, TemplateSpec};
        use crate::domain::models::taxonomy::Taxonomy;

        let mut tax = Taxonomy::new();
        tax.insert("In");
        tax.insert("Out");
        tax.compute_closures();
        TaskTemplate::compile(
            &TemplateSpec {
                provided_inputs: vec!["In".to_string()],
                goal: GoalSpec::Outputs(vec!["Out".to_string()]),
            },
            &tax,
        )
        .unwrap()
    }
}
