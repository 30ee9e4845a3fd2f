//! Task template: the abstract tree of goals a workflow must satisfy.
//!
//! The template is an arena of [`TemplateNode`]s: a single input root holding
//! the task's provided concepts, binary condition nodes with a general and a
//! specific sub-goal, and output leaves naming required concepts. A closed
//! tagged union replaces the virtual-dispatch hierarchy such templates are
//! often modelled with; every operation dispatches with a `match`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::errors::{CompositionError, DomainResult};
use crate::domain::models::taxonomy::{ConceptId, Taxonomy};

/// Arena index of a template node.
///
/// Index 0 is always the input root, whose synthetic marker is the workflow
/// start node; every other index names a goal (an output or condition node)
/// and doubles as that goal's marker identity and branch context tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GoalId(pub(crate) usize);

impl GoalId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One node of the template tree.
#[derive(Debug, Clone)]
pub enum TemplateNode {
    /// The root: the task's provided input concepts and the first goal.
    Input {
        inputs: HashSet<ConceptId>,
        child: GoalId,
    },
    /// A terminal goal: the workflow must produce these concepts.
    Output {
        parent: GoalId,
        required: HashSet<ConceptId>,
    },
    /// A branch point guarded by a general and a specific concept.
    Condition {
        parent: GoalId,
        general: ConceptId,
        specific: ConceptId,
        general_child: GoalId,
        specific_child: GoalId,
    },
}

/// Raw, serde-friendly template description as handed over by the loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateSpec {
    pub provided_inputs: Vec<String>,
    pub goal: GoalSpec,
}

/// Raw goal tree: either a terminal output set or a condition with an
/// if-branch (specific) and an else-branch (general).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GoalSpec {
    Outputs(Vec<String>),
    Condition {
        general: String,
        specific: String,
        specific_branch: Box<GoalSpec>,
        general_branch: Box<GoalSpec>,
    },
}

/// The compiled task template.
#[derive(Debug, Clone)]
pub struct TaskTemplate {
    nodes: Vec<TemplateNode>,
}

impl TaskTemplate {
    /// Compile a raw spec, resolving every concept name against the taxonomy.
    pub fn compile(spec: &TemplateSpec, taxonomy: &Taxonomy) -> DomainResult<Self> {
        if spec.provided_inputs.is_empty() {
            return Err(CompositionError::InvalidTemplate(
                "no provided inputs".to_string(),
            ));
        }
        let inputs = spec
            .provided_inputs
            .iter()
            .map(|name| taxonomy.resolve(name))
            .collect::<DomainResult<HashSet<_>>>()?;

        let mut nodes = vec![TemplateNode::Input {
            inputs,
            child: GoalId(0), // patched below
        }];
        let child = Self::compile_goal(&mut nodes, &spec.goal, GoalId(0), taxonomy)?;
        if let TemplateNode::Input { child: slot, .. } = &mut nodes[0] {
            *slot = child;
        }
        Ok(Self { nodes })
    }

    fn compile_goal(
        nodes: &mut Vec<TemplateNode>,
        spec: &GoalSpec,
        parent: GoalId,
        taxonomy: &Taxonomy,
    ) -> DomainResult<GoalId> {
        match spec {
            GoalSpec::Outputs(outputs) => {
                if outputs.is_empty() {
                    return Err(CompositionError::InvalidTemplate(
                        "output goal with no required concepts".to_string(),
                    ));
                }
                let required = outputs
                    .iter()
                    .map(|name| taxonomy.resolve(name))
                    .collect::<DomainResult<HashSet<_>>>()?;
                let id = GoalId(nodes.len());
                nodes.push(TemplateNode::Output { parent, required });
                Ok(id)
            }
            GoalSpec::Condition {
                general,
                specific,
                specific_branch,
                general_branch,
            } => {
                let id = GoalId(nodes.len());
                nodes.push(TemplateNode::Condition {
                    parent,
                    general: taxonomy.resolve(general)?,
                    specific: taxonomy.resolve(specific)?,
                    general_child: id, // patched below
                    specific_child: id,
                });
                let spec_child = Self::compile_goal(nodes, specific_branch, id, taxonomy)?;
                let gen_child = Self::compile_goal(nodes, general_branch, id, taxonomy)?;
                if let TemplateNode::Condition {
                    general_child,
                    specific_child,
                    ..
                } = &mut nodes[id.0]
                {
                    *general_child = gen_child;
                    *specific_child = spec_child;
                }
                Ok(id)
            }
        }
    }

    pub fn node(&self, id: GoalId) -> &TemplateNode {
        &self.nodes[id.0]
    }

    /// The input root.
    pub fn root(&self) -> GoalId {
        GoalId(0)
    }

    /// The task's provided input concepts.
    pub fn provided_inputs(&self) -> &HashSet<ConceptId> {
        match &self.nodes[0] {
            TemplateNode::Input { inputs, .. } => inputs,
            _ => unreachable!("template root is always an input node"),
        }
    }

    /// The first real goal: the child of the input root.
    pub fn first_goal(&self) -> GoalId {
        match &self.nodes[0] {
            TemplateNode::Input { child, .. } => *child,
            _ => unreachable!("template root is always an input node"),
        }
    }

    pub fn parent(&self, id: GoalId) -> Option<GoalId> {
        match &self.nodes[id.0] {
            TemplateNode::Input { .. } => None,
            TemplateNode::Output { parent, .. } | TemplateNode::Condition { parent, .. } => {
                Some(*parent)
            }
        }
    }

    pub fn children(&self, id: GoalId) -> Vec<GoalId> {
        match &self.nodes[id.0] {
            TemplateNode::Input { child, .. } => vec![*child],
            TemplateNode::Output { .. } => Vec::new(),
            TemplateNode::Condition {
                general_child,
                specific_child,
                ..
            } => vec![*general_child, *specific_child],
        }
    }

    pub fn is_condition(&self, id: GoalId) -> bool {
        matches!(self.nodes[id.0], TemplateNode::Condition { .. })
    }

    pub fn is_output(&self, id: GoalId) -> bool {
        matches!(self.nodes[id.0], TemplateNode::Output { .. })
    }

    /// Required output concepts of an output goal; empty set otherwise.
    pub fn required_outputs(&self, id: GoalId) -> Option<&HashSet<ConceptId>> {
        match &self.nodes[id.0] {
            TemplateNode::Output { required, .. } => Some(required),
            _ => None,
        }
    }

    pub fn guards(&self, id: GoalId) -> Option<(ConceptId, ConceptId)> {
        match &self.nodes[id.0] {
            TemplateNode::Condition {
                general, specific, ..
            } => Some((*general, *specific)),
            _ => None,
        }
    }

    /// All terminal output goals, in arena order.
    pub fn output_goals(&self) -> Vec<GoalId> {
        (0..self.nodes.len())
            .map(GoalId)
            .filter(|id| self.is_output(*id))
            .collect()
    }

    /// All condition goals, in arena order.
    pub fn condition_goals(&self) -> Vec<GoalId> {
        (0..self.nodes.len())
            .map(GoalId)
            .filter(|id| self.is_condition(*id))
            .collect()
    }

    /// Union of required concepts across every output goal.
    pub fn all_required_outputs(&self) -> HashSet<ConceptId> {
        self.output_goals()
            .into_iter()
            .filter_map(|id| self.required_outputs(id))
            .flatten()
            .copied()
            .collect()
    }

    /// Goals strictly below `id`: all transitive template descendants.
    pub fn goals_below(&self, id: GoalId) -> HashSet<GoalId> {
        let mut below = HashSet::new();
        let mut stack = self.children(id);
        while let Some(current) = stack.pop() {
            if below.insert(current) {
                stack.extend(self.children(current));
            }
        }
        below
    }

    /// The chain from `id` up to and including the input root.
    pub fn ancestor_chain(&self, id: GoalId) -> Vec<GoalId> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            chain.push(parent);
            current = parent;
        }
        chain
    }

    /// Whether `target` lies inside the specific subtree of condition `cond`.
    pub fn in_specific_branch(&self, cond: GoalId, target: GoalId) -> bool {
        match &self.nodes[cond.0] {
            TemplateNode::Condition { specific_child, .. } => {
                *specific_child == target
                    || self.goals_below(*specific_child).contains(&target)
            }
            _ => false,
        }
    }

    /// The guard concept a condition marker emits toward `target`: the
    /// specific guard when `target` lies in the specific subtree, the general
    /// guard otherwise.
    pub fn branch_guard(&self, cond: GoalId, target: GoalId) -> Option<ConceptId> {
        let (general, specific) = self.guards(cond)?;
        if self.in_specific_branch(cond, target) {
            Some(specific)
        } else {
            Some(general)
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
