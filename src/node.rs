//! Node model of the editable query tree.
//!
//! Nodes live in the arena owned by [`QueryTree`](crate::tree::QueryTree) and refer
//! to each other by [`NodeId`]. The kind of a node is a closed enum; structural
//! rules are checked by matching on it.

use crate::ast::{Combinator, NodeType, Operator, SITE_FILTER};
use crate::schema::Scope;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Stable identifier of a node. Never reused within a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub fn new(raw: u64) -> Self {
        NodeId(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Accepts `3` as well as `#3`.
impl FromStr for NodeId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim_start_matches('#').parse().map(NodeId)
    }
}

/// Selection state of an ordinary rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleState {
    pub field: String,
    pub operator: Operator,
    pub value: String,
}

/// Selection state of a site rule. Field and operator are fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteState {
    pub source: String,
    /// Set while the rule owns its single refinement group.
    pub has_group: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroupState {
    pub combinator: Combinator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Rule(RuleState),
    RootRule(SiteState),
    Group(GroupState),
    RootGroup,
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Rule(_) => "rule",
            NodeKind::RootRule(_) => "site rule",
            NodeKind::Group(_) => "group",
            NodeKind::RootGroup => "root group",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// Field set in effect for this node's own selection.
    pub(crate) scope: Scope,
    pub(crate) kind: NodeKind,
}

impl Node {
    pub(crate) fn root_group(id: NodeId) -> Self {
        Self {
            id,
            parent: None,
            children: Vec::new(),
            scope: Scope::Sites,
            kind: NodeKind::RootGroup,
        }
    }

    pub(crate) fn root_rule(id: NodeId, parent: NodeId, source: String) -> Self {
        Self {
            id,
            parent: Some(parent),
            children: Vec::new(),
            scope: Scope::Sites,
            kind: NodeKind::RootRule(SiteState {
                source,
                has_group: false,
            }),
        }
    }

    pub(crate) fn group(id: NodeId, parent: NodeId, scope: Scope) -> Self {
        Self {
            id,
            parent: Some(parent),
            children: Vec::new(),
            scope,
            kind: NodeKind::Group(GroupState::default()),
        }
    }

    pub(crate) fn rule(id: NodeId, parent: NodeId, scope: Scope, field: String) -> Self {
        Self {
            id,
            parent: Some(parent),
            children: Vec::new(),
            scope,
            kind: NodeKind::Rule(RuleState {
                field,
                operator: Operator::default(),
                value: String::new(),
            }),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Tag used for this node in the query AST.
    pub fn node_type(&self) -> NodeType {
        match self.kind {
            NodeKind::RootGroup => NodeType::Root,
            NodeKind::Group(_) => NodeType::Group,
            NodeKind::Rule(_) | NodeKind::RootRule(_) => NodeType::Rule,
        }
    }

    pub fn is_rule(&self) -> bool {
        matches!(self.kind, NodeKind::Rule(_) | NodeKind::RootRule(_))
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, NodeKind::Group(_) | NodeKind::RootGroup)
    }

    /// Selected field. `None` for groups.
    pub fn field(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Rule(rule) => Some(&rule.field),
            NodeKind::RootRule(_) => Some(SITE_FILTER),
            _ => None,
        }
    }

    pub fn operator(&self) -> Option<Operator> {
        match &self.kind {
            NodeKind::Rule(rule) => Some(rule.operator),
            NodeKind::RootRule(_) => Some(Operator::Equals),
            _ => None,
        }
    }

    /// Literal value of a rule, or the selected site id of a site rule.
    pub fn value(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Rule(rule) => Some(&rule.value),
            NodeKind::RootRule(site) => Some(&site.source),
            _ => None,
        }
    }

    /// Combinator of a group. The root group has none; it matches if any site rule does.
    pub fn combinator(&self) -> Option<Combinator> {
        match &self.kind {
            NodeKind::Group(group) => Some(group.combinator),
            _ => None,
        }
    }

    pub fn has_group(&self) -> bool {
        matches!(&self.kind, NodeKind::RootRule(site) if site.has_group)
    }
}
