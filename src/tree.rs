//! The editable query tree and its editing operations.
//!
//! All nodes live in one arena keyed by [`NodeId`]; each node records its parent id
//! and its ordered child ids. Every mutation is applied immediately and leaves a
//! [`TreeEvent`] behind for the presentation layer.

use crate::ast::Combinator;
use crate::ast::Operator;
use crate::error::{BuilderError, Result};
use crate::node::{Node, NodeId, NodeKind};
use crate::schema::{FieldSet, Schema, Scope};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Change notification produced by an editing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeEvent {
    Added { id: NodeId, parent: NodeId },
    /// The node and its whole subtree are gone.
    Removed { id: NodeId, parent: NodeId },
    /// Selection state or field set of the node changed.
    Changed { id: NodeId },
}

#[derive(Debug, Clone)]
pub struct QueryTree {
    schema: Arc<Schema>,
    nodes: HashMap<NodeId, Node>,
    root: NodeId,
    next_id: u64,
    events: Vec<TreeEvent>,
}

impl QueryTree {
    /// A tree holding only its root group.
    pub fn new(schema: Arc<Schema>) -> Self {
        let root = NodeId::new(0);
        let mut nodes = HashMap::new();
        nodes.insert(root, Node::root_group(root));
        Self {
            schema,
            nodes,
            root,
            next_id: 1,
            events: Vec::new(),
        }
    }

    /// Empty tree with the same schema, root id and id sequence, so nodes built in it
    /// never collide with ids handed out by `self`.
    pub(crate) fn staging(&self) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(self.root, Node::root_group(self.root));
        Self {
            schema: Arc::clone(&self.schema),
            nodes,
            root: self.root,
            next_id: self.next_id,
            events: Vec::new(),
        }
    }

    /// Swap in the contents of a tree built by [`staging`](Self::staging).
    pub(crate) fn commit(&mut self, staged: QueryTree) {
        self.reset();
        let QueryTree {
            nodes,
            next_id,
            events,
            ..
        } = staged;
        self.nodes = nodes;
        self.next_id = next_id;
        self.events.extend(events);
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(&id).ok_or(BuilderError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(&id).ok_or(BuilderError::UnknownNode(id))
    }

    /// Number of nodes, root group included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the root group has no site rules.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Field set offered to the node's own field selector.
    pub fn fields(&self, id: NodeId) -> Result<&FieldSet> {
        let node = self.node(id)?;
        self.schema.fields(&node.scope)
    }

    /// Depth-first pre-order walk starting at the root group.
    pub fn preorder(&self) -> Vec<NodeId> {
        self.subtree(self.root)
    }

    fn subtree(&self, start: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(&id) {
                out.push(id);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// Take the notifications recorded since the last call.
    pub fn drain_events(&mut self) -> Vec<TreeEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn pending_events(&self) -> &[TreeEvent] {
        &self.events
    }

    fn alloc(&mut self) -> NodeId {
        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        id
    }

    fn attach(&mut self, node: Node) -> Result<NodeId> {
        let id = node.id;
        let parent = node.parent.ok_or(BuilderError::invalid_target(id, "detached node"))?;
        debug!(node = %id, parent = %parent, kind = node.kind.name(), "node added");
        self.node_mut(parent)?.children.push(id);
        self.nodes.insert(id, node);
        self.events.push(TreeEvent::Added { id, parent });
        Ok(id)
    }

    /// Append a rule to `group`. Under the root group this is a site rule selecting
    /// the first site; elsewhere an ordinary rule on the group's first field.
    pub fn add_rule(&mut self, group: NodeId) -> Result<NodeId> {
        let parent = self.node(group)?;
        match &parent.kind {
            NodeKind::RootGroup => {
                let source = self.schema.default_source().to_string();
                let id = self.alloc();
                self.attach(Node::root_rule(id, group, source))
            }
            NodeKind::Group(_) => {
                let scope = parent.scope.clone();
                let field = self.schema.default_field(&scope)?.to_string();
                let id = self.alloc();
                self.attach(Node::rule(id, group, scope, field))
            }
            NodeKind::Rule(_) | NodeKind::RootRule(_) => Err(BuilderError::invalid_target(
                group,
                "rules can only be added to groups",
            )),
        }
    }

    /// Append a group below `node`.
    ///
    /// A site rule gets at most one group, scoped to the site it currently selects;
    /// asking for a second one changes nothing and returns `Ok(None)`.
    pub fn add_group(&mut self, node: NodeId) -> Result<Option<NodeId>> {
        let target = self.node(node)?;
        let scope = match &target.kind {
            NodeKind::RootGroup => {
                return Err(BuilderError::invalid_target(
                    node,
                    "the root group only holds site rules",
                ))
            }
            NodeKind::RootRule(site) => {
                if site.has_group {
                    debug!(node = %node, "site rule already has a group");
                    return Ok(None);
                }
                self.schema.scope_of(&site.source)?
            }
            NodeKind::Group(_) | NodeKind::Rule(_) => target.scope.clone(),
        };

        let id = self.alloc();
        self.attach(Node::group(id, node, scope))?;
        if let NodeKind::RootRule(site) = &mut self.node_mut(node)?.kind {
            site.has_group = true;
            self.changed(node);
        }
        Ok(Some(id))
    }

    /// Detach `id` from its parent and drop its subtree.
    pub fn remove(&mut self, id: NodeId) -> Result<()> {
        let parent = self
            .node(id)?
            .parent
            .ok_or(BuilderError::invalid_target(id, "the root group cannot be removed"))?;
        self.detach_subtree(id, parent);
        Ok(())
    }

    /// Remove every site rule. The root group itself stays.
    pub fn reset(&mut self) {
        let root = self.root;
        let children = self.nodes.get(&root).map(|node| node.children.clone()).unwrap_or_default();
        for child in children {
            self.detach_subtree(child, root);
        }
    }

    fn detach_subtree(&mut self, id: NodeId, parent: NodeId) {
        let mut cleared_group = false;
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.retain(|child| *child != id);
            if let NodeKind::RootRule(site) = &mut parent_node.kind {
                site.has_group = false;
                cleared_group = true;
            }
        }

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children);
            }
        }

        debug!(node = %id, parent = %parent, "node removed");
        self.events.push(TreeEvent::Removed { id, parent });
        if cleared_group {
            self.changed(parent);
        }
    }

    pub fn set_field(&mut self, id: NodeId, field: &str) -> Result<()> {
        let node = self.node(id)?;
        match &node.kind {
            NodeKind::Rule(_) => self.schema.check_field(&node.scope, field)?,
            NodeKind::RootRule(_) => {
                return Err(BuilderError::invalid_target(id, "site rules always filter on site"))
            }
            NodeKind::Group(_) | NodeKind::RootGroup => {
                return Err(BuilderError::invalid_target(id, "groups have no field"))
            }
        }
        if let NodeKind::Rule(rule) = &mut self.node_mut(id)?.kind {
            rule.field = field.to_string();
        }
        self.changed(id);
        Ok(())
    }

    pub fn set_operator(&mut self, id: NodeId, operator: Operator) -> Result<()> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Rule(rule) => rule.operator = operator,
            NodeKind::RootRule(_) => {
                return Err(BuilderError::invalid_target(id, "site rules always use equals"))
            }
            NodeKind::Group(_) | NodeKind::RootGroup => {
                return Err(BuilderError::invalid_target(id, "groups have no operator"))
            }
        }
        self.changed(id);
        Ok(())
    }

    /// Set the literal of a rule. For a site rule this selects the site.
    pub fn set_value(&mut self, id: NodeId, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        if let NodeKind::RootRule(_) = self.node(id)?.kind {
            return self.set_source(id, &value);
        }
        match &mut self.node_mut(id)?.kind {
            NodeKind::Rule(rule) => rule.value = value,
            _ => return Err(BuilderError::invalid_target(id, "groups have no value")),
        }
        self.changed(id);
        Ok(())
    }

    /// Select the site of a site rule and re-derive the field set of its subtree.
    /// Rules whose field the new site lacks fall back to its first field.
    pub fn set_source(&mut self, id: NodeId, source: &str) -> Result<()> {
        let scope = self.schema.scope_of(source)?;
        match &mut self.node_mut(id)?.kind {
            NodeKind::RootRule(site) if site.source == source => return Ok(()),
            NodeKind::RootRule(site) => site.source = source.to_string(),
            _ => return Err(BuilderError::invalid_target(id, "only site rules select a site")),
        }
        self.changed(id);

        let fields = self.schema.fields(&scope)?.clone();
        let default_field = self.schema.default_field(&scope)?.to_string();
        let descendants: Vec<NodeId> = self
            .node(id)?
            .children
            .iter()
            .flat_map(|child| self.subtree(*child))
            .collect();
        for descendant in descendants {
            let node = self.node_mut(descendant)?;
            node.scope = scope.clone();
            if let NodeKind::Rule(rule) = &mut node.kind {
                if !fields.contains_key(&rule.field) {
                    rule.field = default_field.clone();
                }
            }
            self.changed(descendant);
        }
        Ok(())
    }

    pub fn set_condition(&mut self, id: NodeId, combinator: Combinator) -> Result<()> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Group(group) => group.combinator = combinator,
            NodeKind::RootGroup => {
                return Err(BuilderError::invalid_target(id, "the root group combinator is fixed"))
            }
            NodeKind::Rule(_) | NodeKind::RootRule(_) => {
                return Err(BuilderError::invalid_target(id, "rules have no condition"))
            }
        }
        self.changed(id);
        Ok(())
    }

    fn changed(&mut self, id: NodeId) {
        debug!(node = %id, "node changed");
        self.events.push(TreeEvent::Changed { id });
    }
}
