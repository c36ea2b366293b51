//! Renderable view of the tree for a presentation layer.
//!
//! A [`NodeView`] carries everything a widget needs to draw one node: the options
//! of each selector with the current selection marked, and which editing actions
//! are available.

use crate::ast::{Combinator, Operator, SITE_FILTER};
use crate::error::Result;
use crate::node::{Node, NodeKind};
use crate::tree::QueryTree;
use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub key: String,
    pub label: String,
    pub selected: bool,
}

impl Choice {
    fn new(key: &str, label: &str, selected: bool) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            selected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeView {
    pub id: u64,
    pub kind: &'static str,

    /// Field selector (rules only).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Choice>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub operators: Vec<Choice>,
    /// Site selector (site rules only).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sites: Vec<Choice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// AND/OR toggle (groups only).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Choice>,

    /// Field and operator cannot be changed.
    pub locked: bool,
    pub can_add_rule: bool,
    pub can_add_group: bool,
    pub can_remove: bool,

    pub children: Vec<NodeView>,
}

/// Render the whole tree, starting at the root group.
pub fn render(tree: &QueryTree) -> Result<NodeView> {
    render_node(tree, tree.node(tree.root())?)
}

fn render_node(tree: &QueryTree, node: &Node) -> Result<NodeView> {
    let children = node
        .children()
        .iter()
        .map(|id| tree.node(*id).and_then(|child| render_node(tree, child)))
        .collect::<Result<Vec<_>>>()?;

    let mut view = NodeView {
        id: node.id().get(),
        kind: node.kind().name(),
        fields: Vec::new(),
        operators: Vec::new(),
        sites: Vec::new(),
        value: None,
        conditions: Vec::new(),
        locked: false,
        can_add_rule: false,
        can_add_group: false,
        can_remove: node.parent().is_some(),
        children,
    };

    match node.kind() {
        NodeKind::RootGroup => {
            view.can_add_rule = true;
        }
        NodeKind::RootRule(site) => {
            view.fields = vec![Choice::new(SITE_FILTER, "Site", true)];
            view.operators = vec![Choice::new(
                Operator::Equals.as_str(),
                Operator::Equals.label(),
                true,
            )];
            view.sites = tree
                .schema()
                .sources()
                .map(|(id, source)| Choice::new(id, &source.name, id == site.source))
                .collect();
            view.value = Some(site.source.clone());
            view.locked = true;
            view.can_add_group = !site.has_group;
        }
        NodeKind::Group(group) => {
            view.conditions = Combinator::ALL
                .iter()
                .map(|c| Choice::new(c.as_str(), c.as_str(), *c == group.combinator))
                .collect();
            view.can_add_rule = true;
            view.can_add_group = true;
        }
        NodeKind::Rule(rule) => {
            view.fields = tree
                .fields(node.id())?
                .iter()
                .map(|(key, label)| Choice::new(key, label, *key == rule.field))
                .collect();
            view.operators = Operator::ALL
                .iter()
                .map(|op| Choice::new(op.as_str(), op.label(), *op == rule.operator))
                .collect();
            view.value = Some(rule.value.clone());
            view.can_add_group = true;
        }
    }

    Ok(view)
}

/// Plain-text outline, one node per line, indented by depth.
pub fn outline(view: &NodeView) -> String {
    let mut out = String::new();
    write_outline(view, 0, &mut out);
    out
}

fn selected(choices: &[Choice]) -> &str {
    choices
        .iter()
        .find(|c| c.selected)
        .map(|c| c.label.as_str())
        .unwrap_or("?")
}

fn write_outline(view: &NodeView, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    let _ = match view.kind {
        "root group" => writeln!(out, "{}#{} any of:", indent, view.id),
        "site rule" => writeln!(
            out,
            "{}#{} site = {} [{}]",
            indent,
            view.id,
            selected(&view.sites),
            view.value.as_deref().unwrap_or_default()
        ),
        "group" => writeln!(out, "{}#{} {} of:", indent, view.id, selected(&view.conditions)),
        _ => writeln!(
            out,
            "{}#{} {} {} {:?}",
            indent,
            view.id,
            selected(&view.fields),
            selected(&view.operators).to_lowercase(),
            view.value.as_deref().unwrap_or_default()
        ),
    };
    for child in &view.children {
        write_outline(child, depth + 1, out);
    }
}
