//! Live tree -> query AST.

use crate::ast::{Operator, QueryNode, SITE_FILTER};
use crate::node::{Node, NodeKind};
use crate::tree::QueryTree;

/// Serialize the whole tree, depth-first pre-order, keeping child order.
///
/// Pure: reads the current selection state of every node and nothing else.
pub fn serialize(tree: &QueryTree) -> QueryNode {
    match tree.get(tree.root()) {
        Some(root) => serialize_node(tree, root),
        None => QueryNode::root(Vec::new()),
    }
}

fn serialize_node(tree: &QueryTree, node: &Node) -> QueryNode {
    let children = node
        .children()
        .iter()
        .filter_map(|id| tree.get(*id))
        .map(|child| serialize_node(tree, child))
        .collect();

    match node.kind() {
        NodeKind::RootGroup => QueryNode::root(children),
        NodeKind::Group(group) => QueryNode::group(group.combinator, children),
        NodeKind::Rule(rule) => QueryNode::rule(&rule.field, rule.operator, &rule.value, children),
        NodeKind::RootRule(site) => QueryNode::rule(SITE_FILTER, Operator::Equals, &site.source, children),
    }
}
