//! Query AST -> live tree.
//!
//! The document is replayed through the ordinary editing operations on a staging
//! tree, so every field set is re-derived from the schema and the selections made
//! above it, never taken from the document. The target tree is only touched once
//! the whole document has been accepted.

use crate::ast::{Combinator, NodeType, Operator, QueryNode, SITE_FILTER};
use crate::error::{BuilderError, Result};
use crate::node::NodeId;
use crate::schema::Schema;
use crate::tree::QueryTree;
use std::sync::Arc;
use tracing::{info, warn};

/// Replace the contents of `tree` with the tree described by `doc`.
///
/// On error `tree` is left exactly as it was.
pub fn load(tree: &mut QueryTree, doc: &QueryNode) -> Result<()> {
    let mut staged = tree.staging();
    if let Err(err) = build(&mut staged, doc) {
        warn!(error = %err, "rejected query document");
        return Err(err);
    }

    tree.commit(staged);
    info!(nodes = doc.node_count(), "query document loaded");
    Ok(())
}

/// Check `doc` against `schema` without keeping the result.
pub fn validate(schema: &Arc<Schema>, doc: &QueryNode) -> Result<()> {
    build(&mut QueryTree::new(Arc::clone(schema)), doc)
}

/// Build a fresh tree from `doc`.
pub fn from_document(schema: Arc<Schema>, doc: &QueryNode) -> Result<QueryTree> {
    let mut tree = QueryTree::new(schema);
    build(&mut tree, doc)?;
    tree.drain_events();
    Ok(tree)
}

fn build(tree: &mut QueryTree, doc: &QueryNode) -> Result<()> {
    let path = "$";
    expect_type(doc, NodeType::Root, path)?;

    let root = tree.root();
    for (index, child) in doc.children.iter().enumerate() {
        load_site_rule(tree, root, child, &child_path(path, index))?;
    }
    Ok(())
}

fn load_site_rule(tree: &mut QueryTree, root: NodeId, doc: &QueryNode, path: &str) -> Result<()> {
    expect_type(doc, NodeType::Rule, path)?;

    let filter = required(doc.filter.as_deref(), "filter", path)?;
    if filter != SITE_FILTER {
        return Err(BuilderError::invalid_document(
            path,
            format!("site rules filter on `{}`, found `{}`", SITE_FILTER, filter),
        ));
    }
    if operator(doc, path)? != Operator::Equals {
        return Err(BuilderError::invalid_document(path, "site rules must use `equals`"));
    }
    let source = required(doc.value.as_deref(), "value", path)?;

    let id = tree.add_rule(root).map_err(|e| at(path, e))?;
    tree.set_source(id, source).map_err(|e| at(path, e))?;

    match doc.children.as_slice() {
        [] => Ok(()),
        [group] => {
            let group_path = child_path(path, 0);
            expect_type(group, NodeType::Group, &group_path)?;
            // scoped by the site just selected on `id`
            let group_id = tree
                .add_group(id)
                .map_err(|e| at(&group_path, e))?
                .ok_or_else(|| BuilderError::invalid_document(&group_path, "site rule already has a group"))?;
            load_group(tree, group_id, group, &group_path)
        }
        children => Err(BuilderError::invalid_document(
            path,
            format!("a site rule holds at most one group, found {} children", children.len()),
        )),
    }
}

fn load_group(tree: &mut QueryTree, id: NodeId, doc: &QueryNode, path: &str) -> Result<()> {
    let combinator = match doc.condition.as_deref() {
        Some(condition) => condition.parse::<Combinator>().map_err(|e| at(path, e))?,
        None => Combinator::default(),
    };
    tree.set_condition(id, combinator).map_err(|e| at(path, e))?;

    for (index, child) in doc.children.iter().enumerate() {
        let at_path = child_path(path, index);
        match child.node_type {
            NodeType::Rule => {
                let rule = tree.add_rule(id).map_err(|e| at(&at_path, e))?;
                load_rule(tree, rule, child, &at_path)?;
            }
            NodeType::Group => nested_group(tree, id, child, &at_path)?,
            NodeType::Root => {
                return Err(BuilderError::invalid_document(
                    &at_path,
                    "`root` is only allowed at the top of the document",
                ))
            }
        }
    }
    Ok(())
}

fn load_rule(tree: &mut QueryTree, id: NodeId, doc: &QueryNode, path: &str) -> Result<()> {
    let field = required(doc.filter.as_deref(), "filter", path)?;
    let operator = operator(doc, path)?;
    let value = required(doc.value.as_deref(), "value", path)?;

    tree.set_field(id, field).map_err(|e| at(path, e))?;
    tree.set_operator(id, operator).map_err(|e| at(path, e))?;
    tree.set_value(id, value).map_err(|e| at(path, e))?;

    for (index, child) in doc.children.iter().enumerate() {
        let at_path = child_path(path, index);
        expect_type(child, NodeType::Group, &at_path)?;
        nested_group(tree, id, child, &at_path)?;
    }
    Ok(())
}

fn nested_group(tree: &mut QueryTree, parent: NodeId, doc: &QueryNode, path: &str) -> Result<()> {
    let group = tree
        .add_group(parent)
        .map_err(|e| at(path, e))?
        .ok_or_else(|| BuilderError::invalid_document(path, "group could not be attached"))?;
    load_group(tree, group, doc, path)
}

fn expect_type(doc: &QueryNode, expected: NodeType, path: &str) -> Result<()> {
    if doc.node_type == expected {
        Ok(())
    } else {
        Err(BuilderError::invalid_document(
            path,
            format!("expected a `{}` node, found `{}`", expected, doc.node_type),
        ))
    }
}

fn required<'a>(value: Option<&'a str>, name: &str, path: &str) -> Result<&'a str> {
    value.ok_or_else(|| BuilderError::invalid_document(path, format!("missing `{}`", name)))
}

fn operator(doc: &QueryNode, path: &str) -> Result<Operator> {
    required(doc.operator.as_deref(), "operator", path)?
        .parse()
        .map_err(|e| at(path, e))
}

fn child_path(path: &str, index: usize) -> String {
    format!("{}.children[{}]", path, index)
}

/// Report any editing failure as a problem with the document at `path`.
fn at(path: &str, err: BuilderError) -> BuilderError {
    match err {
        BuilderError::InvalidDocument { .. } => err,
        other => BuilderError::invalid_document(path, other.to_string()),
    }
}
