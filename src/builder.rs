//! Entry point used by front-ends.
//!
//! A [`QueryBuilder`] exists before the schema is known; until [`initialize`] has
//! been called every query or load fails with [`BuilderError::Uninitialized`].
//!
//! [`initialize`]: QueryBuilder::initialize

use crate::ast::QueryNode;
use crate::error::{BuilderError, Result};
use crate::loader;
use crate::schema::Schema;
use crate::serializer::serialize;
use crate::tree::QueryTree;
use crate::view::{self, NodeView};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct QueryBuilder {
    tree: Option<QueryTree>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self { tree: None }
    }

    pub fn with_schema(schema: Schema) -> Self {
        let mut builder = Self::new();
        builder.initialize(schema);
        builder
    }

    /// Create the tree for `schema`. A builder is only initialized once; later
    /// schemas are ignored, build a new builder to switch schemas.
    pub fn initialize(&mut self, schema: Schema) -> &mut QueryTree {
        if self.tree.is_some() {
            debug!("query builder already initialized");
        }
        self.tree.get_or_insert_with(|| {
            info!(sites = schema.len(), "query builder initialized");
            QueryTree::new(Arc::new(schema))
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.tree.is_some()
    }

    pub fn tree(&self) -> Result<&QueryTree> {
        self.tree.as_ref().ok_or(BuilderError::Uninitialized)
    }

    pub fn tree_mut(&mut self) -> Result<&mut QueryTree> {
        self.tree.as_mut().ok_or(BuilderError::Uninitialized)
    }

    /// Serialize the current tree.
    pub fn query(&self) -> Result<QueryNode> {
        Ok(serialize(self.tree()?))
    }

    pub fn query_json(&self) -> Result<String> {
        self.query()?.to_json()
    }

    /// Replace the tree with `doc`. Nothing changes if `doc` is rejected.
    pub fn load(&mut self, doc: &QueryNode) -> Result<()> {
        loader::load(self.tree_mut()?, doc)
    }

    pub fn load_json(&mut self, text: &str) -> Result<()> {
        let tree = self.tree_mut()?;
        let doc = QueryNode::from_json(text)?;
        loader::load(tree, &doc)
    }

    pub fn reset(&mut self) -> Result<()> {
        self.tree_mut()?.reset();
        Ok(())
    }

    pub fn view(&self) -> Result<NodeView> {
        view::render(self.tree()?)
    }
}
