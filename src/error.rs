//! Builder error types.

use crate::node::NodeId;
use thiserror::Error;

/// Errors surfaced by the query builder.
///
/// Structural no-ops (a second group under a site rule) are not errors and never
/// show up here.
#[derive(Error, Debug)]
pub enum BuilderError {
    #[error("uninitialized builder: no schema has been supplied")]
    Uninitialized,

    #[error("invalid query document at {path}: {reason}")]
    InvalidDocument { path: String, reason: String },

    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("invalid target {node}: {reason}")]
    InvalidTarget { node: NodeId, reason: &'static str },

    #[error("unknown field `{field}` in {scope}")]
    UnknownField { field: String, scope: String },

    #[error("unknown site: {0}")]
    UnknownSource(String),

    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    #[error("unknown condition: {0} (expected AND or OR)")]
    UnknownCondition(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BuilderError {
    pub(crate) fn invalid_document(path: impl Into<String>, reason: impl Into<String>) -> Self {
        BuilderError::InvalidDocument {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_target(node: NodeId, reason: &'static str) -> Self {
        BuilderError::InvalidTarget { node, reason }
    }
}

pub type Result<T> = std::result::Result<T, BuilderError>;
