//! Site query builder: an editable, typed tree of site rules, groups and rules that
//! serializes to a portable query AST, loads back from it, and compiles to SQL.

pub mod ast;
pub mod builder;
pub mod config;
pub mod error;
pub mod loader;
pub mod node;
pub mod schema;
pub mod serializer;
pub mod sql_compiler;
pub mod tree;
pub mod view;

pub use ast::{Combinator, NodeType, Operator, QueryNode};
pub use builder::QueryBuilder;
pub use config::AppConfig;
pub use error::{BuilderError, Result};
pub use loader::{from_document, load, validate};
pub use node::{Node, NodeId, NodeKind};
pub use schema::{FieldSet, Schema, Scope, Source, SourceMap};
pub use serializer::serialize;
pub use sql_compiler::{CompileError, CompileResult, CompilerConfig, SqlCompiler};
pub use tree::{QueryTree, TreeEvent};
pub use view::{outline, render, NodeView};
