//! Per-site record schemas and the field sets derived from them.
//!
//! A [`Schema`] is supplied once and never changes for the lifetime of a tree.
//! Sites and fields keep the order they were declared in, so "first option" means
//! the first key of the source document.

use crate::ast::SITE_FILTER;
use crate::error::{BuilderError, Result};
use serde::{Deserialize, Serialize};
use indexmap::IndexMap;
use std::fmt;

/// Field key -> human readable label.
pub type FieldSet = IndexMap<String, String>;

/// Site id -> site description, in declaration order.
pub type SourceMap = IndexMap<String, Source>;

/// One upstream data feed ("site").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub keys: FieldSet,
}

impl Source {
    pub fn new<K, L>(name: impl Into<String>, keys: impl IntoIterator<Item = (K, L)>) -> Self
    where
        K: Into<String>,
        L: Into<String>,
    {
        Self {
            name: name.into(),
            keys: keys.into_iter().map(|(k, l)| (k.into(), l.into())).collect(),
        }
    }
}

/// Which field set applies at a position in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Top level: the only field is `site`, its values are the source ids.
    Sites,
    /// Below a site rule: the fields of that site.
    Source(String),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Sites => f.write_str("site selection"),
            Scope::Source(id) => write!(f, "fields of site `{}`", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    sources: SourceMap,
    site_fields: FieldSet,
}

impl Schema {
    /// Build a schema. Every site needs at least one field and there must be at
    /// least one site, so that every selector has a first option.
    pub fn new(sources: SourceMap) -> Result<Self> {
        if sources.is_empty() {
            return Err(BuilderError::InvalidSchema("no sites defined".to_string()));
        }
        for (id, source) in &sources {
            if id.is_empty() {
                return Err(BuilderError::InvalidSchema("empty site id".to_string()));
            }
            if source.keys.is_empty() {
                return Err(BuilderError::InvalidSchema(format!("site `{}` has no fields", id)));
            }
        }

        let mut site_fields = FieldSet::new();
        site_fields.insert(SITE_FILTER.to_string(), "Site".to_string());

        Ok(Self { sources, site_fields })
    }

    /// Parse `{"<site>": {"name": ..., "keys": {...}}, ...}`.
    pub fn from_json(text: &str) -> Result<Self> {
        let sources: SourceMap = serde_json::from_str(text)?;
        Self::new(sources)
    }

    pub fn sources(&self) -> impl Iterator<Item = (&str, &Source)> {
        self.sources.iter().map(|(id, source)| (id.as_str(), source))
    }

    pub fn source(&self, id: &str) -> Option<&Source> {
        self.sources.get(id)
    }

    pub fn contains_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// The site a new site rule selects before the user picks one.
    pub fn default_source(&self) -> &str {
        // non-empty, checked in `new`
        self.sources.keys().next().map(String::as_str).unwrap_or_default()
    }

    /// Scope for the children of a site rule that selects `source`.
    pub fn scope_of(&self, source: &str) -> Result<Scope> {
        if self.contains_source(source) {
            Ok(Scope::Source(source.to_string()))
        } else {
            Err(BuilderError::UnknownSource(source.to_string()))
        }
    }

    pub fn fields(&self, scope: &Scope) -> Result<&FieldSet> {
        match scope {
            Scope::Sites => Ok(&self.site_fields),
            Scope::Source(id) => self
                .sources
                .get(id)
                .map(|source| &source.keys)
                .ok_or_else(|| BuilderError::UnknownSource(id.clone())),
        }
    }

    /// First field of `scope`.
    pub fn default_field(&self, scope: &Scope) -> Result<&str> {
        let fields = self.fields(scope)?;
        fields
            .keys()
            .next()
            .map(String::as_str)
            .ok_or_else(|| BuilderError::InvalidSchema(format!("{} is empty", scope)))
    }

    pub fn check_field(&self, scope: &Scope, field: &str) -> Result<()> {
        if self.fields(scope)?.contains_key(field) {
            Ok(())
        } else {
            Err(BuilderError::UnknownField {
                field: field.to_string(),
                scope: scope.to_string(),
            })
        }
    }
}
