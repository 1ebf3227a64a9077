//! JSON documents describing a criteria chain.
//!
//! A document is an array of nodes in chain order:
//!
//! ```json
//! [
//!     { "field": "name", "entries": [{ "op": "EQUALS", "value": "foo" }], "boost": 2.0 },
//!     { "field": "city", "or": true, "entries": [{ "op": "CONTAINS", "value": "York" }] },
//!     { "field": "status", "not": true, "entries": [{ "op": "IN", "value": ["closed"] }] }
//! ]
//! ```

use crate::config::FieldMappingConfig;
use crate::criteria::{Criteria, CriteriaChain, CriteriaEntry, Field};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Invalid criteria document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Node {index} has conditions but no field name")]
    EmptyField { index: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDocument {
    pub field: String,
    /// Overrides the nested flag the field mapping would assign.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nested: Option<bool>,
    #[serde(default)]
    pub entries: Vec<CriteriaEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f32>,
    #[serde(default)]
    pub or: bool,
    #[serde(default, rename = "not", alias = "negating")]
    pub negating: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CriteriaDocument {
    pub nodes: Vec<NodeDocument>,
}

impl CriteriaDocument {
    pub fn from_json(input: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Builds the chain, resolving each field through the mapping.
    ///
    /// Nodes with conditions must name a field; the compiler treats that as a
    /// programming error, so it is rejected here instead.
    pub fn into_chain(self, mapping: &FieldMappingConfig) -> Result<CriteriaChain, DocumentError> {
        let mut chain = CriteriaChain::default();

        for (index, node) in self.nodes.into_iter().enumerate() {
            if node.field.is_empty() && !node.entries.is_empty() {
                return Err(DocumentError::EmptyField { index });
            }

            let field = match node.nested {
                Some(nested) => Field::nested(mapping.field_name(&node.field), nested),
                None => mapping.resolve(&node.field),
            };

            let mut criteria = Criteria::new(field);
            for entry in node.entries {
                criteria.add_entry(entry);
            }
            if let Some(boost) = node.boost {
                criteria = criteria.with_boost(boost);
            }
            if node.or {
                criteria = criteria.disjunctive();
            }
            if node.negating {
                criteria = criteria.negate();
            }
            chain.push(criteria);
        }

        Ok(chain)
    }
}
