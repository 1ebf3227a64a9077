//! Field mapping configuration, loaded from a JSON file.
//!
//! ```json
//! {
//!     "fields": { "city": "address.city", "zip": "address.zip" },
//!     "nested": ["address"]
//! }
//! ```

use crate::criteria::{Field, PATH_SEPARATOR};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Maps property names onto index field paths and records nested scopes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMappingConfig {
    /// Property name to index field path. Unmapped names are used as-is.
    #[serde(default)]
    pub fields: HashMap<String, String>,
    /// Root paths stored as nested documents.
    #[serde(default)]
    pub nested: HashSet<String>,
}

impl FieldMappingConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Index field path for a property, falling back to the property name.
    pub fn field_name<'a>(&'a self, property: &'a str) -> &'a str {
        self.fields.get(property).map(String::as_str).unwrap_or(property)
    }

    pub fn is_nested_root(&self, root: &str) -> bool {
        self.nested.contains(root)
    }

    /// Resolves a property into a field reference. Paths whose root segment is
    /// a configured nested root become nested fields.
    pub fn resolve(&self, property: &str) -> Field {
        let name = self.field_name(property);
        match name.split_once(PATH_SEPARATOR) {
            Some((root, _)) if self.is_nested_root(root) => Field::nested(name, true),
            _ => Field::simple(name),
        }
    }
}
