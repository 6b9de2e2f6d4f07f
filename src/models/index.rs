//! Index specifications driving the drop/create phases

use crate::error::{AppError, Result};
use mongodb::bson::{Bson, Document};
use serde::{Deserialize, Serialize};

/// One key of an index, in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexField {
    pub field: String,
    /// 1 for ascending, -1 for descending
    #[serde(default = "default_direction")]
    pub direction: i32,
}

fn default_direction() -> i32 {
    1
}

impl IndexField {
    pub fn ascending(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: 1,
        }
    }

    pub fn descending(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: -1,
        }
    }
}

/// An index the profiler drops before the baseline pass and creates
/// before the second pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub collection: String,
    pub fields: Vec<IndexField>,
    #[serde(default)]
    pub unique: bool,
    /// Explicit index name; generated from collection and fields when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl IndexSpec {
    /// Single-field ascending index
    pub fn new(collection: &str, field: &str) -> Self {
        Self {
            collection: collection.to_string(),
            fields: vec![IndexField::ascending(field)],
            unique: false,
            name: None,
        }
    }

    /// Compound index over the given fields, in order
    pub fn compound(collection: &str, fields: Vec<IndexField>) -> Self {
        Self {
            collection: collection.to_string(),
            fields,
            unique: false,
            name: None,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Name used for create and drop calls: `idx_<collection>_<field>[_<field>...]`
    /// unless one was given explicitly.
    pub fn index_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => {
                let fields: Vec<String> = self
                    .fields
                    .iter()
                    .map(|f| {
                        let field = f.field.replace('.', "_");
                        if f.direction < 0 {
                            format!("{}_desc", field)
                        } else {
                            field
                        }
                    })
                    .collect();
                format!("idx_{}_{}", self.collection, fields.join("_"))
            }
        }
    }

    /// Ordered key document, e.g. `{ "userId": 1 }`
    pub fn keys(&self) -> Document {
        let mut keys = Document::new();
        for field in &self.fields {
            keys.insert(field.field.clone(), Bson::Int32(field.direction));
        }
        keys
    }

    /// Human-readable key list, e.g. `email:1, createdAt:-1`
    pub fn describe_keys(&self) -> String {
        self.fields
            .iter()
            .map(|f| format!("{}:{}", f.field, f.direction))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn validate(&self) -> Result<()> {
        if self.collection.trim().is_empty() {
            return Err(AppError::validation("Index collection cannot be empty"));
        }
        if self.collection.starts_with("system.") || self.collection.contains('$') {
            return Err(AppError::validation(format!("Invalid collection name: {}", self.collection)));
        }
        if self.fields.is_empty() {
            return Err(AppError::validation(format!(
                "Index on '{}' must name at least one field",
                self.collection
            )));
        }
        for field in &self.fields {
            if field.field.trim().is_empty() || field.field.starts_with('$') {
                return Err(AppError::validation(format!(
                    "Invalid index field '{}' on '{}'",
                    field.field, self.collection
                )));
            }
            if field.direction != 1 && field.direction != -1 {
                return Err(AppError::validation(format!(
                    "Index direction for '{}' must be 1 or -1, got {}",
                    field.field, field.direction
                )));
            }
        }
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(AppError::validation("Index name cannot be blank"));
            }
        }
        Ok(())
    }
}
