//! Index specs and query cases a run works through
//!
//! The built-in workload covers the EduHub collections: six indexes and the
//! three representative lookups profiled against them. A JSON file can
//! replace it:
//!
//! ```json
//! {
//!   "indexes": [
//!     { "collection": "users", "fields": [{ "field": "email" }], "unique": true }
//!   ],
//!   "queries": [
//!     { "label": "User by Email", "collection": "users",
//!       "type": "find", "filter": { "email": "a@example.com" } }
//!   ]
//! }
//! ```

use crate::error::{AppError, Result};
use crate::models::{IndexSpec, QueryCase, QueryDefinition, QueryTemplate};
use chrono::{DateTime, Utc};
use mongodb::bson::doc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    pub indexes: Vec<IndexSpec>,
    pub queries: Vec<QueryTemplate>,
}

impl Default for Workload {
    fn default() -> Self {
        Self::eduhub()
    }
}

impl Workload {
    /// The EduHub performance workload
    pub fn eduhub() -> Self {
        Self {
            indexes: vec![
                IndexSpec::new("users", "email").unique(),
                IndexSpec::new("courses", "title"),
                IndexSpec::new("courses", "category"),
                IndexSpec::new("assignments", "dueDate"),
                IndexSpec::new("enrollments", "userId"),
                IndexSpec::new("enrollments", "courseId"),
            ],
            queries: vec![
                QueryTemplate {
                    label: "Courses by Category".to_string(),
                    collection: "courses".to_string(),
                    definition: QueryDefinition::Find {
                        filter: doc! { "category": "Data Science" },
                    },
                },
                QueryTemplate {
                    label: "Enrollments by User".to_string(),
                    collection: "enrollments".to_string(),
                    definition: QueryDefinition::Find {
                        filter: doc! { "userId": "u1001" },
                    },
                },
                QueryTemplate {
                    label: "Assignments Due Soon".to_string(),
                    collection: "assignments".to_string(),
                    definition: QueryDefinition::DueWithin {
                        field: "dueDate".to_string(),
                        days: 7,
                    },
                },
            ],
        }
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let workload: Workload = serde_json::from_str(content)
            .map_err(|e| AppError::workload(format!("Invalid workload JSON: {}", e)))?;
        workload.validate()?;
        Ok(workload)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::workload(format!("Cannot read workload file {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Workload from `path`, or the built-in one when no file is configured
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(Path::new(path)),
            None => Ok(Self::eduhub()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.queries.is_empty() {
            return Err(AppError::workload("Workload defines no queries to profile"));
        }

        let mut names = HashSet::new();
        for spec in &self.indexes {
            spec.validate()?;
            if !names.insert((spec.collection.as_str(), spec.index_name())) {
                return Err(AppError::workload(format!(
                    "Index {}.{} is configured more than once",
                    spec.collection,
                    spec.index_name()
                )));
            }
        }

        let mut labels = HashSet::new();
        for query in &self.queries {
            query.validate()?;
            if !labels.insert(query.label.as_str()) {
                return Err(AppError::workload(format!(
                    "Query label '{}' is used more than once",
                    query.label
                )));
            }
        }
        Ok(())
    }

    /// Concrete query cases for one run; relative date windows are fixed
    /// at `now` so both passes execute the same filters
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<Vec<QueryCase>> {
        self.queries.iter().map(|q| q.resolve(now)).collect()
    }
}
