//! Query cases profiled before and after index creation

use chrono::{DateTime, TimeDelta, Utc};
use mongodb::bson::{doc, Bson, DateTime as BsonDateTime, Document};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Longest `due_within` window a workload may ask for (about a century)
pub const MAX_DUE_WITHIN_DAYS: i64 = 36_500;

/// How a query case is declared in a workload.
///
/// `due_within` is resolved into a concrete date-range filter once per run,
/// so the before and after passes execute the identical filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryDefinition {
    Find { filter: Document },
    Aggregate { pipeline: Vec<Document> },
    DueWithin { field: String, days: i64 },
}

impl QueryDefinition {
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<Query> {
        match self {
            Self::Find { filter } => Ok(Query::Find {
                filter: filter.clone(),
            }),
            Self::Aggregate { pipeline } => Ok(Query::Aggregate {
                pipeline: pipeline.clone(),
            }),
            Self::DueWithin { field, days } => {
                let until = TimeDelta::try_days(*days)
                    .and_then(|window| now.checked_add_signed(window))
                    .ok_or_else(|| {
                        AppError::workload(format!("A {} day window on '{}' is out of range", days, field))
                    })?;
                let mut filter = Document::new();
                filter.insert(
                    field.clone(),
                    doc! {
                        "$gte": BsonDateTime::from_millis(now.timestamp_millis()),
                        "$lte": BsonDateTime::from_millis(until.timestamp_millis()),
                    },
                );
                Ok(Query::Find { filter })
            }
        }
    }
}

/// Workload entry before resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryTemplate {
    pub label: String,
    pub collection: String,
    #[serde(flatten)]
    pub definition: QueryDefinition,
}

impl QueryTemplate {
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<QueryCase> {
        Ok(QueryCase {
            label: self.label.clone(),
            collection: self.collection.clone(),
            query: self.definition.resolve(now)?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.label.trim().is_empty() {
            return Err(AppError::validation("Query label cannot be empty"));
        }
        if self.collection.trim().is_empty() {
            return Err(AppError::validation(format!("Query '{}' has no collection", self.label)));
        }
        match &self.definition {
            QueryDefinition::DueWithin { field, days } => {
                if field.trim().is_empty() {
                    return Err(AppError::validation(format!("Query '{}' has an empty date field", self.label)));
                }
                if *days <= 0 {
                    return Err(AppError::validation(format!(
                        "Query '{}' must look at least one day ahead, got {}",
                        self.label, days
                    )));
                }
                if *days > MAX_DUE_WITHIN_DAYS {
                    return Err(AppError::validation(format!(
                        "Query '{}' looks {} days ahead, the limit is {}",
                        self.label, days, MAX_DUE_WITHIN_DAYS
                    )));
                }
            }
            QueryDefinition::Aggregate { pipeline } if pipeline.is_empty() => {
                return Err(AppError::validation(format!("Query '{}' has an empty pipeline", self.label)));
            }
            _ => {}
        }
        Ok(())
    }
}

/// A concrete query ready to execute or explain
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Query {
    Find { filter: Document },
    Aggregate { pipeline: Vec<Document> },
}

impl Query {
    /// Database command equivalent of this query against `collection`.
    /// This is what an explain request wraps.
    pub fn command(&self, collection: &str) -> Document {
        match self {
            Self::Find { filter } => doc! {
                "find": collection,
                "filter": filter.clone(),
            },
            Self::Aggregate { pipeline } => doc! {
                "aggregate": collection,
                "pipeline": pipeline.iter().cloned().map(Bson::Document).collect::<Vec<_>>(),
                "cursor": {},
            },
        }
    }

    /// First field the query filters on, used to reason about index usage
    pub fn leading_field(&self) -> Option<String> {
        match self {
            Self::Find { filter } => filter.keys().next().cloned(),
            Self::Aggregate { pipeline } => pipeline
                .first()
                .and_then(|stage| stage.get_document("$match").ok())
                .and_then(|m| m.keys().next().cloned()),
        }
    }
}

/// One profiled query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryCase {
    pub label: String,
    pub collection: String,
    pub query: Query,
}

impl QueryCase {
    pub fn find(label: &str, collection: &str, filter: Document) -> Self {
        Self {
            label: label.to_string(),
            collection: collection.to_string(),
            query: Query::Find { filter },
        }
    }

    pub fn aggregate(label: &str, collection: &str, pipeline: Vec<Document>) -> Self {
        Self {
            label: label.to_string(),
            collection: collection.to_string(),
            query: Query::Aggregate { pipeline },
        }
    }
}
