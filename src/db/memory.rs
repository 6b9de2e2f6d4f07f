//! Deterministic in-process document store
//!
//! Keeps an index catalog with the same conflict rules as the server and
//! synthesizes `executionStats` explain output from per-collection cost
//! figures. Used by `--dry-run` and by the test suite, which also relies on
//! its fault injection hooks.

use crate::{
    db::DocumentStore,
    error::{ItemResult, ProfilerError},
    models::{IndexSpec, Query},
    profiler::explain::{is_explain_command, is_explain_output, ExplainRequest},
};
use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use tokio::sync::RwLock;

/// Cost figures for one collection
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionProfile {
    /// Documents in the collection
    pub documents: u64,
    /// Documents any profiled filter matches
    pub matching: u64,
    /// Simulated server time for a collection scan, in milliseconds
    pub scan_ms: u64,
    /// Simulated server time when an index covers the leading field
    pub index_ms: u64,
}

impl CollectionProfile {
    pub fn new(documents: u64, matching: u64, scan_ms: u64, index_ms: u64) -> Self {
        Self {
            documents,
            matching,
            scan_ms,
            index_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct IndexEntry {
    keys: Document,
    unique: bool,
}

#[derive(Debug, Default)]
struct StoreState {
    collections: HashMap<String, CollectionProfile>,
    indexes: HashMap<String, BTreeMap<String, IndexEntry>>,
    failing_queries: HashSet<String>,
    failing_explains: HashSet<String>,
    delays: HashMap<String, Duration>,
    calls: Vec<String>,
}

impl StoreState {
    /// Name of an index whose first key is `field`
    fn covering_index(&self, collection: &str, field: Option<&str>) -> Option<String> {
        let field = field?;
        self.indexes.get(collection).and_then(|catalog| {
            catalog
                .iter()
                .find(|(_, entry)| entry.keys.keys().next().map(String::as_str) == Some(field))
                .map(|(name, _)| name.clone())
        })
    }
}

#[derive(Debug)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
        }
    }

    /// Store seeded with the EduHub collections. Assignment lookups are
    /// slower through the index than by scanning, so a dry run shows a
    /// regression next to two improvements.
    pub fn eduhub() -> Self {
        Self::new()
            .with_collection("users", CollectionProfile::new(500, 1, 3, 1))
            .with_collection("courses", CollectionProfile::new(120, 18, 4, 1))
            .with_collection("enrollments", CollectionProfile::new(2_000, 6, 12, 2))
            .with_collection("assignments", CollectionProfile::new(300, 40, 2, 3))
    }

    pub fn with_collection(mut self, name: &str, profile: CollectionProfile) -> Self {
        self.state.get_mut().collections.insert(name.to_string(), profile);
        self
    }

    /// Register an index that exists before any run starts
    pub fn with_index(mut self, collection: &str, name: &str, keys: Document, unique: bool) -> Self {
        self.state
            .get_mut()
            .indexes
            .entry(collection.to_string())
            .or_default()
            .insert(name.to_string(), IndexEntry { keys, unique });
        self
    }

    /// Every query against `collection` fails
    pub fn failing_queries(mut self, collection: &str) -> Self {
        self.state.get_mut().failing_queries.insert(collection.to_string());
        self
    }

    /// Every explain against `collection` fails
    pub fn failing_explains(mut self, collection: &str) -> Self {
        self.state.get_mut().failing_explains.insert(collection.to_string());
        self
    }

    /// Every call touching `collection` stalls for `delay` first
    pub fn with_delay(mut self, collection: &str, delay: Duration) -> Self {
        self.state.get_mut().delays.insert(collection.to_string(), delay);
        self
    }

    /// Names of the indexes currently on `collection`, sorted
    pub async fn index_names(&self, collection: &str) -> Vec<String> {
        let state = self.state.read().await;
        state
            .indexes
            .get(collection)
            .map(|catalog| catalog.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Calls received so far, as `<operation> <target>`
    pub async fn calls(&self) -> Vec<String> {
        self.state.read().await.calls.clone()
    }

    async fn enter(&self, call: String, collection: &str) {
        let delay = {
            let mut state = self.state.write().await;
            state.calls.push(call);
            state.delays.get(collection).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn create_index(&self, spec: &IndexSpec) -> ItemResult<()> {
        let name = spec.index_name();
        self.enter(format!("create_index {}.{}", spec.collection, name), &spec.collection)
            .await;

        let keys = spec.keys();
        let mut state = self.state.write().await;
        let catalog = state.indexes.entry(spec.collection.clone()).or_default();

        if let Some(existing) = catalog.get(&name) {
            if existing.keys == keys && existing.unique == spec.unique {
                return Ok(());
            }
            return Err(ProfilerError::name_conflict(
                &spec.collection,
                &name,
                format!("An existing index has the same name as the requested index: {}", name),
            ));
        }
        if let Some((other, _)) = catalog.iter().find(|(_, entry)| entry.keys == keys) {
            return Err(ProfilerError::name_conflict(
                &spec.collection,
                &name,
                format!("Index already exists with a different name: {}", other),
            ));
        }

        catalog.insert(
            name,
            IndexEntry {
                keys,
                unique: spec.unique,
            },
        );
        Ok(())
    }

    async fn drop_index(&self, collection: &str, index: &str) -> ItemResult<()> {
        self.enter(format!("drop_index {}.{}", collection, index), collection).await;

        let mut state = self.state.write().await;
        if !state.collections.contains_key(collection) && !state.indexes.contains_key(collection) {
            return Err(ProfilerError::already_absent(collection, index));
        }
        match state.indexes.get_mut(collection).and_then(|catalog| catalog.remove(index)) {
            Some(_) => Ok(()),
            None => Err(ProfilerError::already_absent(collection, index)),
        }
    }

    async fn run_query(&self, collection: &str, query: &Query) -> ItemResult<u64> {
        self.enter(format!("run_query {}", collection), collection).await;

        let (profile, indexed) = {
            let state = self.state.read().await;
            if state.failing_queries.contains(collection) {
                return Err(ProfilerError::unclassified(
                    format!("query {}", collection),
                    Some(13),
                    format!("not authorized to query {}", collection),
                ));
            }
            let profile = state.collections.get(collection).cloned();
            let indexed = state
                .covering_index(collection, query.leading_field().as_deref())
                .is_some();
            (profile, indexed)
        };

        let Some(profile) = profile else {
            return Ok(0);
        };
        let cost = if indexed { profile.index_ms } else { profile.scan_ms };
        tokio::time::sleep(Duration::from_millis(cost)).await;
        Ok(profile.matching)
    }

    async fn explain(&self, request: &ExplainRequest) -> ItemResult<Document> {
        let collection = request.collection();
        self.enter(format!("explain {}", collection), collection).await;

        let inner = request.inner();
        if is_explain_command(inner) || is_explain_output(inner) {
            return Err(ProfilerError::self_explain(format!(
                "Explain failed: cannot explain an explain on '{}'",
                collection
            )));
        }

        let state = self.state.read().await;
        if state.failing_explains.contains(collection) {
            return Err(ProfilerError::unclassified(
                format!("explain {}", collection),
                None,
                "explain is unavailable on this deployment",
            ));
        }

        let profile = state
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_else(|| CollectionProfile::new(0, 0, 0, 0));
        let field = command_leading_field(inner);
        let index = state.covering_index(collection, field.as_deref());

        let (plan, stats) = match &index {
            Some(name) => (
                doc! {
                    "stage": "FETCH",
                    "inputStage": { "stage": "IXSCAN", "indexName": name.as_str() },
                },
                doc! {
                    "executionSuccess": true,
                    "nReturned": profile.matching as i64,
                    "executionTimeMillis": profile.index_ms as i64,
                    "totalKeysExamined": profile.matching as i64,
                    "totalDocsExamined": profile.matching as i64,
                },
            ),
            None => (
                doc! { "stage": "COLLSCAN", "direction": "forward" },
                doc! {
                    "executionSuccess": true,
                    "nReturned": profile.matching as i64,
                    "executionTimeMillis": profile.scan_ms as i64,
                    "totalKeysExamined": 0_i64,
                    "totalDocsExamined": profile.documents as i64,
                },
            ),
        };

        let planner = doc! {
            "namespace": collection,
            "winningPlan": plan,
        };

        let output = if inner.contains_key("aggregate") {
            doc! {
                "explainVersion": "1",
                "stages": [
                    { "$cursor": { "queryPlanner": planner, "executionStats": stats } }
                ],
                "serverInfo": { "host": "in-memory" },
                "ok": 1.0,
            }
        } else {
            doc! {
                "explainVersion": "1",
                "queryPlanner": planner,
                "executionStats": stats,
                "command": inner.clone(),
                "ok": 1.0,
            }
        };
        Ok(output)
    }
}

/// First filtered field of a `find` or `aggregate` command
fn command_leading_field(command: &Document) -> Option<String> {
    if let Ok(filter) = command.get_document("filter") {
        return filter.keys().next().cloned();
    }
    command
        .get_array("pipeline")
        .ok()
        .and_then(|stages| stages.first())
        .and_then(Bson::as_document)
        .and_then(|stage| stage.get_document("$match").ok())
        .and_then(|m| m.keys().next().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QueryCase;
    use crate::profiler::explain::execution_profile;

    #[tokio::test]
    async fn test_drop_missing_index_is_absent() {
        let store = InMemoryStore::eduhub();
        let err = store.drop_index("users", "idx_users_email").await.unwrap_err();
        assert!(matches!(err, ProfilerError::IndexAlreadyAbsent { .. }));

        let err = store.drop_index("no_such_collection", "idx").await.unwrap_err();
        assert!(err.is_expected());
    }

    #[tokio::test]
    async fn test_create_is_idempotent_for_identical_definition() {
        let store = InMemoryStore::eduhub();
        let spec = IndexSpec::new("users", "email").unique();
        store.create_index(&spec).await.unwrap();
        store.create_index(&spec).await.unwrap();
        assert_eq!(store.index_names("users").await, vec!["idx_users_email".to_string()]);
    }

    #[tokio::test]
    async fn test_create_conflicts() {
        let store = InMemoryStore::eduhub().with_index("users", "email_1", doc! { "email": 1 }, true);

        let err = store
            .create_index(&IndexSpec::new("users", "email").unique())
            .await
            .unwrap_err();
        assert_eq!(err.category(), "CONFLICT");
        assert!(err.to_string().contains("email_1"));

        store.create_index(&IndexSpec::new("courses", "title")).await.unwrap();
        let err = store
            .create_index(&IndexSpec::new("courses", "title").unique())
            .await
            .unwrap_err();
        assert!(matches!(err, ProfilerError::IndexNameConflict { .. }));
    }

    #[tokio::test]
    async fn test_explain_switches_to_index_scan() {
        let store = InMemoryStore::eduhub();
        let case = QueryCase::find("Courses by Category", "courses", doc! { "category": "Data Science" });
        let request = ExplainRequest::for_case(&case);

        let (before, plan) = execution_profile(&store.explain(&request).await.unwrap()).unwrap();
        assert_eq!(before, 4.0);
        assert_eq!(plan.access_stage.as_deref(), Some("COLLSCAN"));
        assert_eq!(plan.docs_examined, Some(120));

        store.create_index(&IndexSpec::new("courses", "category")).await.unwrap();
        let (after, plan) = execution_profile(&store.explain(&request).await.unwrap()).unwrap();
        assert_eq!(after, 1.0);
        assert_eq!(plan.index_name.as_deref(), Some("idx_courses_category"));
    }

    #[tokio::test]
    async fn test_aggregate_explain_nests_cursor_stats() {
        let store = InMemoryStore::eduhub();
        let case = QueryCase::aggregate(
            "Enrollments per Course",
            "enrollments",
            vec![doc! { "$match": { "courseId": "c1" } }, doc! { "$count": "n" }],
        );
        let output = store.explain(&ExplainRequest::for_case(&case)).await.unwrap();
        assert!(output.get_array("stages").is_ok());
        let (millis, _) = execution_profile(&output).unwrap();
        assert_eq!(millis, 12.0);
    }

    #[tokio::test]
    async fn test_fault_injection_and_call_log() {
        let store = InMemoryStore::eduhub().failing_queries("courses");
        let query = Query::Find {
            filter: doc! { "category": "x" },
        };
        let err = store.run_query("courses", &query).await.unwrap_err();
        assert_eq!(err.category(), "UNCLASSIFIED");
        assert_eq!(store.run_query("users", &query).await.unwrap(), 1);
        assert_eq!(
            store.calls().await,
            vec!["run_query courses".to_string(), "run_query users".to_string()]
        );
    }
}
