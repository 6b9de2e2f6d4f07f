//! MongoDB-backed document store

use crate::{
    db::DocumentStore,
    error::{AppError, ItemResult, ProfilerError, Result},
    models::{Config, IndexSpec, Query},
    profiler::explain::{is_self_explain_rejection, ExplainRequest},
};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    error::{Error as MongoError, ErrorKind},
    options::{ClientOptions, IndexOptions},
    Client, Collection, Database, IndexModel,
};
use tokio::time::timeout;

/// `IndexNotFound`
const CODE_INDEX_NOT_FOUND: i32 = 27;
/// `NamespaceNotFound`
const CODE_NAMESPACE_NOT_FOUND: i32 = 26;
/// `IndexAlreadyExists`
const CODE_INDEX_ALREADY_EXISTS: i32 = 68;
/// `IndexOptionsConflict`
const CODE_INDEX_OPTIONS_CONFLICT: i32 = 85;
/// `IndexKeySpecsConflict`
const CODE_INDEX_KEY_SPECS_CONFLICT: i32 = 86;

/// Store operation an error came from; decides how server codes map onto
/// the per-item taxonomy
#[derive(Debug, Clone, Copy)]
enum StoreOp<'a> {
    DropIndex { collection: &'a str, index: &'a str },
    CreateIndex { collection: &'a str, index: &'a str },
    Query { collection: &'a str },
    Explain { collection: &'a str },
}

impl StoreOp<'_> {
    fn describe(&self) -> String {
        match self {
            StoreOp::DropIndex { collection, index } => format!("drop index {}.{}", collection, index),
            StoreOp::CreateIndex { collection, index } => format!("create index {}.{}", collection, index),
            StoreOp::Query { collection } => format!("query {}", collection),
            StoreOp::Explain { collection } => format!("explain {}", collection),
        }
    }
}

/// Map a driver error onto the per-item taxonomy
fn classify(op: StoreOp<'_>, err: &MongoError) -> ProfilerError {
    let (code, code_name, message) = match err.kind.as_ref() {
        ErrorKind::Command(command) => (
            Some(command.code),
            command.code_name.clone(),
            command.message.clone(),
        ),
        _ => (None, String::new(), err.to_string()),
    };

    match op {
        StoreOp::DropIndex { collection, index }
            if matches!(code, Some(CODE_INDEX_NOT_FOUND) | Some(CODE_NAMESPACE_NOT_FOUND))
                || code_name == "IndexNotFound"
                || code_name == "NamespaceNotFound" =>
        {
            ProfilerError::already_absent(collection, index)
        }
        StoreOp::CreateIndex { collection, index }
            if matches!(
                code,
                Some(CODE_INDEX_OPTIONS_CONFLICT)
                    | Some(CODE_INDEX_KEY_SPECS_CONFLICT)
                    | Some(CODE_INDEX_ALREADY_EXISTS)
            ) =>
        {
            ProfilerError::name_conflict(collection, index, message)
        }
        StoreOp::Explain { collection } if is_self_explain_rejection(code, &message) => {
            ProfilerError::self_explain(format!("server rejected explain on '{}': {}", collection, message))
        }
        _ => ProfilerError::unclassified(op.describe(), code, message),
    }
}

/// Document store talking to a live MongoDB deployment
#[derive(Debug, Clone)]
pub struct MongoStore {
    client: Client,
    db: Database,
    label: String,
}

impl MongoStore {
    /// Open a client and confirm the deployment answers a `ping` within the
    /// configured timeout. This is the only fatal failure of a run.
    pub async fn connect(config: &Config) -> Result<Self> {
        let mut options = ClientOptions::parse(&config.mongo_uri)
            .await
            .map_err(|e| AppError::connection(format!("Invalid connection string: {}", e)))?;
        options.app_name = Some(crate::APP_NAME.to_string());
        options.server_selection_timeout = Some(config.timeout());
        options.connect_timeout = Some(config.timeout());

        let client = Client::with_options(options)?;
        let db = client.database(&config.database);

        match timeout(config.timeout(), db.run_command(doc! { "ping": 1 })).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(AppError::connection(format!(
                    "Could not reach MongoDB at {}: {}",
                    config.mongo_uri, e
                )))
            }
            Err(_) => {
                return Err(AppError::connection(format!(
                    "Timed out after {}ms waiting for MongoDB at {}",
                    config.timeout_ms, config.mongo_uri
                )))
            }
        }

        Ok(Self {
            client,
            label: format!("mongodb:{}", config.database),
            db,
        })
    }

    pub fn database_name(&self) -> &str {
        self.db.name()
    }

    /// Release pooled connections
    pub async fn close(self) {
        self.client.shutdown().await;
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection::<Document>(name)
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn name(&self) -> &str {
        &self.label
    }

    async fn create_index(&self, spec: &IndexSpec) -> ItemResult<()> {
        let name = spec.index_name();
        let mut options = IndexOptions::default();
        options.name = Some(name.clone());
        if spec.unique {
            options.unique = Some(true);
        }
        let model = IndexModel::builder().keys(spec.keys()).options(options).build();

        self.collection(&spec.collection)
            .create_index(model)
            .await
            .map(|_| ())
            .map_err(|e| {
                classify(
                    StoreOp::CreateIndex {
                        collection: &spec.collection,
                        index: &name,
                    },
                    &e,
                )
            })
    }

    async fn drop_index(&self, collection: &str, index: &str) -> ItemResult<()> {
        self.collection(collection)
            .drop_index(index)
            .await
            .map_err(|e| classify(StoreOp::DropIndex { collection, index }, &e))
    }

    async fn run_query(&self, collection: &str, query: &Query) -> ItemResult<u64> {
        let op = StoreOp::Query { collection };
        let coll = self.collection(collection);
        let mut cursor = match query {
            Query::Find { filter } => coll.find(filter.clone()).await,
            Query::Aggregate { pipeline } => coll.aggregate(pipeline.clone()).await,
        }
        .map_err(|e| classify(op, &e))?;

        let mut fetched = 0u64;
        while cursor.try_next().await.map_err(|e| classify(op, &e))?.is_some() {
            fetched += 1;
        }
        Ok(fetched)
    }

    async fn explain(&self, request: &ExplainRequest) -> ItemResult<Document> {
        self.db
            .run_command(request.to_command())
            .await
            .map_err(|e| {
                classify(
                    StoreOp::Explain {
                        collection: request.collection(),
                    },
                    &e,
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_operations() {
        let op = StoreOp::DropIndex {
            collection: "users",
            index: "idx_users_email",
        };
        assert_eq!(op.describe(), "drop index users.idx_users_email");
        assert_eq!(StoreOp::Query { collection: "courses" }.describe(), "query courses");
    }

    #[test]
    fn test_non_command_errors_are_unclassified() {
        let err = MongoError::custom("socket closed");
        let classified = classify(StoreOp::Explain { collection: "courses" }, &err);
        assert_eq!(classified.category(), "UNCLASSIFIED");

        let classified = classify(
            StoreOp::DropIndex {
                collection: "users",
                index: "idx_users_email",
            },
            &err,
        );
        assert!(!classified.is_expected());
    }

    #[test]
    fn test_explain_wording_without_code_is_not_self_explain() {
        let err = MongoError::custom("Cannot explain cmd: explain");
        let classified = classify(StoreOp::Explain { collection: "courses" }, &err);
        assert!(matches!(classified, ProfilerError::Unclassified { .. }));
    }
}
