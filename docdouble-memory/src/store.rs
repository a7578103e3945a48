//! The request dispatcher.
//!
//! [`InMemoryStore`] answers every [`Request`] against process-local state:
//! class collections, relation masks and the hook registry, each behind an
//! async-aware read-write lock. A dispatch takes the lock its current phase
//! needs and lets go of it before a hook is awaited, so hooks are free to
//! dispatch requests of their own.

use std::{cmp::Ordering, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use mea::rwlock::RwLock;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};
use uuid::Uuid;

use docdouble_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{StoreError, StoreResult},
    hook::{Hook, HookKind, HookRegistry},
    query::{Expr, Query, Sort, SortDirection},
    record::{
        CLASS_NAME, CREATED_AT, IDENTITY_FIELDS, OBJECT_ID, Pointer, Record, UPDATED_AT,
        format_timestamp, parse_iso, record_from_value,
    },
    request::{Operation, Request, Response},
};

use crate::{
    config::StoreConfig,
    evaluator::{DocumentEvaluator, sort_order},
    hooks::run_hook,
    includer,
    mutator::{apply_ops, extract_ops},
    state::{ClassCollection, StoreState},
};

/// Thread-safe in-memory backend.
///
/// Clones share the same state, masks and hooks.
///
/// # Example
///
/// ```ignore
/// use docdouble_memory::InMemoryStore;
/// use docdouble_core::{backend::StoreBackend, request::Request};
/// use serde_json::json;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = InMemoryStore::new();
///
///     let created = store.dispatch(Request::create("Item", json!({"price": 30}))).await?;
///     assert_eq!(created.status, 201);
///
///     let found = store
///         .dispatch(Request::query("Item", json!({"where": {"price": {"$gte": 30}}})))
///         .await?;
///     assert_eq!(found.body["results"].as_array().map(Vec::len), Some(1));
///
///     Ok(())
/// }
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
    hooks: Arc<RwLock<HookRegistry>>,
    config: StoreConfig,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates an empty store with the default [`StoreConfig`].
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    fn with_config(config: StoreConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::new())),
            hooks: Arc::new(RwLock::new(HookRegistry::new())),
            config,
        }
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Draws ids until one is unused within the class.
    fn generate_object_id(&self, existing: Option<&ClassCollection>) -> String {
        loop {
            let mut candidate = Uuid::new_v4().simple().to_string();
            candidate.truncate(self.config.object_id_length);

            if !existing.is_some_and(|collection| collection.contains(&candidate)) {
                return candidate;
            }
        }
    }

    async fn create(&self, class_name: &str, payload: Value) -> StoreResult<Response> {
        let draft = record_from_value(payload)?;
        let mut draft = run_hook(&self.hooks, class_name, HookKind::BeforeSave, draft, None).await?;

        for field in IDENTITY_FIELDS {
            draft.remove(field);
        }

        let ops = extract_ops(&mut draft)?;
        let relations = apply_ops(&mut draft, &ops)?;

        let mut state = self.state.write().await;
        let object_id = self.generate_object_id(state.collection(class_name));
        let now = format_timestamp(Utc::now());

        draft.insert(OBJECT_ID.to_string(), Value::from(object_id.clone()));
        draft.insert(CREATED_AT.to_string(), Value::from(now.clone()));
        draft.insert(UPDATED_AT.to_string(), Value::from(now));

        state.record_masked(class_name, relations);
        state
            .collection_mut(class_name)
            .insert(object_id.clone(), draft.clone());

        debug!(class_name, %object_id, "created record");

        state.strip_masked(class_name, &mut draft);
        Ok(Response::created(Value::Object(draft)))
    }

    async fn get_one(&self, class_name: &str, object_id: &str, payload: &Value) -> StoreResult<Response> {
        let query = Query::from_payload(payload)?;
        let state = self.state.read().await;

        let Some(stored) = state.fetch(class_name, object_id) else {
            return Ok(Response::not_found());
        };

        let mut record = stored.clone();
        includer::expand(&state, std::slice::from_mut(&mut record), &query.include);
        state.strip_masked(class_name, &mut record);

        Ok(Response::ok(Value::Object(record)))
    }

    async fn find(&self, class_name: &str, payload: &Value) -> StoreResult<Response> {
        let query = Query::from_payload(payload)?;
        let state = self.state.read().await;

        let target_class = query
            .redirect_key
            .as_deref()
            .and_then(|key| redirect_target(&state, &query, key))
            .unwrap_or_else(|| class_name.to_string());

        let match_all = Expr::match_all();
        let filter = query.filter.as_ref().unwrap_or(&match_all);
        let mut matches = DocumentEvaluator::matching(&state, &target_class, filter)?;
        sort_records(&mut matches, &query.sort);

        let mut body = Map::new();

        if query.count {
            body.insert("results".into(), json!([]));
            body.insert("count".into(), Value::from(matches.len()));
        } else {
            let mut page = matches
                .into_iter()
                .skip(query.offset.unwrap_or(0))
                .take(self.config.page_size(query.limit))
                .cloned()
                .collect::<Vec<_>>();

            includer::expand(&state, &mut page, &query.include);
            for record in page.iter_mut() {
                state.strip_masked(&target_class, record);
            }

            body.insert(
                "results".into(),
                Value::Array(page.into_iter().map(Value::Object).collect()),
            );
        }

        if query.redirect_key.is_some() {
            body.insert(CLASS_NAME.into(), Value::from(target_class));
        }

        Ok(Response::ok(Value::Object(body)))
    }

    async fn update(&self, class_name: &str, object_id: &str, payload: Value) -> StoreResult<Response> {
        let original = {
            let state = self.state.read().await;
            match state.fetch(class_name, object_id) {
                Some(stored) => stored.clone(),
                None => return Ok(Response::not_found()),
            }
        };

        let mut changes = record_from_value(payload)?;
        let ops = extract_ops(&mut changes)
            .inspect_err(|err| warn!(class_name, object_id, %err, "update aborted"))?;

        for field in IDENTITY_FIELDS {
            changes.remove(field);
        }

        let mut draft = original.clone();
        draft.extend(changes);

        let relations = apply_ops(&mut draft, &ops)
            .inspect_err(|err| warn!(class_name, object_id, %err, "update aborted"))?;

        let mut draft = run_hook(
            &self.hooks,
            class_name,
            HookKind::BeforeSave,
            draft,
            Some(original),
        )
        .await?;

        let mut state = self.state.write().await;

        // The record may have been deleted while the hook ran.
        let Some(current) = state.fetch(class_name, object_id) else {
            return Ok(Response::not_found());
        };

        let created_at = current.get(CREATED_AT).cloned();
        let updated_at = next_timestamp(current.get(UPDATED_AT));

        draft.insert(OBJECT_ID.to_string(), Value::from(object_id));
        match created_at {
            Some(created_at) => draft.insert(CREATED_AT.to_string(), created_at),
            None => draft.remove(CREATED_AT),
        };
        draft.insert(UPDATED_AT.to_string(), Value::from(updated_at));

        state.record_masked(class_name, relations);
        state
            .collection_mut(class_name)
            .insert(object_id.to_string(), draft.clone());

        debug!(class_name, object_id, "updated record");

        draft.remove(OBJECT_ID);
        draft.remove(CREATED_AT);
        state.strip_masked(class_name, &mut draft);

        Ok(Response::ok(Value::Object(draft)))
    }

    async fn delete(&self, class_name: &str, object_id: &str) -> StoreResult<Response> {
        let stored = {
            let state = self.state.read().await;
            match state.fetch(class_name, object_id) {
                Some(stored) => stored.clone(),
                None => return Ok(Response::not_found()),
            }
        };

        run_hook(&self.hooks, class_name, HookKind::BeforeDelete, stored, None).await?;

        let mut state = self.state.write().await;
        let removed = state
            .collection(class_name)
            .is_some_and(|collection| collection.contains(object_id));

        if !removed {
            return Ok(Response::not_found());
        }

        state.collection_mut(class_name).remove(object_id);
        debug!(class_name, object_id, "deleted record");

        Ok(Response::ok(json!({})))
    }
}

/// Resolves the class a redirected relation query should run against.
///
/// Applies only when the where clause carries a top-level `$relatedTo` over
/// `key`; the class comes from the first pointer in the owner's relation.
fn redirect_target(state: &StoreState, query: &Query, key: &str) -> Option<String> {
    let param = query.filter.as_ref()?.related_to()?;

    if param.get("key").and_then(Value::as_str) != Some(key) {
        return None;
    }

    let owner = Pointer::from_value(param.get("object")?)?;

    state
        .fetch(&owner.class_name, &owner.object_id)?
        .get(key)?
        .as_array()?
        .iter()
        .find_map(Pointer::from_value)
        .map(|pointer| pointer.class_name)
}

/// Stable multi-key sort; records that compare equal keep creation order.
fn sort_records(records: &mut [&Record], sort: &[Sort]) {
    if sort.is_empty() {
        return;
    }

    records.sort_by(|a, b| {
        for key in sort {
            let ordering = sort_order(a.get(&key.field), b.get(&key.field));
            let ordering = match key.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };

            if ordering != Ordering::Equal {
                return ordering;
            }
        }

        Ordering::Equal
    });
}

/// The current time, never earlier than `previous`.
fn next_timestamp(previous: Option<&Value>) -> String {
    let now = format_timestamp(Utc::now());

    let previous = previous
        .and_then(Value::as_str)
        .and_then(|text| parse_iso(text).map(|instant| (text, instant)));

    match (previous, parse_iso(&now)) {
        (Some((text, before)), Some(current)) if before > current => text.to_string(),
        _ => now,
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn dispatch(&self, request: Request) -> StoreResult<Response> {
        let Request { operation, class_name, object_id, payload } = request;

        debug!(?operation, %class_name, ?object_id, "dispatching request");

        match (operation, object_id) {
            (Operation::Create, _) => self.create(&class_name, payload).await,
            (Operation::Read, Some(object_id)) => self.get_one(&class_name, &object_id, &payload).await,
            (Operation::Read, None) => self.find(&class_name, &payload).await,
            (Operation::Update, Some(object_id)) => self.update(&class_name, &object_id, payload).await,
            (Operation::Delete, Some(object_id)) => self.delete(&class_name, &object_id).await,
            (operation @ (Operation::Update | Operation::Delete), None) => Err(StoreError::InvalidDocument(
                format!("{operation:?} on {class_name} needs an objectId"),
            )),
        }
    }

    async fn clear(&self) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let mut hooks = self.hooks.write().await;

        state.clear();
        hooks.clear();

        debug!("cleared store");
        Ok(())
    }

    async fn register_hook(&self, class_name: &str, kind: HookKind, hook: Arc<dyn Hook>) -> StoreResult<()> {
        self.hooks
            .write()
            .await
            .register(class_name, kind, hook);

        Ok(())
    }

    async fn unregister_hook(&self, class_name: &str, kind: HookKind) -> StoreResult<()> {
        self.hooks
            .write()
            .await
            .unregister(class_name, kind);

        Ok(())
    }
}

/// Builder for [`InMemoryStore`].
///
/// # Example
///
/// ```ignore
/// use docdouble_memory::InMemoryStore;
/// use docdouble_core::backend::StoreBackendBuilder;
///
/// #[tokio::main]
/// async fn main() {
///     let store = InMemoryStore::builder()
///         .default_limit(20)
///         .object_id_length(16)
///         .build()
///         .await
///         .unwrap();
/// }
/// ```
#[derive(Debug, Default, Clone)]
pub struct InMemoryStoreBuilder {
    config: StoreConfig,
}

impl InMemoryStoreBuilder {
    /// Replaces every setting at once.
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn default_limit(mut self, limit: usize) -> Self {
        self.config.default_limit = limit;
        self
    }

    pub fn max_limit(mut self, limit: usize) -> Self {
        self.config.max_limit = limit;
        self
    }

    pub fn object_id_length(mut self, length: usize) -> Self {
        self.config.object_id_length = length;
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Validates the configuration and returns an empty store.
    async fn build(self) -> StoreResult<Self::Backend> {
        self.config.validate()?;
        Ok(InMemoryStore::with_config(self.config))
    }
}
