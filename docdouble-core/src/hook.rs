//! Lifecycle hooks run before records are saved or deleted.
//!
//! A hook receives a [`HookRequest`] and answers with a [`HookResult`]:
//!
//! - `Ok(Some(record))` replaces the record about to be persisted,
//! - `Ok(None)` lets the operation proceed unchanged,
//! - `Err(value)` rejects the operation; the backend fails it with
//!   [`StoreError::HookRejection`](crate::error::StoreError::HookRejection)
//!   carrying `value` and writes nothing.
//!
//! Any `Fn(HookRequest) -> impl Future<Output = HookResult>`, async fns
//! included, is a [`Hook`]:
//!
//! ```ignore
//! use docdouble::hook::{HookKind, HookRequest, HookResult};
//! use serde_json::json;
//!
//! async fn annotate(request: HookRequest) -> HookResult {
//!     if request.get("error").is_some() {
//!         return Err(json!("no errors allowed"));
//!     }
//!     let mut object = request.object;
//!     object.insert("cool".into(), json!(true));
//!     Ok(Some(object))
//! }
//!
//! harness.register_hook("Brand", HookKind::BeforeSave, annotate).await;
//! ```

use std::{collections::HashMap, fmt, future::Future, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::Record;

/// The interception points a hook can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookKind {
    /// Runs before a create or update is committed.
    BeforeSave,
    /// Runs before a record is erased.
    BeforeDelete,
}

/// What a hook sees.
#[derive(Debug, Clone, PartialEq)]
pub struct HookRequest {
    pub class_name: String,
    pub kind: HookKind,
    /// The would-be-persisted record for `BeforeSave`, the stored record for `BeforeDelete`.
    pub object: Record,
    /// The currently stored record when an update is being saved.
    pub original: Option<Record>,
}

impl HookRequest {
    /// Reads a field of [`HookRequest::object`].
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.object.get(field)
    }
}

/// A replacement record, nothing, or a rejection value.
pub type HookResult = Result<Option<Record>, Value>;

#[async_trait]
pub trait Hook: Send + Sync {
    async fn call(&self, request: HookRequest) -> HookResult;
}

#[async_trait]
impl<F, Fut> Hook for F
where
    F: Fn(HookRequest) -> Fut + Send + Sync,
    Fut: Future<Output = HookResult> + Send + 'static,
{
    async fn call(&self, request: HookRequest) -> HookResult {
        (self)(request).await
    }
}

/// At most one hook per (class, kind). Registering again replaces.
#[derive(Default, Clone)]
pub struct HookRegistry {
    hooks: HashMap<(String, HookKind), Arc<dyn Hook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `hook`, returning the one it replaced.
    pub fn register(
        &mut self,
        class_name: &str,
        kind: HookKind,
        hook: Arc<dyn Hook>,
    ) -> Option<Arc<dyn Hook>> {
        self.hooks.insert((class_name.to_string(), kind), hook)
    }

    pub fn unregister(&mut self, class_name: &str, kind: HookKind) -> Option<Arc<dyn Hook>> {
        self.hooks.remove(&(class_name.to_string(), kind))
    }

    pub fn get(&self, class_name: &str, kind: HookKind) -> Option<Arc<dyn Hook>> {
        self.hooks
            .get(&(class_name.to_string(), kind))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn clear(&mut self) {
        self.hooks.clear();
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.hooks.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(object: Record) -> HookRequest {
        HookRequest {
            class_name: "Brand".into(),
            kind: HookKind::BeforeSave,
            object,
            original: None,
        }
    }

    async fn mark_seen(request: HookRequest) -> HookResult {
        let mut object = request.object;
        object.insert("seen".into(), json!(true));
        Ok(Some(object))
    }

    #[tokio::test]
    async fn async_fns_are_hooks() {
        let hook: Arc<dyn Hook> = Arc::new(mark_seen);

        let result = hook.call(request(Record::new())).await.unwrap().unwrap();
        assert_eq!(result.get("seen"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn registering_again_replaces() {
        let mut registry = HookRegistry::new();
        let accept: Arc<dyn Hook> = Arc::new(|_: HookRequest| async { Ok::<Option<Record>, Value>(None) });
        let reject: Arc<dyn Hook> = Arc::new(|_: HookRequest| async { Err::<Option<Record>, Value>(json!("nope")) });

        assert!(registry.register("Brand", HookKind::BeforeSave, accept).is_none());
        assert!(registry.register("Brand", HookKind::BeforeSave, reject).is_some());
        assert_eq!(registry.len(), 1);

        let hook = registry.get("Brand", HookKind::BeforeSave).unwrap();
        assert_eq!(hook.call(request(Record::new())).await, Err(json!("nope")));
        assert!(registry.get("Brand", HookKind::BeforeDelete).is_none());

        registry.unregister("Brand", HookKind::BeforeSave);
        assert!(registry.is_empty());
    }
}
