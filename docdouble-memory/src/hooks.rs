//! Runs the registered `beforeSave` / `beforeDelete` hook for a class.

use std::sync::Arc;

use mea::rwlock::RwLock;
use tracing::warn;

use docdouble_core::{
    error::{StoreError, StoreResult},
    hook::{HookKind, HookRegistry, HookRequest},
    record::Record,
};

/// Calls the hook registered for `(class_name, kind)` with `object`.
///
/// Returns the record the operation should continue with: the hook's
/// replacement, or `object` itself when the hook returns nothing or no hook
/// is registered. A rejection becomes [`StoreError::HookRejection`].
///
/// The registry lock is released before the hook runs, so a hook may call
/// back into the store.
pub async fn run_hook(
    hooks: &Arc<RwLock<HookRegistry>>,
    class_name: &str,
    kind: HookKind,
    object: Record,
    original: Option<Record>,
) -> StoreResult<Record> {
    let hook = {
        let registry = hooks.read().await;
        registry.get(class_name, kind)
    };

    let Some(hook) = hook else {
        return Ok(object);
    };

    let request = HookRequest {
        class_name: class_name.to_string(),
        kind,
        object: object.clone(),
        original,
    };

    match hook.call(request).await {
        Ok(Some(replacement)) => Ok(replacement),
        Ok(None) => Ok(object),
        Err(rejection) => {
            warn!(class_name, ?kind, %rejection, "hook rejected operation");
            Err(StoreError::HookRejection(rejection))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docdouble_core::hook::HookResult;
    use serde_json::json;

    async fn tag(request: HookRequest) -> HookResult {
        let mut object = request.object;
        object.insert("tagged".into(), json!(true));
        Ok(Some(object))
    }

    async fn refuse(_: HookRequest) -> HookResult {
        Err(json!({"code": 141, "error": "refused"}))
    }

    async fn observe(request: HookRequest) -> HookResult {
        assert_eq!(request.original.as_ref().and_then(|original| original.get("n")), Some(&json!(1)));
        Ok(None)
    }

    fn object() -> Record {
        json!({"n": 2}).as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn missing_hooks_pass_through() {
        let hooks = Arc::new(RwLock::new(HookRegistry::new()));
        let result = run_hook(&hooks, "Item", HookKind::BeforeSave, object(), None).await.unwrap();
        assert_eq!(result, object());
    }

    #[tokio::test]
    async fn replacements_are_adopted() {
        let hooks = Arc::new(RwLock::new(HookRegistry::new()));
        hooks.write().await.register("Item", HookKind::BeforeSave, Arc::new(tag));

        let result = run_hook(&hooks, "Item", HookKind::BeforeSave, object(), None).await.unwrap();
        assert_eq!(result.get("tagged"), Some(&json!(true)));

        // other kinds and classes are not affected
        let result = run_hook(&hooks, "Item", HookKind::BeforeDelete, object(), None).await.unwrap();
        assert_eq!(result, object());
    }

    #[tokio::test]
    async fn empty_answers_keep_the_original() {
        let hooks = Arc::new(RwLock::new(HookRegistry::new()));
        hooks.write().await.register("Item", HookKind::BeforeSave, Arc::new(observe));

        let original = json!({"n": 1}).as_object().cloned();
        let result = run_hook(&hooks, "Item", HookKind::BeforeSave, object(), original).await.unwrap();
        assert_eq!(result, object());
    }

    #[tokio::test]
    async fn rejections_carry_the_hook_value() {
        let hooks = Arc::new(RwLock::new(HookRegistry::new()));
        hooks.write().await.register("Item", HookKind::BeforeDelete, Arc::new(refuse));

        let err = run_hook(&hooks, "Item", HookKind::BeforeDelete, object(), None).await.unwrap_err();
        let StoreError::HookRejection(value) = err else { panic!("expected a rejection") };
        assert_eq!(value, json!({"code": 141, "error": "refused"}));
    }
}
