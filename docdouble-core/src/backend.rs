//! Backend abstraction for the engine.
//!
//! The [`StoreBackend`] trait is the single seam the request router talks to:
//! one [`dispatch`](StoreBackend::dispatch) call per routed request, plus the
//! harness operations (full reset and hook registration).
//!
//! # Examples
//!
//! ```ignore
//! use docdouble::{backend::StoreBackend, request::Request};
//! use serde_json::json;
//!
//! let backend = MyBackendImpl::new();
//!
//! let created = backend.dispatch(Request::create("Item", json!({"price": 30}))).await?;
//! assert_eq!(created.status, 201);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;

use crate::{
    error::StoreResult,
    hook::{Hook, HookKind},
    request::{Request, Response},
};

/// Abstract interface for engine backends.
///
/// # Error Handling
///
/// A point lookup on a missing id answers with a 404 [`Response`]; only
/// aborted operations (hook rejections, bad update operators, malformed
/// queries) surface as [`StoreError`](crate::error::StoreError).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Serves one routed request.
    ///
    /// # Arguments
    ///
    /// * `request` - The operation, class, optional object id and payload
    ///
    /// # Returns
    ///
    /// The status and body the hosted service would answer with.
    async fn dispatch(&self, request: Request) -> StoreResult<Response>;

    /// Erases every record, field mask and hook.
    ///
    /// Clearing an already empty backend leaves it in the same state.
    async fn clear(&self) -> StoreResult<()>;

    /// Registers the hook for `(class_name, kind)`, replacing any previous one.
    async fn register_hook(
        &self,
        class_name: &str,
        kind: HookKind,
        hook: Arc<dyn Hook>,
    ) -> StoreResult<()>;

    /// Removes the hook for `(class_name, kind)` if there is one.
    async fn unregister_hook(&self, class_name: &str, kind: HookKind) -> StoreResult<()>;
}

#[async_trait]
impl<B: StoreBackend + ?Sized> StoreBackend for Box<B> {
    async fn dispatch(&self, request: Request) -> StoreResult<Response> {
        (**self).dispatch(request).await
    }

    async fn clear(&self) -> StoreResult<()> {
        (**self).clear().await
    }

    async fn register_hook(
        &self,
        class_name: &str,
        kind: HookKind,
        hook: Arc<dyn Hook>,
    ) -> StoreResult<()> {
        (**self)
            .register_hook(class_name, kind, hook)
            .await
    }

    async fn unregister_hook(&self, class_name: &str, kind: HookKind) -> StoreResult<()> {
        (**self)
            .unregister_hook(class_name, kind)
            .await
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> StoreResult<Self::Backend>;
}
