//! The test harness a suite installs in place of the hosted backend.
//!
//! [`MockHarness`] wraps any [`StoreBackend`] and exposes the single
//! `dispatch(operation, class, id, payload)` seam a request router calls,
//! plus the lifecycle controls a suite needs between tests: install,
//! uninstall, reset and hook registration.
//!
//! # Example
//!
//! ```ignore
//! use docdouble::{harness::MockHarness, hook::HookKind, request::Operation};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let harness = MockHarness::in_memory();
//!     harness.install();
//!
//!     let created = harness
//!         .dispatch(Operation::Create, "Item", None, json!({"price": 30}))
//!         .await?;
//!     assert_eq!(created.status, 201);
//!
//!     harness.reset().await?;
//!     harness.uninstall();
//!     Ok(())
//! }
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use serde_json::Value;
use tracing::debug;

use docdouble_core::{
    backend::StoreBackend,
    error::{StoreError, StoreResult},
    hook::{Hook, HookKind},
    request::{Operation, Request, Response},
};
use docdouble_memory::InMemoryStore;

use crate::collection::Collection;

#[derive(Debug)]
pub struct MockHarness<B: StoreBackend> {
    backend: B,
    installed: AtomicBool,
}

impl MockHarness<InMemoryStore> {
    /// A harness over a fresh [`InMemoryStore`] with default settings.
    pub fn in_memory() -> Self {
        Self::new(InMemoryStore::new())
    }
}

impl<B: StoreBackend> MockHarness<B> {
    /// Wraps `backend`. The harness starts uninstalled.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            installed: AtomicBool::new(false),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Makes the backend answer dispatched requests. Installing twice is a no-op.
    pub fn install(&self) {
        if !self.installed.swap(true, Ordering::SeqCst) {
            debug!("harness installed");
        }
    }

    /// Stops answering requests. Stored state is kept until [`reset`](Self::reset).
    pub fn uninstall(&self) {
        if self.installed.swap(false, Ordering::SeqCst) {
            debug!("harness uninstalled");
        }
    }

    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }

    /// Drops every record, relation mask and hook.
    pub async fn reset(&self) -> StoreResult<()> {
        self.backend.clear().await
    }

    /// Registers `hook` for `(class_name, kind)`, replacing any earlier one.
    pub async fn register_hook<H>(&self, class_name: &str, kind: HookKind, hook: H) -> StoreResult<()>
    where
        H: Hook + 'static,
    {
        self.backend
            .register_hook(class_name, kind, Arc::new(hook))
            .await
    }

    pub async fn unregister_hook(&self, class_name: &str, kind: HookKind) -> StoreResult<()> {
        self.backend
            .unregister_hook(class_name, kind)
            .await
    }

    /// Answers one routed request.
    ///
    /// Fails with [`StoreError::NotInstalled`] unless the harness is installed.
    pub async fn dispatch(
        &self,
        operation: Operation,
        class_name: &str,
        object_id: Option<&str>,
        payload: Value,
    ) -> StoreResult<Response> {
        self.send(Request::new(
            operation,
            class_name,
            object_id.map(str::to_string),
            payload,
        ))
        .await
    }

    /// Answers an already assembled [`Request`].
    pub async fn send(&self, request: Request) -> StoreResult<Response> {
        if !self.is_installed() {
            return Err(StoreError::NotInstalled);
        }

        self.backend.dispatch(request).await
    }

    /// A handle over one class.
    pub fn collection<'a>(&'a self, name: &str) -> Collection<'a, B> {
        Collection::new(name.to_string(), self)
    }
}
