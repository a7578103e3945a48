//! An in-memory double for a hosted JSON document backend.
//!
//! Client code written against a backend-as-a-service document store can run
//! its test suite against docdouble instead of the network. The double keeps
//! class-keyed collections of schemaless JSON records and reproduces the
//! hosted service's data semantics: where-clause matching, atomic update
//! operators, pointer `include`, relation fields and per-class
//! beforeSave / beforeDelete hooks.
//!
//! # Features
//!
//! - **One dispatch seam** - `(operation, class, id, payload) -> (status, body)`
//! - **Parse-style queries** - `$lt`, `$in`, `$regex`, `$select`, `$inQuery`, `$relatedTo`, `$or` and more
//! - **Atomic updates** - `Increment`, `Add`, `AddUnique`, `Remove`, `Delete`, relation ops
//! - **Hooks** - async beforeSave / beforeDelete callbacks that may rewrite or reject
//!
//! # Quick Start
//!
//! ```ignore
//! use docdouble::prelude::*;
//! use serde_json::json;
//!
//! async fn stamp(request: HookRequest) -> HookResult {
//!     let mut object = request.object;
//!     object.insert("stamped".into(), json!(true));
//!     Ok(Some(object))
//! }
//!
//! #[tokio::main]
//! async fn main() -> StoreResult<()> {
//!     let harness = MockHarness::in_memory();
//!     harness.install();
//!     harness.register_hook("Brand", HookKind::BeforeSave, stamp).await?;
//!
//!     let brands = harness.collection("Brand");
//!     let acme = brands.create(json!({"name": "acme"})).await?;
//!     assert_eq!(acme["stamped"], json!(true));
//!
//!     let found = brands.find(json!({"where": {"name": "acme"}})).await?;
//!     assert_eq!(found.len(), 1);
//!
//!     harness.reset().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - the process-local engine

pub mod collection;
pub mod harness;
pub mod prelude;

pub use docdouble_core::{backend, error, hook, query, record, request};

/// In-memory engine.
pub mod memory {
    pub use docdouble_memory::{InMemoryStore, InMemoryStoreBuilder, StoreConfig};
}
