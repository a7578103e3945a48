//! Convenient re-exports of commonly used types from docdouble.
//!
//! ```ignore
//! use docdouble::prelude::*;
//! ```
//!
//! This provides access to:
//! - the harness and collection handle
//! - backends and builders
//! - requests, responses and hooks
//! - records, pointers and error types

pub use docdouble_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{StoreError, StoreResult},
    hook::{Hook, HookKind, HookRequest, HookResult},
    query::{Query, Sort, SortDirection},
    record::{Pointer, Record},
    request::{Operation, Request, Response},
};
pub use docdouble_memory::{InMemoryStore, InMemoryStoreBuilder, StoreConfig};

pub use crate::{collection::Collection, harness::MockHarness};
