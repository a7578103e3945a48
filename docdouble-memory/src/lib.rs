//! In-memory engine for docdouble.
//!
//! This crate provides [`InMemoryStore`], a process-local implementation of
//! the `StoreBackend` trait that behaves like a hosted JSON document backend:
//! class-keyed collections of schemaless records, Parse-style where clauses,
//! atomic update operators, pointer includes and per-class save/delete hooks.
//!
//! # Layout
//!
//! - [`state`] - collections in creation order and relation masks
//! - [`evaluator`] - the where-clause matcher and equality rule
//! - [`mutator`] - `__op` update operators
//! - [`includer`] - pointer dereferencing for `include`
//! - [`hooks`] - the beforeSave / beforeDelete runner
//! - [`store`] - the request dispatcher tying it all together
//!
//! # Quick Start
//!
//! ```ignore
//! use docdouble_core::{backend::{StoreBackend, StoreBackendBuilder}, request::Request};
//! use docdouble_memory::InMemoryStore;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = InMemoryStore::builder().max_limit(500).build().await?;
//!
//!     let created = store.dispatch(Request::create("Item", json!({"price": 30}))).await?;
//!     let id = created.body["objectId"].as_str().unwrap_or_default().to_string();
//!
//!     let fetched = store.dispatch(Request::get("Item", id)).await?;
//!     assert_eq!(fetched.body["price"], json!(30));
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod evaluator;
pub mod hooks;
pub mod includer;
pub mod mutator;
pub mod state;
pub mod store;

pub use config::StoreConfig;
pub use store::{InMemoryStore, InMemoryStoreBuilder};
