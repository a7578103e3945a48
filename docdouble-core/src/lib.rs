//! Core types for an in-memory double of a hosted JSON document backend.
//!
//! This crate is the core of the docdouble project and provides:
//!
//! - **Records** ([`record`]) - The record type and the tagged wire shapes (Pointer, Date)
//! - **Where clauses** ([`query`]) - Parsed query expressions, operators and read parameters
//! - **Requests** ([`request`]) - The routed request and the status/body response
//! - **Hooks** ([`hook`]) - `beforeSave` / `beforeDelete` interception and their registry
//! - **Backend abstraction** ([`backend`]) - The dispatch seam backends implement
//! - **Error handling** ([`error`]) - The error taxonomy and result type
//!
//! # Example
//!
//! ```ignore
//! use docdouble::{backend::StoreBackend, request::Request};
//! use serde_json::json;
//!
//! let response = backend
//!     .dispatch(Request::query("Item", json!({"where": {"price": {"$lt": 30}}})))
//!     .await?;
//! ```

pub mod backend;
pub mod error;
pub mod hook;
pub mod query;
pub mod record;
pub mod request;
