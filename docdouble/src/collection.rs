//! A per-class convenience handle over a [`MockHarness`].
//!
//! [`Collection`] turns dispatch responses into records: a 404 becomes
//! `None` (or `false` for deletes) and query results are decoded into a
//! `Vec<Record>`.
//!
//! # Example
//!
//! ```ignore
//! use docdouble::harness::MockHarness;
//! use serde_json::json;
//!
//! # async fn example() -> docdouble::error::StoreResult<()> {
//! let harness = MockHarness::in_memory();
//! harness.install();
//!
//! let items = harness.collection("Item");
//! let lamp = items.create(json!({"name": "lamp", "price": 30})).await?;
//! let cheap = items.find(json!({"where": {"price": {"$lt": 50}}})).await?;
//! assert_eq!(cheap.len(), 1);
//! # Ok(()) }
//! ```

use serde_json::{Value, json};

use docdouble_core::{
    backend::StoreBackend,
    error::{StoreError, StoreResult},
    record::{OBJECT_ID, Record, record_from_value},
    request::{Operation, Response},
};

use crate::harness::MockHarness;

#[derive(Debug)]
pub struct Collection<'a, B: StoreBackend> {
    name: String,
    harness: &'a MockHarness<B>,
}

impl<'a, B: StoreBackend> Collection<'a, B> {
    pub(crate) fn new(name: String, harness: &'a MockHarness<B>) -> Self {
        Self { name, harness }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn dispatch(&self, operation: Operation, object_id: Option<&str>, payload: Value) -> StoreResult<Response> {
        self.harness
            .dispatch(operation, &self.name, object_id, payload)
            .await
    }

    /// Creates a record and returns it as committed.
    pub async fn create(&self, fields: Value) -> StoreResult<Record> {
        let response = self.dispatch(Operation::Create, None, fields).await?;
        record_from_value(response.body)
    }

    /// Fetches a record by id, `None` when it does not exist.
    pub async fn get(&self, object_id: &str) -> StoreResult<Option<Record>> {
        self.get_with(object_id, Value::Null).await
    }

    /// Fetches a record by id with read parameters such as `include`.
    pub async fn get_with(&self, object_id: &str, params: Value) -> StoreResult<Option<Record>> {
        let response = self.dispatch(Operation::Read, Some(object_id), params).await?;

        if response.is_not_found() {
            return Ok(None);
        }

        record_from_value(response.body).map(Some)
    }

    /// Applies `fields` to a record. Returns the committed changes, or
    /// `None` when the record does not exist.
    pub async fn update(&self, object_id: &str, fields: Value) -> StoreResult<Option<Record>> {
        let response = self.dispatch(Operation::Update, Some(object_id), fields).await?;

        if response.is_not_found() {
            return Ok(None);
        }

        let mut record = record_from_value(response.body)?;
        record.insert(OBJECT_ID.to_string(), Value::from(object_id));
        Ok(Some(record))
    }

    /// Deletes a record. Returns `false` when it did not exist.
    pub async fn delete(&self, object_id: &str) -> StoreResult<bool> {
        let response = self.dispatch(Operation::Delete, Some(object_id), Value::Null).await?;
        Ok(!response.is_not_found())
    }

    /// Runs a query with `{where, include, limit, skip, order}` parameters.
    pub async fn find(&self, params: Value) -> StoreResult<Vec<Record>> {
        let response = self.dispatch(Operation::Read, None, params).await?;

        match response.body.get("results") {
            Some(Value::Array(results)) => results
                .iter()
                .cloned()
                .map(record_from_value)
                .collect(),
            _ => Err(StoreError::InvalidDocument(format!(
                "query on {} answered without results",
                self.name,
            ))),
        }
    }

    /// Counts the records matching `where_clause`.
    pub async fn count(&self, where_clause: Value) -> StoreResult<u64> {
        let response = self
            .dispatch(Operation::Read, None, json!({"where": where_clause, "count": true}))
            .await?;

        response
            .body
            .get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| StoreError::InvalidDocument(format!("count on {} answered without a count", self.name)))
    }
}
