//! The request/response pair exchanged with the request router.
//!
//! The router turns a method and path into a [`Request`]; the backend answers
//! with a [`Response`] carrying an HTTP-like status and a JSON body.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// The four kinds of operation a backend serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

/// A routed request addressed to one class.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub operation: Operation,
    pub class_name: String,
    /// Present for point reads, updates and deletes.
    pub object_id: Option<String>,
    /// Field values for writes; read parameters for queries.
    pub payload: Value,
}

impl Request {
    pub fn new(
        operation: Operation,
        class_name: impl Into<String>,
        object_id: Option<String>,
        payload: Value,
    ) -> Self {
        Self {
            operation,
            class_name: class_name.into(),
            object_id,
            payload,
        }
    }

    pub fn create(class_name: impl Into<String>, fields: Value) -> Self {
        Self::new(Operation::Create, class_name, None, fields)
    }

    pub fn get(class_name: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self::new(Operation::Read, class_name, Some(object_id.into()), Value::Null)
    }

    pub fn query(class_name: impl Into<String>, params: Value) -> Self {
        Self::new(Operation::Read, class_name, None, params)
    }

    pub fn update(class_name: impl Into<String>, object_id: impl Into<String>, fields: Value) -> Self {
        Self::new(Operation::Update, class_name, Some(object_id.into()), fields)
    }

    pub fn delete(class_name: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self::new(Operation::Delete, class_name, Some(object_id.into()), Value::Null)
    }
}

/// Error code the hosted service uses for a missing object.
pub const OBJECT_NOT_FOUND: u16 = 101;

/// A status and JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

impl Response {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn created(body: Value) -> Self {
        Self { status: 201, body }
    }

    pub fn not_found() -> Self {
        Self {
            status: 404,
            body: json!({"code": OBJECT_NOT_FOUND, "error": "Object not found."}),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}
