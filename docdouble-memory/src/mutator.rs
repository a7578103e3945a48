//! Atomic update operators.
//!
//! A field whose value is an object tagged with `__op` is not a literal: it
//! describes a transformation of the stored value.
//!
//! ```ignore
//! {"count": {"__op": "Increment", "amount": -5}}
//! {"tags": {"__op": "AddUnique", "objects": ["red"]}}
//! {"members": {"__op": "AddRelation", "objects": [{"__type": "Pointer", ...}]}}
//! ```
//!
//! [`extract_ops`] pulls those fields out of a draft and [`apply_ops`] runs
//! them. Both leave the draft untouched when they fail.

use serde_json::{Number, Value};

use docdouble_core::{
    error::{StoreError, StoreResult},
    record::{OP_KEY, Record, is_truthy},
};

use crate::evaluator::{objects_are_equal, same_object_id, values_equal};

/// A parsed update operator.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    /// Adds `amount` to the field, starting from 0 when absent or null.
    Increment(Number),
    /// Appends every object, duplicates included.
    Add(Vec<Value>),
    /// Appends the objects not already present.
    AddUnique(Vec<Value>),
    /// Removes every element equal to any object.
    Remove(Vec<Value>),
    /// Removes the field.
    Delete,
    /// `Add` over a pointer list; the field becomes masked.
    AddRelation(Vec<Value>),
    /// `Remove` over a pointer list; the field becomes masked.
    RemoveRelation(Vec<Value>),
    /// Several operators applied in order to the same field.
    Batch(Vec<UpdateOp>),
}

/// Operators keyed by the field they apply to, in payload order.
pub type FieldOps = Vec<(String, UpdateOp)>;

fn operand<'v>(field: &str, value: &'v Value, name: &str) -> StoreResult<&'v Value> {
    value.get(name).ok_or_else(|| StoreError::InvalidOperand {
        field: field.to_string(),
        reason: format!("missing `{name}`"),
    })
}

fn objects(field: &str, value: &Value) -> StoreResult<Vec<Value>> {
    match operand(field, value, "objects")? {
        Value::Array(objects) => Ok(objects.clone()),
        other => Err(StoreError::InvalidOperand {
            field: field.to_string(),
            reason: format!("`objects` must be an array, got {other}"),
        }),
    }
}

impl UpdateOp {
    /// Parses an operator object. Returns `None` when `value` is a literal.
    pub fn parse(field: &str, value: &Value) -> StoreResult<Option<Self>> {
        let Some(tag) = value.as_object().and_then(|object| object.get(OP_KEY)) else {
            return Ok(None);
        };

        let op = match tag.as_str() {
            Some("Increment") => match operand(field, value, "amount")? {
                Value::Number(amount) => UpdateOp::Increment(amount.clone()),
                other => {
                    return Err(StoreError::InvalidOperand {
                        field: field.to_string(),
                        reason: format!("`amount` must be a number, got {other}"),
                    });
                }
            },
            Some("Add") => UpdateOp::Add(objects(field, value)?),
            Some("AddUnique") => UpdateOp::AddUnique(objects(field, value)?),
            Some("Remove") => UpdateOp::Remove(objects(field, value)?),
            Some("Delete") => UpdateOp::Delete,
            Some("AddRelation") => UpdateOp::AddRelation(objects(field, value)?),
            Some("RemoveRelation") => UpdateOp::RemoveRelation(objects(field, value)?),
            Some("Batch") => {
                let nested = match operand(field, value, "ops")? {
                    Value::Array(nested) => nested,
                    other => {
                        return Err(StoreError::InvalidOperand {
                            field: field.to_string(),
                            reason: format!("`ops` must be an array, got {other}"),
                        });
                    }
                };

                let mut ops = Vec::with_capacity(nested.len());
                for entry in nested {
                    match UpdateOp::parse(field, entry)? {
                        Some(op) => ops.push(op),
                        None => {
                            return Err(StoreError::InvalidOperand {
                                field: field.to_string(),
                                reason: format!("batch entry {entry} is not an operator"),
                            });
                        }
                    }
                }

                UpdateOp::Batch(ops)
            },
            Some(other) => return Err(StoreError::UnknownOperator(other.to_string())),
            None => return Err(StoreError::UnknownOperator(tag.to_string())),
        };

        Ok(Some(op))
    }

    pub fn name(&self) -> &'static str {
        match self {
            UpdateOp::Increment(_) => "Increment",
            UpdateOp::Add(_) => "Add",
            UpdateOp::AddUnique(_) => "AddUnique",
            UpdateOp::Remove(_) => "Remove",
            UpdateOp::Delete => "Delete",
            UpdateOp::AddRelation(_) => "AddRelation",
            UpdateOp::RemoveRelation(_) => "RemoveRelation",
            UpdateOp::Batch(_) => "Batch",
        }
    }

    fn touches_relation(&self) -> bool {
        match self {
            UpdateOp::AddRelation(_) | UpdateOp::RemoveRelation(_) => true,
            UpdateOp::Batch(ops) => ops.iter().any(UpdateOp::touches_relation),
            _ => false,
        }
    }
}

/// Removes every operator field from `draft` and returns the parsed operators.
///
/// When any operator is unknown or malformed the draft is left as it was.
pub fn extract_ops(draft: &mut Record) -> StoreResult<FieldOps> {
    let mut ops = FieldOps::new();

    for (field, value) in draft.iter() {
        if let Some(op) = UpdateOp::parse(field, value)? {
            ops.push((field.clone(), op));
        }
    }

    for (field, _) in &ops {
        draft.remove(field);
    }

    Ok(ops)
}

/// Applies `ops` to `draft` and returns the relation fields they touched.
///
/// The operators run on a scratch copy, so a failure leaves `draft` unchanged.
pub fn apply_ops(draft: &mut Record, ops: &[(String, UpdateOp)]) -> StoreResult<Vec<String>> {
    let mut scratch = draft.clone();
    let mut relations = Vec::new();

    for (field, op) in ops {
        apply_op(&mut scratch, field, op)?;

        if op.touches_relation() && !relations.contains(field) {
            relations.push(field.clone());
        }
    }

    *draft = scratch;

    Ok(relations)
}

fn apply_op(record: &mut Record, field: &str, op: &UpdateOp) -> StoreResult<()> {
    match op {
        UpdateOp::Increment(amount) => {
            let current = match record.get(field) {
                None | Some(Value::Null) => Number::from(0),
                Some(Value::Number(current)) => current.clone(),
                Some(other) => {
                    return Err(StoreError::InvalidOperand {
                        field: field.to_string(),
                        reason: format!("cannot increment {other}"),
                    });
                }
            };

            let sum = add_numbers(field, &current, amount)?;
            record.insert(field.to_string(), Value::Number(sum));
        },
        UpdateOp::Add(objects) | UpdateOp::AddRelation(objects) => {
            list_mut(record, field)?.extend(objects.iter().cloned());
        },
        UpdateOp::AddUnique(objects) => {
            let list = list_mut(record, field)?;

            for object in objects {
                if !list.iter().any(|entry| same_entry(entry, object)) {
                    list.push(object.clone());
                }
            }
        },
        UpdateOp::Remove(objects) | UpdateOp::RemoveRelation(objects) => match record.get_mut(field) {
            None | Some(Value::Null) => {},
            Some(Value::Array(list)) => list.retain(|item| {
                !objects
                    .iter()
                    .any(|object| objects_are_equal(Some(object), Some(item)))
            }),
            Some(_) => return Err(StoreError::MalformedArrayOp { field: field.to_string() }),
        },
        UpdateOp::Delete => {
            record.remove(field);
        },
        UpdateOp::Batch(ops) => {
            for op in ops {
                apply_op(record, field, op)?;
            }
        },
    }

    Ok(())
}

/// The list stored at `field`; an absent or falsy field starts a new one.
fn list_mut<'r>(record: &'r mut Record, field: &str) -> StoreResult<&'r mut Vec<Value>> {
    if !is_truthy(record.get(field)) {
        record.insert(field.to_string(), Value::Array(Vec::new()));
    }

    match record.get_mut(field) {
        Some(Value::Array(list)) => Ok(list),
        _ => Err(StoreError::MalformedArrayOp { field: field.to_string() }),
    }
}

fn same_entry(entry: &Value, candidate: &Value) -> bool {
    values_equal(entry, candidate) || same_object_id(entry, candidate)
}

fn add_numbers(field: &str, current: &Number, amount: &Number) -> StoreResult<Number> {
    if let (Some(a), Some(b)) = (current.as_i64(), amount.as_i64()) {
        if let Some(sum) = a.checked_add(b) {
            return Ok(Number::from(sum));
        }
    }

    let sum = current.as_f64().unwrap_or_default() + amount.as_f64().unwrap_or_default();

    Number::from_f64(sum).ok_or_else(|| StoreError::InvalidOperand {
        field: field.to_string(),
        reason: format!("{sum} is not a finite number"),
    })
}
