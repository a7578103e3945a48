//! Where-clause evaluation for in-memory records.
//!
//! This module provides the matcher: the equality rule shared with the
//! mutator, ordering over deserialized values, and a [`QueryVisitor`] that
//! evaluates a parsed [`Expr`] against one record. Operators that run
//! sub-queries (`$select`, `$inQuery`, `$relatedTo`) read the same
//! [`StoreState`] the record lives in.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use regex_lite::Regex;
use serde_json::Value;

use docdouble_core::{
    error::{StoreError, StoreResult},
    query::{Constraint, Expr, FieldPath, Operator, QueryVisitor},
    record::{Pointer, Record, date_instant, is_date, is_truthy, object_id_of, parse_iso, OBJECT_ID},
};

use crate::state::StoreState;

/// Ordering view of a deserialized value.
///
/// Numbers are normalized to f64 and tagged Dates become instants. ISO
/// strings compare against instants, since stored timestamps are strings.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime<Utc>),
    String(&'a str),
    /// Arrays and plain objects have no ordering.
    Composite,
}

impl<'a> From<&'a Value> for Comparable<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Null => Comparable::Null,
            Value::Bool(value) => Comparable::Bool(*value),
            Value::Number(value) => value
                .as_f64()
                .map(Comparable::Number)
                .unwrap_or(Comparable::Null),
            Value::String(value) => Comparable::String(value),
            Value::Object(_) => match date_instant(value) {
                Some(instant) => Comparable::DateTime(instant),
                None => Comparable::Composite,
            },
            Value::Array(_) => Comparable::Composite,
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::DateTime(b)) => parse_iso(a)?.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::String(b)) => a.partial_cmp(&parse_iso(b)?),
            _ => None,
        }
    }
}

impl Comparable<'_> {
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Bool(_) => 1,
            Comparable::Number(_) => 2,
            Comparable::DateTime(_) => 3,
            Comparable::String(_) => 4,
            Comparable::Composite => 5,
        }
    }
}

/// Total order used by `order`: values of different kinds order by kind,
/// absent and `null` first.
pub(crate) fn sort_order(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    let left = left.map(Comparable::from).unwrap_or(Comparable::Null);
    let right = right.map(Comparable::from).unwrap_or(Comparable::Null);

    left.rank()
        .cmp(&right.rank())
        .then_with(|| match (&left, &right) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.total_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.cmp(b),
            _ => Ordering::Equal,
        })
}

/// Structural equality with numbers compared numerically.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| values_equal(a, b))
        },
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter().all(|(key, value)| b.get(key).is_some_and(|other| values_equal(value, other)))
        },
        _ => left == right,
    }
}

/// Both values carry the same `objectId` (pointer vs record, or two pointers).
pub fn same_object_id(left: &Value, right: &Value) -> bool {
    matches!((object_id_of(left), object_id_of(right)), (Some(a), Some(b)) if a == b)
}

fn instant_of(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => parse_iso(text),
        _ => date_instant(value),
    }
}

/// At least one side is a tagged Date and both denote the same instant.
fn same_instant(left: &Value, right: &Value) -> bool {
    if !is_date(left) && !is_date(right) {
        return false;
    }

    matches!((instant_of(left), instant_of(right)), (Some(a), Some(b)) if a == b)
}

/// The equality rule used by `$eq`, `$in`, `$all`, `$select` and `Remove`.
///
/// `field` is the stored side: when it is an array, a param equal to any
/// element counts as equal, so the rule is not symmetric.
pub fn objects_are_equal(field: Option<&Value>, param: Option<&Value>) -> bool {
    let (field, param) = match (field, param) {
        (None | Some(Value::Null), None | Some(Value::Null)) => return true,
        (None | Some(Value::Null), _) | (_, None | Some(Value::Null)) => return false,
        (Some(field), Some(param)) => (field, param),
    };

    if values_equal(field, param) || same_object_id(field, param) {
        return true;
    }

    if let Value::Array(elements) = field {
        if elements.iter().any(|element| objects_are_equal(Some(element), Some(param))) {
            return true;
        }
    }

    same_instant(field, param)
}

fn compare(field: Option<&Value>, param: &Value) -> Option<Ordering> {
    Comparable::from(field?).partial_cmp(&Comparable::from(param))
}

/// Replaces `\Q...\E` quoting with the escaped literal text.
fn unquote_pattern(pattern: &str) -> String {
    let mut source = String::with_capacity(pattern.len());
    let mut rest = pattern;

    while let Some(start) = rest.find("\\Q") {
        source.push_str(&rest[..start]);
        let quoted = &rest[start + 2..];

        match quoted.find("\\E") {
            Some(end) => {
                source.push_str(&regex_lite::escape(&quoted[..end]));
                rest = &quoted[end + 2..];
            },
            None => {
                source.push_str(&regex_lite::escape(quoted));
                rest = "";
            },
        }
    }

    source.push_str(rest);
    source
}

pub(crate) fn compile_pattern(pattern: &str, options: Option<&str>) -> StoreResult<Regex> {
    let flags = options
        .unwrap_or_default()
        .chars()
        .filter(|flag| matches!(flag, 'i' | 'm' | 's' | 'x'))
        .collect::<String>();

    let source = if flags.is_empty() {
        unquote_pattern(pattern)
    } else {
        format!("(?{flags}){}", unquote_pattern(pattern))
    };

    Regex::new(&source).map_err(|err| StoreError::InvalidQuery(format!("invalid $regex {pattern:?}: {err}")))
}

fn as_list(param: &Value) -> &[Value] {
    match param {
        Value::Array(items) => items.as_slice(),
        other => std::slice::from_ref(other),
    }
}

/// Resolves a possibly dotted path.
///
/// The outer `None` means an intermediate segment was absent or falsy, which
/// fails the key outright. The inner option is the field value itself.
fn resolve<'r>(record: &'r Record, path: &FieldPath) -> Option<Option<&'r Value>> {
    let mut object = record;

    for (depth, parent) in path.parents.iter().enumerate() {
        let next = object.get(parent);

        if !is_truthy(next) {
            return None;
        }

        match next.and_then(Value::as_object) {
            Some(nested) => object = nested,
            None if depth + 1 == path.parents.len() => return Some(None),
            None => return None,
        }
    }

    Some(object.get(&path.key))
}

fn invalid(op: Operator, detail: &str) -> StoreError {
    StoreError::InvalidQuery(format!("{} {detail}", op.as_str()))
}

/// Evaluates a parsed where clause against one record of `class_name`.
pub(crate) struct DocumentEvaluator<'a> {
    state: &'a StoreState,
    class_name: &'a str,
    record: &'a Record,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(state: &'a StoreState, class_name: &'a str, record: &'a Record) -> Self {
        Self { state, class_name, record }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> StoreResult<bool> {
        self.visit_expr(expr)
    }

    /// Stored records of `class_name` matching `expr`, in creation order.
    pub fn matching<'s>(
        state: &'s StoreState,
        class_name: &str,
        expr: &Expr,
    ) -> StoreResult<Vec<&'s Record>> {
        let mut matches = Vec::new();

        for record in state.records(class_name) {
            if DocumentEvaluator::new(state, class_name, record).evaluate(expr)? {
                matches.push(record);
            }
        }

        Ok(matches)
    }

    /// Deep copies of the records of `class_name` matching `expr`.
    pub fn filter_records(state: &StoreState, class_name: &str, expr: &Expr) -> StoreResult<Vec<Record>> {
        Ok(
            Self::matching(state, class_name, expr)?
                .into_iter()
                .cloned()
                .collect::<Vec<_>>()
        )
    }

    /// Runs a `{className, where}` sub-query.
    fn sub_query(&self, op: Operator, query: &Value) -> StoreResult<Vec<&'a Record>> {
        let class_name = query
            .get("className")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid(op, "needs a className"))?;
        let expr = Expr::parse(query.get("where").unwrap_or(&Value::Null))?;

        Self::matching(self.state, class_name, &expr)
    }

    fn select(&self, op: Operator, field: Option<&Value>, param: &Value) -> StoreResult<bool> {
        let key = param
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid(op, "needs a key"))?;
        let query = param
            .get("query")
            .ok_or_else(|| invalid(op, "needs a query"))?;

        Ok(
            self.sub_query(op, query)?
                .iter()
                .any(|found| objects_are_equal(found.get(key), field))
        )
    }

    fn in_query(&self, op: Operator, field: Option<&Value>, param: &Value) -> StoreResult<bool> {
        let Some(target) = field.and_then(object_id_of) else {
            return Ok(false);
        };

        Ok(
            self.sub_query(op, param)?
                .iter()
                .any(|found| found.get(OBJECT_ID).and_then(Value::as_str) == Some(target))
        )
    }

    /// Is `subject` among the pointers of the owner's relation field?
    fn related_to(&self, param: &Value, subject: Option<Pointer>) -> StoreResult<bool> {
        let owner = param
            .get("object")
            .and_then(Pointer::from_value)
            .ok_or_else(|| invalid(Operator::RelatedTo, "needs an object pointer"))?;
        let key = param
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid(Operator::RelatedTo, "needs a key"))?;

        let Some(subject) = subject else {
            return Ok(false);
        };

        let members = self
            .state
            .fetch(&owner.class_name, &owner.object_id)
            .and_then(|record| record.get(key))
            .map(as_list)
            .unwrap_or_default();

        Ok(
            members
                .iter()
                .filter_map(Pointer::from_value)
                .any(|member| member == subject)
        )
    }

    fn apply(
        &self,
        op: Operator,
        field: Option<&Value>,
        param: &Value,
        options: Option<&str>,
    ) -> StoreResult<bool> {
        Ok(match op {
            Operator::Exists => is_truthy(field) == is_truthy(Some(param)),
            Operator::In => as_list(param)
                .iter()
                .any(|item| objects_are_equal(field, Some(item))),
            Operator::Nin => !as_list(param)
                .iter()
                .any(|item| objects_are_equal(field, Some(item))),
            Operator::Eq => objects_are_equal(field, Some(param)),
            Operator::Ne => !objects_are_equal(field, Some(param)),
            Operator::Lt => compare(field, param) == Some(Ordering::Less),
            Operator::Lte => matches!(compare(field, param), Some(Ordering::Less | Ordering::Equal)),
            Operator::Gt => compare(field, param) == Some(Ordering::Greater),
            Operator::Gte => matches!(compare(field, param), Some(Ordering::Greater | Ordering::Equal)),
            Operator::Regex => {
                let pattern = param
                    .as_str()
                    .ok_or_else(|| invalid(op, "expects a string pattern"))?;

                match field.and_then(Value::as_str) {
                    Some(text) => compile_pattern(pattern, options)?.is_match(text),
                    None => false,
                }
            },
            // consumed by a sibling $regex
            Operator::Options => true,
            Operator::Select => self.select(op, field, param)?,
            Operator::DontSelect => !self.select(op, field, param)?,
            Operator::InQuery => self.in_query(op, field, param)?,
            Operator::NotInQuery => !self.in_query(op, field, param)?,
            Operator::All => match field {
                Some(Value::Array(_)) => as_list(param)
                    .iter()
                    .all(|item| objects_are_equal(field, Some(item))),
                _ => false,
            },
            Operator::RelatedTo => self.related_to(param, field.and_then(Pointer::from_value))?,
        })
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = StoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_record(&mut self, op: Operator, param: &Value) -> Result<Self::Output, Self::Error> {
        if op == Operator::RelatedTo {
            let subject = self
                .record
                .get(OBJECT_ID)
                .and_then(Value::as_str)
                .map(|object_id| Pointer::new(self.class_name, object_id));

            return self.related_to(param, subject);
        }

        let whole = Value::Object(self.record.clone());
        self.apply(op, Some(&whole), param, None)
    }

    fn visit_equals(&mut self, path: &FieldPath, value: &Value) -> Result<Self::Output, Self::Error> {
        Ok(match resolve(self.record, path) {
            Some(field) => objects_are_equal(field, Some(value)),
            None => false,
        })
    }

    fn visit_constraints(
        &mut self,
        path: &FieldPath,
        constraints: &[Constraint],
    ) -> Result<Self::Output, Self::Error> {
        let Some(field) = resolve(self.record, path) else {
            return Ok(false);
        };

        let options = constraints.iter().find_map(|constraint| match constraint {
            Constraint::Operator(Operator::Options, flags) => flags.as_str(),
            _ => None,
        });

        for constraint in constraints {
            let holds = match constraint {
                Constraint::Operator(op, param) => self.apply(*op, field, param, options)?,
                Constraint::SubKey(key, param) => {
                    objects_are_equal(field.and_then(|value| value.get(key)), Some(param))
                },
            };

            if !holds {
                return Ok(false);
            }
        }

        Ok(true)
    }
}
