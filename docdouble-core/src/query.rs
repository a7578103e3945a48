//! Where clauses, read parameters and the visitor used to evaluate them.
//!
//! A where clause arrives as a JSON object in the hosted service's query
//! language:
//!
//! ```ignore
//! {
//!     "price": {"$gte": 10, "$lt": 30},
//!     "owner.name": "Alice",
//!     "$or": [{"tag": "red"}, {"tag": "blue"}]
//! }
//! ```
//!
//! [`Expr::parse`] turns it into an expression tree once, so backends only
//! walk typed nodes. Operators are the closed [`Operator`] set; anything else
//! inside a constraint object is a literal sub-key compared for equality.
//!
//! [`Query`] carries the remaining read parameters (`include`, `count`,
//! `limit`, `skip`, `order` and relation redirection).

use serde_json::{Map, Value};

use crate::{
    error::{StoreError, StoreResult},
    record::{is_date, is_pointer},
};

/// Query operators understood inside a where clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Field truthiness equals the boolean parameter.
    Exists,
    /// Field equals any element of the parameter list.
    In,
    /// Field equals no element of the parameter list.
    Nin,
    /// Field equals the parameter.
    Eq,
    /// Field does not equal the parameter.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Field matches the pattern.
    Regex,
    /// Flags for a sibling `$regex`.
    Options,
    /// Field equals a key of some sub-query match.
    Select,
    /// Field equals a key of no sub-query match.
    DontSelect,
    /// Field points at some sub-query match.
    InQuery,
    /// Field points at no sub-query match.
    NotInQuery,
    /// Array field contains every element of the parameter list.
    All,
    /// Record is a member of another record's relation field.
    RelatedTo,
}

impl Operator {
    /// Looks up an operator by its `$`-prefixed key.
    pub fn from_key(key: &str) -> Option<Self> {
        let op = match key {
            "$exists" => Operator::Exists,
            "$in" => Operator::In,
            "$nin" => Operator::Nin,
            "$eq" => Operator::Eq,
            "$ne" => Operator::Ne,
            "$lt" => Operator::Lt,
            "$lte" => Operator::Lte,
            "$gt" => Operator::Gt,
            "$gte" => Operator::Gte,
            "$regex" => Operator::Regex,
            "$options" => Operator::Options,
            "$select" => Operator::Select,
            "$dontSelect" => Operator::DontSelect,
            "$inQuery" => Operator::InQuery,
            "$notInQuery" => Operator::NotInQuery,
            "$all" => Operator::All,
            "$relatedTo" => Operator::RelatedTo,
            _ => return None,
        };

        Some(op)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Exists => "$exists",
            Operator::In => "$in",
            Operator::Nin => "$nin",
            Operator::Eq => "$eq",
            Operator::Ne => "$ne",
            Operator::Lt => "$lt",
            Operator::Lte => "$lte",
            Operator::Gt => "$gt",
            Operator::Gte => "$gte",
            Operator::Regex => "$regex",
            Operator::Options => "$options",
            Operator::Select => "$select",
            Operator::DontSelect => "$dontSelect",
            Operator::InQuery => "$inQuery",
            Operator::NotInQuery => "$notInQuery",
            Operator::All => "$all",
            Operator::RelatedTo => "$relatedTo",
        }
    }
}

/// A possibly dotted field reference such as `owner.address.city`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    /// Segments to descend through before reading `key`.
    pub parents: Vec<String>,
    /// The final segment.
    pub key: String,
}

impl FieldPath {
    pub fn parse(path: &str) -> Self {
        let mut segments = path
            .split('.')
            .map(str::to_string)
            .collect::<Vec<_>>();
        // split always yields at least one segment
        let key = segments.pop().unwrap_or_default();

        Self { parents: segments, key }
    }
}

/// One entry of a constraint object such as `{"$gt": 3, "$lt": 9}`.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// A recognized operator and its parameter.
    Operator(Operator, Value),
    /// Any other key: `field[key]` must equal the value.
    SubKey(String, Value),
}

/// How a field is tested.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldTest {
    /// Single equality test against the raw field value.
    Equals(Value),
    /// Every constraint must hold.
    Constraints(Vec<Constraint>),
}

/// A parsed where clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Every expression must match. An empty list matches everything.
    And(Vec<Expr>),
    /// Any expression must match. An empty list matches nothing.
    Or(Vec<Expr>),
    /// An operator used as a top-level key, applied to the whole record.
    Record {
        op: Operator,
        param: Value,
    },
    /// A test on one field.
    Field {
        path: FieldPath,
        test: FieldTest,
    },
}

impl Expr {
    /// An expression matching every record.
    pub fn match_all() -> Self {
        Expr::And(Vec::new())
    }

    /// Parses a where clause.
    ///
    /// `null` parses to [`Expr::match_all`]. A clause holding `$or` (or
    /// `$and`) is that combinator alone; its other keys are ignored.
    pub fn parse(where_clause: &Value) -> StoreResult<Self> {
        let clause = match where_clause {
            Value::Object(clause) => clause,
            Value::Null => return Ok(Expr::match_all()),
            other => {
                return Err(StoreError::InvalidQuery(format!(
                    "where clause must be an object, got {other}"
                )));
            }
        };

        if let Some(branches) = clause.get("$or") {
            return Ok(Expr::Or(Self::parse_list("$or", branches)?));
        }

        if let Some(branches) = clause.get("$and") {
            return Ok(Expr::And(Self::parse_list("$and", branches)?));
        }

        Ok(Expr::And(
            clause
                .iter()
                .map(|(key, value)| Self::parse_key(key, value))
                .collect()
        ))
    }

    fn parse_list(name: &str, branches: &Value) -> StoreResult<Vec<Expr>> {
        match branches {
            Value::Array(branches) => branches
                .iter()
                .map(Expr::parse)
                .collect(),
            other => Err(StoreError::InvalidQuery(format!(
                "{name} expects an array of clauses, got {other}"
            ))),
        }
    }

    fn parse_key(key: &str, value: &Value) -> Expr {
        if let Some(op) = Operator::from_key(key) {
            return Expr::Record { op, param: value.clone() };
        }

        let plain_object = value.is_object() && !is_pointer(value) && !is_date(value);

        let test = match value {
            Value::Object(constraints) if plain_object => FieldTest::Constraints(
                constraints
                    .iter()
                    .map(|(name, param)| match Operator::from_key(name) {
                        Some(op) => Constraint::Operator(op, param.clone()),
                        None => Constraint::SubKey(name.clone(), param.clone()),
                    })
                    .collect()
            ),
            _ => FieldTest::Equals(value.clone()),
        };

        Expr::Field { path: FieldPath::parse(key), test }
    }

    /// Returns the parameter of a top-level `$relatedTo`, if the clause has one.
    pub fn related_to(&self) -> Option<&Value> {
        match self {
            Expr::Record { op: Operator::RelatedTo, param } => Some(param),
            Expr::And(exprs) => exprs.iter().find_map(|expr| match expr {
                Expr::Record { op: Operator::RelatedTo, param } => Some(param),
                _ => None,
            }),
            _ => None,
        }
    }
}

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

/// One sort key for query results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl Sort {
    /// Parses an `order` parameter such as `"score,-createdAt"`.
    pub fn parse_order(order: &str) -> Vec<Sort> {
        order
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(|key| match key.strip_prefix('-') {
                Some(field) => Sort { field: field.to_string(), direction: SortDirection::Desc },
                None => Sort { field: key.to_string(), direction: SortDirection::Asc },
            })
            .collect()
    }
}

/// A dot-separated include path split into segments.
pub type IncludePath = Vec<String>;

/// Parses a comma-separated include parameter such as `"author,author.team"`.
pub fn parse_include(include: &str) -> Vec<IncludePath> {
    include
        .split(',')
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(|path| path.split('.').map(str::to_string).collect())
        .collect()
}

/// Read parameters of a class query.
///
/// # Example
///
/// ```ignore
/// use docdouble::query::Query;
/// use serde_json::json;
///
/// let query = Query::from_payload(&json!({
///     "where": {"price": {"$gt": 10}},
///     "include": "brand",
///     "limit": 20,
/// }))?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Query {
    /// Optional filter expression to match records.
    pub filter: Option<Expr>,
    /// Pointer paths to dereference in the results.
    pub include: Vec<IncludePath>,
    /// Collapse the response to a count.
    pub count: bool,
    /// Maximum number of records to return.
    pub limit: Option<usize>,
    /// Number of records to skip (for pagination).
    pub offset: Option<usize>,
    /// Sort keys, most significant first.
    pub sort: Vec<Sort>,
    /// Relation key whose target class the query should be redirected to.
    pub redirect_key: Option<String>,
}

impl Query {
    /// Creates a new empty query with no filters or limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads query parameters from a read payload.
    ///
    /// `where` may be an object or a JSON-encoded string; `limit` and `skip`
    /// may be numbers or numeric strings; `count` accepts `true`, `1` or
    /// `"1"`.
    pub fn from_payload(payload: &Value) -> StoreResult<Self> {
        let params = match payload {
            Value::Object(params) => params,
            Value::Null => return Ok(Self::new()),
            other => {
                return Err(StoreError::InvalidQuery(format!(
                    "read parameters must be an object, got {other}"
                )));
            }
        };

        let filter = match params.get("where") {
            None | Some(Value::Null) => None,
            Some(Value::String(encoded)) => Some(Expr::parse(&serde_json::from_str(encoded)?)?),
            Some(clause) => Some(Expr::parse(clause)?),
        };

        let include = match params.get("include") {
            Some(Value::String(paths)) => parse_include(paths),
            Some(Value::Array(paths)) => paths
                .iter()
                .filter_map(Value::as_str)
                .flat_map(parse_include)
                .collect(),
            _ => Vec::new(),
        };

        let sort = params
            .get("order")
            .and_then(Value::as_str)
            .map(Sort::parse_order)
            .unwrap_or_default();

        Ok(Self {
            filter,
            include,
            count: params.get("count").is_some_and(flag),
            limit: window_param(params, "limit")?,
            offset: window_param(params, "skip")?,
            sort,
            redirect_key: params
                .get("redirectClassNameForKey")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

fn flag(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => text == "1" || text == "true",
        _ => false,
    }
}

fn window_param(params: &Map<String, Value>, name: &str) -> StoreResult<Option<usize>> {
    let invalid = || StoreError::InvalidQuery(format!("{name} must be a non-negative integer"));

    match params.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(invalid),
        Some(Value::String(text)) => text
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

/// Walks a parsed where clause.
///
/// Backends implement this to evaluate an [`Expr`] against their own record
/// representation. [`QueryVisitor::visit_expr`] dispatches on the node type.
pub trait QueryVisitor {
    type Output;
    type Error: Into<StoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_record(&mut self, op: Operator, param: &Value) -> Result<Self::Output, Self::Error>;
    fn visit_equals(&mut self, path: &FieldPath, value: &Value) -> Result<Self::Output, Self::Error>;
    fn visit_constraints(
        &mut self,
        path: &FieldPath,
        constraints: &[Constraint],
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Record { op, param } => self.visit_record(*op, param),
            Expr::Field { path, test: FieldTest::Equals(value) } => self.visit_equals(path, value),
            Expr::Field { path, test: FieldTest::Constraints(constraints) } => {
                self.visit_constraints(path, constraints)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_pointers_and_dates_parse_as_equality() {
        let pointer = json!({"__type": "Pointer", "className": "Brand", "objectId": "b1"});
        let date = json!({"__type": "Date", "iso": "2026-01-01T00:00:00.000Z"});

        for value in [json!(30), pointer, date] {
            let expr = Expr::parse(&json!({"field": value.clone()})).unwrap();
            assert_eq!(
                expr,
                Expr::And(vec![Expr::Field {
                    path: FieldPath::parse("field"),
                    test: FieldTest::Equals(value),
                }])
            );
        }
    }

    #[test]
    fn constraint_objects_split_operators_from_sub_keys() {
        let expr = Expr::parse(&json!({"size": {"$gt": 3, "unit": "cm"}})).unwrap();

        let Expr::And(exprs) = expr else { panic!("expected conjunction") };
        let Expr::Field { test: FieldTest::Constraints(constraints), .. } = &exprs[0] else {
            panic!("expected constraints");
        };

        assert!(constraints.contains(&Constraint::Operator(Operator::Gt, json!(3))));
        assert!(constraints.contains(&Constraint::SubKey("unit".into(), json!("cm"))));
    }

    #[test]
    fn or_excludes_sibling_keys() {
        let expr = Expr::parse(&json!({"$or": [{"a": 1}], "b": 2})).unwrap();
        assert!(matches!(expr, Expr::Or(ref branches) if branches.len() == 1));

        assert!(matches!(
            Expr::parse(&json!({"$or": {"a": 1}})),
            Err(StoreError::InvalidQuery(_))
        ));
    }

    #[test]
    fn operator_keys_apply_to_the_whole_record() {
        let param = json!({"object": {"__type": "Pointer", "className": "Team", "objectId": "t1"}, "key": "members"});
        let expr = Expr::parse(&json!({"$relatedTo": param.clone()})).unwrap();

        assert_eq!(expr.related_to(), Some(&param));

        let expr = Expr::parse(&json!({"$nin": [], "price": 3})).unwrap();
        assert_eq!(
            expr,
            Expr::And(vec![
                Expr::Record { op: Operator::Nin, param: json!([]) },
                Expr::Field { path: FieldPath::parse("price"), test: FieldTest::Equals(json!(3)) },
            ])
        );
    }

    #[test]
    fn dotted_paths_split_into_parents_and_key() {
        let path = FieldPath::parse("owner.address.city");
        assert_eq!(path.parents, vec!["owner".to_string(), "address".to_string()]);
        assert_eq!(path.key, "city");
    }

    #[test]
    fn read_parameters_accept_wire_encodings() {
        let query = Query::from_payload(&json!({
            "where": "{\"price\": 30}",
            "include": "brand,brand.owner",
            "count": 1,
            "limit": "5",
            "skip": 2,
            "order": "-price,name",
            "redirectClassNameForKey": "members",
        }))
        .unwrap();

        assert!(query.filter.is_some());
        assert_eq!(query.include, vec![vec!["brand".to_string()], vec!["brand".to_string(), "owner".to_string()]]);
        assert!(query.count);
        assert_eq!(query.limit, Some(5));
        assert_eq!(query.offset, Some(2));
        assert_eq!(query.sort[0], Sort { field: "price".into(), direction: SortDirection::Desc });
        assert_eq!(query.sort[1].direction, SortDirection::Asc);
        assert_eq!(query.redirect_key.as_deref(), Some("members"));
    }

    #[test]
    fn negative_windows_are_rejected() {
        assert!(matches!(
            Query::from_payload(&json!({"limit": -1})),
            Err(StoreError::InvalidQuery(_))
        ));
    }
}
