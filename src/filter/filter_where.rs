use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::error::FilterError;
use super::types::{FilterNode, FilterOp, FilterWhereInfo, SqlParam};

pub struct FilterWhere {
    params: Vec<SqlParam>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            params: vec![],
            param_index: starting_param_index,
        }
    }

    /// Parse a where clause into a condition tree. `Null` and `{}` parse to
    /// an empty conjunction, which matches everything.
    pub fn parse(where_data: &Value) -> Result<FilterNode, FilterError> {
        match where_data {
            Value::Null => Ok(FilterNode::And(vec![])),
            Value::Object(obj) => Self::parse_object(obj),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn parse_object(obj: &Map<String, Value>) -> Result<FilterNode, FilterError> {
        let mut nodes = Vec::with_capacity(obj.len());
        for (key, value) in obj {
            if key.starts_with('$') {
                nodes.push(Self::parse_logical_operator(key, value)?);
            } else {
                Self::validate_field(key)?;
                nodes.extend(Self::parse_field_condition(key, value)?);
            }
        }
        Ok(match nodes.len() {
            1 => nodes.remove(0),
            _ => FilterNode::And(nodes),
        })
    }

    fn parse_logical_operator(op: &str, value: &Value) -> Result<FilterNode, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                let children = arr.iter().map(Self::parse).collect::<Result<Vec<_>, _>>()?;
                Ok(if op == "$and" { FilterNode::And(children) } else { FilterNode::Or(children) })
            }
            "$not" => Ok(FilterNode::Not(Box::new(Self::parse(value)?))),
            "$nor" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData("$nor requires array".to_string()))?;
                let children = arr.iter().map(Self::parse).collect::<Result<Vec<_>, _>>()?;
                Ok(FilterNode::Not(Box::new(FilterNode::Or(children))))
            }
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(field: &str, value: &Value) -> Result<Vec<FilterNode>, FilterError> {
        match value {
            Value::Object(obj) if obj.keys().any(|k| k.starts_with('$')) => {
                let mut out = Vec::with_capacity(obj.len());
                for (op_key, op_val) in obj {
                    let operator = Self::map_operator(op_key)?;
                    Self::validate_operator_data(operator, op_val)?;
                    out.push(FilterNode::Condition(FilterWhereInfo {
                        column: field.to_string(),
                        operator,
                        data: op_val.clone(),
                    }));
                }
                Ok(out)
            }
            // Implicit equality: { field: value }
            _ => Ok(vec![FilterNode::Condition(FilterWhereInfo {
                column: field.to_string(),
                operator: FilterOp::Eq,
                data: value.clone(),
            })]),
        }
    }

    fn map_operator(op_key: &str) -> Result<FilterOp, FilterError> {
        Ok(match op_key {
            "$eq" => FilterOp::Eq,
            "$ne" | "$neq" => FilterOp::Ne,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$like" => FilterOp::Like,
            "$ilike" => FilterOp::ILike,
            "$in" => FilterOp::In,
            "$nin" => FilterOp::NIn,
            "$size" => FilterOp::Size,
            "$between" => FilterOp::Between,
            "$exists" => FilterOp::Exists,
            other => return Err(FilterError::UnsupportedOperator(other.to_string())),
        })
    }

    fn validate_operator_data(op: FilterOp, data: &Value) -> Result<(), FilterError> {
        match op {
            FilterOp::In | FilterOp::NIn if !data.is_array() => Err(FilterError::InvalidOperatorData(
                "$in/$nin require an array".to_string(),
            )),
            FilterOp::Between if data.as_array().map(|a| a.len()) != Some(2) => Err(
                FilterError::InvalidOperatorData("$between requires exactly 2 values".to_string()),
            ),
            FilterOp::Size if data.as_u64().is_none() => Err(FilterError::InvalidOperatorData(
                "$size requires a non-negative integer".to_string(),
            )),
            FilterOp::Exists if !data.is_boolean() => Err(FilterError::InvalidOperatorData(
                "$exists requires a boolean".to_string(),
            )),
            FilterOp::Like | FilterOp::ILike if !data.is_string() => Err(
                FilterError::InvalidOperatorData("$like/$ilike require a string pattern".to_string()),
            ),
            _ => Ok(()),
        }
    }

    pub fn validate_field(name: &str) -> Result<(), FilterError> {
        let mut chars = name.chars();
        let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
        if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(FilterError::InvalidField(format!("Invalid field name format: {}", name)));
        }
        Ok(())
    }

    // ========================================
    // In-memory evaluation
    // ========================================

    pub fn matches(node: &FilterNode, doc: &Map<String, Value>) -> bool {
        match node {
            FilterNode::And(children) => children.iter().all(|c| Self::matches(c, doc)),
            FilterNode::Or(children) => children.iter().any(|c| Self::matches(c, doc)),
            FilterNode::Not(child) => !Self::matches(child, doc),
            FilterNode::Condition(info) => Self::matches_condition(info, doc.get(&info.column)),
        }
    }

    fn matches_condition(info: &FilterWhereInfo, field: Option<&Value>) -> bool {
        match info.operator {
            FilterOp::Eq => Self::equals(field, &info.data),
            FilterOp::Ne => !Self::equals(field, &info.data),
            FilterOp::Gt => Self::ordered(field, &info.data, |o| o == Ordering::Greater),
            FilterOp::Gte => Self::ordered(field, &info.data, |o| o != Ordering::Less),
            FilterOp::Lt => Self::ordered(field, &info.data, |o| o == Ordering::Less),
            FilterOp::Lte => Self::ordered(field, &info.data, |o| o != Ordering::Greater),
            FilterOp::In => info
                .data
                .as_array()
                .map(|values| values.iter().any(|v| Self::equals(field, v)))
                .unwrap_or(false),
            FilterOp::NIn => !info
                .data
                .as_array()
                .map(|values| values.iter().any(|v| Self::equals(field, v)))
                .unwrap_or(false),
            FilterOp::Size => match (field, info.data.as_u64()) {
                (Some(Value::Array(items)), Some(n)) => items.len() as u64 == n,
                _ => false,
            },
            FilterOp::Between => match info.data.as_array() {
                Some(bounds) if bounds.len() == 2 => {
                    Self::ordered(field, &bounds[0], |o| o != Ordering::Less)
                        && Self::ordered(field, &bounds[1], |o| o != Ordering::Greater)
                }
                _ => false,
            },
            FilterOp::Exists => {
                let present = field.is_some();
                info.data.as_bool().map(|want| want == present).unwrap_or(false)
            }
            FilterOp::Like | FilterOp::ILike => match (field.and_then(Value::as_str), info.data.as_str()) {
                (Some(text), Some(pattern)) => {
                    if info.operator == FilterOp::ILike {
                        like_match(&text.to_lowercase(), &pattern.to_lowercase())
                    } else {
                        like_match(text, pattern)
                    }
                }
                _ => false,
            },
        }
    }

    /// Equality with document-store semantics: a missing field equals null,
    /// and an array field equals any scalar it contains.
    fn equals(field: Option<&Value>, expected: &Value) -> bool {
        match (field, expected) {
            (None, Value::Null) => true,
            (None, _) => false,
            (Some(Value::Array(items)), e) if !e.is_array() => items.iter().any(|item| item == e),
            (Some(actual), e) => Self::scalar_eq(actual, e),
        }
    }

    fn scalar_eq(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
            _ => a == b,
        }
    }

    fn ordered(field: Option<&Value>, bound: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
        match field.and_then(|f| compare_scalars(f, bound)) {
            Some(ordering) => accept(ordering),
            None => false,
        }
    }

    // ========================================
    // SQL generation (JSONB documents in column "doc")
    // ========================================

    /// The jsonb expression conditions on `field` are written against.
    /// Reference indexes are built on this same expression.
    pub fn field_expr(field: &str) -> String {
        format!("doc->'{}'", field)
    }

    pub fn generate(node: &FilterNode, starting_param_index: usize) -> (String, Vec<SqlParam>) {
        let mut filter_where = Self::new(starting_param_index);
        let sql = filter_where.build(node);
        (sql, filter_where.params)
    }

    fn build(&mut self, node: &FilterNode) -> String {
        match node {
            FilterNode::And(children) if children.is_empty() => "1=1".to_string(),
            FilterNode::Or(children) if children.is_empty() => "1=0".to_string(),
            FilterNode::And(children) => self.join(children, " AND "),
            FilterNode::Or(children) => self.join(children, " OR "),
            FilterNode::Not(child) => format!("NOT COALESCE(({}), false)", self.build(child)),
            FilterNode::Condition(info) => self.build_condition(info),
        }
    }

    fn join(&mut self, children: &[FilterNode], joiner: &str) -> String {
        let parts: Vec<String> = children.iter().map(|c| format!("({})", self.build(c))).collect();
        parts.join(joiner)
    }

    fn build_condition(&mut self, condition: &FilterWhereInfo) -> String {
        let column = Self::field_expr(&condition.column);
        match condition.operator {
            FilterOp::Eq => self.eq_sql(&column, &condition.data),
            FilterOp::Ne => format!("NOT COALESCE(({}), false)", self.eq_sql(&column, &condition.data)),
            FilterOp::Gt => format!("{} > {}", column, self.param(condition.data.clone())),
            FilterOp::Gte => format!("{} >= {}", column, self.param(condition.data.clone())),
            FilterOp::Lt => format!("{} < {}", column, self.param(condition.data.clone())),
            FilterOp::Lte => format!("{} <= {}", column, self.param(condition.data.clone())),
            FilterOp::Like | FilterOp::ILike => {
                let keyword = if condition.operator == FilterOp::ILike { "ILIKE" } else { "LIKE" };
                let pattern = condition.data.as_str().unwrap_or_default().to_string();
                format!("doc->>'{}' {} {}", condition.column, keyword, self.text_param(pattern))
            }
            FilterOp::In | FilterOp::NIn => {
                let values = condition.data.as_array().cloned().unwrap_or_default();
                let any = if values.is_empty() {
                    "1=0".to_string()
                } else {
                    let parts: Vec<String> = values.iter().map(|v| format!("({})", self.eq_sql(&column, v))).collect();
                    parts.join(" OR ")
                };
                if condition.operator == FilterOp::In {
                    any
                } else {
                    format!("NOT COALESCE(({}), false)", any)
                }
            }
            FilterOp::Size => format!(
                "(jsonb_typeof({col}) = 'array' AND jsonb_array_length({col}) = {n})",
                col = column,
                n = condition.data.as_u64().unwrap_or(0)
            ),
            FilterOp::Between => {
                let bounds = condition.data.as_array().cloned().unwrap_or_default();
                let low = self.param(bounds.first().cloned().unwrap_or(Value::Null));
                let high = self.param(bounds.get(1).cloned().unwrap_or(Value::Null));
                format!("({col} >= {low} AND {col} <= {high})", col = column, low = low, high = high)
            }
            FilterOp::Exists => {
                if condition.data.as_bool().unwrap_or(false) {
                    format!("doc ? '{}'", condition.column)
                } else {
                    format!("NOT (doc ? '{}')", condition.column)
                }
            }
        }
    }

    fn eq_sql(&mut self, column: &str, data: &Value) -> String {
        match data {
            Value::Null => format!("COALESCE({}, 'null'::jsonb) = 'null'::jsonb", column),
            // Containment gives scalar equality plus array membership
            Value::Array(_) | Value::Object(_) => format!("{} = {}", column, self.param(data.clone())),
            _ => format!("{} @> {}", column, self.param(data.clone())),
        }
    }

    fn param(&mut self, value: Value) -> String {
        self.params.push(SqlParam::Json(value));
        self.param_index += 1;
        format!("${}", self.param_index)
    }

    fn text_param(&mut self, value: String) -> String {
        self.params.push(SqlParam::Text(value));
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

/// Ordering between two scalars of the same JSON kind. Mixed kinds are
/// incomparable.
pub fn compare_scalars(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// SQL LIKE matching: `%` matches any run, `_` any single character.
fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut t, mut p) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            star = Some((p, t));
            p += 1;
        } else if let Some((sp, st)) = star {
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == '%' {
        p += 1;
    }
    p == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn check(where_data: Value, document: Value) -> bool {
        let node = FilterWhere::parse(&where_data).unwrap();
        FilterWhere::matches(&node, &doc(document))
    }

    #[test]
    fn ne_true_matches_missing_and_false() {
        let clause = json!({ "isDeleted": { "$ne": true } });
        assert!(check(clause.clone(), json!({ "content": "x" })));
        assert!(check(clause.clone(), json!({ "isDeleted": false })));
        assert!(!check(clause, json!({ "isDeleted": true })));
    }

    #[test]
    fn equality_matches_array_membership() {
        let clause = json!({ "likes": "u1" });
        assert!(check(clause.clone(), json!({ "likes": ["u0", "u1"] })));
        assert!(!check(clause, json!({ "likes": ["u2"] })));
    }

    #[test]
    fn logical_operators_compose() {
        let clause = json!({
            "$or": [{ "status": "published" }, { "featured": true }],
            "viewCount": { "$gte": 10 }
        });
        assert!(check(clause.clone(), json!({ "status": "draft", "featured": true, "viewCount": 10 })));
        assert!(!check(clause.clone(), json!({ "status": "published", "viewCount": 3 })));
        assert!(!check(json!({ "$not": { "status": "draft" } }), json!({ "status": "draft" })));
    }

    #[test]
    fn in_and_nin() {
        assert!(check(json!({ "author": { "$in": ["a", "b"] } }), json!({ "author": "b" })));
        assert!(!check(json!({ "author": { "$nin": ["a", "b"] } }), json!({ "author": "b" })));
        assert!(!check(json!({ "author": { "$in": [] } }), json!({ "author": "b" })));
    }

    #[test]
    fn ilike_is_case_insensitive() {
        assert!(check(json!({ "title": { "$ilike": "%rust%" } }), json!({ "title": "Learning Rust Today" })));
        assert!(!check(json!({ "title": { "$like": "%rust%" } }), json!({ "title": "Learning Rust Today" })));
        assert!(like_match("abc", "a_c"));
        assert!(!like_match("abcd", "a_c"));
    }

    #[test]
    fn rejects_unknown_operator_and_bad_field() {
        assert!(matches!(
            FilterWhere::parse(&json!({ "a": { "$regex": "x" } })),
            Err(FilterError::UnsupportedOperator(_))
        ));
        assert!(matches!(
            FilterWhere::parse(&json!({ "a'; drop": 1 })),
            Err(FilterError::InvalidField(_))
        ));
        assert!(matches!(
            FilterWhere::parse(&json!({ "a": { "$in": 3 } })),
            Err(FilterError::InvalidOperatorData(_))
        ));
    }

    #[test]
    fn generates_null_safe_ne_sql() {
        let node = FilterWhere::parse(&json!({ "isDeleted": { "$ne": true } })).unwrap();
        let (sql, params) = FilterWhere::generate(&node, 0);
        assert_eq!(sql, "NOT COALESCE((doc->'isDeleted' @> $1), false)");
        assert_eq!(params, vec![SqlParam::Json(json!(true))]);
    }

    #[test]
    fn generates_and_with_numbered_params() {
        let node = FilterWhere::parse(&json!({
            "$and": [{ "post": "p1" }, { "isDeleted": { "$ne": true } }]
        }))
        .unwrap();
        let (sql, params) = FilterWhere::generate(&node, 0);
        assert_eq!(
            sql,
            "(doc->'post' @> $1) AND (NOT COALESCE((doc->'isDeleted' @> $2), false))"
        );
        assert_eq!(params.len(), 2);
    }
}
