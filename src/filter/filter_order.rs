use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::error::FilterError;
use super::filter_where::{compare_scalars, FilterWhere};
use super::types::{FilterOrderInfo, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    pub fn validate_and_parse(order: &Value) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let out = match order {
            Value::Null => vec![],
            Value::String(s) => Self::parse_order_string(s),
            Value::Array(arr) => {
                // Expect array of strings like ["createdAt desc", "title asc"]
                let mut out = Vec::new();
                for v in arr {
                    match v {
                        Value::String(s) => out.extend(Self::parse_order_string(s)),
                        other => return Err(FilterError::InvalidOrder(format!("Unexpected order entry: {}", other))),
                    }
                }
                out
            }
            Value::Object(obj) => {
                // { "createdAt": "desc", "title": 1 }
                let mut out = Vec::new();
                for (k, v) in obj {
                    let sort = match v {
                        Value::Number(n) if n.as_i64() == Some(-1) => SortDirection::Desc,
                        Value::String(s) if s.eq_ignore_ascii_case("desc") => SortDirection::Desc,
                        _ => SortDirection::Asc,
                    };
                    out.push(FilterOrderInfo { column: k.clone(), sort });
                }
                out
            }
            other => return Err(FilterError::InvalidOrder(format!("Unsupported order spec: {}", other))),
        };
        for info in &out {
            FilterWhere::validate_field(&info.column)?;
        }
        Ok(out)
    }

    /// Accepts "a desc, b", and the "-a" shorthand for descending.
    fn parse_order_string(s: &str) -> Vec<FilterOrderInfo> {
        let mut out = Vec::new();
        for part in s.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut it = trimmed.split_whitespace();
            if let Some(col) = it.next() {
                let (col, mut sort) = match col.strip_prefix('-') {
                    Some(stripped) => (stripped, SortDirection::Desc),
                    None => (col, SortDirection::Asc),
                };
                if let Some(dir) = it.next() {
                    sort = if dir.eq_ignore_ascii_case("desc") { SortDirection::Desc } else { SortDirection::Asc };
                }
                out.push(FilterOrderInfo { column: col.to_string(), sort });
            }
        }
        out
    }

    /// Ordering used when a query names none.
    pub fn default_order() -> Vec<FilterOrderInfo> {
        vec![
            FilterOrderInfo { column: "createdAt".to_string(), sort: SortDirection::Asc },
            FilterOrderInfo { column: "id".to_string(), sort: SortDirection::Asc },
        ]
    }

    pub fn generate(infos: &[FilterOrderInfo]) -> String {
        if infos.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = infos
            .iter()
            .map(|i| format!("doc->'{}' {}", i.column, i.sort.to_sql()))
            .collect();
        format!("ORDER BY {}", parts.join(", "))
    }

    /// Compare two documents. Missing and null sort first, like Postgres
    /// NULLS FIRST on ascending order.
    pub fn compare(a: &Map<String, Value>, b: &Map<String, Value>, infos: &[FilterOrderInfo]) -> Ordering {
        for info in infos {
            let ordering = Self::compare_field(a.get(&info.column), b.get(&info.column));
            let ordering = match info.sort {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    fn compare_field(a: Option<&Value>, b: Option<&Value>) -> Ordering {
        let a = a.filter(|v| !v.is_null());
        let b = b.filter(|v| !v.is_null());
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => compare_scalars(x, y).unwrap_or_else(|| kind_rank(x).cmp(&kind_rank(y))),
        }
    }
}

fn kind_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}
