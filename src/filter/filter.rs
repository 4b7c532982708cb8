use serde_json::{Map, Value};

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{FilterData, FilterNode, FilterOrderInfo, SqlResult};

/// A validated query over one collection. Built from caller-supplied
/// [`FilterData`], then either evaluated against in-memory documents or
/// compiled to SQL over a JSONB `doc` column.
#[derive(Debug, Clone)]
pub struct Filter {
    table_name: String,
    where_node: FilterNode,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i64>,
    offset: Option<i64>,
    max_limit: Option<i64>,
}

impl Filter {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        Self::validate_table_name(&table_name)?;
        Ok(Self {
            table_name,
            where_node: FilterNode::And(vec![]),
            order_data: vec![],
            limit: None,
            offset: None,
            max_limit: None,
        })
    }

    /// Cap applied to caller-supplied limits.
    pub fn with_max_limit(mut self, max_limit: Option<i64>) -> Self {
        self.max_limit = max_limit;
        self
    }

    pub fn from_data(table_name: impl Into<String>, data: &FilterData, max_limit: Option<i64>) -> Result<Self, FilterError> {
        let mut filter = Self::new(table_name)?.with_max_limit(max_limit);
        filter.assign(data)?;
        Ok(filter)
    }

    pub fn assign(&mut self, data: &FilterData) -> Result<&mut Self, FilterError> {
        if let Some(where_clause) = &data.where_clause {
            self.where_clause(where_clause)?;
        }
        if let Some(order) = &data.order {
            self.order(order)?;
        }
        if data.limit.is_some() || data.offset.is_some() {
            self.limit(data.limit, data.offset)?;
        }
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: &Value) -> Result<&mut Self, FilterError> {
        self.where_node = FilterWhere::parse(conditions)?;
        Ok(self)
    }

    pub fn order(&mut self, order_spec: &Value) -> Result<&mut Self, FilterError> {
        self.order_data = FilterOrder::validate_and_parse(order_spec)?;
        Ok(self)
    }

    pub fn limit(&mut self, limit: Option<i64>, offset: Option<i64>) -> Result<&mut Self, FilterError> {
        if let Some(l) = limit {
            if l < 0 {
                return Err(FilterError::InvalidLimit("Limit must be non-negative".to_string()));
            }
        }
        if let Some(off) = offset {
            if off < 0 {
                return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string()));
            }
        }

        self.limit = match (limit, self.max_limit) {
            (Some(l), Some(max)) if l > max => {
                tracing::warn!("Limit {} exceeds max {}, capping to max", l, max);
                Some(max)
            }
            (None, Some(max)) => Some(max),
            (l, _) => l,
        };
        self.offset = offset;
        Ok(self)
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn where_node(&self) -> &FilterNode {
        &self.where_node
    }

    pub fn matches(&self, doc: &Map<String, Value>) -> bool {
        FilterWhere::matches(&self.where_node, doc)
    }

    fn effective_order(&self) -> Vec<FilterOrderInfo> {
        let mut order = self.order_data.clone();
        // Stable tie-break so paging is deterministic
        for fallback in FilterOrder::default_order() {
            if !order.iter().any(|o| o.column == fallback.column) {
                order.push(fallback);
            }
        }
        order
    }

    /// Filter, sort and page a set of documents.
    pub fn apply<'a, I>(&self, docs: I) -> Vec<Map<String, Value>>
    where
        I: IntoIterator<Item = &'a Map<String, Value>>,
    {
        let order = self.effective_order();
        let mut matched: Vec<&Map<String, Value>> = docs.into_iter().filter(|d| self.matches(d)).collect();
        matched.sort_by(|a, b| FilterOrder::compare(a, b, &order));

        let offset = self.offset.unwrap_or(0).max(0) as usize;
        let iter = matched.into_iter().skip(offset);
        match self.limit {
            Some(limit) => iter.take(limit as usize).cloned().collect(),
            None => iter.cloned().collect(),
        }
    }

    pub fn to_sql(&self) -> SqlResult {
        self.to_sql_with_lock(false)
    }

    /// SELECT statement; `for_update` appends a row lock for read-modify-write.
    pub fn to_sql_with_lock(&self, for_update: bool) -> SqlResult {
        let (where_clause, params) = FilterWhere::generate(&self.where_node, 0);
        let order_clause = FilterOrder::generate(&self.effective_order());
        let limit_clause = self.build_limit_clause();

        let query = [
            "SELECT doc".to_string(),
            format!("FROM \"{}\"", self.table_name),
            format!("WHERE {}", where_clause),
            order_clause,
            limit_clause,
            if for_update { "FOR UPDATE".to_string() } else { String::new() },
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        SqlResult { query, params }
    }

    pub fn to_where_sql(&self) -> SqlResult {
        let (query, params) = FilterWhere::generate(&self.where_node, 0);
        SqlResult { query, params }
    }

    pub fn to_count_sql(&self) -> SqlResult {
        let where_result = self.to_where_sql();
        SqlResult {
            query: format!("SELECT COUNT(*) AS count FROM \"{}\" WHERE {}", self.table_name, where_result.query),
            params: where_result.params,
        }
    }

    pub fn to_delete_sql(&self) -> SqlResult {
        let where_result = self.to_where_sql();
        SqlResult {
            query: format!("DELETE FROM \"{}\" WHERE {} RETURNING doc", self.table_name, where_result.query),
            params: where_result.params,
        }
    }

    fn validate_table_name(name: &str) -> Result<(), FilterError> {
        if name.is_empty() {
            return Err(FilterError::InvalidTableName("Table name cannot be empty".to_string()));
        }
        FilterWhere::validate_field(name)
            .map_err(|_| FilterError::InvalidTableName(format!("Invalid table name format: {}", name)))
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            (None, Some(o)) => format!("OFFSET {}", o),
            (None, None) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn docs() -> Vec<Map<String, Value>> {
        (0..5)
            .map(|i| {
                json!({
                    "id": format!("id-{}", i),
                    "createdAt": format!("2024-01-0{}T00:00:00Z", i + 1),
                    "viewCount": i * 10,
                })
                .as_object()
                .cloned()
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn applies_where_order_and_paging() {
        let data = FilterData::new(json!({ "viewCount": { "$gte": 10 } }))
            .order("-viewCount")
            .limit(2)
            .offset(1);
        let filter = Filter::from_data("posts", &data, None).unwrap();
        let out = filter.apply(docs().iter());
        let ids: Vec<&str> = out.iter().map(|d| d["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["id-3", "id-2"]);
    }

    #[test]
    fn default_order_is_creation_time() {
        let filter = Filter::new("posts").unwrap();
        let mut input = docs();
        input.reverse();
        let out = filter.apply(input.iter());
        assert_eq!(out[0]["id"], json!("id-0"));
    }

    #[test]
    fn caps_limit_to_max() {
        let data = FilterData::default().limit(500);
        let filter = Filter::from_data("posts", &data, Some(100)).unwrap();
        assert!(filter.to_sql().query.ends_with("LIMIT 100"));
    }

    #[test]
    fn rejects_negative_offset() {
        let data = FilterData::default().offset(-1);
        assert!(matches!(Filter::from_data("posts", &data, None), Err(FilterError::InvalidOffset(_))));
    }

    #[test]
    fn select_sql_targets_jsonb() {
        let data = FilterData::new(json!({ "author": "u1" })).order("createdAt desc");
        let sql = Filter::from_data("posts", &data, None).unwrap().to_sql();
        assert_eq!(
            sql.query,
            "SELECT doc FROM \"posts\" WHERE doc->'author' @> $1 ORDER BY doc->'createdAt' DESC, doc->'id' ASC"
        );
    }

    #[test]
    fn rejects_bad_table_name() {
        assert!(Filter::new("posts; drop").is_err());
    }
}
