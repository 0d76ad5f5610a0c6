//! SQL to Elasticsearch DSL statement assembly
//!
//! Translates a parsed SELECT into the top-level search request body, with
//! keys in a fixed order: `query`, `from`, `size`, `sort`, `search_after`,
//! `aggs`. Absent clauses produce no key at all.

use crate::aggregation::{AggregationInput, AggregationTranslator, OrderKey, SelectItem};
use crate::ast::Expr;
use crate::config::QueryConfig;
use crate::error::{Result, SqlError};
use crate::lower::Lowering;
use crate::predicate::PredicateTranslator;
use serde_json::{json, Map, Value};
use sqlparser::ast::{
    Expr as SqlExpr, GroupByExpr, LimitClause, OrderBy, OrderByExpr, OrderByKind,
    Query as SqlQuery, SelectItem as SqlSelectItem, SetExpr, Statement, TableFactor,
    TableWithJoins, Value as SqlValue,
};
use tracing::debug;

/// Tie-breaker appended to every sort in compatibility mode
pub const TIE_BREAKER: &str = "RunID";
/// Default sort field in compatibility mode
pub const START_TIME: &str = "StartTime";

/// Translated request body and the fields it sorts on
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    pub dsl: Value,
    /// Sort field names in sort order, as emitted
    pub sort_fields: Vec<String>,
}

/// Statement-level SQL translator
pub struct SqlTranslator<'a> {
    config: &'a QueryConfig,
}

impl<'a> SqlTranslator<'a> {
    pub fn new(config: &'a QueryConfig) -> Self {
        Self { config }
    }

    /// Translate a statement; `search_after` values follow the sort order
    pub fn translate(&self, stmt: &Statement, search_after: &[Value]) -> Result<Translation> {
        match stmt {
            Statement::Query(query) => self.translate_query(query, search_after),
            _ => Err(SqlError::UnsupportedStatement(format!(
                "Only SELECT queries are supported, got: {}",
                stmt
            ))),
        }
    }

    fn translate_query(&self, sql_query: &SqlQuery, search_after: &[Value]) -> Result<Translation> {
        if sql_query.with.is_some() {
            return Err(SqlError::UnsupportedStatement(
                "WITH clauses are not supported".to_string(),
            ));
        }

        // Extract the SELECT body
        let select = match sql_query.body.as_ref() {
            SetExpr::Select(select) => select,
            _ => {
                return Err(SqlError::UnsupportedStatement(
                    "Only simple SELECT queries are supported (no UNION, INTERSECT, etc.)"
                        .to_string(),
                ))
            }
        };

        if select.distinct.is_some() {
            return Err(SqlError::UnsupportedExpression(
                "SELECT DISTINCT is not supported, use GROUP BY".to_string(),
            ));
        }

        let index = Self::extract_table(&select.from)?;
        debug!("Extracted index: {}", index);

        let items = Self::extract_select_items(&select.projection);
        let group_by = Self::extract_group_by(&select.group_by)?;
        let order_by = Self::extract_order_by(&sql_query.order_by)?;
        let having = select.having.as_ref().map(Lowering::lower);
        let selection = select.selection.as_ref().map(Lowering::lower);
        let (limit, offset) = Self::extract_limit_offset(&sql_query.limit_clause)?;

        let query = PredicateTranslator::new(self.config).translate_where(selection.as_ref())?;
        debug!("Query: {}", query);

        let mut dsl = Map::new();
        dsl.insert("query".to_string(), query);

        let input = AggregationInput {
            items: &items,
            group_by: &group_by,
            order_by: &order_by,
            having: having.as_ref(),
            bucket_count: self.config.bucket_count,
        };

        if input.is_aggregation() {
            if offset.is_some() {
                return Err(SqlError::UnsupportedExpression(
                    "OFFSET is not supported in aggregation queries".to_string(),
                ));
            }
            if !search_after.is_empty() {
                return Err(SqlError::InvalidStatement(
                    "pagination arguments are not supported in aggregation queries".to_string(),
                ));
            }

            let bucket_count = match limit {
                Some(0) => {
                    return Err(SqlError::InvalidStatement(
                        "LIMIT of an aggregation query must be positive".to_string(),
                    ))
                }
                Some(n) if !group_by.is_empty() => n,
                _ => self.config.bucket_count,
            };
            let aggs = AggregationTranslator::new(self.config).translate(&AggregationInput {
                bucket_count,
                ..input
            })?;

            dsl.insert("size".to_string(), json!(0));
            if let Some(aggs) = aggs {
                dsl.insert("aggs".to_string(), aggs);
            }
            return Ok(Translation {
                dsl: Value::Object(dsl),
                sort_fields: Vec::new(),
            });
        }

        let (sort, sort_fields) = self.plain_sort(&order_by)?;

        if let Some(from) = offset {
            dsl.insert("from".to_string(), json!(from));
        }
        dsl.insert(
            "size".to_string(),
            json!(limit.unwrap_or(self.config.page_size)),
        );
        if !sort.is_empty() {
            dsl.insert("sort".to_string(), Value::Array(sort));
        }

        if !search_after.is_empty() {
            if sort_fields.is_empty() {
                return Err(SqlError::InvalidStatement(
                    "pagination requires ORDER BY".to_string(),
                ));
            }
            if offset.is_some() {
                return Err(SqlError::InvalidStatement(
                    "pagination cannot be combined with OFFSET".to_string(),
                ));
            }
            if search_after.len() != sort_fields.len() {
                return Err(SqlError::InvalidStatement(format!(
                    "expected {} pagination values for sort fields {:?}, got {}",
                    sort_fields.len(),
                    sort_fields,
                    search_after.len()
                )));
            }
            dsl.insert(
                "search_after".to_string(),
                Value::Array(search_after.to_vec()),
            );
        }

        debug!("Sort fields: {:?}", sort_fields);
        Ok(Translation {
            dsl: Value::Object(dsl),
            sort_fields,
        })
    }

    /// Field sort of a non-aggregation query
    fn plain_sort(&self, order_by: &[OrderKey]) -> Result<(Vec<Value>, Vec<String>)> {
        let mut sort = Vec::new();
        let mut fields = Vec::new();

        for key in order_by {
            let field = match &key.expr {
                Expr::Column(name) => self.config.column(name)?,
                other => {
                    return Err(SqlError::InvalidStatement(format!(
                        "ORDER BY {} requires an aggregation query",
                        other
                    )))
                }
            };
            sort.push(json!({ field.as_str(): key.direction() }));
            fields.push(field);
        }

        if self.config.compatibility_mode {
            if fields.len() > 1 {
                return Err(SqlError::InvalidStatement(
                    "only one field can be used to sort".to_string(),
                ));
            }
            if fields.is_empty() {
                sort.push(json!({ START_TIME: "desc" }));
                fields.push(START_TIME.to_string());
            }
            sort.push(json!({ TIE_BREAKER: "desc" }));
            fields.push(TIE_BREAKER.to_string());
        }

        Ok((sort, fields))
    }

    /// Extract the single index name from the FROM clause
    fn extract_table(from: &[TableWithJoins]) -> Result<String> {
        if from.is_empty() {
            return Err(SqlError::InvalidStatement(
                "no FROM clause specified".to_string(),
            ));
        }

        if from.len() > 1 {
            return Err(SqlError::InvalidStatement(
                "multiple FROM items are not supported".to_string(),
            ));
        }

        let table = &from[0];
        if !table.joins.is_empty() {
            return Err(SqlError::UnsupportedStatement(
                "JOINs not supported".to_string(),
            ));
        }

        match &table.relation {
            TableFactor::Table { name, .. } => Ok(Lowering::object_name_to_string(name)),
            _ => Err(SqlError::UnsupportedStatement(
                "Only simple table references are supported".to_string(),
            )),
        }
    }

    fn extract_select_items(items: &[SqlSelectItem]) -> Vec<SelectItem> {
        items
            .iter()
            .map(|item| match item {
                SqlSelectItem::UnnamedExpr(expr) => SelectItem {
                    expr: Lowering::lower(expr),
                    alias: None,
                },
                SqlSelectItem::ExprWithAlias { expr, alias } => SelectItem {
                    expr: Lowering::lower(expr),
                    alias: Some(alias.value.clone()),
                },
                // `*` and `t.*`
                _ => SelectItem {
                    expr: Expr::Wildcard,
                    alias: None,
                },
            })
            .collect()
    }

    fn extract_group_by(group_by: &GroupByExpr) -> Result<Vec<Expr>> {
        match group_by {
            GroupByExpr::Expressions(exprs, _) => Ok(exprs.iter().map(Lowering::lower).collect()),
            GroupByExpr::All(_) => Err(SqlError::UnsupportedExpression(
                "GROUP BY ALL is not supported".to_string(),
            )),
        }
    }

    /// Extract ORDER BY keys (sqlparser 0.60 API)
    fn extract_order_by(order_by: &Option<OrderBy>) -> Result<Vec<OrderKey>> {
        let order_by = match order_by {
            Some(ob) => ob,
            None => return Ok(Vec::new()),
        };

        let exprs: &[OrderByExpr] = match &order_by.kind {
            OrderByKind::Expressions(exprs) => exprs,
            OrderByKind::All(_) => {
                return Err(SqlError::UnsupportedExpression(
                    "ORDER BY ALL is not supported".to_string(),
                ))
            }
        };

        Ok(exprs
            .iter()
            .map(|e| OrderKey {
                expr: Lowering::lower(&e.expr),
                // sqlparser 0.60: asc is in options.asc
                asc: e.options.asc,
            })
            .collect())
    }

    /// Extract LIMIT and OFFSET from limit_clause (sqlparser 0.60 API)
    fn extract_limit_offset(
        limit_clause: &Option<LimitClause>,
    ) -> Result<(Option<usize>, Option<usize>)> {
        let limit_clause = match limit_clause {
            Some(lc) => lc,
            None => return Ok((None, None)),
        };

        match limit_clause {
            LimitClause::LimitOffset { limit, offset, .. } => {
                let limit_val = match limit {
                    Some(expr) => Some(Self::expr_to_usize(expr)?),
                    None => None,
                };
                let offset_val = match offset {
                    Some(off) => Some(Self::expr_to_usize(&off.value)?),
                    None => None,
                };
                Ok((limit_val, offset_val))
            }
            LimitClause::OffsetCommaLimit { offset, limit } => {
                // MySQL syntax: LIMIT offset, limit
                let limit_val = Some(Self::expr_to_usize(limit)?);
                let offset_val = Some(Self::expr_to_usize(offset)?);
                Ok((limit_val, offset_val))
            }
        }
    }

    /// Convert an expression to usize (for LIMIT/OFFSET)
    fn expr_to_usize(expr: &SqlExpr) -> Result<usize> {
        match expr {
            SqlExpr::Value(value_with_span) => match &value_with_span.value {
                SqlValue::Number(n, _) => n.parse::<usize>().map_err(|_| {
                    SqlError::InvalidStatement(format!("Invalid LIMIT/OFFSET number: {}", n))
                }),
                other => Err(SqlError::InvalidStatement(format!(
                    "LIMIT/OFFSET must be a number, got {}",
                    other
                ))),
            },
            _ => Err(SqlError::InvalidStatement(format!(
                "LIMIT/OFFSET must be a literal, got {}",
                expr
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SqlParser;

    fn translate_with(config: &QueryConfig, sql: &str, search_after: &[Value]) -> Result<Translation> {
        let stmt = SqlParser::parse(sql)?;
        SqlTranslator::new(config).translate(&stmt, search_after)
    }

    fn translate(sql: &str) -> Result<Translation> {
        translate_with(&QueryConfig::default(), sql, &[])
    }

    fn keys(dsl: &Value) -> Vec<String> {
        dsl.as_object().unwrap().keys().cloned().collect()
    }

    #[test]
    fn test_simple_select() {
        let t = translate("SELECT * FROM t").unwrap();
        assert_eq!(t.dsl, json!({"query": {"match_all": {}}, "size": 1000}));
        assert!(t.sort_fields.is_empty());
    }

    #[test]
    fn test_key_order() {
        let t = translate_with(
            &QueryConfig::default(),
            "SELECT colA FROM t WHERE colA = 'x' ORDER BY colB DESC, colC LIMIT 5",
            &[json!(1), json!("a")],
        )
        .unwrap();
        assert_eq!(keys(&t.dsl), vec!["query", "size", "sort", "search_after"]);
        assert_eq!(t.dsl["sort"], json!([{"colB": "desc"}, {"colC": "asc"}]));
        assert_eq!(t.dsl["search_after"], json!([1, "a"]));
        assert_eq!(t.sort_fields, vec!["colB", "colC"]);
    }

    #[test]
    fn test_limit_offset() {
        let t = translate("SELECT * FROM t LIMIT 10 OFFSET 20").unwrap();
        assert_eq!(keys(&t.dsl), vec!["query", "from", "size"]);
        assert_eq!(t.dsl["from"], json!(20));
        assert_eq!(t.dsl["size"], json!(10));

        let t = translate("SELECT * FROM t LIMIT 20, 10").unwrap();
        assert_eq!(t.dsl["from"], json!(20));
        assert_eq!(t.dsl["size"], json!(10));
    }

    #[test]
    fn test_page_size_default() {
        let config = QueryConfig {
            page_size: 25,
            ..Default::default()
        };
        let t = translate_with(&config, "SELECT * FROM t", &[]).unwrap();
        assert_eq!(t.dsl["size"], json!(25));
    }

    #[test]
    fn test_aggregation_query_shape() {
        let t = translate("SELECT colA, COUNT(colB) FROM t GROUP BY colA LIMIT 7").unwrap();
        assert_eq!(keys(&t.dsl), vec!["query", "size", "aggs"]);
        assert_eq!(t.dsl["size"], json!(0));
        assert_eq!(t.dsl["aggs"]["groupby"]["composite"]["size"], json!(7));
    }

    #[test]
    fn test_count_star_has_no_aggs() {
        let t = translate("SELECT COUNT(*) FROM t WHERE colA = 'x'").unwrap();
        assert_eq!(
            t.dsl,
            json!({
                "query": {"bool": {"filter": [{"match_phrase": {"colA": {"query": "x"}}}]}},
                "size": 0
            })
        );
    }

    #[test]
    fn test_aggregation_offset_rejected() {
        assert!(matches!(
            translate("SELECT colA, COUNT(*) FROM t GROUP BY colA LIMIT 5 OFFSET 5"),
            Err(SqlError::UnsupportedExpression(_))
        ));
    }

    #[test]
    fn test_from_rules() {
        assert!(matches!(
            translate("SELECT 1"),
            Err(SqlError::InvalidStatement(_))
        ));
        assert!(matches!(
            translate("SELECT * FROM a, b"),
            Err(SqlError::InvalidStatement(_))
        ));
        assert!(matches!(
            translate("SELECT * FROM a JOIN b ON a.id = b.id"),
            Err(SqlError::UnsupportedStatement(_))
        ));
        assert!(matches!(
            translate("SELECT * FROM (SELECT * FROM a) AS s"),
            Err(SqlError::UnsupportedStatement(_))
        ));
    }

    #[test]
    fn test_non_select_rejected() {
        assert!(matches!(
            translate("DELETE FROM t WHERE colA = 1"),
            Err(SqlError::UnsupportedStatement(_))
        ));
        assert!(matches!(
            translate("SELECT * FROM a UNION SELECT * FROM b"),
            Err(SqlError::UnsupportedStatement(_))
        ));
    }

    #[test]
    fn test_select_distinct_rejected() {
        assert!(matches!(
            translate("SELECT DISTINCT colA FROM t"),
            Err(SqlError::UnsupportedExpression(_))
        ));
    }

    #[test]
    fn test_order_by_aggregate_without_aggregation_rejected() {
        assert!(matches!(
            translate("SELECT colA FROM t ORDER BY SUM(colB)"),
            Err(SqlError::InvalidStatement(_))
        ));
    }

    #[test]
    fn test_search_after_rules() {
        let config = QueryConfig::default();
        assert!(matches!(
            translate_with(&config, "SELECT * FROM t", &[json!(1)]),
            Err(SqlError::InvalidStatement(_))
        ));
        assert!(matches!(
            translate_with(&config, "SELECT * FROM t ORDER BY colA", &[json!(1), json!(2)]),
            Err(SqlError::InvalidStatement(_))
        ));
        assert!(matches!(
            translate_with(&config, "SELECT * FROM t ORDER BY colA LIMIT 5 OFFSET 5", &[json!(1)]),
            Err(SqlError::InvalidStatement(_))
        ));
        assert!(matches!(
            translate_with(&config, "SELECT colA, COUNT(*) FROM t GROUP BY colA", &[json!(1)]),
            Err(SqlError::InvalidStatement(_))
        ));
    }

    #[test]
    fn test_compatibility_default_sort() {
        let config = QueryConfig {
            compatibility_mode: true,
            ..Default::default()
        };
        let t = translate_with(&config, "SELECT * FROM t WHERE WorkflowID = 'w'", &[]).unwrap();
        assert_eq!(t.dsl["sort"], json!([{"StartTime": "desc"}, {"RunID": "desc"}]));
        assert_eq!(t.sort_fields, vec!["StartTime", "RunID"]);
    }

    #[test]
    fn test_compatibility_tie_breaker() {
        let config = QueryConfig {
            compatibility_mode: true,
            ..Default::default()
        };
        let t = translate_with(&config, "SELECT * FROM t ORDER BY CloseTime", &[]).unwrap();
        assert_eq!(t.dsl["sort"], json!([{"CloseTime": "asc"}, {"RunID": "desc"}]));
        assert_eq!(t.sort_fields, vec!["CloseTime", "RunID"]);

        assert!(matches!(
            translate_with(&config, "SELECT * FROM t ORDER BY CloseTime, WorkflowID", &[]),
            Err(SqlError::InvalidStatement(_))
        ));
    }

    #[test]
    fn test_sort_field_rewritten() {
        let config = QueryConfig {
            column_rewrite: Some(std::sync::Arc::new(|c: &str| Ok(c.to_lowercase()))),
            ..Default::default()
        };
        let t = translate_with(&config, "SELECT * FROM t ORDER BY ColA DESC", &[]).unwrap();
        assert_eq!(t.dsl["sort"], json!([{"cola": "desc"}]));
        assert_eq!(t.sort_fields, vec!["cola"]);
    }
}
