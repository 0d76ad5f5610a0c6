//! GROUP BY, aggregate SELECT items, ORDER BY and HAVING translation
//!
//! All aggregations of a statement share one [`AggTagMap`], so an aggregate
//! requested from SELECT, ORDER BY and HAVING alike is emitted once. The
//! emitted object nests the metrics and pipeline stages under a `composite`
//! aggregation keyed `groupby` when GROUP BY is present:
//!
//! ```text
//! {"groupby": {"composite": {"size": n, "sources": [...]},
//!              "aggs": {<metrics>, <bucket_script>..., "bucket_sort": ..., "having": ...}}}
//! ```

use crate::ast::Expr;
use crate::config::QueryConfig;
use crate::error::{Result, SqlError};
use crate::functions::FunctionRegistry;
use crate::script::ScriptTranslator;
use crate::tags::{AggTagMap, COUNT_TAG};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Key of the composite aggregation in the emitted `aggs`
pub const GROUP_BY_KEY: &str = "groupby";
/// Key of the ORDER BY pipeline stage
pub const BUCKET_SORT_KEY: &str = "bucket_sort";
/// Key of the HAVING pipeline stage
pub const HAVING_KEY: &str = "having";

/// One SELECT list entry
#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

/// One ORDER BY key, `asc` is `None` when no direction was written
#[derive(Debug, Clone, PartialEq)]
pub struct OrderKey {
    pub expr: Expr,
    pub asc: Option<bool>,
}

impl OrderKey {
    pub fn direction(&self) -> &'static str {
        if self.asc.unwrap_or(true) {
            "asc"
        } else {
            "desc"
        }
    }
}

/// Clauses of one statement relevant to aggregation
#[derive(Debug, Clone, Copy)]
pub struct AggregationInput<'q> {
    pub items: &'q [SelectItem],
    pub group_by: &'q [Expr],
    pub order_by: &'q [OrderKey],
    pub having: Option<&'q Expr>,
    /// Composite and bucket_sort `size`
    pub bucket_count: usize,
}

impl AggregationInput<'_> {
    /// Whether the statement needs the aggregation pipeline at all
    pub fn is_aggregation(&self) -> bool {
        !self.group_by.is_empty()
            || self.having.is_some()
            || self.items.iter().any(|item| item.expr.contains_aggregate())
    }
}

pub struct AggregationTranslator<'a> {
    config: &'a QueryConfig,
}

impl<'a> AggregationTranslator<'a> {
    pub fn new(config: &'a QueryConfig) -> Self {
        Self { config }
    }

    /// Build the `aggs` object, `None` when there is nothing to emit
    pub fn translate(&self, input: &AggregationInput<'_>) -> Result<Option<Value>> {
        if input.having.is_some() && input.group_by.is_empty() {
            return Err(SqlError::InvalidStatement(
                "HAVING requires GROUP BY".to_string(),
            ));
        }

        let (group_keys, sources) = self.group_by(input.group_by)?;
        let grouped = !sources.is_empty();
        let aliases = Self::aggregate_aliases(input.items);
        let mut tags = AggTagMap::new();

        let bucket_scripts = self.select_items(input.items, &group_keys, &mut tags)?;
        let sort = self.order_by(input.order_by, &aliases, &mut tags)?;
        let having = match input.having {
            Some(expr) => Some(self.having(expr, &aliases, &mut tags)?),
            None => None,
        };

        let mut inner = tags.to_object();
        inner.extend(bucket_scripts);
        if !sort.is_empty() {
            // bucket_sort needs a parent multi-bucket aggregation
            if !grouped {
                return Err(SqlError::InvalidStatement(
                    "ORDER BY aggregate requires GROUP BY".to_string(),
                ));
            }
            inner.insert(
                BUCKET_SORT_KEY.to_string(),
                json!({ "bucket_sort": { "sort": sort, "size": input.bucket_count } }),
            );
        }
        if let Some(selector) = having {
            inner.insert(HAVING_KEY.to_string(), selector);
        }

        debug!(
            "Aggregation: {} group keys, {} metrics, {} stages",
            sources.len(),
            tags.len(),
            inner.len() - tags.len()
        );

        if grouped {
            let mut group = Map::new();
            group.insert(
                "composite".to_string(),
                json!({ "size": input.bucket_count, "sources": sources }),
            );
            if !inner.is_empty() {
                group.insert("aggs".to_string(), Value::Object(inner));
            }
            return Ok(Some(json!({ GROUP_BY_KEY: group })));
        }

        if inner.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Value::Object(inner)))
        }
    }

    /// Composite sources, plus the written key names for compatibility checks
    fn group_by(&self, group_by: &[Expr]) -> Result<(HashSet<String>, Vec<Value>)> {
        let mut keys = HashSet::new();
        let mut sources = Vec::new();

        for expr in group_by {
            let name = match expr {
                Expr::Column(name) => name,
                other => {
                    return Err(SqlError::UnsupportedExpression(format!(
                        "GROUP BY {} is not supported, only columns",
                        other
                    )))
                }
            };
            if !keys.insert(name.clone()) {
                continue;
            }
            let field = self.config.column(name)?;
            sources.push(json!({
                format!("group_{}", field): {
                    "terms": { "field": field, "missing_bucket": true }
                }
            }));
        }

        Ok((keys, sources))
    }

    /// Alias of every SELECT item that involves an aggregate
    fn aggregate_aliases(items: &[SelectItem]) -> HashMap<String, Expr> {
        items
            .iter()
            .filter(|item| item.expr.contains_aggregate())
            .filter_map(|item| {
                item.alias
                    .as_ref()
                    .map(|alias| (alias.clone(), item.expr.clone()))
            })
            .collect()
    }

    fn resolve_aliases(expr: &Expr, aliases: &HashMap<String, Expr>) -> Expr {
        if aliases.is_empty() {
            return expr.clone();
        }
        expr.substitute(&|name| aliases.get(name).cloned())
    }

    /// Register SELECT aggregates and check GROUP BY compatibility;
    /// returns the `bucket_script` stages of computed columns
    fn select_items(
        &self,
        items: &[SelectItem],
        group_keys: &HashSet<String>,
        tags: &mut AggTagMap,
    ) -> Result<Map<String, Value>> {
        let mut columns: Vec<&str> = Vec::new();
        let mut targets: HashSet<String> = HashSet::new();
        let mut stages = Map::new();

        for item in items {
            match &item.expr {
                Expr::Wildcard => {
                    if !group_keys.is_empty() {
                        return Err(SqlError::ColumnNotInGroupBy("*".to_string()));
                    }
                }
                Expr::Column(name) => columns.push(name),
                Expr::Function(call) => {
                    tags.insert(&FunctionRegistry::allocate(call, self.config)?);
                    Self::collect_targets(&call.args, &mut targets);
                }
                Expr::GroupConcat(gc) => {
                    tags.insert(&FunctionRegistry::allocate_group_concat(gc, self.config)?);
                    Self::collect_targets(&gc.columns, &mut targets);
                }
                computed if computed.contains_aggregate() => {
                    if group_keys.is_empty() {
                        return Err(SqlError::InvalidStatement(format!(
                            "computed column {} requires GROUP BY",
                            computed
                        )));
                    }
                    let mut scripts = ScriptTranslator::new(self.config, tags);
                    let script = scripts.translate(computed)?;
                    let referenced = scripts.into_referenced();
                    let key = item
                        .alias
                        .clone()
                        .unwrap_or_else(|| format!("script_{}", stages.len()));
                    stages.insert(
                        key,
                        json!({ "bucket_script": {
                            "buckets_path": Self::buckets_path(&referenced),
                            "script": script,
                        }}),
                    );
                }
                other => {
                    return Err(SqlError::UnsupportedExpression(format!(
                        "{} is not supported in an aggregation SELECT",
                        other
                    )))
                }
            }
        }

        if !group_keys.is_empty() {
            for column in columns {
                if !group_keys.contains(column) && !targets.contains(column) {
                    return Err(SqlError::ColumnNotInGroupBy(column.to_string()));
                }
            }
        }

        Ok(stages)
    }

    fn collect_targets(args: &[Expr], targets: &mut HashSet<String>) {
        for arg in args {
            if let Some(name) = arg.as_column() {
                targets.insert(name.to_string());
            }
        }
    }

    /// Register ORDER BY aggregates; returns the `bucket_sort` sort list
    fn order_by(
        &self,
        order_by: &[OrderKey],
        aliases: &HashMap<String, Expr>,
        tags: &mut AggTagMap,
    ) -> Result<Vec<Value>> {
        let resolved: Vec<(Expr, &OrderKey)> = order_by
            .iter()
            .map(|key| (Self::resolve_aliases(&key.expr, aliases), key))
            .collect();

        let plain = resolved
            .iter()
            .filter(|(expr, _)| !matches!(expr, Expr::Function(_) | Expr::GroupConcat(_)))
            .count();
        if plain > 0 {
            let message = if plain == resolved.len() {
                "ORDER BY in an aggregation query must use aggregate functions"
            } else {
                "ORDER BY cannot mix aggregate functions and plain columns"
            };
            return Err(SqlError::InvalidStatement(message.to_string()));
        }

        let mut directions: HashMap<String, &'static str> = HashMap::new();
        let mut sort = Vec::new();
        for (expr, key) in &resolved {
            let Expr::Function(call) = expr else {
                return Err(SqlError::UnsupportedExpression(format!(
                    "cannot ORDER BY {}",
                    expr
                )));
            };
            if !FunctionRegistry::get_aggregate(&call.name)?.is_metric() {
                return Err(SqlError::UnsupportedExpression(format!(
                    "cannot ORDER BY bucket aggregation {}",
                    expr
                )));
            }

            let allocation = FunctionRegistry::allocate(call, self.config)?;
            tags.insert(&allocation);

            let direction = key.direction();
            if let Some(existing) = directions.get(&allocation.tag).copied() {
                if existing != direction {
                    return Err(SqlError::OrderDirectionConflict(allocation.tag));
                }
                continue;
            }
            directions.insert(allocation.tag.clone(), direction);
            sort.push(json!({ allocation.tag: { "order": direction } }));
        }

        Ok(sort)
    }

    /// HAVING as a `bucket_selector` over the numeric metrics registered so far
    fn having(
        &self,
        expr: &Expr,
        aliases: &HashMap<String, Expr>,
        tags: &mut AggTagMap,
    ) -> Result<Value> {
        let resolved = Self::resolve_aliases(expr, aliases);
        let mut scripts = ScriptTranslator::new(self.config, tags);
        let script = scripts.translate_condition(&resolved)?;
        let uses_count = scripts.into_referenced().iter().any(|t| t == COUNT_TAG);

        let mut paths: Vec<String> = tags
            .numeric_tags()
            .into_iter()
            .map(str::to_string)
            .collect();
        if uses_count {
            paths.push(COUNT_TAG.to_string());
        }

        Ok(json!({ "bucket_selector": {
            "buckets_path": Self::buckets_path(&paths),
            "script": script,
        }}))
    }

    fn buckets_path(tags: &[String]) -> Map<String, Value> {
        tags.iter()
            .map(|tag| (tag.clone(), Value::String(tag.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::Lowering;
    use crate::parser::SqlParser;
    use sqlparser::ast::{
        GroupByExpr, OrderByKind, SelectItem as SqlSelectItem, SetExpr, Statement,
    };

    struct Parts {
        items: Vec<SelectItem>,
        group_by: Vec<Expr>,
        order_by: Vec<OrderKey>,
        having: Option<Expr>,
    }

    fn parts(sql: &str) -> Parts {
        let Statement::Query(query) = SqlParser::parse(sql).unwrap() else {
            panic!("expected query");
        };
        let SetExpr::Select(select) = query.body.as_ref() else {
            panic!("expected select");
        };
        let items = select
            .projection
            .iter()
            .map(|item| match item {
                SqlSelectItem::UnnamedExpr(e) => SelectItem {
                    expr: Lowering::lower(e),
                    alias: None,
                },
                SqlSelectItem::ExprWithAlias { expr, alias } => SelectItem {
                    expr: Lowering::lower(expr),
                    alias: Some(alias.value.clone()),
                },
                _ => SelectItem {
                    expr: Expr::Wildcard,
                    alias: None,
                },
            })
            .collect();
        let group_by = match &select.group_by {
            GroupByExpr::Expressions(exprs, _) => exprs.iter().map(Lowering::lower).collect(),
            GroupByExpr::All(_) => panic!("GROUP BY ALL"),
        };
        let order_by = match query.order_by.as_ref().map(|o| &o.kind) {
            Some(OrderByKind::Expressions(exprs)) => exprs
                .iter()
                .map(|o| OrderKey {
                    expr: Lowering::lower(&o.expr),
                    asc: o.options.asc,
                })
                .collect(),
            _ => Vec::new(),
        };
        Parts {
            items,
            group_by,
            order_by,
            having: select.having.as_ref().map(Lowering::lower),
        }
    }

    fn aggs(sql: &str) -> Result<Option<Value>> {
        let p = parts(sql);
        let config = QueryConfig::default();
        AggregationTranslator::new(&config).translate(&AggregationInput {
            items: &p.items,
            group_by: &p.group_by,
            order_by: &p.order_by,
            having: p.having.as_ref(),
            bucket_count: config.bucket_count,
        })
    }

    #[test]
    fn test_group_by_composite() {
        let value = aggs("SELECT colA, SUM(colB) FROM t GROUP BY colA, colA")
            .unwrap()
            .unwrap();
        assert_eq!(
            value,
            json!({"groupby": {
                "composite": {"size": 1000, "sources": [
                    {"group_colA": {"terms": {"field": "colA", "missing_bucket": true}}}
                ]},
                "aggs": {"sum_colB": {"sum": {"field": "colB"}}}
            }})
        );
    }

    #[test]
    fn test_group_by_without_metrics_has_no_aggs() {
        let value = aggs("SELECT colA FROM t GROUP BY colA").unwrap().unwrap();
        assert!(value["groupby"].get("aggs").is_none());
        assert!(value["groupby"].get("composite").is_some());
    }

    #[test]
    fn test_metrics_without_group_by_stand_alone() {
        let value = aggs("SELECT MAX(colB), COUNT(DISTINCT colC) FROM t")
            .unwrap()
            .unwrap();
        assert_eq!(
            value,
            json!({
                "max_colB": {"max": {"field": "colB"}},
                "count_distinct_colC": {"cardinality": {"field": "colC"}}
            })
        );
    }

    #[test]
    fn test_count_star_alone_emits_nothing() {
        assert_eq!(aggs("SELECT COUNT(*) FROM t").unwrap(), None);
    }

    #[test]
    fn test_column_not_in_group_by() {
        assert!(matches!(
            aggs("SELECT colA, colC, SUM(colB) FROM t GROUP BY colA"),
            Err(SqlError::ColumnNotInGroupBy(c)) if c == "colC"
        ));
        assert!(matches!(
            aggs("SELECT * FROM t GROUP BY colA"),
            Err(SqlError::ColumnNotInGroupBy(c)) if c == "*"
        ));
    }

    #[test]
    fn test_aggregate_target_counts_as_grouped() {
        assert!(aggs("SELECT colA, colB, SUM(colB) FROM t GROUP BY colA").is_ok());
    }

    #[test]
    fn test_having_requires_group_by() {
        assert!(matches!(
            aggs("SELECT SUM(colB) FROM t HAVING SUM(colB) > 5"),
            Err(SqlError::InvalidStatement(_))
        ));
    }

    #[test]
    fn test_order_by_bucket_sort() {
        let value = aggs("SELECT colA, AVG(colB) FROM t GROUP BY colA ORDER BY AVG(colB) DESC")
            .unwrap()
            .unwrap();
        assert_eq!(
            value["groupby"]["aggs"],
            json!({
                "avg_colB": {"avg": {"field": "colB"}},
                "bucket_sort": {"bucket_sort": {"sort": [{"avg_colB": {"order": "desc"}}], "size": 1000}}
            })
        );
    }

    #[test]
    fn test_order_by_count_star_and_default_direction() {
        let value = aggs("SELECT colA, COUNT(*) FROM t GROUP BY colA ORDER BY COUNT(*), MIN(colB) DESC")
            .unwrap()
            .unwrap();
        assert_eq!(
            value["groupby"]["aggs"]["bucket_sort"]["bucket_sort"]["sort"],
            json!([{"_count": {"order": "asc"}}, {"min_colB": {"order": "desc"}}])
        );
    }

    #[test]
    fn test_order_by_aggregate_requires_group_by() {
        assert!(matches!(
            aggs("SELECT SUM(colB) FROM t ORDER BY SUM(colB) DESC"),
            Err(SqlError::InvalidStatement(m)) if m.contains("GROUP BY")
        ));
    }

    #[test]
    fn test_order_by_direction_conflict() {
        assert!(matches!(
            aggs("SELECT colA FROM t GROUP BY colA ORDER BY SUM(colB) ASC, SUM(colB) DESC"),
            Err(SqlError::OrderDirectionConflict(t)) if t == "sum_colB"
        ));
    }

    #[test]
    fn test_order_by_repeated_key_deduplicated() {
        let value = aggs("SELECT colA FROM t GROUP BY colA ORDER BY SUM(colB) DESC, SUM(colB) DESC")
            .unwrap()
            .unwrap();
        assert_eq!(
            value["groupby"]["aggs"]["bucket_sort"]["bucket_sort"]["sort"]
                .as_array()
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_order_by_mixed_or_plain_rejected() {
        assert!(matches!(
            aggs("SELECT colA FROM t GROUP BY colA ORDER BY colA, SUM(colB)"),
            Err(SqlError::InvalidStatement(_))
        ));
        assert!(matches!(
            aggs("SELECT colA FROM t GROUP BY colA ORDER BY colA"),
            Err(SqlError::InvalidStatement(_))
        ));
    }

    #[test]
    fn test_order_by_alias() {
        let value = aggs("SELECT colA, SUM(colB) AS total FROM t GROUP BY colA ORDER BY total DESC")
            .unwrap()
            .unwrap();
        assert_eq!(
            value["groupby"]["aggs"]["bucket_sort"]["bucket_sort"]["sort"],
            json!([{"sum_colB": {"order": "desc"}}])
        );
    }

    #[test]
    fn test_tag_deduplicated_across_clauses() {
        let value = aggs(
            "SELECT colA, SUM(colB) FROM t GROUP BY colA HAVING SUM(colB) > 5 ORDER BY SUM(colB)",
        )
        .unwrap()
        .unwrap();
        let inner = value["groupby"]["aggs"].as_object().unwrap();
        let keys: Vec<&str> = inner.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["sum_colB", "bucket_sort", "having"]);
    }

    #[test]
    fn test_having_bucket_selector() {
        let value = aggs(
            "SELECT colA, AVG(colB) FROM t GROUP BY colA HAVING COUNT(*) > 2 AND MAX(colC) < 10",
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            value["groupby"]["aggs"]["having"],
            json!({"bucket_selector": {
                "buckets_path": {
                    "avg_colB": "avg_colB",
                    "max_colC": "max_colC",
                    "_count": "_count"
                },
                "script": "params._count > 2 && params.max_colC < 10"
            }})
        );
        assert!(value["groupby"]["aggs"].get("max_colC").is_some());
    }

    #[test]
    fn test_computed_column_bucket_script() {
        let value = aggs(
            "SELECT colA, SUM(colB) / COUNT(colC) AS ratio, MAX(colD) + 1 FROM t GROUP BY colA",
        )
        .unwrap()
        .unwrap();
        let inner = &value["groupby"]["aggs"];
        assert_eq!(
            inner["ratio"],
            json!({"bucket_script": {
                "buckets_path": {"sum_colB": "sum_colB", "count_colC": "count_colC"},
                "script": "params.sum_colB / params.count_colC"
            }})
        );
        assert_eq!(
            inner["script_1"]["bucket_script"]["buckets_path"],
            json!({"max_colD": "max_colD"})
        );
    }

    #[test]
    fn test_computed_column_requires_group_by() {
        assert!(matches!(
            aggs("SELECT SUM(colB) * 2 FROM t"),
            Err(SqlError::InvalidStatement(_))
        ));
    }

    #[test]
    fn test_computed_column_without_aggregate_rejected() {
        assert!(matches!(
            aggs("SELECT colA, colB + 1 FROM t GROUP BY colA"),
            Err(SqlError::UnsupportedExpression(_))
        ));
    }

    #[test]
    fn test_group_by_expression_rejected() {
        assert!(matches!(
            aggs("SELECT COUNT(*) FROM t GROUP BY colA + 1"),
            Err(SqlError::UnsupportedExpression(_))
        ));
    }

    #[test]
    fn test_bucket_aggregations_in_select() {
        let value = aggs(
            "SELECT colA, DATE_HISTOGRAM(ts, '1h'), GROUP_CONCAT(colB) FROM t GROUP BY colA",
        )
        .unwrap()
        .unwrap();
        let inner = value["groupby"]["aggs"].as_object().unwrap();
        assert!(inner.contains_key("date_histogram_ts"));
        assert!(inner.contains_key("group_concat_colB"));
    }
}
