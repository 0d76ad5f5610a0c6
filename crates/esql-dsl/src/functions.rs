//! Aggregate function registry
//!
//! Maps SQL aggregate calls to Elasticsearch aggregations and allocates the
//! tag each one is stored under.

use crate::ast::{Expr, FuncCall, GroupConcat};
use crate::config::QueryConfig;
use crate::error::{Result, SqlError};
use crate::expression::ExpressionTranslator;
use crate::tags::{AggAllocation, COUNT_TAG};
use serde_json::{json, Map, Value};

/// Positional argument names of HISTOGRAM
pub const HISTOGRAM_ARGS: [&str; 4] = ["field", "interval", "min_doc_count", "extended_bounds"];
/// Positional argument names of DATE_HISTOGRAM
pub const DATE_HISTOGRAM_ARGS: [&str; 3] = ["field", "interval", "format"];
/// Leading argument names of RANGE, followed by the bounds
pub const RANGE_ARGS: [&str; 1] = ["field"];
/// Leading argument names of DATE_RANGE, followed by the bounds
pub const DATE_RANGE_ARGS: [&str; 2] = ["field", "format"];

/// Aggregate function kinds understood by the translator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateKind {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    Histogram,
    DateHistogram,
    Range,
    DateRange,
    GroupConcat,
}

impl AggregateKind {
    /// Single-value numeric metric, usable from bucket scripts and sorts
    pub fn is_metric(self) -> bool {
        matches!(
            self,
            AggregateKind::Count
                | AggregateKind::Sum
                | AggregateKind::Avg
                | AggregateKind::Min
                | AggregateKind::Max
        )
    }
}

/// Registry for SQL aggregate functions
pub struct FunctionRegistry;

impl FunctionRegistry {
    /// Map a SQL function name to an AggregateKind
    pub fn get_aggregate(name: &str) -> Result<AggregateKind> {
        let name_lower = name.to_lowercase();
        match name_lower.as_str() {
            "count" => Ok(AggregateKind::Count),
            "sum" => Ok(AggregateKind::Sum),
            "avg" => Ok(AggregateKind::Avg),
            "min" => Ok(AggregateKind::Min),
            "max" => Ok(AggregateKind::Max),
            "histogram" => Ok(AggregateKind::Histogram),
            "date_histogram" => Ok(AggregateKind::DateHistogram),
            "range" => Ok(AggregateKind::Range),
            "date_range" => Ok(AggregateKind::DateRange),
            "group_concat" => Ok(AggregateKind::GroupConcat),
            _ => Err(SqlError::UnsupportedAggregateFunction(name.to_string())),
        }
    }

    /// Resolve a function call into its tag and DSL body
    pub fn allocate(call: &FuncCall, config: &QueryConfig) -> Result<AggAllocation> {
        let kind = Self::get_aggregate(&call.name)?;

        if call.distinct && kind != AggregateKind::Count {
            return Err(SqlError::DistinctNotSupported(call.name.clone()));
        }

        match kind {
            AggregateKind::Count => Self::allocate_count(call, config),
            AggregateKind::Sum | AggregateKind::Avg | AggregateKind::Min | AggregateKind::Max => {
                Self::allocate_metric(call, config)
            }
            AggregateKind::Histogram => Self::allocate_histogram(call, config),
            AggregateKind::DateHistogram => Self::allocate_date_histogram(call, config),
            AggregateKind::Range => Self::allocate_range(call, config, &RANGE_ARGS),
            AggregateKind::DateRange => Self::allocate_range(call, config, &DATE_RANGE_ARGS),
            AggregateKind::GroupConcat => Self::allocate_group_concat(
                &GroupConcat {
                    columns: call.args.clone(),
                    separator: crate::lower::DEFAULT_SEPARATOR.to_string(),
                },
                config,
            ),
        }
    }

    fn allocate_count(call: &FuncCall, config: &QueryConfig) -> Result<AggAllocation> {
        let arg = Self::single_arg(call)?;
        if matches!(arg, Expr::Wildcard) {
            if call.distinct {
                return Err(SqlError::UnsupportedExpression(
                    "COUNT(DISTINCT *)".to_string(),
                ));
            }
            return Ok(AggAllocation {
                tag: COUNT_TAG.to_string(),
                body: None,
                numeric: true,
            });
        }

        let field = Self::column_arg(arg, config)?;
        let (tag, metric) = if call.distinct {
            (format!("count_distinct_{}", field), "cardinality")
        } else {
            (format!("count_{}", field), "value_count")
        };
        Ok(AggAllocation {
            tag: Self::sanitize_tag(&tag),
            body: Some(json!({ metric: { "field": field } })),
            numeric: true,
        })
    }

    fn allocate_metric(call: &FuncCall, config: &QueryConfig) -> Result<AggAllocation> {
        let field = Self::column_arg(Self::single_arg(call)?, config)?;
        Ok(AggAllocation {
            tag: Self::sanitize_tag(&format!("{}_{}", call.name, field)),
            body: Some(json!({ call.name.as_str(): { "field": field } })),
            numeric: true,
        })
    }

    fn allocate_histogram(call: &FuncCall, config: &QueryConfig) -> Result<AggAllocation> {
        Self::check_arity(call, 2, HISTOGRAM_ARGS.len())?;

        let field = Self::column_arg(&call.args[0], config)?;
        let mut body = Map::new();
        body.insert("field".to_string(), Value::String(field.clone()));
        for (name, arg) in HISTOGRAM_ARGS.iter().zip(&call.args).skip(1) {
            let text = ExpressionTranslator::argument_text(arg)?;
            let value = if *name == "extended_bounds" {
                Self::extended_bounds(&text)?
            } else {
                Value::String(text)
            };
            body.insert(name.to_string(), value);
        }

        Ok(AggAllocation {
            tag: Self::sanitize_tag(&format!("histogram_{}", field)),
            body: Some(json!({ "histogram": body })),
            numeric: false,
        })
    }

    fn allocate_date_histogram(call: &FuncCall, config: &QueryConfig) -> Result<AggAllocation> {
        Self::check_arity(call, 2, DATE_HISTOGRAM_ARGS.len())?;

        let field = Self::column_arg(&call.args[0], config)?;
        let mut body = Map::new();
        body.insert("field".to_string(), Value::String(field.clone()));
        for (name, arg) in DATE_HISTOGRAM_ARGS.iter().zip(&call.args).skip(1) {
            body.insert(
                name.to_string(),
                Value::String(ExpressionTranslator::argument_text(arg)?),
            );
        }

        Ok(AggAllocation {
            tag: Self::sanitize_tag(&format!("date_histogram_{}", field)),
            body: Some(json!({ "date_histogram": body })),
            numeric: false,
        })
    }

    /// RANGE and DATE_RANGE: leading named arguments, then at least one bound
    fn allocate_range(
        call: &FuncCall,
        config: &QueryConfig,
        leading: &[&str],
    ) -> Result<AggAllocation> {
        if call.args.len() <= leading.len() {
            return Err(SqlError::InvalidExpression(format!(
                "{} requires {} and at least one bound",
                call.name,
                leading.join(", ")
            )));
        }

        let field = Self::column_arg(&call.args[0], config)?;
        let mut body = Map::new();
        body.insert("field".to_string(), Value::String(field.clone()));
        for (name, arg) in leading.iter().zip(&call.args).skip(1) {
            body.insert(
                name.to_string(),
                Value::String(ExpressionTranslator::argument_text(arg)?),
            );
        }

        let bounds = call.args[leading.len()..]
            .iter()
            .map(ExpressionTranslator::argument_text)
            .collect::<Result<Vec<_>>>()?;
        body.insert("ranges".to_string(), Value::Array(Self::range_buckets(&bounds)));

        Ok(AggAllocation {
            tag: Self::sanitize_tag(&format!("{}_{}", call.name, field)),
            body: Some(json!({ call.name.as_str(): body })),
            numeric: false,
        })
    }

    /// `[{to: b0}, {from: b0, to: b1}, ..., {from: bn}]`
    fn range_buckets(bounds: &[String]) -> Vec<Value> {
        let mut buckets = Vec::with_capacity(bounds.len() + 1);
        if let Some(first) = bounds.first() {
            buckets.push(json!({ "to": first }));
        }
        for pair in bounds.windows(2) {
            buckets.push(json!({ "from": pair[0], "to": pair[1] }));
        }
        if let Some(last) = bounds.last() {
            buckets.push(json!({ "from": last }));
        }
        buckets
    }

    /// `'min,max'` into `{"min": min, "max": max}` with raw numbers
    fn extended_bounds(text: &str) -> Result<Value> {
        let invalid = || {
            SqlError::InvalidExpression(format!(
                "extended_bounds must be 'min,max', got '{}'",
                text
            ))
        };
        let (min, max) = text.split_once(',').ok_or_else(invalid)?;
        let min = min
            .trim()
            .parse::<serde_json::Number>()
            .map_err(|_| invalid())?;
        let max = max
            .trim()
            .parse::<serde_json::Number>()
            .map_err(|_| invalid())?;
        Ok(json!({ "min": min, "max": max }))
    }

    /// GROUP_CONCAT as a scripted metric collecting per-document strings
    pub fn allocate_group_concat(gc: &GroupConcat, config: &QueryConfig) -> Result<AggAllocation> {
        if gc.columns.is_empty() {
            return Err(SqlError::InvalidExpression(
                "group_concat requires at least one column".to_string(),
            ));
        }
        let fields = gc
            .columns
            .iter()
            .map(|c| Self::column_arg(c, config))
            .collect::<Result<Vec<_>>>()?;

        let separator = Self::painless_string(&gc.separator);
        let guard = fields
            .iter()
            .map(|f| format!("doc['{}'].size() > 0", f))
            .collect::<Vec<_>>()
            .join(" && ");
        let joined = fields
            .iter()
            .map(|f| format!("String.valueOf(doc['{}'].value)", f))
            .collect::<Vec<_>>()
            .join(&format!(" + {} + ", separator));
        let value = if fields.len() > 1 {
            format!("'(' + {} + ')'", joined)
        } else {
            joined
        };

        let map_script = format!("if ({}) {{ state.values.add({}) }}", guard, value);
        let reduce_script = format!(
            "List all = new ArrayList(); for (s in states) {{ if (s != null) {{ all.addAll(s) }} }} return String.join({}, all)",
            separator
        );

        Ok(AggAllocation {
            tag: Self::sanitize_tag(&format!("group_concat_{}", fields.join("_"))),
            body: Some(json!({
                "scripted_metric": {
                    "init_script": "state.values = []",
                    "map_script": map_script,
                    "combine_script": "return state.values",
                    "reduce_script": reduce_script,
                }
            })),
            numeric: false,
        })
    }

    fn single_arg(call: &FuncCall) -> Result<&Expr> {
        Self::check_arity(call, 1, 1)?;
        Ok(&call.args[0])
    }

    fn check_arity(call: &FuncCall, min: usize, max: usize) -> Result<()> {
        let n = call.args.len();
        if n < min || n > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{} to {}", min, max)
            };
            return Err(SqlError::InvalidExpression(format!(
                "{} expects {} argument(s), got {}",
                call.name, expected, n
            )));
        }
        Ok(())
    }

    /// Target column of an aggregate, after the column policy
    fn column_arg(expr: &Expr, config: &QueryConfig) -> Result<String> {
        match expr {
            Expr::Column(name) => config.column(name),
            other => Err(SqlError::UnsupportedExpression(format!(
                "aggregate target must be a column: {}",
                other
            ))),
        }
    }

    fn painless_string(s: &str) -> String {
        format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
    }

    pub fn sanitize_tag(tag: &str) -> String {
        tag.replace('.', "_")
    }
}
