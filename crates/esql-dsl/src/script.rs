//! Painless script generation
//!
//! Scalar expressions become painless expressions evaluated per bucket:
//! columns read `doc['col'].value` and aggregate calls read the bucket-path
//! parameter `params.<tag>`. Each aggregate met on the way is registered in
//! the shared [`AggTagMap`] and remembered as referenced, so that the caller
//! can build a `buckets_path` listing exactly what the script reads.

use crate::ast::{CompareOp, Expr, UnaryOp};
use crate::config::QueryConfig;
use crate::error::{Result, SqlError};
use crate::expression::ExpressionTranslator;
use crate::functions::FunctionRegistry;
use crate::tags::AggTagMap;
use tracing::trace;

pub struct ScriptTranslator<'a> {
    config: &'a QueryConfig,
    tags: &'a mut AggTagMap,
    referenced: Vec<String>,
}

impl<'a> ScriptTranslator<'a> {
    pub fn new(config: &'a QueryConfig, tags: &'a mut AggTagMap) -> Self {
        Self {
            config,
            tags,
            referenced: Vec::new(),
        }
    }

    /// Tags read by the scripts translated so far, first use first
    pub fn into_referenced(self) -> Vec<String> {
        self.referenced
    }

    /// Translate a scalar expression
    pub fn translate(&mut self, expr: &Expr) -> Result<String> {
        match expr {
            Expr::Column(name) => Ok(format!("doc['{}'].value", self.config.column(name)?)),
            Expr::Literal(lit) => Ok(ExpressionTranslator::script_literal(lit)),
            Expr::UnaryOp { op, expr } => {
                let symbol = op.script_op().ok_or_else(|| {
                    SqlError::UnsupportedOperator(match op {
                        UnaryOp::Other(o) => o.clone(),
                        known => format!("{:?}", known),
                    })
                })?;
                Ok(format!("{}{}", symbol, self.translate(expr)?))
            }
            Expr::BinaryOp { op, left, right } => {
                let symbol = op
                    .script_op()
                    .ok_or_else(|| SqlError::UnsupportedOperator(op.to_string()))?;
                let l = self.translate(left)?;
                let r = self.translate(right)?;
                Ok(format!("{} {} {}", l, symbol, r))
            }
            Expr::Paren(inner) => Ok(format!("({})", self.translate(inner)?)),
            Expr::Function(call) => {
                let kind = FunctionRegistry::get_aggregate(&call.name)?;
                if !kind.is_metric() {
                    return Err(SqlError::UnsupportedExpression(format!(
                        "bucket aggregation {} cannot be used in a script",
                        expr
                    )));
                }
                let allocation = FunctionRegistry::allocate(call, self.config)?;
                self.tags.insert(&allocation);
                if !self.referenced.contains(&allocation.tag) {
                    trace!("Script references {}", allocation.tag);
                    self.referenced.push(allocation.tag.clone());
                }
                Ok(format!("params.{}", allocation.tag))
            }
            other => Err(SqlError::UnsupportedExpression(format!(
                "{} cannot be used in a script",
                other
            ))),
        }
    }

    /// Translate a HAVING condition into a boolean painless expression
    pub fn translate_condition(&mut self, expr: &Expr) -> Result<String> {
        match expr {
            Expr::And(l, r) => Ok(format!(
                "{} && {}",
                self.translate_condition(l)?,
                self.translate_condition(r)?
            )),
            Expr::Or(l, r) => Ok(format!(
                "{} || {}",
                self.translate_condition(l)?,
                self.translate_condition(r)?
            )),
            Expr::Not(inner) => {
                let script = self.translate_condition(inner)?;
                match inner.as_ref() {
                    Expr::Paren(_) | Expr::Between { .. } => Ok(format!("!{}", script)),
                    _ => Ok(format!("!({})", script)),
                }
            }
            Expr::Paren(inner) => Ok(format!("({})", self.translate_condition(inner)?)),
            Expr::Comparison { op, left, right } => self.comparison(*op, left, right),
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let lower = self.comparison(CompareOp::GtEq, expr, low)?;
                let upper = self.comparison(CompareOp::LtEq, expr, high)?;
                let script = format!("({} && {})", lower, upper);
                Ok(if *negated {
                    format!("!{}", script)
                } else {
                    script
                })
            }
            other => Err(SqlError::UnsupportedExpression(format!(
                "{} is not supported in HAVING",
                other
            ))),
        }
    }

    fn comparison(&mut self, op: CompareOp, left: &Expr, right: &Expr) -> Result<String> {
        let l = self.translate(left)?;
        let r = self.translate(right)?;
        Ok(format!("{} {} {}", l, op.script_op(), r))
    }
}
