//! WHERE clause translation into Elasticsearch bool queries
//!
//! NOT is never emitted as a generic wrapper around a compound query.
//! Negation travels down the tree as a flag instead: AND and OR swap
//! (De Morgan), comparisons take their inverse operator, and leaves with no
//! inverse (IN, LIKE, BETWEEN, IS NULL) are wrapped in `must_not`.
//!
//! AND and OR chains are flattened: a compound whose parent is a compound of
//! the same effective kind contributes its clauses to the parent's array
//! instead of nesting a new `bool`. Parentheses break the chain.

use crate::ast::{CompareOp, Expr, Literal};
use crate::config::QueryConfig;
use crate::error::{Result, SqlError};
use crate::expression::ExpressionTranslator;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoolKind {
    /// AND, emitted as `filter`
    All,
    /// OR, emitted as `should`
    Any,
}

impl BoolKind {
    fn negate(self, negated: bool) -> Self {
        match (self, negated) {
            (kind, false) => kind,
            (BoolKind::All, true) => BoolKind::Any,
            (BoolKind::Any, true) => BoolKind::All,
        }
    }

    fn occur(self) -> &'static str {
        match self {
            BoolKind::All => "filter",
            BoolKind::Any => "should",
        }
    }
}

/// Node the current expression hangs off, for chain merging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parent {
    Root,
    Compound(BoolKind),
    Paren,
}

/// Translated clauses of one subtree
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub clauses: Vec<Value>,
    /// Whether the subtree was an AND/OR compound
    pub boolean: bool,
}

impl Fragment {
    fn leaf(clause: Value) -> Self {
        Self {
            clauses: vec![clause],
            boolean: false,
        }
    }
}

pub struct PredicateTranslator<'a> {
    config: &'a QueryConfig,
}

impl<'a> PredicateTranslator<'a> {
    pub fn new(config: &'a QueryConfig) -> Self {
        Self { config }
    }

    /// Translate an optional WHERE clause into the top-level `query` object
    pub fn translate_where(&self, selection: Option<&Expr>) -> Result<Value> {
        let Some(expr) = selection else {
            return Ok(json!({ "match_all": {} }));
        };

        let fragment = self.translate(expr, false, Parent::Root)?;
        match (fragment.boolean, fragment.clauses.len()) {
            (true, 1) => Ok(fragment.clauses.into_iter().next().unwrap_or(Value::Null)),
            _ => Ok(json!({ "bool": { "filter": fragment.clauses } })),
        }
    }

    fn translate(&self, expr: &Expr, negated: bool, parent: Parent) -> Result<Fragment> {
        match expr {
            Expr::And(l, r) => self.compound(BoolKind::All.negate(negated), l, r, negated, parent),
            Expr::Or(l, r) => self.compound(BoolKind::Any.negate(negated), l, r, negated, parent),
            Expr::Not(inner) => self.translate(inner, !negated, parent),
            Expr::Paren(inner) => self.translate(inner, negated, Parent::Paren),
            Expr::Comparison { op, left, right } => {
                let op = if negated { op.inverse() } else { *op };
                Ok(Fragment::leaf(self.comparison(op, left, right)?))
            }
            Expr::InList {
                expr: target,
                list,
                negated: not_in,
            } => {
                let column = self.column(target, expr)?;
                let values = ExpressionTranslator::tuple(list)?
                    .into_iter()
                    .map(|v| match v {
                        Value::String(s) => self.value(target, &s).map(Value::String),
                        other => Ok(other),
                    })
                    .collect::<Result<Vec<_>>>()?;
                let clause = json!({ "terms": { column: values } });
                Ok(Fragment::leaf(Self::negate_leaf(clause, *not_in != negated)))
            }
            Expr::Like {
                expr: target,
                pattern,
                negated: not_like,
                regex,
            } => {
                let column = self.column(target, expr)?;
                let pattern = match pattern.as_ref() {
                    Expr::Literal(Literal::String(p)) => p,
                    other => {
                        return Err(SqlError::UnsupportedExpression(format!(
                            "pattern must be a string literal: {}",
                            other
                        )))
                    }
                };
                let clause = if *regex {
                    json!({ "regexp": { column: { "value": pattern } } })
                } else {
                    json!({ "wildcard": { column: { "wildcard": Self::like_to_wildcard(pattern) } } })
                };
                Ok(Fragment::leaf(Self::negate_leaf(clause, *not_like != negated)))
            }
            Expr::IsNull {
                expr: target,
                negated: is_not_null,
            } => {
                let column = self.column(target, expr)?;
                let clause = json!({ "exists": { "field": column } });
                // IS NULL is the negated form of `exists`
                let must_not = !*is_not_null != negated;
                Ok(Fragment::leaf(Self::negate_leaf(clause, must_not)))
            }
            Expr::Between {
                expr: target,
                low,
                high,
                negated: not_between,
            } => {
                let column = self.column(target, expr)?;
                let from = self.scalar(target, low)?;
                let to = self.scalar(target, high)?;
                let clause = json!({ "range": { column: { "from": from, "to": to } } });
                Ok(Fragment::leaf(Self::negate_leaf(clause, *not_between != negated)))
            }
            other => Err(SqlError::UnsupportedExpression(format!(
                "{} is not supported in WHERE",
                other
            ))),
        }
    }

    fn compound(
        &self,
        kind: BoolKind,
        left: &Expr,
        right: &Expr,
        negated: bool,
        parent: Parent,
    ) -> Result<Fragment> {
        let mut clauses = self
            .translate(left, negated, Parent::Compound(kind))?
            .clauses;
        clauses.extend(
            self.translate(right, negated, Parent::Compound(kind))?
                .clauses,
        );

        if parent == Parent::Compound(kind) {
            return Ok(Fragment {
                clauses,
                boolean: true,
            });
        }
        Ok(Fragment {
            clauses: vec![json!({ "bool": { kind.occur(): clauses } })],
            boolean: true,
        })
    }

    fn comparison(&self, op: CompareOp, left: &Expr, right: &Expr) -> Result<Value> {
        let column = match left {
            Expr::Column(name) => self.config.column(name)?,
            other => {
                return Err(SqlError::InvalidExpression(format!(
                    "left-hand side of {} must be a column: {}",
                    op, other
                )))
            }
        };
        let value = self.scalar(left, right)?;

        let phrase = json!({ "match_phrase": { column.as_str(): { "query": value } } });
        Ok(match op {
            CompareOp::Eq => phrase,
            CompareOp::NotEq => Self::negate_leaf(phrase, true),
            CompareOp::Lt | CompareOp::LtEq | CompareOp::Gt | CompareOp::GtEq => {
                let key = op.range_key().unwrap_or("gte");
                json!({ "range": { column: { key: value } } })
            }
        })
    }

    fn column(&self, target: &Expr, whole: &Expr) -> Result<String> {
        match target {
            Expr::Column(name) => self.config.column(name),
            _ => Err(SqlError::InvalidExpression(format!(
                "operand must be a column: {}",
                whole
            ))),
        }
    }

    /// Scalar operand compared against `column`, as string text
    fn scalar(&self, column: &Expr, operand: &Expr) -> Result<String> {
        match ExpressionTranslator::scalar(operand)? {
            Literal::String(s) => self.value(column, &s),
            other => Ok(other.text()),
        }
    }

    fn value(&self, column: &Expr, value: &str) -> Result<String> {
        match column.as_column() {
            Some(name) => self.config.value(name, value),
            None => Ok(value.to_string()),
        }
    }

    fn negate_leaf(clause: Value, negated: bool) -> Value {
        if negated {
            json!({ "bool": { "must_not": [clause] } })
        } else {
            clause
        }
    }

    /// SQL LIKE pattern to an Elasticsearch wildcard pattern
    pub fn like_to_wildcard(pattern: &str) -> String {
        let mut out = String::with_capacity(pattern.len());
        let mut chars = pattern.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '%' => out.push('*'),
                '_' => out.push('?'),
                '*' | '?' => {
                    out.push('\\');
                    out.push(c);
                }
                '\\' => match chars.peek() {
                    Some('%') | Some('_') => {
                        if let Some(escaped) = chars.next() {
                            out.push(escaped);
                        }
                    }
                    _ => out.push_str("\\\\"),
                },
                _ => out.push(c),
            }
        }
        out
    }
}
