//! Literal and tuple rendering shared by the translators

use crate::ast::{Expr, Literal};
use crate::error::{Result, SqlError};
use serde_json::Value;

pub struct ExpressionTranslator;

impl ExpressionTranslator {
    /// Text of a scalar WHERE operand; always emitted as a JSON string
    pub fn scalar(expr: &Expr) -> Result<Literal> {
        match expr {
            Expr::Literal(Literal::Null) => Err(SqlError::InvalidExpression(format!(
                "cannot compare against NULL, use IS NULL: {}",
                expr
            ))),
            Expr::Literal(lit) => Ok(lit.clone()),
            other => Err(SqlError::UnsupportedExpression(format!(
                "right-hand side must be a literal: {}",
                other
            ))),
        }
    }

    /// JSON value of a tuple member; numbers stay numbers
    pub fn tuple_member(expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(Literal::String(s)) => Ok(Value::String(s.clone())),
            Expr::Literal(Literal::Number(n)) => Ok(n
                .parse::<serde_json::Number>()
                .map(Value::Number)
                .unwrap_or_else(|_| Value::String(n.clone()))),
            Expr::Literal(Literal::Boolean(b)) => Ok(Value::Bool(*b)),
            Expr::Literal(Literal::Null) => Ok(Value::Null),
            other => Err(SqlError::UnsupportedExpression(format!(
                "tuple members must be literals: {}",
                other
            ))),
        }
    }

    pub fn tuple(list: &[Expr]) -> Result<Vec<Value>> {
        list.iter().map(Self::tuple_member).collect()
    }

    /// Literal rendered inside a painless script
    pub fn script_literal(lit: &Literal) -> String {
        match lit {
            Literal::String(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            other => other.text(),
        }
    }

    /// Text of a function argument such as an interval or a bound
    pub fn argument_text(expr: &Expr) -> Result<String> {
        match expr {
            Expr::Literal(lit) => Ok(lit.text()),
            Expr::Column(name) => Ok(name.clone()),
            other => Err(SqlError::UnsupportedExpression(format!(
                "function argument must be a literal: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn num(n: &str) -> Expr {
        Expr::Literal(Literal::Number(n.to_string()))
    }

    fn string(s: &str) -> Expr {
        Expr::Literal(Literal::String(s.to_string()))
    }

    #[test]
    fn test_scalar_rejects_null_and_columns() {
        assert!(matches!(
            ExpressionTranslator::scalar(&Expr::Literal(Literal::Null)),
            Err(SqlError::InvalidExpression(_))
        ));
        assert!(matches!(
            ExpressionTranslator::scalar(&Expr::Column("colB".to_string())),
            Err(SqlError::UnsupportedExpression(_))
        ));
        assert_eq!(ExpressionTranslator::scalar(&num("10")).unwrap().text(), "10");
    }

    #[test]
    fn test_tuple_keeps_json_types() {
        let values = ExpressionTranslator::tuple(&[string("a"), num("3"), num("2.5")]).unwrap();
        assert_eq!(json!(values), json!(["a", 3, 2.5]));
    }

    #[test]
    fn test_script_literal_quotes_strings() {
        assert_eq!(
            ExpressionTranslator::script_literal(&Literal::String("it's".to_string())),
            "'it\\'s'"
        );
        assert_eq!(
            ExpressionTranslator::script_literal(&Literal::Number("42".to_string())),
            "42"
        );
        assert_eq!(ExpressionTranslator::script_literal(&Literal::Null), "null");
    }
}
