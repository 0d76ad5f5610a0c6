//! Lowering of sqlparser expressions into [`crate::ast::Expr`]
//!
//! Lowering never fails: constructs outside the supported grammar become
//! [`Expr::Unsupported`] carrying their SQL text, and the translator that
//! meets them reports the error in context.

use crate::ast::{ArithOp, CompareOp, Expr, FuncCall, GroupConcat, Literal, UnaryOp};
use sqlparser::ast::{
    BinaryOperator, DuplicateTreatment, Expr as SqlExpr, Function, FunctionArg, FunctionArgExpr,
    FunctionArguments, ObjectName, UnaryOperator, Value,
};

/// Default GROUP_CONCAT separator, as in MySQL
pub const DEFAULT_SEPARATOR: &str = ",";

/// Converts sqlparser expressions into translator expressions
pub struct Lowering;

impl Lowering {
    /// Lower a sqlparser expression
    pub fn lower(expr: &SqlExpr) -> Expr {
        match expr {
            SqlExpr::Identifier(ident) => Expr::Column(ident.value.clone()),
            SqlExpr::CompoundIdentifier(idents) => Expr::Column(
                idents
                    .iter()
                    .map(|i| i.value.as_str())
                    .collect::<Vec<_>>()
                    .join("."),
            ),
            SqlExpr::Value(value_with_span) => match Self::lower_value(&value_with_span.value) {
                Some(lit) => Expr::Literal(lit),
                None => Expr::Unsupported(expr.to_string()),
            },
            SqlExpr::Nested(inner) => Expr::Paren(Box::new(Self::lower(inner))),
            SqlExpr::BinaryOp { left, op, right } => Self::lower_binary(left, op, right),
            SqlExpr::UnaryOp { op, expr: inner } => Self::lower_unary(op, inner),
            SqlExpr::IsNull(inner) => Expr::IsNull {
                expr: Box::new(Self::lower(inner)),
                negated: false,
            },
            SqlExpr::IsNotNull(inner) => Expr::IsNull {
                expr: Box::new(Self::lower(inner)),
                negated: true,
            },
            SqlExpr::InList {
                expr: inner,
                list,
                negated,
            } => Expr::InList {
                expr: Box::new(Self::lower(inner)),
                list: list.iter().map(Self::lower).collect(),
                negated: *negated,
            },
            SqlExpr::Between {
                expr: inner,
                negated,
                low,
                high,
            } => Expr::Between {
                expr: Box::new(Self::lower(inner)),
                low: Box::new(Self::lower(low)),
                high: Box::new(Self::lower(high)),
                negated: *negated,
            },
            SqlExpr::Like {
                negated,
                expr: inner,
                pattern,
                ..
            } => Expr::Like {
                expr: Box::new(Self::lower(inner)),
                pattern: Box::new(Self::lower(pattern)),
                negated: *negated,
                regex: false,
            },
            SqlExpr::RLike {
                negated,
                expr: inner,
                pattern,
                ..
            } => Expr::Like {
                expr: Box::new(Self::lower(inner)),
                pattern: Box::new(Self::lower(pattern)),
                negated: *negated,
                regex: true,
            },
            SqlExpr::Function(func) => Self::lower_function(func),
            _ => Expr::Unsupported(expr.to_string()),
        }
    }

    fn lower_value(value: &Value) -> Option<Literal> {
        match value {
            Value::SingleQuotedString(s) | Value::DoubleQuotedString(s) => {
                Some(Literal::String(s.clone()))
            }
            Value::Number(n, _) => Some(Literal::Number(n.to_string())),
            Value::Boolean(b) => Some(Literal::Boolean(*b)),
            Value::Null => Some(Literal::Null),
            _ => None,
        }
    }

    fn lower_binary(left: &SqlExpr, op: &BinaryOperator, right: &SqlExpr) -> Expr {
        let l = Box::new(Self::lower(left));
        let r = Box::new(Self::lower(right));

        let compare = match op {
            BinaryOperator::Eq => Some(CompareOp::Eq),
            BinaryOperator::NotEq => Some(CompareOp::NotEq),
            BinaryOperator::Lt => Some(CompareOp::Lt),
            BinaryOperator::LtEq => Some(CompareOp::LtEq),
            BinaryOperator::Gt => Some(CompareOp::Gt),
            BinaryOperator::GtEq => Some(CompareOp::GtEq),
            _ => None,
        };
        if let Some(op) = compare {
            return Expr::Comparison {
                op,
                left: l,
                right: r,
            };
        }

        let arith = match op {
            BinaryOperator::And => return Expr::And(l, r),
            BinaryOperator::Or => return Expr::Or(l, r),
            BinaryOperator::Plus => ArithOp::Plus,
            BinaryOperator::Minus => ArithOp::Minus,
            BinaryOperator::Multiply => ArithOp::Multiply,
            BinaryOperator::Divide => ArithOp::Divide,
            BinaryOperator::Modulo => ArithOp::Modulo,
            BinaryOperator::BitwiseOr => ArithOp::BitOr,
            BinaryOperator::BitwiseAnd => ArithOp::BitAnd,
            BinaryOperator::BitwiseXor | BinaryOperator::PGBitwiseXor => ArithOp::BitXor,
            BinaryOperator::PGBitwiseShiftLeft => ArithOp::ShiftLeft,
            BinaryOperator::PGBitwiseShiftRight => ArithOp::ShiftRight,
            other => ArithOp::Other(other.to_string()),
        };
        Expr::BinaryOp {
            op: arith,
            left: l,
            right: r,
        }
    }

    fn lower_unary(op: &UnaryOperator, inner: &SqlExpr) -> Expr {
        let lowered = Self::lower(inner);
        match op {
            UnaryOperator::Not => Expr::Not(Box::new(lowered)),
            // -5 is a literal, not an expression over one
            UnaryOperator::Minus => match lowered {
                Expr::Literal(Literal::Number(n)) if !n.starts_with('-') => {
                    Expr::Literal(Literal::Number(format!("-{}", n)))
                }
                other => Expr::UnaryOp {
                    op: UnaryOp::Minus,
                    expr: Box::new(other),
                },
            },
            UnaryOperator::Plus => Expr::UnaryOp {
                op: UnaryOp::Plus,
                expr: Box::new(lowered),
            },
            UnaryOperator::BitwiseNot => Expr::UnaryOp {
                op: UnaryOp::BitNot,
                expr: Box::new(lowered),
            },
            other => Expr::UnaryOp {
                op: UnaryOp::Other(other.to_string()),
                expr: Box::new(lowered),
            },
        }
    }

    fn lower_function(func: &Function) -> Expr {
        if func.over.is_some() || func.filter.is_some() {
            return Expr::Unsupported(func.to_string());
        }

        let name = Self::object_name_to_string(&func.name).to_lowercase();

        let (args, distinct, separator) = match &func.args {
            FunctionArguments::None => (Vec::new(), false, None),
            FunctionArguments::Subquery(_) => return Expr::Unsupported(func.to_string()),
            FunctionArguments::List(arg_list) => {
                let args = arg_list
                    .args
                    .iter()
                    .map(Self::lower_function_arg)
                    .collect::<Vec<_>>();
                let distinct = matches!(
                    arg_list.duplicate_treatment,
                    Some(DuplicateTreatment::Distinct)
                );
                // Only the SEPARATOR clause carries meaning for us
                let separator = arg_list.clauses.iter().find_map(|clause| {
                    clause
                        .to_string()
                        .strip_prefix("SEPARATOR ")
                        .map(Self::unquote)
                });
                (args, distinct, separator)
            }
        };

        if name == "group_concat" {
            return Expr::GroupConcat(GroupConcat {
                columns: args,
                separator: separator.unwrap_or_else(|| DEFAULT_SEPARATOR.to_string()),
            });
        }

        Expr::Function(FuncCall {
            name,
            distinct,
            args,
        })
    }

    fn lower_function_arg(arg: &FunctionArg) -> Expr {
        let arg_expr = match arg {
            FunctionArg::Unnamed(arg_expr) => arg_expr,
            FunctionArg::Named { arg, .. } => arg,
            FunctionArg::ExprNamed { arg, .. } => arg,
        };
        match arg_expr {
            FunctionArgExpr::Expr(expr) => Self::lower(expr),
            FunctionArgExpr::Wildcard | FunctionArgExpr::QualifiedWildcard(_) => Expr::Wildcard,
        }
    }

    /// Convert ObjectName to string (sqlparser 0.60 uses ObjectNamePart)
    pub fn object_name_to_string(name: &ObjectName) -> String {
        name.0
            .iter()
            .map(|part| part.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Strip one level of SQL quoting from a rendered literal
    fn unquote(text: &str) -> String {
        let text = text.trim();
        for quote in ['\'', '"'] {
            if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
                let inner = &text[1..text.len() - 1];
                let doubled = format!("{}{}", quote, quote);
                return inner.replace(&doubled, &quote.to_string());
            }
        }
        text.to_string()
    }
}
