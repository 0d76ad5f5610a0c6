//! Expression tree consumed by the translators
//!
//! The sqlparser AST is lowered into this closed set of node kinds (see
//! [`crate::lower`]) so that every translator can match exhaustively and
//! reject whatever it does not understand with one catch-all arm.

use std::fmt;

/// Literal value appearing in an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Quoted string, stored without quotes
    String(String),
    /// Numeric literal, stored as written
    Number(String),
    Boolean(bool),
    Null,
}

impl Literal {
    /// Literal text without quotes
    pub fn text(&self) -> String {
        match self {
            Literal::String(s) | Literal::Number(s) => s.clone(),
            Literal::Boolean(b) => b.to_string(),
            Literal::Null => "null".to_string(),
        }
    }
}

/// Comparison operators accepted in WHERE and HAVING
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    /// Operator that matches exactly the rows this one rejects
    pub fn inverse(self) -> CompareOp {
        match self {
            CompareOp::Eq => CompareOp::NotEq,
            CompareOp::NotEq => CompareOp::Eq,
            CompareOp::Lt => CompareOp::GtEq,
            CompareOp::LtEq => CompareOp::Gt,
            CompareOp::Gt => CompareOp::LtEq,
            CompareOp::GtEq => CompareOp::Lt,
        }
    }

    /// Spelling inside a painless script
    pub fn script_op(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::NotEq => "!==",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        }
    }

    /// Key of the `range` query bound, for ordering operators
    pub fn range_key(self) -> Option<&'static str> {
        match self {
            CompareOp::Lt => Some("lt"),
            CompareOp::LtEq => Some("lte"),
            CompareOp::Gt => Some("gt"),
            CompareOp::GtEq => Some("gte"),
            CompareOp::Eq | CompareOp::NotEq => None,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        };
        f.write_str(s)
    }
}

/// Arithmetic and bitwise binary operators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArithOp {
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    BitOr,
    BitAnd,
    BitXor,
    ShiftLeft,
    ShiftRight,
    /// Any other SQL binary operator, kept for error reporting
    Other(String),
}

impl ArithOp {
    /// Spelling inside a painless script, `None` when there is no counterpart
    pub fn script_op(&self) -> Option<&'static str> {
        match self {
            ArithOp::Plus => Some("+"),
            ArithOp::Minus => Some("-"),
            ArithOp::Multiply => Some("*"),
            ArithOp::Divide => Some("/"),
            ArithOp::Modulo => Some("%"),
            ArithOp::BitOr => Some("|"),
            ArithOp::BitAnd => Some("&"),
            ArithOp::BitXor => Some("^"),
            ArithOp::ShiftLeft => Some("<<"),
            ArithOp::ShiftRight => Some(">>"),
            ArithOp::Other(_) => None,
        }
    }
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArithOp::Other(op) => f.write_str(op),
            known => f.write_str(known.script_op().unwrap_or("?")),
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    BitNot,
    Other(String),
}

impl UnaryOp {
    pub fn script_op(&self) -> Option<&'static str> {
        match self {
            UnaryOp::Plus => Some("+"),
            UnaryOp::Minus => Some("-"),
            UnaryOp::BitNot => Some("~"),
            UnaryOp::Other(_) => None,
        }
    }
}

/// Function call such as `SUM(colA)` or `COUNT(DISTINCT colB)`
#[derive(Debug, Clone, PartialEq)]
pub struct FuncCall {
    /// Lowercased function name
    pub name: String,
    pub distinct: bool,
    pub args: Vec<Expr>,
}

/// `GROUP_CONCAT(col, ... SEPARATOR s)`
#[derive(Debug, Clone, PartialEq)]
pub struct GroupConcat {
    pub columns: Vec<Expr>,
    pub separator: String,
}

/// Expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference, dotted for nested fields
    Column(String),
    Literal(Literal),
    /// `*`, only meaningful in SELECT and COUNT(*)
    Wildcard,
    Comparison {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    /// `LIKE` when `regex` is false, `REGEXP`/`RLIKE` otherwise
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
        regex: bool,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Paren(Box<Expr>),
    BinaryOp {
        op: ArithOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Function(FuncCall),
    GroupConcat(GroupConcat),
    /// Construct outside the supported grammar, rendered as SQL text
    Unsupported(String),
}

impl Expr {
    /// Column name if this node is a plain column reference
    pub fn as_column(&self) -> Option<&str> {
        match self {
            Expr::Column(name) => Some(name),
            _ => None,
        }
    }

    /// Whether an aggregate call appears anywhere in this expression
    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expr::Function(_) | Expr::GroupConcat(_) => true,
            Expr::Comparison { left, right, .. } | Expr::BinaryOp { left, right, .. } => {
                left.contains_aggregate() || right.contains_aggregate()
            }
            Expr::And(l, r) | Expr::Or(l, r) => l.contains_aggregate() || r.contains_aggregate(),
            Expr::Not(e) | Expr::Paren(e) => e.contains_aggregate(),
            Expr::UnaryOp { expr, .. } | Expr::IsNull { expr, .. } => expr.contains_aggregate(),
            Expr::InList { expr, list, .. } => {
                expr.contains_aggregate() || list.iter().any(Expr::contains_aggregate)
            }
            Expr::Like { expr, pattern, .. } => {
                expr.contains_aggregate() || pattern.contains_aggregate()
            }
            Expr::Between {
                expr, low, high, ..
            } => expr.contains_aggregate() || low.contains_aggregate() || high.contains_aggregate(),
            Expr::Column(_) | Expr::Literal(_) | Expr::Wildcard | Expr::Unsupported(_) => false,
        }
    }

    /// Replace column references for which `lookup` returns a substitute
    pub fn substitute(&self, lookup: &dyn Fn(&str) -> Option<Expr>) -> Expr {
        let sub = |e: &Expr| Box::new(e.substitute(lookup));
        match self {
            Expr::Column(name) => lookup(name).unwrap_or_else(|| self.clone()),
            Expr::Comparison { op, left, right } => Expr::Comparison {
                op: *op,
                left: sub(left),
                right: sub(right),
            },
            Expr::BinaryOp { op, left, right } => Expr::BinaryOp {
                op: op.clone(),
                left: sub(left),
                right: sub(right),
            },
            Expr::UnaryOp { op, expr } => Expr::UnaryOp {
                op: op.clone(),
                expr: sub(expr),
            },
            Expr::And(l, r) => Expr::And(sub(l), sub(r)),
            Expr::Or(l, r) => Expr::Or(sub(l), sub(r)),
            Expr::Not(e) => Expr::Not(sub(e)),
            Expr::Paren(e) => Expr::Paren(sub(e)),
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => Expr::Between {
                expr: sub(expr),
                low: sub(low),
                high: sub(high),
                negated: *negated,
            },
            _ => self.clone(),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => f.write_str(name),
            Expr::Literal(Literal::String(s)) => write!(f, "'{}'", s),
            Expr::Literal(lit) => f.write_str(&lit.text()),
            Expr::Wildcard => f.write_str("*"),
            Expr::Comparison { op, left, right } => write!(f, "{} {} {}", left, op, right),
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                let items: Vec<String> = list.iter().map(|e| e.to_string()).collect();
                let not = if *negated { "NOT " } else { "" };
                write!(f, "{} {}IN ({})", expr, not, items.join(", "))
            }
            Expr::Like {
                expr,
                pattern,
                negated,
                regex,
            } => {
                let not = if *negated { "NOT " } else { "" };
                let kw = if *regex { "REGEXP" } else { "LIKE" };
                write!(f, "{} {}{} {}", expr, not, kw, pattern)
            }
            Expr::IsNull { expr, negated } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "{} IS {}NULL", expr, not)
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "{} {}BETWEEN {} AND {}", expr, not, low, high)
            }
            Expr::And(l, r) => write!(f, "{} AND {}", l, r),
            Expr::Or(l, r) => write!(f, "{} OR {}", l, r),
            Expr::Not(e) => write!(f, "NOT {}", e),
            Expr::Paren(e) => write!(f, "({})", e),
            Expr::BinaryOp { op, left, right } => write!(f, "{} {} {}", left, op, right),
            Expr::UnaryOp { op, expr } => match op {
                UnaryOp::Other(o) => write!(f, "{} {}", o, expr),
                known => write!(f, "{}{}", known.script_op().unwrap_or("?"), expr),
            },
            Expr::Function(call) => {
                let args: Vec<String> = call.args.iter().map(|e| e.to_string()).collect();
                let distinct = if call.distinct { "DISTINCT " } else { "" };
                write!(f, "{}({}{})", call.name, distinct, args.join(", "))
            }
            Expr::GroupConcat(gc) => {
                let cols: Vec<String> = gc.columns.iter().map(|e| e.to_string()).collect();
                write!(f, "group_concat({} SEPARATOR '{}')", cols.join(", "), gc.separator)
            }
            Expr::Unsupported(sql) => f.write_str(sql),
        }
    }
}
