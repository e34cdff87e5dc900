//! Expression AST for the WHERE and SELECT clauses.
//!
//! A strongly-typed AST for SQL expressions with exhaustive pattern
//! matching enforced by the compiler. Literal values only ever reach SQL
//! text through [`Token::LitString`] and friends, which escape for the
//! target dialect.

use super::dialect::Dialect;
use super::token::{Token, TokenStream};

// =============================================================================
// Expression AST
// =============================================================================

/// A SQL expression.
///
/// Every variant must be handled in `to_tokens()` - the compiler enforces this.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference
    Column(String),

    /// Literal values
    Literal(Literal),

    /// Binary operation: left op right
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    /// Function call: name(args...)
    Function { name: String, args: Vec<Expr> },

    /// Named function argument: NAME => value
    NamedArg { name: String, value: Box<Expr> },

    /// IN: expr IN (values...)
    In { expr: Box<Expr>, values: Vec<Expr> },

    /// IS NULL / IS NOT NULL
    IsNull { expr: Box<Expr>, negated: bool },

    /// Wildcard: *
    Star,

    /// Parenthesized expression
    Paren(Box<Expr>),

    /// Raw SQL expression passed directly to output without escaping.
    ///
    /// # Security Warning
    ///
    /// **Never pass predicate values to this variant.** It exists for the
    /// free-form filter a user types as SQL on purpose.
    Raw(String),
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Null,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Comparison
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    // Logical
    And,
    Or,
    // String
    Like,
}

impl Expr {
    /// Convert this expression to a token stream for a specific dialect.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        match self {
            Expr::Column(column) => {
                ts.push(Token::Ident(column.clone()));
            }

            Expr::Literal(lit) => {
                ts.push(match lit {
                    Literal::Int(n) => Token::LitInt(*n),
                    Literal::Float(f) => Token::LitFloat(*f),
                    Literal::String(s) => Token::LitString(s.clone()),
                    Literal::Bool(b) => Token::LitBool(*b),
                    Literal::Null => Token::LitNull,
                });
            }

            Expr::BinaryOp { left, op, right } => {
                ts.append(&left.to_tokens(dialect));
                ts.space();
                ts.push(binary_op_to_token(*op));
                ts.space();
                ts.append(&right.to_tokens(dialect));
            }

            Expr::Function { name, args } => {
                ts.push(Token::FunctionName(name.clone()));
                ts.lparen();
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.append(&arg.to_tokens(dialect));
                }
                ts.rparen();
            }

            Expr::NamedArg { name, value } => {
                ts.push(Token::ParamName(name.clone()))
                    .space()
                    .push(Token::RArrow)
                    .space()
                    .append(&value.to_tokens(dialect));
            }

            Expr::In { expr, values } => {
                // "x IN ()" is invalid SQL; an empty list matches nothing
                if values.is_empty() {
                    ts.push(Token::False);
                } else {
                    ts.append(&expr.to_tokens(dialect));
                    ts.space().push(Token::In).space().lparen();
                    for (i, val) in values.iter().enumerate() {
                        if i > 0 {
                            ts.comma().space();
                        }
                        ts.append(&val.to_tokens(dialect));
                    }
                    ts.rparen();
                }
            }

            Expr::IsNull { expr, negated } => {
                ts.append(&expr.to_tokens(dialect));
                ts.space();
                ts.push(if *negated {
                    Token::IsNotNull
                } else {
                    Token::IsNull
                });
            }

            Expr::Star => {
                ts.push(Token::Star);
            }

            Expr::Paren(inner) => {
                ts.lparen();
                ts.append(&inner.to_tokens(dialect));
                ts.rparen();
            }

            Expr::Raw(sql) => {
                ts.push(Token::Raw(sql.clone()));
            }
        }

        ts
    }

    /// Join expressions with a logical operator, left to right.
    ///
    /// Returns `None` for an empty list.
    pub fn join_all(exprs: Vec<Expr>, op: BinaryOperator) -> Option<Expr> {
        exprs.into_iter().reduce(|left, right| Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }
}

fn binary_op_to_token(op: BinaryOperator) -> Token {
    match op {
        BinaryOperator::Eq => Token::Eq,
        BinaryOperator::Ne => Token::Ne,
        BinaryOperator::Lt => Token::Lt,
        BinaryOperator::Gt => Token::Gt,
        BinaryOperator::Lte => Token::Lte,
        BinaryOperator::Gte => Token::Gte,
        BinaryOperator::And => Token::And,
        BinaryOperator::Or => Token::Or,
        BinaryOperator::Like => Token::Like,
    }
}

// =============================================================================
// Expression Constructors
// =============================================================================

/// Create a column reference.
pub fn col(name: &str) -> Expr {
    Expr::Column(name.into())
}

/// Create an integer literal.
pub fn lit_int(n: i64) -> Expr {
    Expr::Literal(Literal::Int(n))
}

/// Create a string literal.
pub fn lit_str(s: &str) -> Expr {
    Expr::Literal(Literal::String(s.into()))
}

/// Create `*`.
pub fn star() -> Expr {
    Expr::Star
}

/// Call `name` with `args`.
pub fn func(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Function {
        name: name.into(),
        args,
    }
}

/// `NAME => value`, for functions that take named arguments.
pub fn named_arg(name: &str, value: impl Into<Expr>) -> Expr {
    Expr::NamedArg {
        name: name.into(),
        value: Box::new(value.into()),
    }
}

/// COUNT(*)
pub fn count_star() -> Expr {
    Expr::Function {
        name: "COUNT".into(),
        args: vec![Expr::Star],
    }
}

// =============================================================================
// Fluent builder
// =============================================================================

/// Extension trait for fluent expression building.
pub trait ExprExt: Sized {
    fn into_expr(self) -> Expr;

    fn binary(self, op: BinaryOperator, other: impl Into<Expr>) -> Expr {
        Expr::BinaryOp {
            left: Box::new(self.into_expr()),
            op,
            right: Box::new(other.into()),
        }
    }

    fn eq(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Eq, other)
    }

    fn gt(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Gt, other)
    }

    fn and(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::And, other)
    }

    fn or(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Or, other)
    }

    fn like(self, pattern: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Like, pattern)
    }

    fn is_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self.into_expr()),
            negated: false,
        }
    }

    fn is_not_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self.into_expr()),
            negated: true,
        }
    }

    fn in_list(self, values: Vec<Expr>) -> Expr {
        Expr::In {
            expr: Box::new(self.into_expr()),
            values,
        }
    }

    fn paren(self) -> Expr {
        Expr::Paren(Box::new(self.into_expr()))
    }
}

impl ExprExt for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        lit_int(n)
    }
}

impl From<f64> for Expr {
    fn from(f: f64) -> Self {
        Expr::Literal(Literal::Float(f))
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        lit_str(s)
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Expr::Literal(Literal::Bool(b))
    }
}

impl From<Literal> for Expr {
    fn from(lit: Literal) -> Self {
        Expr::Literal(lit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sql(expr: &Expr) -> String {
        expr.to_tokens(Dialect::Snowflake).serialize(Dialect::Snowflake)
    }

    #[test]
    fn test_column() {
        assert_eq!(sql(&col("name")), "\"name\"");
    }

    #[test]
    fn test_binary_op() {
        assert_eq!(sql(&col("age").gt(lit_int(18))), "\"age\" > 18");
    }

    #[test]
    fn test_chained_or() {
        let expr = col("a").eq(1i64).or(col("b").eq(2i64));
        assert_eq!(sql(&expr), "\"a\" = 1 OR \"b\" = 2");
    }

    #[test]
    fn test_join_all() {
        let joined = Expr::join_all(
            vec![col("a").eq(1i64), col("b").eq(2i64), col("c").eq(3i64)],
            BinaryOperator::And,
        )
        .unwrap();
        assert_eq!(sql(&joined), "\"a\" = 1 AND \"b\" = 2 AND \"c\" = 3");
        assert!(Expr::join_all(vec![], BinaryOperator::And).is_none());
    }

    #[test]
    fn test_count_star() {
        assert_eq!(sql(&count_star()), "COUNT(*)");
    }

    #[test]
    fn test_like_escapes_pattern() {
        let expr = col("name").like("%O'Neil%");
        assert_eq!(sql(&expr), "\"name\" LIKE '%O''Neil%'");
    }

    #[test]
    fn test_in_list() {
        let expr = col("status").in_list(vec![lit_str("active"), lit_str("pending")]);
        assert_eq!(sql(&expr), "\"status\" IN ('active', 'pending')");
    }

    #[test]
    fn test_named_args() {
        let expr = func("cortex.summarize", vec![named_arg("text", "it's"), named_arg("max", 3i64)]);
        assert_eq!(sql(&expr), "CORTEX.SUMMARIZE(TEXT => 'it''s', MAX => 3)");
    }

    #[test]
    fn test_in_list_empty() {
        assert_eq!(sql(&col("status").in_list(vec![])), "FALSE");
    }

    #[test]
    fn test_is_null() {
        assert_eq!(sql(&col("x").is_null()), "\"x\" IS NULL");
        assert_eq!(sql(&col("x").is_not_null()), "\"x\" IS NOT NULL");
    }

    #[test]
    fn test_paren() {
        let expr = col("a").eq(1i64).or(col("b").eq(2i64)).paren();
        assert_eq!(sql(&expr), "(\"a\" = 1 OR \"b\" = 2)");
    }
}
