//! Arithmetic expressions for calculated columns
//!
//! The calculate node derives new columns from small arithmetic formulas.
//! Expressions are parsed by a recursive-descent parser into a tiny AST and
//! evaluated against one row at a time; nothing in an expression can reach
//! beyond the cell being computed.
//!
//! ## Syntax
//!
//! - Numeric literals: `42`, `3.5`, `.25`, `1e3`
//! - Arithmetic: `+`, `-`, `*`, `/` with the usual precedence
//! - Unary minus: `-[cost]`
//! - Parentheses: `([a] + [b]) / 2`
//! - Column references: `[column name]`
//!
//! A column reference is replaced by the row's value coerced to a number. A
//! missing or non-numeric value reads as `0`, the same rule the aggregation
//! functions use.
//!
//! ## Example
//!
//! ```
//! use dataforge_rs::expression::{evaluate, Expression};
//! use dataforge_rs::types::row;
//!
//! let r = row([("price", 12.5), ("qty", 4.0)]);
//! assert_eq!(evaluate("[price] * [qty]", &r), Some(50.0));
//!
//! let expr = Expression::parse("([price] - 2.5) / 2").unwrap();
//! assert_eq!(expr.evaluate(&r).unwrap(), 5.0);
//!
//! // Errors never escape: they yield `None`.
//! assert_eq!(evaluate("[price] / 0", &r), None);
//! ```

mod parser;

pub use parser::{BinaryOp, ExprError, ExprNode, Expression, MAX_NESTING_DEPTH};

use crate::types::Row;

/// Parse and evaluate `expression` against `row`.
///
/// Returns `None` on any parse or evaluation error.
pub fn evaluate(expression: &str, row: &Row) -> Option<f64> {
    match Expression::parse(expression).and_then(|expr| expr.evaluate(row)) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::trace!("Expression {:?} failed: {}", expression, e);
            None
        }
    }
}
