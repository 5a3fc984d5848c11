//! Query expression language: AST and range specifications.
//!
//! Parsing query strings into this AST is done upstream; the compiler only
//! consumes the tree. Trees can also be built with the constructors on
//! [`Expression`] or deserialized from JSON:
//!
//! ```ignore
//! use fims_query::dsl::{ComparisonOperator, Expression};
//!
//! let expr = Expression::and(
//!     Expression::comparison("year", ComparisonOperator::GreaterThan, "2001"),
//!     Expression::expedition(&["EXP1"]),
//! );
//! ```

pub mod ast;
pub mod range;

pub use ast::{ComparisonOperator, Expression, LogicalOperator};
pub use range::{ParsedRange, RangeBound, RangeParseError};
