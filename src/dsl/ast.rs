//! AST node types for entity query expressions.
//!
//! The tree is produced by an external query parser (or deserialized from
//! JSON) and is never mutated by the compiler. Each variant corresponds to one
//! query construct:
//!
//! - `Comparison`: `col = value`, `col > 10`, ...
//! - `Range`: `col:[1 TO 10]` or `col:">=1 and <=10"`
//! - `Like`: case-insensitive pattern match
//! - `FullTextSearch`: words matched against the precomputed text vector
//! - `Exists`: the attribute has a value
//! - `Expedition` / `Project`: restrict to expeditions or projects
//! - `Select`: project related entities into the result
//! - `All`: match every row
//! - `Empty`: a query that said nothing; always rejected

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Operators
// ============================================================================

/// Comparison operator of a `Comparison` expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOperator {
    #[serde(rename = "=")]
    Equals,
    #[serde(rename = "!=", alias = "<>")]
    NotEquals,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessThanOrEqual,
}

impl ComparisonOperator {
    /// Ordering operators compare typed values; equality compares raw text.
    pub fn is_ordering(&self) -> bool {
        !matches!(
            self,
            ComparisonOperator::Equals | ComparisonOperator::NotEquals
        )
    }

    /// Parse an operator from its SQL spelling.
    pub fn from_symbol(s: &str) -> Option<Self> {
        match s {
            "=" => Some(ComparisonOperator::Equals),
            "<>" | "!=" => Some(ComparisonOperator::NotEquals),
            ">" => Some(ComparisonOperator::GreaterThan),
            ">=" => Some(ComparisonOperator::GreaterThanOrEqual),
            "<" => Some(ComparisonOperator::LessThan),
            "<=" => Some(ComparisonOperator::LessThanOrEqual),
            _ => None,
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComparisonOperator::Equals => "=",
            ComparisonOperator::NotEquals => "!=",
            ComparisonOperator::GreaterThan => ">",
            ComparisonOperator::GreaterThanOrEqual => ">=",
            ComparisonOperator::LessThan => "<",
            ComparisonOperator::LessThanOrEqual => "<=",
        };
        f.write_str(s)
    }
}

/// Boolean connective of a `Logical` expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOperator::And => f.write_str("AND"),
            LogicalOperator::Or => f.write_str("OR"),
        }
    }
}

// ============================================================================
// Expression
// ============================================================================

/// A node of the query expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expression {
    Comparison {
        column: String,
        operator: ComparisonOperator,
        term: String,
    },
    Range {
        column: String,
        range: String,
    },
    Like {
        column: String,
        term: String,
    },
    FullTextSearch {
        #[serde(default)]
        column: Option<String>,
        term: String,
    },
    Exists {
        columns: Vec<String>,
    },
    Not {
        expression: Box<Expression>,
    },
    Logical {
        operator: LogicalOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Group {
        expression: Box<Expression>,
    },
    Expedition {
        expeditions: Vec<String>,
    },
    Project {
        projects: Vec<i64>,
    },
    Select {
        entities: Vec<String>,
        #[serde(default)]
        expression: Option<Box<Expression>>,
    },
    All,
    Empty,
}

impl Expression {
    pub fn comparison(column: &str, operator: ComparisonOperator, term: &str) -> Self {
        Expression::Comparison {
            column: column.into(),
            operator,
            term: term.into(),
        }
    }

    pub fn range(column: &str, range: &str) -> Self {
        Expression::Range {
            column: column.into(),
            range: range.into(),
        }
    }

    pub fn like(column: &str, term: &str) -> Self {
        Expression::Like {
            column: column.into(),
            term: term.into(),
        }
    }

    pub fn fts(column: Option<&str>, term: &str) -> Self {
        Expression::FullTextSearch {
            column: column.map(String::from),
            term: term.into(),
        }
    }

    pub fn exists(columns: &[&str]) -> Self {
        Expression::Exists {
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn not(expression: Expression) -> Self {
        Expression::Not {
            expression: Box::new(expression),
        }
    }

    pub fn and(left: Expression, right: Expression) -> Self {
        Expression::logical(LogicalOperator::And, left, right)
    }

    pub fn or(left: Expression, right: Expression) -> Self {
        Expression::logical(LogicalOperator::Or, left, right)
    }

    pub fn logical(operator: LogicalOperator, left: Expression, right: Expression) -> Self {
        Expression::Logical {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn group(expression: Expression) -> Self {
        Expression::Group {
            expression: Box::new(expression),
        }
    }

    pub fn expedition(codes: &[&str]) -> Self {
        Expression::Expedition {
            expeditions: codes.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn project(ids: &[i64]) -> Self {
        Expression::Project {
            projects: ids.to_vec(),
        }
    }

    pub fn select(entities: &[&str], expression: Option<Expression>) -> Self {
        Expression::Select {
            entities: entities.iter().map(|e| e.to_string()).collect(),
            expression: expression.map(Box::new),
        }
    }

    /// Direct children of this node, left to right.
    pub fn children(&self) -> Vec<&Expression> {
        match self {
            Expression::Not { expression } | Expression::Group { expression } => {
                vec![expression.as_ref()]
            }
            Expression::Logical { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Expression::Select {
                expression: Some(expression),
                ..
            } => vec![expression.as_ref()],
            _ => Vec::new(),
        }
    }

    /// Visit every node pre-order.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Expression)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Expedition codes referenced anywhere in the tree.
    pub fn expedition_codes(&self) -> BTreeSet<&str> {
        let mut codes = BTreeSet::new();
        self.walk(&mut |node| {
            if let Expression::Expedition { expeditions } = node {
                codes.extend(expeditions.iter().map(String::as_str));
            }
        });
        codes
    }

    /// Project ids referenced anywhere in the tree.
    pub fn project_ids(&self) -> BTreeSet<i64> {
        let mut ids = BTreeSet::new();
        self.walk(&mut |node| {
            if let Expression::Project { projects } = node {
                ids.extend(projects.iter().copied());
            }
        });
        ids
    }

    /// Entities named by `Select` nodes anywhere in the tree.
    pub fn select_entities(&self) -> BTreeSet<&str> {
        let mut entities = BTreeSet::new();
        self.walk(&mut |node| {
            if let Expression::Select { entities: names, .. } = node {
                entities.extend(names.iter().map(String::as_str));
            }
        });
        entities
    }
}
