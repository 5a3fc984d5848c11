//! Range specification parsing.
//!
//! Two spellings are accepted:
//!
//! ```text
//! [1 TO 10]        ->  >= 1 AND <= 10
//! [1 TO 10}        ->  >= 1 AND < 10
//! {1 TO 10}        ->  > 1 AND < 10
//! {* TO 100]       ->  <= 100
//! >=0 and <=90     ->  >= 0 AND <= 90
//! >5               ->  > 5
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

use super::ast::ComparisonOperator;

static BRACKET_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([\[{])\s*(.*?)\s+TO\s+(.*?)\s*([\]}])\s*$").expect("range regex is valid")
});

static OPERATOR_BOUND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(>=|<=|>|<)\s*(\S.*?)\s*$").expect("bound regex is valid"));

static AND_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+and\s+").expect("separator regex is valid"));

/// One side of a range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeBound {
    pub operator: ComparisonOperator,
    pub value: String,
}

impl RangeBound {
    fn new(operator: ComparisonOperator, value: &str) -> Self {
        Self {
            operator,
            value: value.to_string(),
        }
    }
}

/// A parsed range with an optional lower (`>`/`>=`) and upper (`<`/`<=`) bound.
///
/// At least one bound is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRange {
    pub lower: Option<RangeBound>,
    pub upper: Option<RangeBound>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid range {0}")]
pub struct RangeParseError(pub String);

impl ParsedRange {
    pub fn parse(spec: &str) -> Result<Self, RangeParseError> {
        let parsed = match BRACKET_RANGE.captures(spec) {
            Some(caps) => Self::from_brackets(&caps[1], &caps[2], &caps[3], &caps[4]),
            None => Self::from_operators(spec),
        };
        let parsed = parsed.ok_or_else(|| RangeParseError(spec.to_string()))?;

        if parsed.lower.is_none() && parsed.upper.is_none() {
            return Err(RangeParseError(spec.to_string()));
        }
        Ok(parsed)
    }

    /// Bounds present, lower first.
    pub fn bounds(&self) -> impl Iterator<Item = &RangeBound> {
        self.lower.iter().chain(self.upper.iter())
    }

    fn from_brackets(open: &str, low: &str, high: &str, close: &str) -> Option<Self> {
        let lower = match low {
            "*" => None,
            "" => return None,
            v if open == "[" => Some(RangeBound::new(ComparisonOperator::GreaterThanOrEqual, v)),
            v => Some(RangeBound::new(ComparisonOperator::GreaterThan, v)),
        };
        let upper = match high {
            "*" => None,
            "" => return None,
            v if close == "]" => Some(RangeBound::new(ComparisonOperator::LessThanOrEqual, v)),
            v => Some(RangeBound::new(ComparisonOperator::LessThan, v)),
        };
        Some(Self { lower, upper })
    }

    fn from_operators(spec: &str) -> Option<Self> {
        let mut range = Self {
            lower: None,
            upper: None,
        };

        let parts: Vec<&str> = AND_SEPARATOR.split(spec.trim()).collect();
        if parts.len() > 2 {
            return None;
        }

        for part in parts {
            let caps = OPERATOR_BOUND.captures(part)?;
            let operator = ComparisonOperator::from_symbol(&caps[1])?;
            let bound = RangeBound::new(operator, &caps[2]);
            let slot = match operator {
                ComparisonOperator::GreaterThan | ComparisonOperator::GreaterThanOrEqual => {
                    &mut range.lower
                }
                _ => &mut range.upper,
            };
            if slot.replace(bound).is_some() {
                return None;
            }
        }

        Some(range)
    }
}
