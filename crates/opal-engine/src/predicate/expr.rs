//! Predicate expression tree.
//!
//! A parsed WHERE-like clause is represented as an [`Expr`] tree and
//! evaluated row-by-row against a column-name list. Cell values are carried
//! as strings; comparison operators coerce both sides to numbers first and
//! fall back to lexicographic string comparison when either side does not
//! parse.

use std::fmt;

use regex::Regex;

/// Absolute tolerance for numeric equality.
const NUMERIC_EPSILON: f64 = 1e-9;

/// Comparison operators usable between two scalar values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `!=`
    NotEq,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    GtEq,
    /// `<=`
    LtEq,
    /// `LIKE` pattern match (`%` any sequence, `_` any single character).
    Like,
}

impl CompareOp {
    /// Returns the predicate-language spelling of the operator.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::GtEq => ">=",
            Self::LtEq => "<=",
            Self::Like => "LIKE",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A predicate expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal string value (numeric literals keep their source text).
    Literal(String),

    /// A reference to a column by name (resolved case-insensitively).
    Column(String),

    /// A binary comparison.
    Comparison {
        /// Left operand.
        left: Box<Expr>,
        /// Operator.
        op: CompareOp,
        /// Right operand.
        right: Box<Expr>,
    },

    /// Logical AND with short-circuit evaluation.
    And(Box<Expr>, Box<Expr>),

    /// Logical OR with short-circuit evaluation.
    Or(Box<Expr>, Box<Expr>),

    /// Logical negation.
    Not(Box<Expr>),

    /// IS NULL / IS NOT NULL test (NULL is the empty string).
    IsNull {
        /// The tested expression; meaningful for column references.
        expr: Box<Expr>,
        /// True for IS NOT NULL.
        negated: bool,
    },

    /// BETWEEN range test, inclusive on both ends.
    Between {
        /// The tested value.
        expr: Box<Expr>,
        /// Lower bound.
        low: Box<Expr>,
        /// Upper bound.
        high: Box<Expr>,
        /// True for NOT BETWEEN.
        negated: bool,
    },

    /// IN list membership by exact string match against literals.
    InList {
        /// The tested value.
        expr: Box<Expr>,
        /// Candidate values.
        list: Vec<Expr>,
        /// True for NOT IN.
        negated: bool,
    },
}

/// Resolves a column name against a column-name list.
///
/// Matching is case-insensitive. An unqualified name also matches a
/// qualified `table.column` entry by its suffix, which is how projections
/// and conditions over joined rows resolve plain names.
#[must_use]
pub fn resolve_column(name: &str, columns: &[String]) -> Option<usize> {
    if let Some(idx) = columns
        .iter()
        .position(|c| c.eq_ignore_ascii_case(name))
    {
        return Some(idx);
    }
    if !name.contains('.') {
        return columns.iter().position(|c| {
            c.rsplit_once('.')
                .is_some_and(|(_, col)| col.eq_ignore_ascii_case(name))
        });
    }
    None
}

/// The truthiness rule applied to literal and cell values.
fn is_truthy(value: &str) -> bool {
    !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
}

fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok()
}

/// Matches a value against a SQL LIKE pattern.
///
/// `%` matches any sequence, `_` any single character; everything else is
/// literal.
#[must_use]
pub fn like_matches(value: &str, pattern: &str) -> bool {
    let mut regex_source = String::with_capacity(pattern.len() + 2);
    regex_source.push('^');
    for ch in pattern.chars() {
        match ch {
            '%' => regex_source.push_str(".*"),
            '_' => regex_source.push('.'),
            ch => regex_source.push_str(&regex::escape(&ch.to_string())),
        }
    }
    regex_source.push('$');

    Regex::new(&regex_source).is_ok_and(|re| re.is_match(value))
}

fn compare_numeric(left: f64, right: f64, op: CompareOp) -> bool {
    match op {
        CompareOp::Eq => (left - right).abs() < NUMERIC_EPSILON,
        CompareOp::NotEq => (left - right).abs() >= NUMERIC_EPSILON,
        CompareOp::Gt => left > right,
        CompareOp::Lt => left < right,
        CompareOp::GtEq => left >= right,
        CompareOp::LtEq => left <= right,
        CompareOp::Like => false,
    }
}

fn compare_lexicographic(left: &str, right: &str, op: CompareOp) -> bool {
    match op {
        CompareOp::Eq => left == right,
        CompareOp::NotEq => left != right,
        CompareOp::Gt => left > right,
        CompareOp::Lt => left < right,
        CompareOp::GtEq => left >= right,
        CompareOp::LtEq => left <= right,
        CompareOp::Like => false,
    }
}

impl Expr {
    /// Evaluates the expression against one row.
    ///
    /// `columns` names the positions of `row`; column references resolve
    /// case-insensitively. Missing columns and too-short rows evaluate to
    /// false rather than erroring.
    #[must_use]
    pub fn evaluate(&self, row: &[String], columns: &[String]) -> bool {
        match self {
            Self::Literal(value) => is_truthy(value),
            Self::Column(name) => match resolve_column(name, columns) {
                Some(idx) => row.get(idx).map(String::as_str).is_some_and(is_truthy),
                None => false,
            },
            Self::Comparison { left, op, right } => {
                Self::evaluate_comparison(left, *op, right, row, columns)
            }
            Self::And(left, right) => left.evaluate(row, columns) && right.evaluate(row, columns),
            Self::Or(left, right) => left.evaluate(row, columns) || right.evaluate(row, columns),
            Self::Not(inner) => !inner.evaluate(row, columns),
            Self::IsNull { expr, negated } => match expr.as_ref() {
                Self::Column(name) => {
                    let value = column_value(name, row, columns);
                    value.is_empty() != *negated
                }
                _ => false,
            },
            Self::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let (Some(value), Some(low), Some(high)) = (
                    expr.scalar_value(row, columns),
                    low.scalar_value(row, columns),
                    high.scalar_value(row, columns),
                ) else {
                    return false;
                };
                let in_range = match (
                    parse_number(&value),
                    parse_number(&low),
                    parse_number(&high),
                ) {
                    (Some(v), Some(lo), Some(hi)) => (lo..=hi).contains(&v),
                    _ => (low.as_str()..=high.as_str()).contains(&value.as_str()),
                };
                in_range != *negated
            }
            Self::InList {
                expr,
                list,
                negated,
            } => {
                let Some(value) = expr.scalar_value(row, columns) else {
                    return false;
                };
                let found = list
                    .iter()
                    .any(|item| matches!(item, Self::Literal(lit) if *lit == value));
                found != *negated
            }
        }
    }

    fn evaluate_comparison(
        left: &Expr,
        op: CompareOp,
        right: &Expr,
        row: &[String],
        columns: &[String],
    ) -> bool {
        match (
            left.scalar_value(row, columns),
            right.scalar_value(row, columns),
        ) {
            (Some(lhs), Some(rhs)) => {
                if op == CompareOp::Like {
                    return like_matches(&lhs, &rhs);
                }
                match (parse_number(&lhs), parse_number(&rhs)) {
                    (Some(l), Some(r)) => compare_numeric(l, r, op),
                    _ => compare_lexicographic(&lhs, &rhs, op),
                }
            }
            // Compound boolean operands: only equality is defined.
            _ => {
                let lhs = left.evaluate(row, columns);
                let rhs = right.evaluate(row, columns);
                match op {
                    CompareOp::Eq => lhs == rhs,
                    CompareOp::NotEq => lhs != rhs,
                    _ => false,
                }
            }
        }
    }

    /// Returns the string value of a literal or column reference, or `None`
    /// for compound expressions.
    ///
    /// An unresolvable column reference yields the empty string, which is
    /// the NULL representation.
    #[must_use]
    pub fn scalar_value(&self, row: &[String], columns: &[String]) -> Option<String> {
        match self {
            Self::Literal(value) => Some(value.clone()),
            Self::Column(name) => Some(column_value(name, row, columns)),
            _ => None,
        }
    }

    /// True when this node is a plain literal or column reference.
    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        matches!(self, Self::Literal(_) | Self::Column(_))
    }
}

fn column_value(name: &str, row: &[String], columns: &[String]) -> String {
    resolve_column(name, columns)
        .and_then(|idx| row.get(idx))
        .cloned()
        .unwrap_or_default()
}

fn write_quoted(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    f.write_str("'")?;
    for ch in value.chars() {
        if ch == '\'' || ch == '\\' {
            f.write_str("\\")?;
        }
        write!(f, "{ch}")?;
    }
    f.write_str("'")
}

/// Canonical printer. The output reparses to an equivalent tree: literals
/// are always quoted (quoted and numeric tokens classify to the same node),
/// and AND/OR groups are parenthesized to pin the shape.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write_quoted(f, value),
            Self::Column(name) => f.write_str(name),
            Self::Comparison { left, op, right } => write!(f, "{left} {op} {right}"),
            Self::And(left, right) => write!(f, "({left} AND {right})"),
            Self::Or(left, right) => write!(f, "({left} OR {right})"),
            Self::Not(inner) => write!(f, "NOT ({inner})"),
            Self::IsNull { expr, negated } => {
                if *negated {
                    write!(f, "{expr} IS NOT NULL")
                } else {
                    write!(f, "{expr} IS NULL")
                }
            }
            Self::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let keyword = if *negated { "NOT BETWEEN" } else { "BETWEEN" };
                write!(f, "{expr} {keyword} {low} AND {high}")
            }
            Self::InList {
                expr,
                list,
                negated,
            } => {
                let keyword = if *negated { "NOT IN" } else { "IN" };
                write!(f, "{expr} {keyword} (")?;
                for (i, item) in list.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
        }
    }
}
