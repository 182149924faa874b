//! Recursive-descent predicate parser.
//!
//! Grammar (keywords case-insensitive):
//!
//! ```text
//! expr      := term ( OR term )*
//! term      := factor ( AND factor )*
//! factor    := NOT factor | '(' expr ')' | predicate
//! predicate := value ( compOp value
//!                    | (IS NULL | IS NOT NULL)
//!                    | ([NOT] BETWEEN) value AND value
//!                    | ([NOT] IN) '(' value (',' value)* ')'
//!                    | ([NOT] LIKE) value
//!                    | ε )
//! value     := quoted-string | signed-integer | identifier
//! ```
//!
//! An empty input parses to the tautology `Literal("TRUE")`.

use super::error::ParseError;
use super::expr::{CompareOp, Expr};
use super::tokenizer::tokenize;

/// Parses a predicate string into an expression tree.
///
/// # Errors
///
/// Returns a [`ParseError`] for unbalanced parentheses, a BETWEEN tail
/// without AND, a malformed IN list, or a truncated input.
pub fn parse_predicate(condition: &str) -> Result<Expr, ParseError> {
    PredicateParser::new(condition).parse()
}

/// Token-stream parser for the predicate grammar.
pub struct PredicateParser {
    tokens: Vec<String>,
    pos: usize,
}

impl PredicateParser {
    /// Creates a parser over the tokenized condition.
    #[must_use]
    pub fn new(condition: &str) -> Self {
        Self {
            tokens: tokenize(condition),
            pos: 0,
        }
    }

    /// Parses the whole input.
    ///
    /// # Errors
    ///
    /// See [`parse_predicate`].
    pub fn parse(mut self) -> Result<Expr, ParseError> {
        if self.tokens.is_empty() {
            return Ok(Expr::Literal("TRUE".to_string()));
        }
        self.parse_expression()
    }

    fn peek(&self) -> &str {
        self.tokens.get(self.pos).map_or("", String::as_str)
    }

    fn next_token(&mut self) -> String {
        let token = self.tokens.get(self.pos).cloned().unwrap_or_default();
        self.pos += 1;
        token
    }

    fn match_token(&mut self, token: &str) -> bool {
        if self.peek().eq_ignore_ascii_case(token) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_term()?;
        while self.peek().eq_ignore_ascii_case("OR") {
            self.next_token();
            let right = self.parse_term()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_factor()?;
        while self.peek().eq_ignore_ascii_case("AND") {
            self.next_token();
            let right = self.parse_factor()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr, ParseError> {
        if self.peek().eq_ignore_ascii_case("NOT") {
            self.next_token();
            let inner = self.parse_factor()?;
            return Ok(Expr::Not(Box::new(inner)));
        }

        if self.match_token("(") {
            let inner = self.parse_expression()?;
            if !self.match_token(")") {
                return Err(ParseError::MissingCloseParen);
            }
            return Ok(inner);
        }

        self.parse_comparison_predicate()
    }

    fn parse_comparison_predicate(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_value()?;

        let keyword = self.peek().to_uppercase();
        match keyword.as_str() {
            "IS NULL" | "IS NOT NULL" => {
                self.next_token();
                Ok(Expr::IsNull {
                    expr: Box::new(left),
                    negated: keyword == "IS NOT NULL",
                })
            }
            "BETWEEN" | "NOT BETWEEN" => {
                self.next_token();
                let low = self.parse_value()?;
                if !self.match_token("AND") {
                    return Err(ParseError::MissingBetweenAnd);
                }
                let high = self.parse_value()?;
                Ok(Expr::Between {
                    expr: Box::new(left),
                    low: Box::new(low),
                    high: Box::new(high),
                    negated: keyword == "NOT BETWEEN",
                })
            }
            "IN" | "NOT IN" => {
                self.next_token();
                if !self.match_token("(") {
                    return Err(ParseError::MissingInOpen);
                }
                let mut list = vec![self.parse_value()?];
                while self.match_token(",") {
                    list.push(self.parse_value()?);
                }
                if !self.match_token(")") {
                    return Err(ParseError::MissingInClose);
                }
                Ok(Expr::InList {
                    expr: Box::new(left),
                    list,
                    negated: keyword == "NOT IN",
                })
            }
            "LIKE" | "NOT LIKE" => {
                self.next_token();
                let pattern = self.parse_value()?;
                let comparison = Expr::Comparison {
                    left: Box::new(left),
                    op: CompareOp::Like,
                    right: Box::new(pattern),
                };
                if keyword == "NOT LIKE" {
                    Ok(Expr::Not(Box::new(comparison)))
                } else {
                    Ok(comparison)
                }
            }
            "=" | "!=" | ">" | "<" | ">=" | "<=" => {
                self.next_token();
                let op = match keyword.as_str() {
                    "=" => CompareOp::Eq,
                    "!=" => CompareOp::NotEq,
                    ">" => CompareOp::Gt,
                    "<" => CompareOp::Lt,
                    ">=" => CompareOp::GtEq,
                    _ => CompareOp::LtEq,
                };
                let right = self.parse_value()?;
                Ok(Expr::Comparison {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                })
            }
            // A bare value acts as a boolean test.
            _ => Ok(left),
        }
    }

    fn parse_value(&mut self) -> Result<Expr, ParseError> {
        let token = self.next_token();
        if token.is_empty() {
            return Err(ParseError::UnexpectedEnd { expected: "a value" });
        }
        Ok(classify_value(&token))
    }
}

/// Classifies a raw value token as a literal or column reference.
///
/// Single-quoted tokens become literals with the quotes stripped; tokens
/// starting with a digit, or `-` followed by a digit, become literals kept
/// verbatim for later numeric coercion; anything else is a column reference.
fn classify_value(token: &str) -> Expr {
    let bytes = token.as_bytes();
    if token.len() >= 2 && token.starts_with('\'') && token.ends_with('\'') {
        return Expr::Literal(token[1..token.len() - 1].to_string());
    }
    let starts_numeric = bytes[0].is_ascii_digit()
        || (token.len() > 1 && bytes[0] == b'-' && bytes[1].is_ascii_digit());
    if starts_numeric {
        return Expr::Literal(token.to_string());
    }
    Expr::Column(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_empty_input_is_tautology() {
        let expr = parse_predicate("").unwrap();
        assert_eq!(expr, Expr::Literal("TRUE".to_string()));
        assert!(expr.evaluate(&[], &[]));
    }

    #[test]
    fn test_value_classification() {
        assert_eq!(classify_value("'abc'"), Expr::Literal("abc".into()));
        assert_eq!(classify_value("42"), Expr::Literal("42".into()));
        assert_eq!(classify_value("-7"), Expr::Literal("-7".into()));
        assert_eq!(classify_value("price"), Expr::Column("price".into()));
        // A lone minus is not numeric.
        assert_eq!(classify_value("-"), Expr::Column("-".into()));
    }

    #[test]
    fn test_simple_comparison() {
        let expr = parse_predicate("age >= 18").unwrap();
        assert!(expr.evaluate(&row(&["21"]), &cols(&["age"])));
        assert!(!expr.evaluate(&row(&["17"]), &cols(&["age"])));
    }

    #[test]
    fn test_and_or_precedence() {
        // AND binds tighter than OR.
        let expr = parse_predicate("a = 1 OR b = 1 AND c = 1").unwrap();
        let columns = cols(&["a", "b", "c"]);
        assert!(expr.evaluate(&row(&["1", "0", "0"]), &columns));
        assert!(expr.evaluate(&row(&["0", "1", "1"]), &columns));
        assert!(!expr.evaluate(&row(&["0", "1", "0"]), &columns));
    }

    #[test]
    fn test_parenthesized_grouping() {
        let expr = parse_predicate("(a = 1 OR b = 1) AND c = 1").unwrap();
        let columns = cols(&["a", "b", "c"]);
        assert!(!expr.evaluate(&row(&["1", "0", "0"]), &columns));
        assert!(expr.evaluate(&row(&["1", "0", "1"]), &columns));
    }

    #[test]
    fn test_not_factor() {
        let expr = parse_predicate("NOT a = 1").unwrap();
        let columns = cols(&["a"]);
        assert!(expr.evaluate(&row(&["2"]), &columns));
        assert!(!expr.evaluate(&row(&["1"]), &columns));
    }

    #[test]
    fn test_is_null_and_is_not_null() {
        let columns = cols(&["x"]);
        assert!(parse_predicate("x IS NULL")
            .unwrap()
            .evaluate(&row(&[""]), &columns));
        assert!(parse_predicate("x IS NOT NULL")
            .unwrap()
            .evaluate(&row(&["v"]), &columns));
    }

    #[test]
    fn test_between_and_not_between() {
        let columns = cols(&["x"]);
        assert!(parse_predicate("x BETWEEN 1 AND 5")
            .unwrap()
            .evaluate(&row(&["3"]), &columns));
        assert!(parse_predicate("x NOT BETWEEN 1 AND 5")
            .unwrap()
            .evaluate(&row(&["9"]), &columns));
    }

    #[test]
    fn test_in_list() {
        let columns = cols(&["x"]);
        let expr = parse_predicate("x IN ('a', 'b', 'c')").unwrap();
        assert!(expr.evaluate(&row(&["b"]), &columns));
        assert!(!expr.evaluate(&row(&["d"]), &columns));
        let expr = parse_predicate("x NOT IN (1, 2)").unwrap();
        assert!(expr.evaluate(&row(&["3"]), &columns));
    }

    #[test]
    fn test_like_and_not_like() {
        let columns = cols(&["name"]);
        let expr = parse_predicate("name LIKE 'alph%'").unwrap();
        assert!(expr.evaluate(&row(&["alphabet"]), &columns));
        let expr = parse_predicate("name NOT LIKE 'alph%'").unwrap();
        assert!(expr.evaluate(&row(&["beta"]), &columns));
        assert!(!expr.evaluate(&row(&["alpha"]), &columns));
    }

    #[test]
    fn test_bare_column_is_boolean_test() {
        let expr = parse_predicate("active").unwrap();
        assert!(expr.evaluate(&row(&["1"]), &cols(&["active"])));
        assert!(!expr.evaluate(&row(&["0"]), &cols(&["active"])));
    }

    #[test]
    fn test_missing_close_paren() {
        assert_eq!(
            parse_predicate("(a = 1").unwrap_err(),
            ParseError::MissingCloseParen
        );
    }

    #[test]
    fn test_missing_between_and() {
        assert_eq!(
            parse_predicate("x BETWEEN 1 5").unwrap_err(),
            ParseError::MissingBetweenAnd
        );
    }

    #[test]
    fn test_malformed_in_list() {
        assert_eq!(
            parse_predicate("x IN 1, 2").unwrap_err(),
            ParseError::MissingInOpen
        );
        assert_eq!(
            parse_predicate("x IN (1, 2").unwrap_err(),
            ParseError::MissingInClose
        );
    }

    #[test]
    fn test_truncated_comparison() {
        assert_eq!(
            parse_predicate("x =").unwrap_err(),
            ParseError::UnexpectedEnd { expected: "a value" }
        );
    }

    #[test]
    fn test_parse_print_parse_is_stable() {
        let inputs = [
            "age >= 18 AND name LIKE 'a%'",
            "x IS NOT NULL OR y BETWEEN 1 AND 5",
            "status IN ('new', 'open') AND NOT closed = 1",
        ];
        let columns = cols(&["age", "name", "x", "y", "status", "closed"]);
        let rows = [
            row(&["21", "alice", "", "3", "new", "0"]),
            row(&["17", "bob", "v", "9", "done", "1"]),
        ];
        for input in inputs {
            let parsed = parse_predicate(input).unwrap();
            let reparsed = parse_predicate(&parsed.to_string()).unwrap();
            for r in &rows {
                assert_eq!(
                    parsed.evaluate(r, &columns),
                    reparsed.evaluate(r, &columns),
                    "round-trip divergence for {input}"
                );
            }
        }
    }
}
