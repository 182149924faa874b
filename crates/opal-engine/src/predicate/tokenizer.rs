//! Predicate tokenizer.
//!
//! Splits a WHERE-like clause into string tokens. Whitespace separates
//! tokens, single-quoted strings form one token (quotes preserved, backslash
//! escapes the next character), parentheses and commas are single-character
//! tokens, and `= ! < >` begin one- or two-character operator tokens. A
//! second pass folds multi-word keywords (`IS NULL`, `NOT BETWEEN`, ...)
//! into single tokens so the parser can treat them atomically.

/// Tokenizes a predicate string.
#[must_use]
pub fn tokenize(condition: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut buffer = String::new();
    let mut in_quotes = false;
    let mut escape_next = false;

    let mut chars = condition.chars().peekable();
    while let Some(ch) = chars.next() {
        if escape_next {
            buffer.push(ch);
            escape_next = false;
            continue;
        }

        if ch == '\\' {
            escape_next = true;
            continue;
        }

        if ch == '\'' {
            in_quotes = !in_quotes;
            buffer.push(ch);
        } else if in_quotes {
            buffer.push(ch);
        } else if ch.is_whitespace() {
            if !buffer.is_empty() {
                tokens.push(std::mem::take(&mut buffer));
            }
        } else if ch == '(' || ch == ')' || ch == ',' {
            if !buffer.is_empty() {
                tokens.push(std::mem::take(&mut buffer));
            }
            tokens.push(ch.to_string());
        } else if ch == '=' || ch == '!' || ch == '<' || ch == '>' {
            if !buffer.is_empty() {
                tokens.push(std::mem::take(&mut buffer));
            }
            let mut op = ch.to_string();
            if chars.peek() == Some(&'=') {
                op.push('=');
                chars.next();
            }
            tokens.push(op);
        } else {
            buffer.push(ch);
        }
    }

    if !buffer.is_empty() {
        tokens.push(buffer);
    }

    fold_keywords(tokens)
}

/// Folds multi-word keyword sequences into single tokens.
fn fold_keywords(tokens: Vec<String>) -> Vec<String> {
    let mut folded = Vec::with_capacity(tokens.len());
    let mut i = 0;

    let upper = |s: &String| s.to_uppercase();

    while i < tokens.len() {
        let first = upper(&tokens[i]);
        let second = tokens.get(i + 1).map(upper);
        let third = tokens.get(i + 2).map(upper);

        match (first.as_str(), second.as_deref(), third.as_deref()) {
            ("IS", Some("NOT"), Some("NULL")) => {
                folded.push("IS NOT NULL".to_string());
                i += 3;
            }
            ("IS", Some("NULL"), _) => {
                folded.push("IS NULL".to_string());
                i += 2;
            }
            ("NOT", Some("BETWEEN"), _) => {
                folded.push("NOT BETWEEN".to_string());
                i += 2;
            }
            ("NOT", Some("IN"), _) => {
                folded.push("NOT IN".to_string());
                i += 2;
            }
            ("NOT", Some("LIKE"), _) => {
                folded.push("NOT LIKE".to_string());
                i += 2;
            }
            _ => {
                folded.push(tokens[i].clone());
                i += 1;
            }
        }
    }

    folded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn test_whitespace_only() {
        assert!(tokenize("   \t \n ").is_empty());
    }

    #[test]
    fn test_simple_comparison() {
        assert_eq!(tokenize("age >= 18"), vec!["age", ">=", "18"]);
    }

    #[test]
    fn test_operators_split_from_operands() {
        assert_eq!(tokenize("a=1"), vec!["a", "=", "1"]);
        assert_eq!(tokenize("a!=b"), vec!["a", "!=", "b"]);
        assert_eq!(tokenize("a<b"), vec!["a", "<", "b"]);
        assert_eq!(tokenize("a<=b"), vec!["a", "<=", "b"]);
    }

    #[test]
    fn test_quoted_string_is_one_token() {
        assert_eq!(
            tokenize("name = 'van der Berg'"),
            vec!["name", "=", "'van der Berg'"]
        );
    }

    #[test]
    fn test_backslash_escapes_quote() {
        assert_eq!(tokenize(r"name = 'it\'s'"), vec!["name", "=", "'it's'"]);
    }

    #[test]
    fn test_parens_and_commas() {
        assert_eq!(
            tokenize("x IN (1,2, 3)"),
            vec!["x", "IN", "(", "1", ",", "2", ",", "3", ")"]
        );
    }

    #[test]
    fn test_is_null_folding() {
        assert_eq!(tokenize("x IS NULL"), vec!["x", "IS NULL"]);
        assert_eq!(tokenize("x is not null"), vec!["x", "IS NOT NULL"]);
    }

    #[test]
    fn test_not_between_folding() {
        assert_eq!(
            tokenize("x NOT BETWEEN 1 AND 5"),
            vec!["x", "NOT BETWEEN", "1", "AND", "5"]
        );
    }

    #[test]
    fn test_not_in_and_not_like_folding() {
        assert_eq!(tokenize("x not in ( 'a' )"), vec!["x", "NOT IN", "(", "'a'", ")"]);
        assert_eq!(tokenize("x NOT LIKE 'a%'"), vec!["x", "NOT LIKE", "'a%'"]);
    }

    #[test]
    fn test_bare_not_is_untouched() {
        assert_eq!(tokenize("NOT x = 1"), vec!["NOT", "x", "=", "1"]);
    }
}
