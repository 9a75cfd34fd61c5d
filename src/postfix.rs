//! Regular expression front end: tokenizing, alphabet inference and the
//! infix to postfix rewrite.
//!
//! Supported syntax: literal characters, `|`, `*`, `+`, `?`, parentheses,
//! `ε` for the empty string and `\x` to take any character `x` literally.
//! Concatenation is implicit.

use std::fmt;

use itertools::Itertools;

use crate::{
    automaton::EPSILON_MARKER,
    error::{Error, ParseErrorKind, Result},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    Symbol(char),
    Epsilon,
    Union,
    Concat,
    Star,
    Plus,
    Optional,
    LeftParen,
    RightParen,
}

impl Token {
    /// Binding strength of binary operators.
    fn precedence(self) -> u8 {
        match self {
            Token::Union => 0,
            Token::Concat => 1,
            _ => 2,
        }
    }

    fn is_binary(self) -> bool {
        matches!(self, Token::Union | Token::Concat)
    }

    fn is_postfix(self) -> bool {
        matches!(self, Token::Star | Token::Plus | Token::Optional)
    }

    // a complete operand ends here
    fn ends_operand(self) -> bool {
        matches!(self, Token::Symbol(_) | Token::Epsilon | Token::RightParen) || self.is_postfix()
    }

    // a new operand starts here
    fn starts_operand(self) -> bool {
        matches!(self, Token::Symbol(_) | Token::Epsilon | Token::LeftParen)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Symbol(c) if is_reserved(*c) => write!(f, "\\{}", c),
            Token::Symbol(c) => write!(f, "{}", c),
            Token::Epsilon => write!(f, "{}", EPSILON_MARKER),
            Token::Union => write!(f, "|"),
            Token::Concat => write!(f, "."),
            Token::Star => write!(f, "*"),
            Token::Plus => write!(f, "+"),
            Token::Optional => write!(f, "?"),
            Token::LeftParen => write!(f, "("),
            Token::RightParen => write!(f, ")"),
        }
    }
}

fn is_reserved(c: char) -> bool {
    "|*+?()\\.".contains(c) || c == EPSILON_MARKER
}

/// A regex rewritten in postfix order, together with the symbols it uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Postfix {
    pub tokens: Vec<Token>,
    pub alphabet: Vec<char>,
}

impl fmt::Display for Postfix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tokens.iter().join(" "))
    }
}

/// Splits `expr` into tokens tagged with their character position.
pub fn tokenize(expr: &str) -> Result<Vec<(usize, Token)>> {
    let mut tokens = vec![];
    let mut chars = expr.chars().enumerate();
    while let Some((pos, c)) = chars.next() {
        let token = match c {
            '|' => Token::Union,
            '*' => Token::Star,
            '+' => Token::Plus,
            '?' => Token::Optional,
            '(' => Token::LeftParen,
            ')' => Token::RightParen,
            '\\' => match chars.next() {
                Some((_, escaped)) => Token::Symbol(escaped),
                None => return Err(Error::parse(pos, ParseErrorKind::DanglingEscape)),
            },
            c if c == EPSILON_MARKER => Token::Epsilon,
            c => Token::Symbol(c),
        };
        tokens.push((pos, token));
    }
    Ok(tokens)
}

/// Literal symbols in first-seen order, without duplicates.
pub fn infer_alphabet(tokens: &[(usize, Token)]) -> Vec<char> {
    tokens
        .iter()
        .filter_map(|(_, token)| match token {
            Token::Symbol(c) => Some(*c),
            _ => None,
        })
        .unique()
        .collect()
}

/// Makes concatenation explicit. An inserted operator takes the position of
/// the token that follows it.
pub fn insert_concatenation(tokens: &[(usize, Token)]) -> Vec<(usize, Token)> {
    let mut out: Vec<(usize, Token)> = Vec::with_capacity(tokens.len() * 2);
    for &(pos, token) in tokens {
        if let Some(&(_, prev)) = out.last() {
            if prev.ends_operand() && token.starts_operand() {
                out.push((pos, Token::Concat));
            }
        }
        out.push((pos, token));
    }
    out
}

/// Shunting-yard rewrite of an explicitly concatenated token stream.
/// `end` is the position reported for errors found after the last token.
pub fn to_postfix(tokens: &[(usize, Token)], end: usize) -> Result<Vec<Token>> {
    let mut output = vec![];
    let mut operators: Vec<(usize, Token)> = vec![];
    let mut expect_operand = true;

    for &(pos, token) in tokens {
        match token {
            Token::Symbol(_) | Token::Epsilon => {
                output.push(token);
                expect_operand = false;
            }
            Token::LeftParen => {
                operators.push((pos, token));
                expect_operand = true;
            }
            Token::RightParen => {
                if expect_operand {
                    return Err(Error::parse(pos, ParseErrorKind::MissingOperand));
                }
                loop {
                    match operators.pop() {
                        Some((_, Token::LeftParen)) => break,
                        Some((_, op)) => output.push(op),
                        None => {
                            return Err(Error::parse(pos, ParseErrorKind::UnbalancedParenthesis))
                        }
                    }
                }
            }
            t if t.is_postfix() => {
                if expect_operand {
                    return Err(Error::parse(pos, ParseErrorKind::MissingOperand));
                }
                // binds tighter than anything that can sit on the stack
                output.push(t);
            }
            t => {
                debug_assert!(t.is_binary());
                if expect_operand {
                    return Err(Error::parse(pos, ParseErrorKind::MissingOperand));
                }
                while let Some(&(_, top)) = operators.last() {
                    if top == Token::LeftParen || top.precedence() < t.precedence() {
                        break;
                    }
                    output.push(top);
                    operators.pop();
                }
                operators.push((pos, t));
                expect_operand = true;
            }
        }
    }

    if expect_operand {
        let kind = if tokens.is_empty() {
            ParseErrorKind::EmptyExpression
        } else {
            ParseErrorKind::MissingOperand
        };
        return Err(Error::parse(end, kind));
    }
    while let Some((pos, op)) = operators.pop() {
        if op == Token::LeftParen {
            return Err(Error::parse(pos, ParseErrorKind::UnbalancedParenthesis));
        }
        output.push(op);
    }
    Ok(output)
}

/// Runs the whole front end on `expr`.
pub fn compile(expr: &str) -> Result<Postfix> {
    let tokens = tokenize(expr)?;
    let alphabet = infer_alphabet(&tokens);
    let explicit = insert_concatenation(&tokens);
    let tokens = to_postfix(&explicit, expr.chars().count())?;
    log::debug!("postfix of {:?}: {}", expr, tokens.iter().join(" "));
    Ok(Postfix { tokens, alphabet })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn postfix(expr: &str) -> String {
        compile(expr).unwrap().to_string()
    }

    fn parse_error(expr: &str) -> (usize, ParseErrorKind) {
        match compile(expr) {
            Err(Error::Parse { position, kind }) => (position, kind),
            other => panic!("expected a parse error for {:?}, got {:?}", expr, other),
        }
    }

    #[test]
    fn test_alphabet_inference() {
        assert_eq!(compile("ab|a").unwrap().alphabet, vec!['a', 'b']);
        assert_eq!(compile("(c|a)*bca").unwrap().alphabet, vec!['c', 'a', 'b']);
        assert!(compile("ε").unwrap().alphabet.is_empty());
        assert_eq!(compile("\\*a").unwrap().alphabet, vec!['*', 'a']);
    }

    #[test]
    fn test_concatenation_binds_tighter_than_union() {
        assert_eq!(postfix("ab|c"), "a b . c |");
        assert_eq!(postfix("a|bc"), "a b c . |");
    }

    #[test]
    fn test_left_associativity() {
        assert_eq!(postfix("abc"), "a b . c .");
        assert_eq!(postfix("a|b|c"), "a b | c |");
    }

    #[test]
    fn test_postfix_operators() {
        assert_eq!(postfix("ab*"), "a b * .");
        assert_eq!(postfix("(ab)*"), "a b . *");
        assert_eq!(postfix("a+b?"), "a + b ? .");
        assert_eq!(postfix("a**"), "a * *");
        assert_eq!(postfix("(a|b)*c"), "a b | * c .");
    }

    #[test]
    fn test_implicit_concatenation_sites() {
        assert_eq!(postfix("a(b)"), "a b .");
        assert_eq!(postfix("(a)b"), "a b .");
        assert_eq!(postfix("(a)(b)"), "a b .");
        assert_eq!(postfix("a*b"), "a * b .");
        assert_eq!(postfix("aεb"), "a ε . b .");
    }

    #[test]
    fn test_escapes() {
        assert_eq!(postfix("\\(a\\)"), "\\( a . \\) .");
        assert_eq!(postfix("a\\|b"), "a \\| . b .");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_error(""), (0, ParseErrorKind::EmptyExpression));
        assert_eq!(parse_error("|a"), (0, ParseErrorKind::MissingOperand));
        assert_eq!(parse_error("a|"), (2, ParseErrorKind::MissingOperand));
        assert_eq!(parse_error("a||b"), (2, ParseErrorKind::MissingOperand));
        assert_eq!(parse_error("*a"), (0, ParseErrorKind::MissingOperand));
        assert_eq!(parse_error("()"), (1, ParseErrorKind::MissingOperand));
        assert_eq!(parse_error("(a|)"), (3, ParseErrorKind::MissingOperand));
        assert_eq!(parse_error("(ab"), (0, ParseErrorKind::UnbalancedParenthesis));
        assert_eq!(parse_error("a(b(c)"), (1, ParseErrorKind::UnbalancedParenthesis));
        assert_eq!(parse_error("ab)"), (2, ParseErrorKind::UnbalancedParenthesis));
        assert_eq!(parse_error("ab\\"), (2, ParseErrorKind::DanglingEscape));
    }
}
