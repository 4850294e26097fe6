//! Tokenizer for condition expressions.

use crate::error::EvaluationError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Bool(bool),
    Ident(String),
    LParen,
    RParen,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Lt,
    LtEq,
    Gt,
    GtEq,
    EqEq,
    NotEq,
    And,
    Or,
    Not,
}

/// A token with its byte offset in the source.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub position: usize,
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, EvaluationError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;
        let token = match c {
            b'(' => single(&mut pos, Token::LParen),
            b')' => single(&mut pos, Token::RParen),
            b'+' => single(&mut pos, Token::Plus),
            b'-' => single(&mut pos, Token::Minus),
            b'*' => single(&mut pos, Token::Star),
            b'/' => single(&mut pos, Token::Slash),
            b'%' => single(&mut pos, Token::Percent),
            b'<' => pair(bytes, &mut pos, b'=', Token::LtEq, Token::Lt),
            b'>' => pair(bytes, &mut pos, b'=', Token::GtEq, Token::Gt),
            b'!' => pair(bytes, &mut pos, b'=', Token::NotEq, Token::Not),
            b'=' if bytes.get(pos + 1) == Some(&b'=') => {
                pos += 2;
                Token::EqEq
            }
            b'&' if bytes.get(pos + 1) == Some(&b'&') => {
                pos += 2;
                Token::And
            }
            b'|' if bytes.get(pos + 1) == Some(&b'|') => {
                pos += 2;
                Token::Or
            }
            b'0'..=b'9' | b'.' => number(source, &mut pos)?,
            c if c.is_ascii_alphabetic() || c == b'_' => word(source, &mut pos),
            _ => {
                let found = source[pos..].chars().next().unwrap_or('?');
                return Err(EvaluationError::Syntax {
                    position: pos,
                    message: format!("unexpected character '{found}'"),
                });
            }
        };
        tokens.push(Spanned {
            token,
            position: start,
        });
    }

    Ok(tokens)
}

fn single(pos: &mut usize, token: Token) -> Token {
    *pos += 1;
    token
}

fn pair(bytes: &[u8], pos: &mut usize, next: u8, long: Token, short: Token) -> Token {
    if bytes.get(*pos + 1) == Some(&next) {
        *pos += 2;
        long
    } else {
        *pos += 1;
        short
    }
}

fn number(source: &str, pos: &mut usize) -> Result<Token, EvaluationError> {
    let start = *pos;
    let bytes = source.as_bytes();
    while *pos < bytes.len() && (bytes[*pos].is_ascii_digit() || bytes[*pos] == b'.') {
        *pos += 1;
    }
    // exponent, e.g. 1e3 / 2.5E-2
    if *pos < bytes.len() && (bytes[*pos] == b'e' || bytes[*pos] == b'E') {
        let mut end = *pos + 1;
        if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
            end += 1;
        }
        if end < bytes.len() && bytes[end].is_ascii_digit() {
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            *pos = end;
        }
    }

    let text = &source[start..*pos];
    text.parse::<f64>()
        .map(Token::Number)
        .map_err(|_| EvaluationError::Syntax {
            position: start,
            message: format!("invalid number literal '{text}'"),
        })
}

fn word(source: &str, pos: &mut usize) -> Token {
    let start = *pos;
    let bytes = source.as_bytes();
    while *pos < bytes.len() && (bytes[*pos].is_ascii_alphanumeric() || bytes[*pos] == b'_') {
        *pos += 1;
    }
    match &source[start..*pos] {
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "true" | "True" => Token::Bool(true),
        "false" | "False" => Token::Bool(false),
        ident => Token::Ident(ident.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_operators_and_keywords() {
        assert_eq!(
            kinds("distance <= 10 and not movement || red != 2.5e1"),
            vec![
                Token::Ident("distance".into()),
                Token::LtEq,
                Token::Number(10.0),
                Token::And,
                Token::Not,
                Token::Ident("movement".into()),
                Token::Or,
                Token::Ident("red".into()),
                Token::NotEq,
                Token::Number(25.0),
            ]
        );
    }

    #[test]
    fn test_positions_are_byte_offsets() {
        let tokens = tokenize("  a >  1").unwrap();
        let positions: Vec<_> = tokens.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![2, 4, 7]);
    }

    #[test]
    fn test_rejects_unknown_characters() {
        let err = tokenize("distance = 3").unwrap_err();
        assert!(matches!(err, EvaluationError::Syntax { position: 9, .. }));

        let err = tokenize("__import__('os')").unwrap_err();
        assert!(matches!(err, EvaluationError::Syntax { position: 11, .. }));
    }

    #[test]
    fn test_malformed_number() {
        let err = tokenize("1.2.3").unwrap_err();
        assert!(matches!(err, EvaluationError::Syntax { position: 0, .. }));
    }
}
