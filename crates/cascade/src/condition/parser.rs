//! Recursive-descent parser producing the condition AST.
//!
//! Precedence, lowest first: `or`, `and`, `not`, comparisons (chainable),
//! additive, multiplicative, unary minus, primary.

use super::lexer::{tokenize, Spanned, Token};
use crate::error::EvaluationError;

/// Bound on nesting (parentheses, prefix operators, operator chains), which
/// also bounds the recursion of evaluating and dropping the tree.
pub(crate) const MAX_NESTING: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eq,
    NotEq,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Number(f64),
    Bool(bool),
    Var(String),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Arith(Box<Expr>, ArithOp, Box<Expr>),
    /// `a < b <= c` is `a < b and b <= c`, with `b` evaluated once.
    Compare(Box<Expr>, Vec<(CmpOp, Expr)>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

pub(crate) fn parse(source: &str) -> Result<Expr, EvaluationError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: source.len(),
        depth: 0,
    };
    let expr = parser.or()?;
    match parser.tokens.get(parser.pos) {
        None => Ok(expr),
        Some(extra) => Err(EvaluationError::Syntax {
            position: extra.position,
            message: "unexpected trailing input".to_string(),
        }),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|s| s.position)
            .unwrap_or(self.end)
    }

    fn error(&self, message: impl Into<String>) -> EvaluationError {
        EvaluationError::Syntax {
            position: self.position(),
            message: message.into(),
        }
    }

    fn nest(&mut self) -> Result<(), EvaluationError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error("expression nested too deeply"));
        }
        Ok(())
    }

    fn or(&mut self) -> Result<Expr, EvaluationError> {
        let outer = self.depth;
        let mut lhs = self.and()?;
        while self.eat(&Token::Or) {
            self.nest()?;
            let rhs = self.and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        self.depth = outer;
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, EvaluationError> {
        let outer = self.depth;
        let mut lhs = self.not()?;
        while self.eat(&Token::And) {
            self.nest()?;
            let rhs = self.not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        self.depth = outer;
        Ok(lhs)
    }

    fn not(&mut self) -> Result<Expr, EvaluationError> {
        if self.eat(&Token::Not) {
            self.nest()?;
            let inner = self.not()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, EvaluationError> {
        let first = self.additive()?;
        let mut chain = Vec::new();
        while let Some(op) = self.peek().and_then(cmp_op) {
            self.pos += 1;
            chain.push((op, self.additive()?));
        }
        if chain.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare(Box::new(first), chain))
        }
    }

    fn additive(&mut self) -> Result<Expr, EvaluationError> {
        let outer = self.depth;
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => ArithOp::Add,
                Some(Token::Minus) => ArithOp::Sub,
                _ => {
                    self.depth = outer;
                    return Ok(lhs);
                }
            };
            self.pos += 1;
            self.nest()?;
            let rhs = self.multiplicative()?;
            lhs = Expr::Arith(Box::new(lhs), op, Box::new(rhs));
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, EvaluationError> {
        let outer = self.depth;
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => ArithOp::Mul,
                Some(Token::Slash) => ArithOp::Div,
                Some(Token::Percent) => ArithOp::Rem,
                _ => {
                    self.depth = outer;
                    return Ok(lhs);
                }
            };
            self.pos += 1;
            self.nest()?;
            let rhs = self.unary()?;
            lhs = Expr::Arith(Box::new(lhs), op, Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Expr, EvaluationError> {
        if self.eat(&Token::Minus) {
            self.nest()?;
            let inner = self.unary()?;
            self.depth -= 1;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        if self.eat(&Token::Plus) {
            self.nest()?;
            let inner = self.unary()?;
            self.depth -= 1;
            return Ok(inner);
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, EvaluationError> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.error("unexpected end of expression"));
        };
        match token {
            Token::Number(n) => {
                self.pos += 1;
                Ok(Expr::Number(n))
            }
            Token::Bool(b) => {
                self.pos += 1;
                Ok(Expr::Bool(b))
            }
            Token::Ident(name) => {
                self.pos += 1;
                if self.peek() == Some(&Token::LParen) {
                    return Err(self.error(format!("'{name}' cannot be called")));
                }
                Ok(Expr::Var(name))
            }
            Token::LParen => {
                self.pos += 1;
                self.nest()?;
                let inner = self.or()?;
                if !self.eat(&Token::RParen) {
                    return Err(self.error("expected ')'"));
                }
                self.depth -= 1;
                Ok(inner)
            }
            other => Err(self.error(format!("unexpected token {other:?}"))),
        }
    }
}

fn cmp_op(token: &Token) -> Option<CmpOp> {
    Some(match token {
        Token::Lt => CmpOp::Lt,
        Token::LtEq => CmpOp::LtEq,
        Token::Gt => CmpOp::Gt,
        Token::GtEq => CmpOp::GtEq,
        Token::EqEq => CmpOp::Eq,
        Token::NotEq => CmpOp::NotEq,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Box<Expr> {
        Box::new(Expr::Var(name.to_string()))
    }

    #[test]
    fn test_precedence() {
        let expr = parse("red + green * 2 > 10 or blue").unwrap();
        let expected = Expr::Or(
            Box::new(Expr::Compare(
                Box::new(Expr::Arith(
                    var("red"),
                    ArithOp::Add,
                    Box::new(Expr::Arith(
                        var("green"),
                        ArithOp::Mul,
                        Box::new(Expr::Number(2.0)),
                    )),
                )),
                vec![(CmpOp::Gt, Expr::Number(10.0))],
            )),
            var("blue"),
        );
        assert_eq!(expr, expected);
    }

    #[test]
    fn test_chained_comparison() {
        let expr = parse("10 < distance <= 20").unwrap();
        assert_eq!(
            expr,
            Expr::Compare(
                Box::new(Expr::Number(10.0)),
                vec![
                    (CmpOp::Lt, Expr::Var("distance".into())),
                    (CmpOp::LtEq, Expr::Number(20.0)),
                ],
            )
        );
    }

    #[test]
    fn test_not_binds_looser_than_comparison() {
        let expr = parse("not distance < 5").unwrap();
        assert!(matches!(expr, Expr::Not(inner) if matches!(*inner, Expr::Compare(..))));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(
            parse("(distance < 10"),
            Err(EvaluationError::Syntax { position: 14, .. })
        ));
        assert!(matches!(
            parse("distance <"),
            Err(EvaluationError::Syntax { position: 10, .. })
        ));
        assert!(matches!(
            parse("distance 10"),
            Err(EvaluationError::Syntax { position: 9, .. })
        ));
        assert!(matches!(
            parse("exit()"),
            Err(EvaluationError::Syntax { .. })
        ));
        assert!(matches!(parse(""), Err(EvaluationError::Syntax { .. })));
    }

    fn too_deep(result: Result<Expr, EvaluationError>) -> bool {
        match result {
            Err(EvaluationError::Syntax { message, .. }) => {
                message == "expression nested too deeply"
            }
            _ => false,
        }
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let n = 10_000;
        assert!(too_deep(parse(&format!("{}1{} > 0", "(".repeat(n), ")".repeat(n)))));
        assert!(too_deep(parse(&format!("{}1", "-".repeat(n)))));
        assert!(too_deep(parse(&format!("{}distance", "not ".repeat(n)))));
        assert!(too_deep(parse(&vec!["1"; n].join(" + "))));
        assert!(too_deep(parse(&vec!["true"; n].join(" and "))));
    }

    #[test]
    fn test_nesting_within_limit() {
        let n = MAX_NESTING / 2;
        let expr = parse(&format!("{}distance{} < 5", "(".repeat(n), ")".repeat(n))).unwrap();
        assert!(matches!(expr, Expr::Compare(..)));
        assert!(parse(&vec!["red"; 20].join(" + ")).is_ok());
        // long comparison chains stay flat
        assert!(parse(&vec!["1"; 1_000].join(" < ")).is_ok());
    }
}
