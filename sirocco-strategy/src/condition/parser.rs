//! Recursive-descent parser for condition expressions.
//!
//! Precedence, loosest to tightest: `||`, `&&`, comparisons, `+ -`,
//! `* / %`, unary `! -`. Comparisons do not chain.

use sirocco_core::data::Field;
use sirocco_core::error::ConditionError;

use super::ast::{BinOp, Expr, UnOp};
use super::lexer::{Spanned, Token};

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    end: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Spanned], end: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            end,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |s| s.position)
    }

    fn advance(&mut self) -> Option<&Spanned> {
        let spanned = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(spanned)
    }

    fn error(&self, message: impl Into<String>) -> ConditionError {
        ConditionError::Parse {
            message: message.into(),
            position: self.position(),
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), ConditionError> {
        match self.peek() {
            Some(token) if token == expected => {
                self.advance();
                Ok(())
            }
            Some(token) => Err(self.error(format!("expected {what}, found {token:?}"))),
            None => Err(self.error(format!("expected {what}, found end of input"))),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ConditionError> {
        let mut expr = self.parse_and()?;
        while self.peek() == Some(&Token::OrOr) {
            self.advance();
            let rhs = self.parse_and()?;
            expr = Expr::Binary {
                op: BinOp::Or,
                lhs: Box::new(expr),
                rhs: Box::new(rhs),
            };
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, ConditionError> {
        let mut expr = self.parse_comparison()?;
        while self.peek() == Some(&Token::AndAnd) {
            self.advance();
            let rhs = self.parse_comparison()?;
            expr = Expr::Binary {
                op: BinOp::And,
                lhs: Box::new(expr),
                rhs: Box::new(rhs),
            };
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ConditionError> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            Some(Token::Lt) => BinOp::Lt,
            Some(Token::Le) => BinOp::Le,
            Some(Token::Gt) => BinOp::Gt,
            Some(Token::Ge) => BinOp::Ge,
            Some(Token::EqEq) => BinOp::Eq,
            Some(Token::Ne) => BinOp::Ne,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_additive()?;
        Ok(Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn parse_additive(&mut self) -> Result<Expr, ConditionError> {
        let mut expr = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(expr),
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            expr = Expr::Binary {
                op,
                lhs: Box::new(expr),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ConditionError> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Rem,
                _ => return Ok(expr),
            };
            self.advance();
            let rhs = self.parse_unary()?;
            expr = Expr::Binary {
                op,
                lhs: Box::new(expr),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ConditionError> {
        match self.peek() {
            Some(Token::Not) => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::Unary {
                    op: UnOp::Not,
                    operand: Box::new(operand),
                })
            }
            Some(Token::Minus) => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::Unary {
                    op: UnOp::Neg,
                    operand: Box::new(operand),
                })
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ConditionError> {
        let position = self.position();
        match self.advance().map(|s| s.token.clone()) {
            Some(Token::Num(value)) => Ok(Expr::Num(value)),
            Some(Token::Ident(ident)) => match Field::resolve(&ident) {
                Some(field) => Ok(Expr::Var(field)),
                None => Err(ConditionError::UnknownIdentifier { ident, position }),
            },
            Some(Token::LParen) => {
                let expr = self.parse_or()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(expr)
            }
            Some(token) => Err(ConditionError::Parse {
                message: format!("unexpected token {token:?}"),
                position,
            }),
            None => Err(ConditionError::Parse {
                message: "unexpected end of input".to_string(),
                position,
            }),
        }
    }
}

/// Parses a token stream into an expression.
///
/// `end` is the source length, used to position end-of-input errors.
pub(super) fn parse(tokens: &[Spanned], end: usize) -> Result<Expr, ConditionError> {
    let mut parser = Parser::new(tokens, end);
    let expr = parser.parse_or()?;
    if parser.pos < tokens.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::super::lexer::tokenize;
    use super::*;

    fn parse_str(input: &str) -> Result<Expr, ConditionError> {
        parse(&tokenize(input)?, input.len())
    }

    #[test]
    fn test_parse_comparison() {
        let expr = parse_str("rsi < 30").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinOp::Lt,
                lhs: Box::new(Expr::Var(Field::Rsi)),
                rhs: Box::new(Expr::Num(30.0)),
            }
        );
    }

    #[test]
    fn test_parse_precedence_mul_over_add() {
        // 1 + 2 * 3 parses as 1 + (2 * 3).
        let expr = parse_str("close == 1 + 2 * 3").unwrap();
        let Expr::Binary { op: BinOp::Eq, rhs, .. } = expr else {
            panic!("expected comparison");
        };
        let Expr::Binary { op: BinOp::Add, rhs: mul, .. } = *rhs else {
            panic!("expected addition");
        };
        assert!(matches!(*mul, Expr::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn test_parse_parentheses_override() {
        let expr = parse_str("close == (1 + 2) * 3").unwrap();
        let Expr::Binary { op: BinOp::Eq, rhs, .. } = expr else {
            panic!("expected comparison");
        };
        assert!(matches!(*rhs, Expr::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn test_parse_boolean_spine() {
        let expr = parse_str("rsi < 30 && close > 1 || volume > 0").unwrap();
        // || at the top, && beneath it on the left.
        let Expr::Binary { op: BinOp::Or, lhs, .. } = expr else {
            panic!("expected ||");
        };
        assert!(matches!(*lhs, Expr::Binary { op: BinOp::And, .. }));
    }

    #[test]
    fn test_parse_unary_chain() {
        let expr = parse_str("!!(close > 1)").unwrap();
        let Expr::Unary { op: UnOp::Not, operand } = expr else {
            panic!("expected !");
        };
        assert!(matches!(*operand, Expr::Unary { op: UnOp::Not, .. }));
    }

    #[test]
    fn test_parse_unknown_identifier_position() {
        let err = parse_str("close > threshold").unwrap_err();
        assert_eq!(
            err,
            ConditionError::UnknownIdentifier {
                ident: "threshold".to_string(),
                position: 8,
            }
        );
    }

    #[test]
    fn test_parse_unbalanced_paren() {
        assert!(matches!(
            parse_str("(close > 1"),
            Err(ConditionError::Parse { .. })
        ));
    }

    #[test]
    fn test_parse_comma_rejected() {
        assert!(matches!(
            parse_str("close > 1, volume > 0"),
            Err(ConditionError::Parse { .. })
        ));
    }

    #[test]
    fn test_parse_comparisons_do_not_chain() {
        assert!(matches!(
            parse_str("1 < close < 100"),
            Err(ConditionError::Parse { .. })
        ));
    }

    #[test]
    fn test_parse_dangling_operator() {
        assert!(matches!(
            parse_str("close >"),
            Err(ConditionError::Parse { .. })
        ));
    }
}
