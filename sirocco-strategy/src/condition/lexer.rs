//! Condition lexer and sandbox filters.
//!
//! The lexer is the first sandbox layer: it rejects any character outside
//! the whitelist and any identifier on the deny-list before parsing begins.

use sirocco_core::error::ConditionError;

/// Identifiers that are rejected outright, whatever the surrounding syntax.
const DENY_LIST: &[&str] = &[
    "constructor",
    "prototype",
    "process",
    "global",
    "require",
    "import",
    "function",
    "new",
];

/// One lexical token with its byte offset in the source.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Spanned {
    pub token: Token,
    pub position: usize,
}

/// Lexical token kinds.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Token {
    Num(f64),
    Ident(String),
    AndAnd,
    OrOr,
    Not,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    Ne,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    Comma,
}

fn char_allowed(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(
            ch,
            '_' | ' ' | '(' | ')' | '.' | ',' | '!' | '<' | '>' | '=' | '&' | '|' | '+' | '-'
                | '*' | '/' | '%'
        )
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn parse_error(&self, message: impl Into<String>) -> ConditionError {
        ConditionError::Parse {
            message: message.into(),
            position: self.pos,
        }
    }

    fn scan_number(&mut self) -> Result<Spanned, ConditionError> {
        let start = self.pos;
        let mut has_dot = false;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }
        let text = &self.input[start..self.pos];
        let value: f64 = text.parse().map_err(|_| ConditionError::Parse {
            message: format!("invalid number '{text}'"),
            position: start,
        })?;
        Ok(Spanned {
            token: Token::Num(value),
            position: start,
        })
    }

    fn scan_word(&mut self) -> (String, usize) {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        (self.input[start..self.pos].to_string(), start)
    }

    fn scan_identifier(&mut self) -> Result<Spanned, ConditionError> {
        let (mut word, start) = self.scan_word();
        if DENY_LIST.contains(&word.to_ascii_lowercase().as_str()) {
            return Err(ConditionError::ForbiddenToken { token: word });
        }
        // Normalization: an optional `data.` prefix is stripped.
        if word.eq_ignore_ascii_case("data") && self.peek() == Some('.') {
            self.advance();
            let (inner, inner_start) = self.scan_word();
            if inner.is_empty() {
                return Err(ConditionError::Parse {
                    message: "expected identifier after 'data.'".to_string(),
                    position: inner_start,
                });
            }
            if DENY_LIST.contains(&inner.to_ascii_lowercase().as_str()) {
                return Err(ConditionError::ForbiddenToken { token: inner });
            }
            word = inner;
        }
        Ok(Spanned {
            token: Token::Ident(word),
            position: start,
        })
    }
}

/// Tokenizes a condition expression, applying the sandbox filters.
pub(super) fn tokenize(input: &str) -> Result<Vec<Spanned>, ConditionError> {
    if input.trim().is_empty() {
        return Err(ConditionError::Empty);
    }
    for (position, ch) in input.char_indices() {
        if !char_allowed(ch) {
            return Err(ConditionError::ForbiddenCharacter { ch, position });
        }
    }

    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();

    while let Some(ch) = lexer.peek() {
        let position = lexer.pos;
        match ch {
            ' ' => {
                lexer.advance();
            }
            '0'..='9' => tokens.push(lexer.scan_number()?),
            'a'..='z' | 'A'..='Z' | '_' => tokens.push(lexer.scan_identifier()?),
            '(' => {
                lexer.advance();
                tokens.push(Spanned {
                    token: Token::LParen,
                    position,
                });
            }
            ')' => {
                lexer.advance();
                tokens.push(Spanned {
                    token: Token::RParen,
                    position,
                });
            }
            ',' => {
                lexer.advance();
                tokens.push(Spanned {
                    token: Token::Comma,
                    position,
                });
            }
            '+' => {
                lexer.advance();
                tokens.push(Spanned {
                    token: Token::Plus,
                    position,
                });
            }
            '-' => {
                lexer.advance();
                tokens.push(Spanned {
                    token: Token::Minus,
                    position,
                });
            }
            '*' => {
                lexer.advance();
                tokens.push(Spanned {
                    token: Token::Star,
                    position,
                });
            }
            '/' => {
                lexer.advance();
                tokens.push(Spanned {
                    token: Token::Slash,
                    position,
                });
            }
            '%' => {
                lexer.advance();
                tokens.push(Spanned {
                    token: Token::Percent,
                    position,
                });
            }
            '&' => {
                lexer.advance();
                if lexer.peek() == Some('&') {
                    lexer.advance();
                    tokens.push(Spanned {
                        token: Token::AndAnd,
                        position,
                    });
                } else {
                    return Err(lexer.parse_error("expected '&&'"));
                }
            }
            '|' => {
                lexer.advance();
                if lexer.peek() == Some('|') {
                    lexer.advance();
                    tokens.push(Spanned {
                        token: Token::OrOr,
                        position,
                    });
                } else {
                    return Err(lexer.parse_error("expected '||'"));
                }
            }
            '<' => {
                lexer.advance();
                if lexer.peek() == Some('=') {
                    lexer.advance();
                    tokens.push(Spanned {
                        token: Token::Le,
                        position,
                    });
                } else {
                    tokens.push(Spanned {
                        token: Token::Lt,
                        position,
                    });
                }
            }
            '>' => {
                lexer.advance();
                if lexer.peek() == Some('=') {
                    lexer.advance();
                    tokens.push(Spanned {
                        token: Token::Ge,
                        position,
                    });
                } else {
                    tokens.push(Spanned {
                        token: Token::Gt,
                        position,
                    });
                }
            }
            '=' => {
                lexer.advance();
                if lexer.peek() == Some('=') {
                    lexer.advance();
                    tokens.push(Spanned {
                        token: Token::EqEq,
                        position,
                    });
                } else {
                    return Err(lexer.parse_error("expected '==' (assignment is not supported)"));
                }
            }
            '!' => {
                lexer.advance();
                if lexer.peek() == Some('=') {
                    lexer.advance();
                    tokens.push(Spanned {
                        token: Token::Ne,
                        position,
                    });
                } else {
                    tokens.push(Spanned {
                        token: Token::Not,
                        position,
                    });
                }
            }
            '.' => {
                return Err(ConditionError::Parse {
                    message: "unexpected '.'".to_string(),
                    position,
                });
            }
            other => {
                // Unreachable given the whitelist scan, kept as a hard stop.
                return Err(ConditionError::ForbiddenCharacter {
                    ch: other,
                    position,
                });
            }
        }
    }

    Ok(tokens)
}
