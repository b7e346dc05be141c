//! Matcher tokenizer

use tessera_core::{Result, TesseraError};

/// Matcher token
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Ident(String),
    Str(String),
    LParen,
    RParen,
    Comma,
    Dot,
    And,
    Or,
    Not,
    Eq,
    NotEq,
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("identifier `{s}`"),
            Token::Str(s) => format!("string \"{s}\""),
            Token::LParen => "`(`".into(),
            Token::RParen => "`)`".into(),
            Token::Comma => "`,`".into(),
            Token::Dot => "`.`".into(),
            Token::And => "`&&`".into(),
            Token::Or => "`||`".into(),
            Token::Not => "`!`".into(),
            Token::Eq => "`==`".into(),
            Token::NotEq => "`!=`".into(),
        }
    }
}

/// Token with its byte offset in the matcher text
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

pub(crate) fn tokenize(text: &str) -> Result<Vec<Spanned>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;
        let token = match c {
            b' ' | b'\t' | b'\r' | b'\n' => {
                i += 1;
                continue;
            }
            b'(' => {
                i += 1;
                Token::LParen
            }
            b')' => {
                i += 1;
                Token::RParen
            }
            b',' => {
                i += 1;
                Token::Comma
            }
            b'.' => {
                i += 1;
                Token::Dot
            }
            b'&' if bytes.get(i + 1) == Some(&b'&') => {
                i += 2;
                Token::And
            }
            b'|' if bytes.get(i + 1) == Some(&b'|') => {
                i += 2;
                Token::Or
            }
            b'=' if bytes.get(i + 1) == Some(&b'=') => {
                i += 2;
                Token::Eq
            }
            b'!' if bytes.get(i + 1) == Some(&b'=') => {
                i += 2;
                Token::NotEq
            }
            b'!' => {
                i += 1;
                Token::Not
            }
            b'"' | b'\'' => {
                let quote = c;
                i += 1;
                let body_start = i;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                if i == bytes.len() {
                    return Err(TesseraError::configuration(format!(
                        "unterminated string starting at offset {start}"
                    )));
                }
                let body = text[body_start..i].to_string();
                i += 1;
                Token::Str(body)
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                Token::Ident(text[start..i].to_string())
            }
            _ => {
                let ch = text[start..].chars().next().unwrap_or('?');
                return Err(TesseraError::configuration(format!(
                    "unsupported character `{ch}` at offset {start}"
                )));
            }
        };
        tokens.push(Spanned {
            token,
            offset: start,
        });
    }

    Ok(tokens)
}
