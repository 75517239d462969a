//! Token stream -> tagged `PdfValue` (spec.md §4.B).

use crate::error::{Error, Result};
use crate::tokenizer::{Lexer, Token};
use crate::value::{ObjRef, PdfValue};

pub struct Parser<'a> {
    pub lexer: Lexer<'a>,
}

impl<'a> Parser<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Parser {
            lexer: Lexer::new(bytes),
        }
    }

    pub fn at(bytes: &'a [u8], pos: usize) -> Self {
        let mut lexer = Lexer::new(bytes);
        lexer.seek(pos);
        Parser { lexer }
    }

    pub fn pos(&self) -> usize {
        self.lexer.pos()
    }

    pub fn seek(&mut self, pos: usize) {
        self.lexer.seek(pos);
    }

    pub fn source(&self) -> &'a [u8] {
        self.lexer.source()
    }

    /// Reads the next token and parses the value it begins.
    pub fn parse_value(&mut self) -> Result<PdfValue> {
        let tok = self.lexer.next_token();
        self.parse_value_from(tok)
    }

    pub fn parse_value_from(&mut self, tok: Token) -> Result<PdfValue> {
        match tok {
            Token::DictOpen => self.parse_dict(),
            Token::ArrayOpen => self.parse_array(),
            Token::LParen => Ok(PdfValue::StringLit(self.lexer.read_literal_string())),
            Token::LAngle => Ok(PdfValue::HexString(self.lexer.read_hex_string())),
            Token::Word(w) => self.parse_word(w),
            Token::Eof => Err(Error::Parse("unexpected end of input while parsing a value".into())),
            other => Err(Error::Parse(format!("unexpected token {other:?} while parsing a value"))),
        }
    }

    fn parse_dict(&mut self) -> Result<PdfValue> {
        let mut dict = crate::value::Dictionary::new();
        loop {
            let key_tok = self.lexer.next_token();
            match key_tok {
                Token::DictClose => break,
                Token::Eof => {
                    return Err(Error::Parse("unexpected end of input inside a dictionary".into()))
                }
                Token::Word(w) => {
                    let key = word_as_name(&w).ok_or_else(|| {
                        Error::Parse(format!("expected a /Name dictionary key, got {:?}", String::from_utf8_lossy(&w)))
                    })?;
                    // A value whose sub-parse immediately sees `>>` means a
                    // missing value: emit Null for this key and terminate
                    // (spec.md §4.B).
                    let value_tok = self.lexer.next_token();
                    if value_tok == Token::DictClose {
                        dict.insert(key, PdfValue::Null);
                        break;
                    }
                    let value = self.parse_value_from(value_tok)?;
                    dict.insert(key, value);
                }
                other => return Err(Error::Parse(format!("expected a dictionary key, got {other:?}"))),
            }
        }
        Ok(PdfValue::Dictionary(dict))
    }

    fn parse_array(&mut self) -> Result<PdfValue> {
        let mut items = Vec::new();
        loop {
            let tok = self.lexer.next_token();
            match tok {
                Token::ArrayClose => break,
                Token::Eof => return Err(Error::Parse("unexpected end of input inside an array".into())),
                other => items.push(self.parse_value_from(other)?),
            }
        }
        Ok(PdfValue::Array(items))
    }

    fn parse_word(&mut self, w: Vec<u8>) -> Result<PdfValue> {
        match w.as_slice() {
            b"true" => return Ok(PdfValue::Boolean(true)),
            b"false" => return Ok(PdfValue::Boolean(false)),
            b"null" => return Ok(PdfValue::Null),
            _ => {}
        }

        if let Some(name) = word_as_name(&w) {
            return Ok(PdfValue::Name(name));
        }

        if let Some(classified) = classify_number(&w) {
            return match classified {
                Number::Integer(n) => self.parse_number_with_lookahead(n),
                Number::Real(r) => Ok(PdfValue::Real(r)),
            };
        }

        Ok(PdfValue::Token(w))
    }

    /// `N` has already been read as an integer. Peek up to two more tokens
    /// to disambiguate `N N obj` / `N N R` from a lone integer.
    fn parse_number_with_lookahead(&mut self, n: i64) -> Result<PdfValue> {
        let tok2 = self.lexer.next_token();
        let second_int = match &tok2 {
            Token::Word(w) => classify_number(w).and_then(|c| match c {
                Number::Integer(g) => Some(g),
                Number::Real(_) => None,
            }),
            _ => None,
        };

        let Some(gen) = second_int else {
            self.lexer.push_back(tok2);
            return Ok(PdfValue::Integer(n));
        };

        let tok3 = self.lexer.next_token();
        match &tok3 {
            Token::Word(w) if w.as_slice() == b"obj" => Ok(PdfValue::ObjectDecl(ObjRef::new(n as u32, gen as u16))),
            Token::Word(w) if w.as_slice() == b"R" => Ok(PdfValue::IndirectRef(ObjRef::new(n as u32, gen as u16))),
            _ => {
                self.lexer.push_back(tok3);
                self.lexer.push_back(tok2);
                Ok(PdfValue::Integer(n))
            }
        }
    }
}

fn word_as_name(w: &[u8]) -> Option<String> {
    if w.first() == Some(&b'/') {
        Some(String::from_utf8_lossy(&w[1..]).into_owned())
    } else {
        None
    }
}

enum Number {
    Integer(i64),
    Real(f64),
}

fn classify_number(w: &[u8]) -> Option<Number> {
    if w.is_empty() {
        return None;
    }
    let s = std::str::from_utf8(w).ok()?;
    let body = s.strip_prefix(['+', '-']).unwrap_or(s);
    if body.is_empty() || !body.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return None;
    }
    if body.contains('.') {
        s.parse::<f64>().ok().map(Number::Real)
    } else {
        s.parse::<i64>().ok().map(Number::Integer)
    }
}
