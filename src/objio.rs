//! Shared "read one indirect object's body" routine (spec.md §4.C step 2,
//! §4.D step 2). Used both by the cross-reference-stream bootstrap, which
//! runs before any xref table exists, and by the general object resolver,
//! which can satisfy an indirect `/Length` by recursing back into itself.

use crate::error::{Error, Result};
use crate::parser::Parser;
use crate::tokenizer::Token;
use crate::value::{ObjRef, PdfValue};

/// Parses `id gen obj <value> [stream ... endstream] endobj` starting at
/// `parser`'s current position, which must already sit on the leading `id`
/// token. `resolve_length` turns whatever the stream dictionary's
/// `/Length` value is (an `Integer`, or an `IndirectRef` the caller knows
/// how to chase) into a concrete byte count.
pub fn read_object_body(
    parser: &mut Parser,
    expected: ObjRef,
    resolve_length: &mut dyn FnMut(&PdfValue) -> Result<i64>,
) -> Result<PdfValue> {
    let decl = parser.parse_value()?;
    let got = match decl {
        PdfValue::ObjectDecl(r) => r,
        other => return Err(Error::Parse(format!("expected 'N G obj', found {other:?}"))),
    };
    if got != expected {
        return Err(Error::Parse(format!(
            "object declaration mismatch: expected {}, found {}",
            fmt_ref(expected),
            fmt_ref(got)
        )));
    }

    let value = parser.parse_value()?;

    let next = parser.lexer.next_token();
    match next {
        Token::Word(w) if w == b"endobj" => Ok(value),
        Token::Word(w) if w == b"stream" => {
            let dict = value
                .as_dict()
                .cloned()
                .ok_or_else(|| Error::Parse("'stream' keyword without a preceding dictionary".into()))?;
            skip_stream_eol(parser);

            let length_val = dict
                .get("Length")
                .ok_or_else(|| Error::Parse("stream dictionary is missing /Length".into()))?;
            let length = resolve_length(length_val)?;
            if length < 0 {
                return Err(Error::Parse("stream /Length is negative".into()));
            }

            let start = parser.pos();
            let end = start + length as usize;
            let bytes = parser
                .source()
                .get(start..end)
                .ok_or_else(|| Error::Parse("stream runs past end of file".into()))?
                .to_vec();
            parser.seek(end);

            expect_word(parser, b"endstream")?;
            expect_word(parser, b"endobj")?;
            Ok(PdfValue::Stream(dict, bytes))
        }
        other => Err(Error::Parse(format!(
            "expected 'endobj' or 'stream' after object {}, found {other:?}",
            fmt_ref(expected)
        ))),
    }
}

fn skip_stream_eol(parser: &mut Parser) {
    let bytes = parser.source();
    let mut pos = parser.pos();
    if bytes.get(pos) == Some(&b'\r') {
        pos += 1;
    }
    if bytes.get(pos) == Some(&b'\n') {
        pos += 1;
    }
    parser.seek(pos);
}

fn expect_word(parser: &mut Parser, want: &[u8]) -> Result<()> {
    match parser.lexer.next_token() {
        Token::Word(w) if w == want => Ok(()),
        other => Err(Error::Parse(format!(
            "expected keyword {:?}, found {other:?}",
            String::from_utf8_lossy(want)
        ))),
    }
}

fn fmt_ref(r: ObjRef) -> String {
    format!("{} {} obj", r.id, r.gen)
}
