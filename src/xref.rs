//! Classic xref tables and cross-reference streams (spec.md §4.C). Both
//! forms are read into the same `CrossReference`, and `/Prev` chains are
//! walked until exhausted, with the newest section's entries always
//! winning over anything an older section claims for the same id.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::filter::{flate_decode, reverse_png_predictor};
use crate::objio::read_object_body;
use crate::parser::Parser;
use crate::tokenizer::Token;
use crate::value::{Dictionary, PdfValue};

/// Where a plain (non-compressed) object lives: a byte offset into the
/// source file.
pub type ClassicTable = HashMap<u32, HashMap<u16, u64>>;

/// Where a compressed object lives: the id of its containing `/ObjStm` and
/// its index within that stream.
pub type CompressedTable = HashMap<u32, (u32, u32)>;

#[derive(Debug, Default, Clone)]
pub struct CrossReference {
    pub classic: ClassicTable,
    pub compressed: CompressedTable,
}

impl CrossReference {
    pub fn classic_offset(&self, id: u32, gen: u16) -> Option<u64> {
        self.classic.get(&id).and_then(|gens| gens.get(&gen)).copied()
    }

    pub fn compressed_location(&self, id: u32) -> Option<(u32, u32)> {
        self.compressed.get(&id).copied()
    }

    fn merge_classic(&mut self, id: u32, gen: u16, offset: u64) {
        self.classic.entry(id).or_default().entry(gen).or_insert(offset);
    }

    fn merge_compressed(&mut self, id: u32, stream_id: u32, index: u32) {
        self.compressed.entry(id).or_insert((stream_id, index));
    }
}

pub type Trailer = Dictionary;

/// Reads the xref section at `start_offset` and follows `/Prev` until the
/// chain ends, merging entries so the newest section wins (spec.md §4.C).
pub fn read_xref_chain(bytes: &[u8], start_offset: u64) -> Result<(CrossReference, Trailer)> {
    let mut xref = CrossReference::default();
    let mut trailer = Trailer::new();
    let mut next_offset = Some(start_offset);
    let mut visited = HashSet::new();

    while let Some(offset) = next_offset {
        if !visited.insert(offset) {
            log::warn!("/Prev chain revisited offset {offset}, stopping");
            break;
        }
        log::debug!("reading cross-reference section at offset {offset}");
        let (section, prev) = read_one_section(bytes, offset, &mut xref)
            .map_err(|e| e.context(&format!("failed to read xref section at offset {offset}")))?;
        for (key, value) in section {
            trailer.entry(key).or_insert(value);
        }
        next_offset = prev;
    }

    log::debug!(
        "xref chain exhausted: {} classic entries, {} compressed entries",
        xref.classic.len(),
        xref.compressed.len()
    );
    Ok((xref, trailer))
}

fn read_one_section(bytes: &[u8], offset: u64, xref: &mut CrossReference) -> Result<(Dictionary, Option<u64>)> {
    let mut parser = Parser::at(bytes, offset as usize);
    let first = parser.lexer.next_token();
    match first {
        Token::Word(ref w) if w == b"xref" => read_classic_section(&mut parser, xref),
        _ => {
            parser.lexer.push_back(first);
            read_stream_section(&mut parser, xref)
        }
    }
}

fn read_classic_section(parser: &mut Parser, xref: &mut CrossReference) -> Result<(Dictionary, Option<u64>)> {
    loop {
        let tok = parser.lexer.next_token();
        let start_id: u64 = match &tok {
            Token::Word(w) if w.as_slice() == b"trailer" => break,
            Token::Word(w) => parse_ascii_uint(w)
                .ok_or_else(|| Error::Parse("malformed xref subsection header".into()))?,
            other => return Err(Error::Parse(format!("expected subsection header or 'trailer', found {other:?}"))),
        };

        let count_tok = parser.lexer.next_token();
        let count = match &count_tok {
            Token::Word(w) => parse_ascii_uint(w)
                .ok_or_else(|| Error::Parse("malformed xref subsection count".into()))?,
            other => return Err(Error::Parse(format!("expected subsection count, found {other:?}"))),
        };

        for i in 0..count {
            let off_tok = parser.lexer.next_token();
            let gen_tok = parser.lexer.next_token();
            let kind_tok = parser.lexer.next_token();
            let (off_w, gen_w, kind_w) = match (off_tok, gen_tok, kind_tok) {
                (Token::Word(a), Token::Word(b), Token::Word(c)) => (a, b, c),
                _ => return Err(Error::Parse("malformed xref entry".into())),
            };
            let entry_offset = parse_ascii_uint(&off_w)
                .ok_or_else(|| Error::Parse("malformed xref entry offset".into()))?;
            let gen = parse_ascii_uint(&gen_w)
                .ok_or_else(|| Error::Parse("malformed xref entry generation".into()))?;
            if kind_w == b"n" {
                let id = start_id + i;
                xref.merge_classic(id as u32, gen as u16, entry_offset);
            }
        }
    }

    log::debug!("classic xref section parsed, {} ids known so far", xref.classic.len());
    let trailer_val = parser.parse_value()?;
    let dict = trailer_val
        .as_dict()
        .cloned()
        .ok_or_else(|| Error::Parse("'trailer' keyword not followed by a dictionary".into()))?;
    let prev = dict.get("Prev").and_then(PdfValue::as_i64).map(|v| v as u64);
    Ok((dict, prev))
}

fn read_stream_section(parser: &mut Parser, xref: &mut CrossReference) -> Result<(Dictionary, Option<u64>)> {
    let start_pos = parser.pos();
    let header = parser.parse_value()?;
    let obj_ref = match header {
        PdfValue::ObjectDecl(r) => r,
        other => return Err(Error::Parse(format!("expected 'N G obj' at xref offset, found {other:?}"))),
    };
    parser.seek(start_pos);

    let mut resolve_length = |v: &PdfValue| -> Result<i64> {
        v.as_i64()
            .ok_or_else(|| Error::UnsupportedFeature("indirect /Length on a cross-reference stream".into()))
    };
    let object = read_object_body(parser, obj_ref, &mut resolve_length)?;
    let (dict, raw) = match object {
        PdfValue::Stream(d, bytes) => (d, bytes),
        other => return Err(Error::Parse(format!("cross-reference object is not a stream: {other:?}"))),
    };

    let ty = dict.get("Type").and_then(PdfValue::as_name);
    if ty != Some("XRef") {
        return Err(Error::Parse(format!("expected /Type /XRef, found {ty:?}")));
    }

    let w = dict
        .get("W")
        .and_then(PdfValue::as_array)
        .ok_or_else(|| Error::Parse("cross-reference stream missing /W".into()))?;
    if w.len() != 3 {
        return Err(Error::Parse("/W must have exactly three entries".into()));
    }
    let widths: Vec<usize> = w
        .iter()
        .map(|v| v.as_i64().map(|n| n as usize))
        .collect::<Option<_>>()
        .ok_or_else(|| Error::Parse("/W entries must be integers".into()))?;

    let size = dict
        .get("Size")
        .and_then(PdfValue::as_i64)
        .ok_or_else(|| Error::Parse("cross-reference stream missing /Size".into()))?;
    let index: Vec<i64> = match dict.get("Index").and_then(PdfValue::as_array) {
        Some(arr) => arr
            .iter()
            .map(PdfValue::as_i64)
            .collect::<Option<_>>()
            .ok_or_else(|| Error::Parse("/Index entries must be integers".into()))?,
        None => vec![0, size],
    };

    let decoded = decode_xref_stream_data(&dict, &raw)?;
    let row_len: usize = widths.iter().sum();
    if row_len == 0 {
        return Err(Error::Parse("/W entries cannot all be zero".into()));
    }

    let mut cursor = 0usize;
    for pair in index.chunks(2) {
        let &[start_id, count] = pair else {
            return Err(Error::Parse("/Index must contain id/count pairs".into()));
        };
        for i in 0..count {
            let row = decoded
                .get(cursor..cursor + row_len)
                .ok_or_else(|| Error::Parse("cross-reference stream data ends mid-row".into()))?;
            cursor += row_len;

            let id = (start_id + i) as u32;
            let (f1, rest) = row.split_at(widths[0]);
            let (f2, f3) = rest.split_at(widths[1]);
            let field_type = if widths[0] == 0 { 1 } else { be_uint(f1) };
            let field2 = be_uint(f2);
            let field3 = be_uint(f3);

            match field_type {
                0 => {}
                1 => xref.merge_classic(id, field3 as u16, field2),
                2 => xref.merge_compressed(id, field2 as u32, field3 as u32),
                other => {
                    return Err(Error::UnsupportedFeature(format!(
                        "unknown cross-reference stream entry type {other}"
                    )))
                }
            }
        }
    }

    log::debug!("cross-reference stream parsed, {} ids known so far", xref.classic.len() + xref.compressed.len());
    let prev = dict.get("Prev").and_then(PdfValue::as_i64).map(|v| v as u64);
    Ok((dict, prev))
}

fn decode_xref_stream_data(dict: &Dictionary, raw: &[u8]) -> Result<Vec<u8>> {
    let inflated = match dict.get("Filter").and_then(PdfValue::as_name) {
        Some("FlateDecode") => flate_decode(raw)?,
        None => raw.to_vec(),
        Some(other) => {
            return Err(Error::UnsupportedFeature(format!(
                "cross-reference stream filter {other} is not supported"
            )))
        }
    };

    let Some(parms) = dict.get("DecodeParms").and_then(PdfValue::as_dict) else {
        return Ok(inflated);
    };
    let predictor = parms.get("Predictor").and_then(PdfValue::as_i64).unwrap_or(1);
    if predictor <= 1 {
        return Ok(inflated);
    }
    if predictor > 12 {
        return Err(Error::UnsupportedFeature(format!(
            "cross-reference stream predictor {predictor} is not supported (only /Predictor <= 12)"
        )));
    }
    let columns = parms.get("Columns").and_then(PdfValue::as_i64).unwrap_or(1) as usize;
    log::debug!("reversing PNG predictor {predictor} over {columns} columns");
    reverse_png_predictor(&inflated, columns)
}

fn be_uint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

pub(crate) fn parse_ascii_uint(w: &[u8]) -> Option<u64> {
    if w.is_empty() || !w.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(w).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classic_table_prefers_newest_entry() {
        let mut xref = CrossReference::default();
        xref.merge_classic(5, 0, 100);
        xref.merge_classic(5, 0, 200); // older /Prev section, should be ignored
        assert_eq!(xref.classic_offset(5, 0), Some(100));
    }

    #[test]
    fn reads_minimal_classic_xref() {
        let pdf = b"xref\n0 2\n0000000000 65535 f \n0000000020 00000 n \ntrailer\n<< /Size 2 /Root 1 0 R >>\n";
        let (xref, trailer) = read_xref_chain(pdf, 0).unwrap();
        assert_eq!(xref.classic_offset(1, 0), Some(20));
        assert_eq!(trailer.get("Size"), Some(&PdfValue::Integer(2)));
    }

    #[test]
    fn be_uint_reads_big_endian() {
        assert_eq!(be_uint(&[0x05, 0x07]), 1287);
    }
}
