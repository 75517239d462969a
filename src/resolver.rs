//! Turns a loaded PDF byte buffer into resolvable indirect objects
//! (spec.md §4.D): discovers the xref chain once, then resolves `id gen R`
//! on demand, transparently materializing `/ObjStm` containers the first
//! time one of their members is requested.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::filter::flate_decode;
use crate::objio::read_object_body;
use crate::parser::Parser;
use crate::source::{read_all, PdfSource};
use crate::tokenizer::{Lexer, Token};
use crate::value::{ObjRef, PdfValue};
use crate::xref::{parse_ascii_uint, read_xref_chain, CrossReference, Trailer};

pub struct Reader {
    bytes: Vec<u8>,
    xref: CrossReference,
    pub trailer: Trailer,
    objstm_cache: RefCell<HashMap<u32, Vec<PdfValue>>>,
}

impl Reader {
    /// Loads the whole file into memory and discovers its xref chain
    /// (spec.md §4.D step 1). Idempotent: cheap to call once and share.
    pub fn open(bytes: Vec<u8>) -> Result<Self> {
        let start = find_startxref(&bytes)?;
        log::debug!("startxref points at byte offset {start}");
        let (xref, trailer) = read_xref_chain(&bytes, start)?;
        log::debug!(
            "xref chain resolved: {} classic entries, {} compressed entries",
            xref.classic.len(),
            xref.compressed.len()
        );
        Ok(Reader {
            bytes,
            xref,
            trailer,
            objstm_cache: RefCell::new(HashMap::new()),
        })
    }

    /// Like `open`, but reads the file from anything that implements
    /// `Read + Seek` rather than requiring the caller to have already
    /// loaded it into a `Vec<u8>` (SPEC_FULL.md §5).
    pub fn from_source(mut source: impl PdfSource) -> Result<Self> {
        Self::open(read_all(&mut source)?)
    }

    pub fn root_ref(&self) -> Result<ObjRef> {
        self.trailer
            .get("Root")
            .and_then(PdfValue::as_ref)
            .ok_or_else(|| Error::Reference("trailer has no /Root entry".into()))
    }

    /// Resolves `r` to its materialized value. Object bodies are re-read
    /// from the byte buffer on every call rather than cached permanently:
    /// the importer only ever walks a page's object graph once per page,
    /// so the simpler re-read is cheaper to reason about than cache
    /// invalidation (`/ObjStm` contents are the exception, cached below
    /// since unpacking one means parsing every sibling it contains).
    pub fn resolve(&self, r: ObjRef) -> Result<PdfValue> {
        if let Some(offset) = self.xref.classic_offset(r.id, r.gen) {
            return self.read_classic_object(r, offset);
        }
        if let Some((stream_id, index)) = self.xref.compressed_location(r.id) {
            return self.read_compressed_object(stream_id, index);
        }
        Err(Error::Reference(format!(
            "no cross-reference entry for {} {} R",
            r.id, r.gen
        )))
    }

    /// Resolves `value` one level if it's an `IndirectRef`, otherwise
    /// returns it unchanged. Used throughout the page-tree walker, which
    /// frequently doesn't care whether an attribute was direct or indirect.
    pub fn resolve_shallow(&self, value: &PdfValue) -> Result<PdfValue> {
        match value {
            PdfValue::IndirectRef(r) => self.resolve(*r),
            other => Ok(other.clone()),
        }
    }

    fn read_classic_object(&self, r: ObjRef, offset: u64) -> Result<PdfValue> {
        let mut parser = Parser::at(&self.bytes, offset as usize);
        let mut resolve_length = |v: &PdfValue| -> Result<i64> { self.resolve_length(v) };
        read_object_body(&mut parser, r, &mut resolve_length)
    }

    fn resolve_length(&self, v: &PdfValue) -> Result<i64> {
        match v {
            PdfValue::Integer(n) => Ok(*n),
            PdfValue::IndirectRef(r) => self
                .resolve(*r)?
                .as_i64()
                .ok_or_else(|| Error::Parse("/Length did not resolve to an integer".into())),
            other => Err(Error::Parse(format!("/Length must be a number, found {other:?}"))),
        }
    }

    fn read_compressed_object(&self, stream_id: u32, index: u32) -> Result<PdfValue> {
        if let Some(members) = self.objstm_cache.borrow().get(&stream_id) {
            return members
                .get(index as usize)
                .cloned()
                .ok_or_else(|| Error::Reference(format!("object stream {stream_id} has no member {index}")));
        }
        let members = self.materialize_objstm(stream_id)?;
        let result = members
            .get(index as usize)
            .cloned()
            .ok_or_else(|| Error::Reference(format!("object stream {stream_id} has no member {index}")));
        self.objstm_cache.borrow_mut().insert(stream_id, members);
        result
    }

    /// Unpacks an `/ObjStm` (spec.md §4.D step 3): `/N` header pairs of
    /// `id offset`, then each object's value starts at `/First + offset`
    /// with no `id gen obj`/`endobj` wrapper of its own.
    fn materialize_objstm(&self, stream_id: u32) -> Result<Vec<PdfValue>> {
        let obj = self.resolve(ObjRef::new(stream_id, 0))?;
        let (dict, raw) = match obj {
            PdfValue::Stream(d, b) => (d, b),
            other => return Err(Error::Parse(format!("object stream {stream_id} is not a stream: {other:?}"))),
        };

        let ty = dict.get("Type").and_then(PdfValue::as_name);
        if ty != Some("ObjStm") {
            return Err(Error::Parse(format!("expected /Type /ObjStm on object {stream_id}")));
        }
        let n = dict
            .get("N")
            .and_then(PdfValue::as_i64)
            .ok_or_else(|| Error::Parse("object stream missing /N".into()))? as usize;
        let first = dict
            .get("First")
            .and_then(PdfValue::as_i64)
            .ok_or_else(|| Error::Parse("object stream missing /First".into()))? as usize;

        let decoded = match dict.get("Filter").and_then(PdfValue::as_name) {
            Some("FlateDecode") => flate_decode(&raw)?,
            None => raw,
            Some(other) => {
                return Err(Error::UnsupportedFeature(format!(
                    "object stream filter {other} is not supported"
                )))
            }
        };

        let mut header = Lexer::new(&decoded);
        let mut offsets = Vec::with_capacity(n);
        for _ in 0..n {
            let id_tok = header.next_token();
            let off_tok = header.next_token();
            let (id_w, off_w) = match (id_tok, off_tok) {
                (Token::Word(a), Token::Word(b)) => (a, b),
                _ => return Err(Error::Parse("malformed object stream header".into())),
            };
            let id = parse_ascii_uint(&id_w).ok_or_else(|| Error::Parse("malformed object stream id".into()))?;
            let off = parse_ascii_uint(&off_w).ok_or_else(|| Error::Parse("malformed object stream offset".into()))?;
            offsets.push((id as u32, off as usize));
        }

        let mut members = Vec::with_capacity(n);
        for &(_id, off) in &offsets {
            let mut body_parser = Parser::at(&decoded, first + off);
            members.push(body_parser.parse_value()?);
        }
        Ok(members)
    }
}

fn find_startxref(bytes: &[u8]) -> Result<u64> {
    let needle = b"startxref";
    let pos = bytes
        .windows(needle.len())
        .rposition(|w| w == needle)
        .ok_or_else(|| Error::Parse("no 'startxref' keyword found".into()))?;
    let mut lexer = Lexer::new(bytes);
    lexer.seek(pos + needle.len());
    match lexer.next_token() {
        Token::Word(w) => {
            parse_ascii_uint(&w).ok_or_else(|| Error::Parse("malformed startxref offset".into()))
        }
        other => Err(Error::Parse(format!("expected an offset after 'startxref', found {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pdf() -> Vec<u8> {
        let mut pdf = Vec::new();
        pdf.extend_from_slice(b"%PDF-1.4\n");
        let obj1_off = pdf.len();
        pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
        let obj2_off = pdf.len();
        pdf.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n");
        let obj3_off = pdf.len();
        pdf.extend_from_slice(
            b"3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R >>\nendobj\n",
        );
        let obj4_off = pdf.len();
        let content = b"q Q";
        pdf.extend_from_slice(
            format!("4 0 obj\n<< /Length {} >>\nstream\n", content.len()).as_bytes(),
        );
        pdf.extend_from_slice(content);
        pdf.extend_from_slice(b"\nendstream\nendobj\n");
        let xref_off = pdf.len();
        pdf.extend_from_slice(b"xref\n0 5\n");
        pdf.extend_from_slice(b"0000000000 65535 f \n");
        for off in [obj1_off, obj2_off, obj3_off, obj4_off] {
            pdf.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes());
        }
        pdf.extend_from_slice(b"trailer\n<< /Size 5 /Root 1 0 R >>\n");
        pdf.extend_from_slice(format!("startxref\n{xref_off}\n%%EOF").as_bytes());
        pdf
    }

    #[test]
    fn opens_and_resolves_catalog() {
        let reader = Reader::open(sample_pdf()).unwrap();
        let root = reader.root_ref().unwrap();
        let catalog = reader.resolve(root).unwrap();
        assert_eq!(catalog.as_dict().unwrap().get("Type").and_then(PdfValue::as_name), Some("Catalog"));
    }

    #[test]
    fn resolves_stream_object_body() {
        let reader = Reader::open(sample_pdf()).unwrap();
        let contents = reader.resolve(ObjRef::new(4, 0)).unwrap();
        match contents {
            PdfValue::Stream(_, bytes) => assert_eq!(bytes, b"q Q"),
            other => panic!("expected a stream, got {other:?}"),
        }
    }

    #[test]
    fn missing_reference_is_an_error() {
        let reader = Reader::open(sample_pdf()).unwrap();
        assert!(reader.resolve(ObjRef::new(99, 0)).is_err());
    }
}
