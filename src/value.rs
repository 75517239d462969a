//! The tagged value type every parsed PDF object is built from.

use std::collections::BTreeMap;

/// A dictionary maps `/Name` keys (stored without the leading slash) to
/// values. Keys are unique; iteration order is lexicographic, which is
/// also what makes emitted bytes reproducible across runs (spec.md §9).
pub type Dictionary = BTreeMap<String, PdfValue>;

/// An indirect object identity: object number + generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjRef {
    pub id: u32,
    pub gen: u16,
}

impl ObjRef {
    pub fn new(id: u32, gen: u16) -> Self {
        ObjRef { id, gen }
    }
}

/// A parsed PDF value. `Stream` always carries its dictionary plus the raw
/// (not yet filter-applied) bytes; filter application happens when the
/// stream is consumed, not when it's parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    /// A `/Name` token, stored without its leading slash.
    Name(String),
    /// A literal string `(...)`, escapes left verbatim (spec.md §4.B/§9).
    StringLit(Vec<u8>),
    /// A hex string `<...>`, already decoded to bytes.
    HexString(Vec<u8>),
    Array(Vec<PdfValue>),
    Dictionary(Dictionary),
    IndirectRef(ObjRef),
    Stream(Dictionary, Vec<u8>),
    /// `id gen obj` — only appears transiently while the resolver reads an
    /// object header; never stored in a finished document tree.
    ObjectDecl(ObjRef),
    /// A fully materialized indirect object, as produced by the resolver.
    Object(ObjRef, Box<PdfValue>),
    /// A keyword that isn't `true`/`false`/`null` and wasn't consumed by
    /// the `N N obj`/`N N R` lookahead (e.g. a stray `endobj`/`stream`
    /// encountered where a value was expected).
    Token(Vec<u8>),
}

impl PdfValue {
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            PdfValue::Dictionary(d) => Some(d),
            PdfValue::Stream(d, _) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[PdfValue]> {
        match self {
            PdfValue::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            PdfValue::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_ref(&self) -> Option<ObjRef> {
        match self {
            PdfValue::IndirectRef(r) => Some(*r),
            _ => None,
        }
    }

    /// Box math and other geometry reads treat integers and reals
    /// uniformly (spec.md §9 "Integer/Real duality").
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PdfValue::Integer(i) => Some(*i as f64),
            PdfValue::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PdfValue::Integer(i) => Some(*i),
            PdfValue::Real(r) => Some(*r as i64),
            _ => None,
        }
    }
}
