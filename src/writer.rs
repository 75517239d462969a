//! Copies an object and its transitive dependencies out of a source PDF
//! and serializes them as new indirect objects, renumbered for the host
//! document (spec.md §4.G). Also builds the Form XObject wrapper around a
//! `Template` (spec.md §4.F/§6.2) and the page-placement matrix math
//! (spec.md §4.H).

use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use sha1::{Digest, Sha1};

use crate::error::{Error, Result};
use crate::resolver::Reader;
use crate::template::Template;
use crate::value::{Dictionary, ObjRef, PdfValue};

/// How a copied dictionary/array serializes a reference to another copied
/// object (spec.md §6.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefMode {
    /// `{base_id + alloc_index} 0 R`: real, final object numbers, stable
    /// for the lifetime of one `Writer`.
    Numeric,
    /// A 40-character lowercase SHA-1 hex digest of
    /// `"{alloc_index}-{source_id}-{source_file}"`, a placeholder the host
    /// generator text-substitutes once it has assigned the real numbers.
    Hash,
}

pub struct Writer {
    reader: Rc<Reader>,
    source_name: String,
    mode: RefMode,
    base_id: u32,
    next_alloc: u32,
    alloc_index: BTreeMap<ObjRef, u32>,
    queue: VecDeque<ObjRef>,
    written: BTreeMap<ObjRef, PdfValue>,
}

impl Writer {
    pub fn new(reader: Rc<Reader>, source_name: impl Into<String>, mode: RefMode, base_id: u32) -> Self {
        Writer {
            reader,
            source_name: source_name.into(),
            mode,
            base_id,
            next_alloc: 0,
            alloc_index: BTreeMap::new(),
            queue: VecDeque::new(),
            written: BTreeMap::new(),
        }
    }

    /// Registers `source_ref` (and transitively everything it references)
    /// for copying, draining the work queue to exhaustion before
    /// returning. Returns the final object id assigned to `source_ref`
    /// (meaningful in `RefMode::Numeric`; in `RefMode::Hash` callers
    /// should use `hash_for` instead).
    pub fn import(&mut self, source_ref: ObjRef) -> Result<u32> {
        let alloc = self.register(source_ref);
        self.drain()?;
        Ok(self.base_id + alloc)
    }

    /// The current count of distinct objects copied so far across every
    /// `import` call made on this writer. Callers use this to pick a
    /// non-colliding `base_id` for the next source file (spec.md §4.H).
    pub fn object_count(&self) -> u32 {
        self.next_alloc
    }

    pub fn base_object_id(&self) -> u32 {
        self.base_id
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Registers a value this writer didn't read from the source file
    /// itself (a freshly built Form XObject, typically) under a synthetic
    /// key, scanning it for references into objects that genuinely do
    /// need to be copied from the source (e.g. a `/Resources` dictionary
    /// pointing at source fonts), then drains as usual.
    pub fn adopt(&mut self, synthetic_ref: ObjRef, value: PdfValue) -> Result<u32> {
        let alloc = self.register(synthetic_ref);
        self.scan(&value);
        self.written.insert(synthetic_ref, value);
        self.drain()?;
        Ok(self.base_id + alloc)
    }

    fn register(&mut self, source_ref: ObjRef) -> u32 {
        if let Some(&idx) = self.alloc_index.get(&source_ref) {
            return idx;
        }
        let idx = self.next_alloc;
        self.next_alloc += 1;
        self.alloc_index.insert(source_ref, idx);
        self.queue.push_back(source_ref);
        idx
    }

    fn scan(&mut self, value: &PdfValue) {
        match value {
            PdfValue::IndirectRef(r) => {
                self.register(*r);
            }
            PdfValue::Array(items) => items.iter().for_each(|v| self.scan(v)),
            PdfValue::Dictionary(d) => d.values().for_each(|v| self.scan(v)),
            PdfValue::Stream(d, _) => d.values().for_each(|v| self.scan(v)),
            _ => {}
        }
    }

    fn drain(&mut self) -> Result<()> {
        while let Some(source_ref) = self.queue.pop_front() {
            if self.written.contains_key(&source_ref) {
                continue;
            }
            let value = self.reader.resolve(source_ref)?;
            self.scan(&value);
            self.written.insert(source_ref, value);
        }
        Ok(())
    }

    fn ref_bytes(&self, source_ref: ObjRef) -> Result<Vec<u8>> {
        let alloc = *self
            .alloc_index
            .get(&source_ref)
            .ok_or_else(|| Error::Serialization(format!("{source_ref:?} was never registered for copying")))?;
        match self.mode {
            RefMode::Numeric => Ok(format!("{} 0 R", self.base_id + alloc).into_bytes()),
            RefMode::Hash => Ok(hash_ref(alloc, source_ref.id, &self.source_name).into_bytes()),
        }
    }

    /// Serializes every object copied so far, in allocation order, as
    /// `id 0 obj ... endobj` blocks ready to splice into the host document.
    pub fn serialize_all(&self) -> Result<Vec<(u32, Vec<u8>)>> {
        let mut by_alloc: Vec<(u32, ObjRef)> = self
            .alloc_index
            .iter()
            .map(|(&source_ref, &alloc)| (alloc, source_ref))
            .collect();
        by_alloc.sort_by_key(|(alloc, _)| *alloc);

        let mut out = Vec::with_capacity(by_alloc.len());
        for (alloc, source_ref) in by_alloc {
            let value = self
                .written
                .get(&source_ref)
                .ok_or_else(|| Error::Serialization(format!("{source_ref:?} was registered but never resolved")))?;
            let id = self.base_id + alloc;
            let mut body = format!("{id} 0 obj\n").into_bytes();
            body.extend(self.serialize_value(value)?);
            body.extend_from_slice(b"\nendobj\n");
            out.push((id, body));
        }
        Ok(out)
    }

    /// Maps each hash placeholder this writer emitted to the real id it
    /// stands in for, so a caller using `RefMode::Hash` can run its own
    /// substitution pass once the host has finalized numbering.
    pub fn hash_to_id(&self) -> BTreeMap<String, u32> {
        self.alloc_index
            .iter()
            .map(|(&source_ref, &alloc)| {
                (hash_ref(alloc, source_ref.id, &self.source_name), self.base_id + alloc)
            })
            .collect()
    }

    /// The `RefMode::Hash` placeholder for `source_ref`, if it's already
    /// been registered with this writer (via `import`/`adopt`). `None`
    /// means the caller hasn't copied that object yet.
    pub fn hash_for(&self, source_ref: ObjRef) -> Option<String> {
        self.alloc_index
            .get(&source_ref)
            .map(|&alloc| hash_ref(alloc, source_ref.id, &self.source_name))
    }

    fn serialize_value(&self, value: &PdfValue) -> Result<Vec<u8>> {
        match value {
            PdfValue::Null => Ok(b"null".to_vec()),
            PdfValue::Boolean(true) => Ok(b"true".to_vec()),
            PdfValue::Boolean(false) => Ok(b"false".to_vec()),
            PdfValue::Integer(n) => Ok(n.to_string().into_bytes()),
            PdfValue::Real(r) => Ok(fmt_real(*r).into_bytes()),
            PdfValue::Name(n) => Ok(format!("/{n}").into_bytes()),
            PdfValue::StringLit(bytes) => {
                let mut out = Vec::with_capacity(bytes.len() + 2);
                out.push(b'(');
                out.extend_from_slice(bytes);
                out.push(b')');
                Ok(out)
            }
            PdfValue::HexString(bytes) => {
                let mut out = Vec::with_capacity(bytes.len() * 2 + 2);
                out.push(b'<');
                for b in bytes {
                    out.extend_from_slice(format!("{b:02X}").as_bytes());
                }
                out.push(b'>');
                Ok(out)
            }
            PdfValue::Array(items) => {
                let mut out = Vec::new();
                out.push(b'[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(b' ');
                    }
                    out.extend(self.serialize_value(item)?);
                }
                out.push(b']');
                Ok(out)
            }
            PdfValue::Dictionary(d) => self.serialize_dict(d),
            PdfValue::Stream(d, raw) => {
                let mut out = self.serialize_dict(d)?;
                out.extend_from_slice(b"\nstream\n");
                out.extend_from_slice(raw);
                out.extend_from_slice(b"\nendstream");
                Ok(out)
            }
            PdfValue::IndirectRef(r) => self.ref_bytes(*r),
            PdfValue::Token(bytes) => Ok(bytes.clone()),
            PdfValue::ObjectDecl(_) | PdfValue::Object(_, _) => {
                Err(Error::Serialization("object declarations are not a serializable value".into()))
            }
        }
    }

    fn serialize_dict(&self, d: &Dictionary) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.extend_from_slice(b"<<");
        for (k, v) in d {
            out.push(b' ');
            out.extend_from_slice(format!("/{k} ").as_bytes());
            out.extend(self.serialize_value(v)?);
        }
        out.extend_from_slice(b" >>");
        Ok(out)
    }
}

fn hash_ref(alloc_index: u32, source_id: u32, source_file: &str) -> String {
    let input = format!("{alloc_index}-{source_id}-{source_file}");
    let mut hasher = Sha1::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Trims to the shortest representation that round-trips at 6 decimal
/// digits, matching the precision PDF viewers expect from content-stream
/// numbers without emitting needless trailing zeros.
fn fmt_real(v: f64) -> String {
    let s = format!("{v:.6}");
    let trimmed = s.trim_end_matches('0');
    let trimmed = trimmed.trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-" || trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Builds the Form XObject dictionary+stream for a template (spec.md
/// §4.F/§6.2): `/BBox` at two decimal places, `/Matrix` at five, matching
/// the byte layout PDF readers expect from hand-assembled content.
/// `compress` re-applies `/FlateDecode` to the content on the way out
/// (spec.md §4.G.4, default on).
pub fn build_form_xobject(template: &Template, compress: bool) -> Result<PdfValue> {
    let mut dict = Dictionary::new();
    dict.insert("Type".into(), PdfValue::Name("XObject".into()));
    dict.insert("Subtype".into(), PdfValue::Name("Form".into()));
    dict.insert("FormType".into(), PdfValue::Integer(1));
    dict.insert(
        "BBox".into(),
        PdfValue::Array(
            [template.box_llx, template.box_lly, template.box_urx, template.box_ury]
                .iter()
                .map(|v| PdfValue::Token(format!("{v:.2}").into_bytes()))
                .collect(),
        ),
    );
    let matrix = rotation_matrix(template.rotation, template.box_llx, template.box_lly, template.box_urx, template.box_ury);
    dict.insert(
        "Matrix".into(),
        PdfValue::Array(matrix.iter().map(|v| PdfValue::Token(format!("{v:.5}").into_bytes())).collect()),
    );
    if let Some(resources) = &template.resources {
        dict.insert("Resources".into(), resources.clone());
    }

    let body = if compress {
        let compressed = flate_encode(&template.buffer)?;
        dict.insert("Filter".into(), PdfValue::Name("FlateDecode".into()));
        compressed
    } else {
        template.buffer.clone()
    };
    dict.insert("Length".into(), PdfValue::Integer(body.len() as i64));
    Ok(PdfValue::Stream(dict, body))
}

fn flate_encode(bytes: &[u8]) -> Result<Vec<u8>> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .map_err(|e| Error::Serialization(format!("FlateDecode compression failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| Error::Serialization(format!("FlateDecode compression failed: {e}")))
}

/// The content-space transform that counter-rotates a page's content so
/// it renders upright within the Form XObject's `/BBox` (spec.md §4.G.2).
/// `llx`/`lly`/`urx`/`ury` are the chosen box's corners as they appear on
/// the source page, not the (possibly swapped) template `w`/`h`.
fn rotation_matrix(rotation: i64, llx: f64, lly: f64, urx: f64, ury: f64) -> [f64; 6] {
    match rotation {
        90 => [0.0, 1.0, -1.0, 0.0, ury, -llx],
        180 => [-1.0, 0.0, 0.0, -1.0, urx, ury],
        270 => [0.0, -1.0, 1.0, 0.0, -lly, urx],
        _ => [1.0, 0.0, 0.0, 1.0, -llx, -lly],
    }
}

/// Computes where a template lands in the host's content stream (spec.md
/// §4.H): a zero width or height is filled in from the template's own
/// aspect ratio; both zero reproduces the template's native size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// The `cm` matrix the host writes immediately before `/Do`-ing the
    /// Form XObject.
    pub matrix: [f64; 6],
}

pub fn place_template(template: &Template, x: f64, y: f64, w: f64, h: f64) -> Placement {
    let (width, height) = match (w <= 0.0, h <= 0.0) {
        (true, true) => (template.w, template.h),
        (true, false) => (template.w * (h / template.h), h),
        (false, true) => (w, template.h * (w / template.w)),
        (false, false) => (w, h),
    };
    let scale_x = if template.w == 0.0 { 1.0 } else { width / template.w };
    let scale_y = if template.h == 0.0 { 1.0 } else { height / template.h };
    Placement {
        x,
        y,
        width,
        height,
        // PDF's content space is bottom-up; `ty` flips `y` through the
        // placed height (spec.md §4.H's `UseTemplate` formula).
        matrix: [scale_x, 0.0, 0.0, scale_y, x, -y - height],
    }
}
