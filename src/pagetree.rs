//! Page-tree walking: flattening `/Pages` into an ordered list of leaf
//! pages, folding inherited attributes down the `/Parent` chain, and
//! concatenating a page's content streams (spec.md §4.E).

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::filter::flate_decode;
use crate::resolver::Reader;
use crate::value::{ObjRef, PdfValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BoxName {
    MediaBox,
    CropBox,
    BleedBox,
    TrimBox,
    ArtBox,
}

impl BoxName {
    fn key(self) -> &'static str {
        match self {
            BoxName::MediaBox => "MediaBox",
            BoxName::CropBox => "CropBox",
            BoxName::BleedBox => "BleedBox",
            BoxName::TrimBox => "TrimBox",
            BoxName::ArtBox => "ArtBox",
        }
    }
}

pub const ALL_BOX_NAMES: [BoxName; 5] = [
    BoxName::MediaBox,
    BoxName::CropBox,
    BoxName::BleedBox,
    BoxName::TrimBox,
    BoxName::ArtBox,
];

#[derive(Debug, Clone)]
pub struct PageAttrs {
    pub media_box: [f64; 4],
    pub boxes: BTreeMap<&'static str, [f64; 4]>,
    pub resources: Option<PdfValue>,
    pub rotate: i64,
}

impl PageAttrs {
    /// Resolves a box name through the fallback chain spec.md §4.E lays
    /// out: `/BleedBox`/`/TrimBox`/`/ArtBox` fall back to `/CropBox`, which
    /// in turn falls back to `/MediaBox` (always present).
    pub fn resolve_box(&self, name: BoxName) -> [f64; 4] {
        if let Some(b) = self.boxes.get(name.key()) {
            return *b;
        }
        if name != BoxName::MediaBox {
            if let Some(b) = self.boxes.get(BoxName::CropBox.key()) {
                return *b;
            }
        }
        self.media_box
    }

    /// The full fold across every box name (SPEC_FULL.md §5's
    /// `GetPageSizes`-style extension): every entry resolves through the
    /// same fallback chain, not just the one the caller originally asked
    /// for.
    pub fn all_boxes(&self) -> BTreeMap<BoxName, [f64; 4]> {
        ALL_BOX_NAMES.iter().map(|&n| (n, self.resolve_box(n))).collect()
    }
}

/// Walks `/Root -> /Pages -> Kids*` depth-first, collecting leaf `/Type
/// /Page` object refs in document order. A subtree's `/Count`, when
/// present, must match the number of leaves actually found under it.
pub fn flatten_pages(reader: &Reader) -> Result<Vec<ObjRef>> {
    let catalog = reader.resolve(reader.root_ref()?).map_err(|e| e.context("failed to read pages"))?;
    let pages_ref = catalog
        .as_dict()
        .and_then(|d| d.get("Pages"))
        .and_then(PdfValue::as_ref)
        .ok_or_else(|| Error::Page("catalog has no /Pages entry".into()))?;

    let mut leaves = Vec::new();
    walk_node(reader, pages_ref, &mut leaves).map_err(|e| e.context("failed to read pages"))?;
    Ok(leaves)
}

fn walk_node(reader: &Reader, node_ref: ObjRef, leaves: &mut Vec<ObjRef>) -> Result<()> {
    let node = reader.resolve(node_ref).map_err(|e| e.context("failed to resolve object"))?;
    let dict = node
        .as_dict()
        .ok_or_else(|| Error::Page(format!("page-tree node {} {} R is not a dictionary", node_ref.id, node_ref.gen)))?;

    match dict.get("Type").and_then(PdfValue::as_name) {
        Some("Page") => {
            leaves.push(node_ref);
            return Ok(());
        }
        Some("Pages") | None => {}
        Some(other) => return Err(Error::Page(format!("unexpected /Type {other} in page tree"))),
    }

    let kids = dict
        .get("Kids")
        .and_then(PdfValue::as_array)
        .ok_or_else(|| Error::Page(format!("/Pages node {} {} R has no /Kids", node_ref.id, node_ref.gen)))?;

    let before = leaves.len();
    for kid in kids {
        let kid_ref = kid
            .as_ref()
            .ok_or_else(|| Error::Page("/Kids entry is not an indirect reference".into()))?;
        walk_node(reader, kid_ref, leaves).map_err(|e| e.context("failed to resolve kids"))?;
    }

    if let Some(expected) = dict.get("Count").and_then(PdfValue::as_i64) {
        let found = (leaves.len() - before) as i64;
        if found != expected {
            log::warn!("/Count mismatch under {} {} R: declared {expected}, found {found}", node_ref.id, node_ref.gen);
            return Err(Error::Page(format!(
                "/Count mismatch under {} {} R: declared {expected}, found {found}",
                node_ref.id, node_ref.gen
            )));
        }
    }

    Ok(())
}

/// Folds inherited attributes up the `/Parent` chain (spec.md §4.E):
/// `/Resources`, `/Rotate`, and the box attributes are inheritable; the
/// nearest ancestor that sets one wins.
pub fn resolve_page_attrs(reader: &Reader, page_ref: ObjRef) -> Result<PageAttrs> {
    let mut boxes = BTreeMap::new();
    let mut resources = None;
    let mut rotate = None;
    let mut media_box = None;

    let mut current = Some(page_ref);
    let mut visited = std::collections::HashSet::new();
    while let Some(r) = current {
        if !visited.insert(r) {
            return Err(Error::Page("cyclic /Parent chain in page tree".into()));
        }
        let node = reader.resolve(r)?;
        let dict = node
            .as_dict()
            .ok_or_else(|| Error::Page(format!("page-tree node {} {} R is not a dictionary", r.id, r.gen)))?;

        if resources.is_none() {
            if let Some(v) = dict.get("Resources") {
                resources = Some(reader.resolve_shallow(v)?);
            }
        }
        if rotate.is_none() {
            if let Some(v) = dict.get("Rotate") {
                rotate = v.as_i64();
            }
        }
        if media_box.is_none() {
            if let Some(b) = read_box(reader, dict, "MediaBox")? {
                media_box = Some(b);
            }
        }
        for name in ALL_BOX_NAMES {
            if name == BoxName::MediaBox {
                continue;
            }
            if !boxes.contains_key(name.key()) {
                if let Some(b) = read_box(reader, dict, name.key())? {
                    boxes.insert(name.key(), b);
                }
            }
        }

        current = dict.get("Parent").and_then(PdfValue::as_ref);
    }

    let media_box = media_box.ok_or_else(|| Error::Page(format!("page {} {} R has no inherited /MediaBox", page_ref.id, page_ref.gen)))?;

    Ok(PageAttrs {
        media_box,
        boxes,
        resources,
        rotate: normalize_rotation(rotate.unwrap_or(0)),
    })
}

fn read_box(reader: &Reader, dict: &crate::value::Dictionary, key: &str) -> Result<Option<[f64; 4]>> {
    let Some(raw) = dict.get(key) else { return Ok(None) };
    let resolved = reader.resolve_shallow(raw)?;
    let arr = resolved
        .as_array()
        .ok_or_else(|| Error::Page(format!("/{key} is not an array")))?;
    if arr.len() != 4 {
        return Err(Error::Page(format!("/{key} does not have exactly four entries")));
    }
    let mut out = [0.0f64; 4];
    for (i, v) in arr.iter().enumerate() {
        out[i] = v.as_f64().ok_or_else(|| Error::Page(format!("/{key} entry is not a number")))?;
    }
    Ok(Some(out))
}

/// Normalizes a `/Rotate` value into `0..360` (spec.md §4.E): negative
/// values and values over 360 both wrap around.
pub fn normalize_rotation(deg: i64) -> i64 {
    ((deg % 360) + 360) % 360
}

/// True when `deg` (already normalized) is an odd multiple of 90 — the
/// case where template placement must swap width and height.
pub fn swaps_dimensions(deg: i64) -> bool {
    (deg / 90) % 2 == 1
}

/// Concatenates a page's `/Contents` (a single stream or an array of
/// streams) into one byte buffer, separated by `\n` (spec.md §9). Only
/// `/FlateDecode` (or no filter) is supported on content streams.
pub fn page_contents(reader: &Reader, page_ref: ObjRef) -> Result<Vec<u8>> {
    let node = reader.resolve(page_ref)?;
    let dict = node
        .as_dict()
        .ok_or_else(|| Error::Page(format!("page {} {} R is not a dictionary", page_ref.id, page_ref.gen)))?;

    let Some(contents) = dict.get("Contents") else {
        return Ok(Vec::new());
    };

    let refs: Vec<ObjRef> = match contents {
        PdfValue::IndirectRef(r) => vec![*r],
        PdfValue::Array(items) => items
            .iter()
            .map(|v| v.as_ref().ok_or_else(|| Error::Page("/Contents array entry is not a reference".into())))
            .collect::<Result<_>>()?,
        other => return Err(Error::Page(format!("unexpected /Contents value {other:?}"))),
    };

    let mut out = Vec::new();
    for (i, r) in refs.iter().enumerate() {
        if i > 0 {
            out.push(b'\n');
        }
        let stream = reader.resolve(*r)?;
        let (stream_dict, raw) = match stream {
            PdfValue::Stream(d, b) => (d, b),
            other => return Err(Error::Page(format!("/Contents entry {} {} R is not a stream: {other:?}", r.id, r.gen))),
        };
        let decoded = match stream_dict.get("Filter").and_then(PdfValue::as_name) {
            Some("FlateDecode") => flate_decode(&raw)?,
            None => raw,
            Some(other) => return Err(Error::UnsupportedFeature(format!("content stream filter {other} is not supported"))),
        };
        out.extend_from_slice(&decoded);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(media: [f64; 4], extra: &[(&'static str, [f64; 4])]) -> PageAttrs {
        PageAttrs {
            media_box: media,
            boxes: extra.iter().cloned().collect(),
            resources: None,
            rotate: 0,
        }
    }

    #[test]
    fn box_falls_back_to_media_box() {
        let a = attrs([0.0, 0.0, 612.0, 792.0], &[]);
        assert_eq!(a.resolve_box(BoxName::BleedBox), [0.0, 0.0, 612.0, 792.0]);
    }

    #[test]
    fn box_falls_back_to_crop_box_before_media_box() {
        let a = attrs([0.0, 0.0, 612.0, 792.0], &[("CropBox", [10.0, 10.0, 600.0, 780.0])]);
        assert_eq!(a.resolve_box(BoxName::TrimBox), [10.0, 10.0, 600.0, 780.0]);
    }

    #[test]
    fn explicit_box_wins_over_fallback() {
        let a = attrs(
            [0.0, 0.0, 612.0, 792.0],
            &[
                ("CropBox", [10.0, 10.0, 600.0, 780.0]),
                ("ArtBox", [20.0, 20.0, 500.0, 700.0]),
            ],
        );
        assert_eq!(a.resolve_box(BoxName::ArtBox), [20.0, 20.0, 500.0, 700.0]);
    }

    #[test]
    fn rotation_normalizes_negative_and_over_360() {
        assert_eq!(normalize_rotation(-90), 270);
        assert_eq!(normalize_rotation(450), 90);
        assert_eq!(normalize_rotation(0), 0);
    }

    #[test]
    fn swap_applies_only_to_odd_multiples_of_90() {
        assert!(swaps_dimensions(90));
        assert!(swaps_dimensions(270));
        assert!(!swaps_dimensions(0));
        assert!(!swaps_dimensions(180));
    }
}
