//! Builds a `Template` record from a resolved page (spec.md §4.F): the box
//! geometry a caller asked for, folded through the inheritance chain, plus
//! the page's raw (already filter-decoded) content bytes and resources.

use crate::error::Result;
use crate::pagetree::{normalize_rotation, page_contents, resolve_page_attrs, swaps_dimensions, BoxName};
use crate::resolver::Reader;
use crate::value::{ObjRef, PdfValue};

#[derive(Debug, Clone)]
pub struct Template {
    pub source_page: ObjRef,
    pub box_name: BoxName,
    /// Always `0.0` (spec.md §4.F) — placement offsets are carried entirely
    /// by `UseTemplate`'s `x`/`y` arguments, not by the template itself.
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    /// The chosen box's corners as they appear on the source page, before
    /// any rotation-driven dimension swap. The emitter's `/BBox` and
    /// `/Matrix` (spec.md §4.G.2) are computed from these, not from `w`/`h`.
    pub box_llx: f64,
    pub box_lly: f64,
    pub box_urx: f64,
    pub box_ury: f64,
    /// Normalized `/Rotate`, `0/90/180/270` (spec.md §4.E).
    pub rotation: i64,
    pub buffer: Vec<u8>,
    pub resources: Option<PdfValue>,
}

pub fn build_template(reader: &Reader, page_ref: ObjRef, box_name: BoxName) -> Result<Template> {
    let attrs = resolve_page_attrs(reader, page_ref)?;
    let b = attrs.resolve_box(box_name);
    let llx = b[0].min(b[2]);
    let lly = b[1].min(b[3]);
    let urx = b[0].max(b[2]);
    let ury = b[1].max(b[3]);
    let mut w = urx - llx;
    let mut h = ury - lly;
    let rotation = normalize_rotation(attrs.rotate);
    if swaps_dimensions(rotation) {
        std::mem::swap(&mut w, &mut h);
    }

    let buffer = page_contents(reader, page_ref)?;

    Ok(Template {
        source_page: page_ref,
        box_name,
        x: 0.0,
        y: 0.0,
        w,
        h,
        box_llx: llx,
        box_lly: lly,
        box_urx: urx,
        box_ury: ury,
        rotation,
        buffer,
        resources: attrs.resources,
    })
}
