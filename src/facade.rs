//! The public entry point (spec.md §4.H): opens source PDFs on demand,
//! imports pages from them as templates, and hands back Form XObjects plus
//! placement matrices for a host document generator to splice into its
//! own output. This crate never writes a PDF file itself.

use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::pagetree::{flatten_pages, BoxName};
use crate::resolver::Reader;
use crate::source::PdfSource;
use crate::template::{build_template, Template};
use crate::value::ObjRef;
use crate::writer::{build_form_xobject, place_template, Placement, RefMode, Writer};

/// Tunables that apply uniformly across every source file an `Importer`
/// opens (SPEC_FULL.md §5).
#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
    /// Which page box is used when a caller doesn't pick one explicitly.
    pub default_box: BoxName,
    pub ref_mode: RefMode,
    /// Whether a Form XObject's content stream is re-compressed with
    /// `/FlateDecode` on the way out (spec.md §4.G.4: "default yes").
    pub compress_streams: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportOptions {
            default_box: BoxName::CropBox,
            ref_mode: RefMode::Numeric,
            compress_streams: true,
        }
    }
}

struct SourceFile {
    reader: Rc<Reader>,
    writer: Writer,
    /// `(page_index, box_name) -> template id`, so re-importing the same
    /// page+box from the same file is a no-op (spec.md §4.H idempotence).
    templates_by_page: BTreeMap<(usize, BoxName), u32>,
    templates: BTreeMap<u32, Template>,
}

pub struct Importer {
    options: ImportOptions,
    sources: BTreeMap<String, SourceFile>,
    next_template_id: u32,
    next_object_id: u32,
}

impl Importer {
    pub fn new(options: ImportOptions) -> Self {
        Importer {
            options,
            sources: BTreeMap::new(),
            next_template_id: 0,
            next_object_id: 1,
        }
    }

    /// Sets the first object number the next batch of copied objects will
    /// receive in `RefMode::Numeric`. The host calls this once it knows
    /// how many objects it has already written.
    pub fn set_next_object_id(&mut self, next: u32) {
        self.next_object_id = next;
    }

    /// Opens `path` if it isn't already, returning its map key. Takes
    /// `&mut self` only for the duration of the lookup/insert so callers
    /// can go on to borrow individual fields of `self` afterwards instead
    /// of being stuck holding a borrow of the whole `Importer`.
    fn ensure_source_open(&mut self, path: &Path) -> Result<String> {
        let key = canonical_key(path);
        if !self.sources.contains_key(&key) {
            let file = std::fs::File::open(path).map_err(|e| Error::InputOpen(format!("{}: {e}", path.display())))?;
            let reader = Reader::from_source(file)?;
            self.insert_source(key.clone(), reader);
        }
        Ok(key)
    }

    /// Opens `source` under `key` the same way `ensure_source_open` opens a
    /// file on disk, for callers whose PDF bytes don't live in a file the
    /// crate can open by path — an in-memory buffer, a network stream
    /// already fetched into a cursor, anything `Read + Seek` (spec.md
    /// §6.3's `SetSourceStream`). Re-registering an already-used key
    /// replaces that source and discards anything copied from it so far.
    pub fn set_source_stream(&mut self, key: impl Into<String>, source: Box<dyn PdfSource>) -> Result<String> {
        let key = key.into();
        let reader = Reader::from_source(source)?;
        self.insert_source(key.clone(), reader);
        Ok(key)
    }

    fn insert_source(&mut self, key: String, reader: Reader) {
        let reader = Rc::new(reader);
        let writer = Writer::new(Rc::clone(&reader), key.clone(), self.options.ref_mode, self.next_object_id);
        self.sources.insert(
            key,
            SourceFile {
                reader,
                writer,
                templates_by_page: BTreeMap::new(),
                templates: BTreeMap::new(),
            },
        );
    }

    /// Imports page `page_index` (0-based) from `path` using `box_name`,
    /// returning a stable template id. Calling this again for the same
    /// `(path, page_index, box_name)` returns the same id without
    /// re-walking the page tree (spec.md §4.H).
    pub fn import_page(&mut self, path: &Path, page_index: usize, box_name: BoxName) -> Result<u32> {
        let key = self.ensure_source_open(path)?;

        let source = self.sources.get(&key).expect("just opened above");
        if let Some(&tpl) = source.templates_by_page.get(&(page_index, box_name)) {
            return Ok(tpl);
        }

        let pages = flatten_pages(&source.reader)?;
        let page_ref = *pages
            .get(page_index)
            .ok_or_else(|| Error::Page(format!("page index {page_index} out of range ({} pages)", pages.len())))?;
        let template = build_template(&source.reader, page_ref, box_name)?;

        let tpl_id = self.next_template_id;
        self.next_template_id += 1;

        let source = self.sources.get_mut(&key).expect("just opened above");
        source.templates_by_page.insert((page_index, box_name), tpl_id);
        source.templates.insert(tpl_id, template);
        Ok(tpl_id)
    }

    /// Like `import_page` but uses the importer's configured default box.
    pub fn import_page_default_box(&mut self, path: &Path, page_index: usize) -> Result<u32> {
        self.import_page(path, page_index, self.options.default_box)
    }

    pub fn page_count(&mut self, path: &Path) -> Result<usize> {
        let key = self.ensure_source_open(path)?;
        let source = self.sources.get(&key).expect("just opened above");
        Ok(flatten_pages(&source.reader)?.len())
    }

    /// Every box name's extent for every page in `path`, folded through the
    /// fallback chain (spec.md §6.3's `GetPageSizes`).
    pub fn page_sizes(&mut self, path: &Path) -> Result<BTreeMap<usize, BTreeMap<BoxName, [f64; 4]>>> {
        let key = self.ensure_source_open(path)?;
        let source = self.sources.get(&key).expect("just opened above");
        let pages = flatten_pages(&source.reader)?;
        pages
            .iter()
            .enumerate()
            .map(|(i, &page_ref)| {
                let attrs = crate::pagetree::resolve_page_attrs(&source.reader, page_ref)?;
                Ok((i, attrs.all_boxes()))
            })
            .collect()
    }

    fn find_template<'a>(&'a self, tpl_id: u32) -> Result<(&'a SourceFile, &'a Template)> {
        for source in self.sources.values() {
            if let Some(t) = source.templates.get(&tpl_id) {
                return Ok((source, t));
            }
        }
        Err(Error::Reference(format!("unknown template id {tpl_id}")))
    }

    fn find_template_mut(&mut self, tpl_id: u32) -> Result<(&mut SourceFile, Template)> {
        for source in self.sources.values_mut() {
            if let Some(t) = source.templates.get(&tpl_id) {
                return Ok((source, t.clone()));
            }
        }
        Err(Error::Reference(format!("unknown template id {tpl_id}")))
    }

    /// Places `tpl_id` at `(x, y)` sized `(w, h)` (either may be `0.0` to
    /// derive from the template's own aspect ratio) and returns the
    /// geometry plus the `cm` matrix a host writes before `/Do`-ing the
    /// Form XObject it gets from `form_xobject_ref` (spec.md §4.H).
    pub fn use_template(&self, tpl_id: u32, x: f64, y: f64, w: f64, h: f64) -> Result<Placement> {
        let (_, template) = self.find_template(tpl_id)?;
        Ok(place_template(template, x, y, w, h))
    }

    /// Copies `tpl_id`'s Form XObject (and everything it transitively
    /// depends on) into its source file's writer, returning the resource
    /// name the host's `/Resources/XObject` dictionary should file it
    /// under and the object id assigned in `RefMode::Numeric` (spec.md
    /// §3/§6.2). The name is `/GOFPDITPL<N>`, `N` the template id — a
    /// single counter shared by every source file this importer opens, so
    /// names never collide across files.
    pub fn put_form_xobject(&mut self, tpl_id: u32) -> Result<(String, u32)> {
        let (source, template) = self.find_template_mut(tpl_id)?;
        let xobject = build_form_xobject(&template, self.options.compress_streams)?;
        let fake_ref = ObjRef::new(synthetic_id(tpl_id), 0);
        let id = source.writer.adopt(fake_ref, xobject)?;
        Ok((gofpditpl_name(tpl_id), id))
    }

    /// `put_form_xobject` for every template imported so far, across every
    /// open source file, keyed by resource name (spec.md §6.3's
    /// `PutFormXobjects`).
    pub fn put_form_xobjects(&mut self) -> Result<BTreeMap<String, u32>> {
        let mut out = BTreeMap::new();
        for tpl_id in self.all_template_ids() {
            let (name, id) = self.put_form_xobject(tpl_id)?;
            out.insert(name, id);
        }
        Ok(out)
    }

    /// Like `put_form_xobjects`, but for `RefMode::Hash`: each entry maps a
    /// resource name to its hash placeholder rather than a final object id
    /// (spec.md §6.3's `PutFormXobjectsUnordered`).
    pub fn put_form_xobjects_unordered(&mut self) -> Result<BTreeMap<String, String>> {
        let mut out = BTreeMap::new();
        for tpl_id in self.all_template_ids() {
            let (source, template) = self.find_template_mut(tpl_id)?;
            let xobject = build_form_xobject(&template, self.options.compress_streams)?;
            let fake_ref = ObjRef::new(synthetic_id(tpl_id), 0);
            source.writer.adopt(fake_ref, xobject)?;
            let hash = source.writer.hash_for(fake_ref).expect("just adopted above");
            out.insert(gofpditpl_name(tpl_id), hash);
        }
        Ok(out)
    }

    /// Every template id imported so far, across every open source file,
    /// in ascending order.
    fn all_template_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.sources.values().flat_map(|s| s.templates.keys().copied()).collect();
        ids.sort_unstable();
        ids
    }

    /// All objects copied so far across every open source file, each as a
    /// complete `N 0 obj ... endobj` block ready to splice into the host
    /// document, grouped by source file.
    pub fn imported_objects(&self) -> Result<BTreeMap<String, Vec<(u32, Vec<u8>)>>> {
        let mut out = BTreeMap::new();
        for (name, source) in &self.sources {
            out.insert(name.clone(), source.writer.serialize_all()?);
        }
        Ok(out)
    }

    /// Unordered variant of `imported_objects`: flattens every file's
    /// objects into one list, for hosts that don't care which source file
    /// an object came from (spec.md §4.H).
    pub fn imported_objects_unordered(&self) -> Result<Vec<(u32, Vec<u8>)>> {
        let mut out = Vec::new();
        for source in self.sources.values() {
            out.extend(source.writer.serialize_all()?);
        }
        Ok(out)
    }

    /// `RefMode::Hash` placeholder -> final object id, across every open
    /// source file, for the host's own substitution pass.
    pub fn hash_positions(&self) -> BTreeMap<String, u32> {
        let mut out = BTreeMap::new();
        for source in self.sources.values() {
            out.extend(source.writer.hash_to_id());
        }
        out
    }

    /// Drops every copied object, across every source file, without
    /// discarding already-assigned template ids, so a host can call
    /// `put_form_xobject`/`imported_objects` again across incremental
    /// writes (SPEC_FULL.md §5's `ClearImportedObjects`).
    pub fn clear_imported_objects(&mut self) {
        for source in self.sources.values_mut() {
            let base = source.writer.base_object_id();
            let name = source.writer.source_name().to_string();
            source.writer = Writer::new(Rc::clone(&source.reader), name, self.options.ref_mode, base);
        }
    }
}

/// Template ids are assigned by the importer and never collide with real
/// source object ids (which start at 0 within each file's own numbering),
/// so `put_form_xobject` needs a source-object-shaped key purely to slot
/// the synthesized Form XObject into the same dependency-draining queue
/// real copied objects use. Offsetting far past any realistic object
/// count keeps it visually distinct in `Writer`'s internal maps.
fn synthetic_id(tpl_id: u32) -> u32 {
    0xffff_0000 + tpl_id
}

/// The gofpdi/FPDI-derived Form XObject resource name for a template id
/// (spec.md §3/§6.2).
fn gofpditpl_name(tpl_id: u32) -> String {
    format!("/GOFPDITPL{tpl_id}")
}

fn canonical_key(path: &Path) -> String {
    path.canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}
