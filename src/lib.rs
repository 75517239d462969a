//! xoimport
//!
//! Imports pages out of existing PDF files and re-emits them as Form
//! XObjects, renumbered for embedding into a PDF a host generator is
//! building. This crate does not write PDF files itself: it reads,
//! renumbers, and serializes object bytes, and leaves assembling a
//! complete document (page content, fonts the host itself needs,
//! metadata, the final xref/trailer) to its caller.
//!
//! ```no_run
//! use std::path::Path;
//! use xoimport::{Importer, ImportOptions, BoxName};
//!
//! let mut importer = Importer::new(ImportOptions::default());
//! let tpl = importer.import_page(Path::new("input.pdf"), 0, BoxName::MediaBox)?;
//! let (xobject_name, xobject_id) = importer.put_form_xobject(tpl)?;
//! let placement = importer.use_template(tpl, 10.0, 10.0, 200.0, 0.0)?;
//! for (file, objects) in importer.imported_objects()? {
//!     for (id, bytes) in objects {
//!         // splice `bytes` (already "id 0 obj ... endobj") into the host document
//!         let _ = (file.as_str(), id, bytes);
//!     }
//! }
//! let _ = (xobject_name, xobject_id, placement);
//! # Ok::<(), xoimport::Error>(())
//! ```

mod error;
mod facade;
mod filter;
mod objio;
mod pagetree;
mod parser;
mod resolver;
mod source;
mod template;
mod tokenizer;
mod value;
mod writer;
mod xref;

pub use error::{Error, Result};
pub use facade::{ImportOptions, Importer};
pub use pagetree::BoxName;
pub use source::PdfSource;
pub use template::Template;
pub use value::{Dictionary, ObjRef, PdfValue};
pub use writer::{Placement, RefMode};
