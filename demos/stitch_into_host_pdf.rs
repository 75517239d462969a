//! Stitches one page imported from an existing PDF into a trivial
//! hand-rolled host document. Not part of the core crate (spec.md §1): a
//! real host is expected to own its own document model, xref and trailer
//! writer; this only shows the shape of the handoff, tracking byte offsets
//! by hand the same way the crate's own test fixtures do.

use std::env;
use std::fs;
use std::path::PathBuf;

use xoimport::{BoxName, ImportOptions, Importer};

fn main() {
    env_logger::init();

    let source = env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| {
        eprintln!("usage: stitch_into_host_pdf <source.pdf>");
        std::process::exit(1);
    });

    let mut importer = Importer::new(ImportOptions::default());
    let tpl = importer
        .import_page(&source, 0, BoxName::MediaBox)
        .expect("failed to import page 0");
    let (xobject_name, xobject_id) = importer.put_form_xobject(tpl).expect("failed to build Form XObject");
    let placement = importer.use_template(tpl, 0.0, 0.0, 0.0, 0.0).expect("failed to place template");

    let copied = importer.imported_objects_unordered().expect("failed to serialize copied objects");
    let next_id = copied.iter().map(|(id, _)| *id).max().unwrap_or(0) + 1;

    let content_id = next_id;
    let page_id = next_id + 1;
    let pages_id = next_id + 2;
    let catalog_id = next_id + 3;
    let highest_id = catalog_id;

    let content = format!(
        "q {sx} 0 0 {sy} {x} {y} cm {xobject_name} Do Q",
        sx = placement.matrix[0],
        sy = placement.matrix[3],
        x = placement.matrix[4],
        y = placement.matrix[5],
    );

    let mut pdf = Vec::new();
    pdf.extend_from_slice(b"%PDF-1.4\n");

    // `offsets[id]` holds the byte offset of object `id`'s "id 0 obj", for
    // every id from 1 up to `highest_id`.
    let mut offsets = vec![0u64; highest_id as usize + 1];
    for (id, bytes) in &copied {
        offsets[*id as usize] = pdf.len() as u64;
        pdf.extend_from_slice(bytes);
    }

    offsets[content_id as usize] = pdf.len() as u64;
    pdf.extend_from_slice(
        format!(
            "{content_id} 0 obj\n<< /Length {} >>\nstream\n{content}\nendstream\nendobj\n",
            content.len()
        )
        .as_bytes(),
    );

    offsets[page_id as usize] = pdf.len() as u64;
    pdf.extend_from_slice(
        format!(
            "{page_id} 0 obj\n<< /Type /Page /Parent {pages_id} 0 R /MediaBox [0 0 {w} {h}] \
             /Resources << /XObject << {xobject_name} {xobject_id} 0 R >> >> /Contents {content_id} 0 R >>\nendobj\n",
            w = placement.width,
            h = placement.height,
        )
        .as_bytes(),
    );

    offsets[pages_id as usize] = pdf.len() as u64;
    pdf.extend_from_slice(format!("{pages_id} 0 obj\n<< /Type /Pages /Kids [{page_id} 0 R] /Count 1 >>\nendobj\n").as_bytes());

    offsets[catalog_id as usize] = pdf.len() as u64;
    pdf.extend_from_slice(format!("{catalog_id} 0 obj\n<< /Type /Catalog /Pages {pages_id} 0 R >>\nendobj\n").as_bytes());

    let xref_off = pdf.len();
    let size = highest_id + 1;
    pdf.extend_from_slice(format!("xref\n0 {size}\n").as_bytes());
    pdf.extend_from_slice(b"0000000000 65535 f \n");
    for id in 1..size {
        let off = offsets[id as usize];
        if off == 0 {
            // No object was ever assigned this id (ids the importer's
            // numbering skipped); mark it free so /Size stays contiguous.
            pdf.extend_from_slice(b"0000000000 00001 f \n");
        } else {
            pdf.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes());
        }
    }
    pdf.extend_from_slice(format!("trailer\n<< /Size {size} /Root {catalog_id} 0 R >>\n").as_bytes());
    pdf.extend_from_slice(format!("startxref\n{xref_off}\n%%EOF").as_bytes());

    let out = PathBuf::from("stitched.pdf");
    fs::write(&out, &pdf).expect("failed to write stitched.pdf");
    println!("wrote {}", out.display());
}
