//! Fixture builders shared by the integration tests: small, hand-assembled
//! PDFs exercising exactly the machinery a given test cares about, the same
//! way `resolver.rs`'s own `sample_pdf()` unit-test helper is built (offsets
//! tracked via running buffer length rather than hardcoded).

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Writes `bytes` to a fresh file under the system temp dir and returns its
/// path. Each call gets a unique name so parallel tests never collide.
pub fn write_temp_pdf(label: &str, bytes: &[u8]) -> PathBuf {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!("xoimport_test_{label}_{}_{n}.pdf", std::process::id()));
    std::fs::write(&path, bytes).expect("failed to write fixture PDF");
    path
}

fn fmt_box(b: [f64; 4]) -> String {
    format!("[{} {} {} {}]", b[0], b[1], b[2], b[3])
}

/// A single-page PDF with a classic (non-stream) cross-reference table:
/// catalog -> pages -> one page carrying `media`, any `extra_boxes`, an
/// optional `/Rotate`, and `content` as its (uncompressed) content stream.
pub fn classic_single_page_pdf(
    media: [f64; 4],
    extra_boxes: &[(&str, [f64; 4])],
    rotate: Option<i64>,
    content: &[u8],
) -> Vec<u8> {
    let mut pdf = Vec::new();
    pdf.extend_from_slice(b"%PDF-1.4\n");

    let obj1_off = pdf.len();
    pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");

    let obj2_off = pdf.len();
    pdf.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n");

    let obj3_off = pdf.len();
    let mut page_dict = format!("<< /Type /Page /Parent 2 0 R /MediaBox {}", fmt_box(media));
    for (key, val) in extra_boxes {
        page_dict.push_str(&format!(" /{key} {}", fmt_box(*val)));
    }
    if let Some(r) = rotate {
        page_dict.push_str(&format!(" /Rotate {r}"));
    }
    page_dict.push_str(" /Contents 4 0 R >>");
    pdf.extend_from_slice(format!("3 0 obj\n{page_dict}\nendobj\n").as_bytes());

    let obj4_off = pdf.len();
    pdf.extend_from_slice(format!("4 0 obj\n<< /Length {} >>\nstream\n", content.len()).as_bytes());
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

fn be_bytes(value: u64, width: usize) -> Vec<u8> {
    let full = value.to_be_bytes();
    full[full.len() - width..].to_vec()
}

fn flate_compress(bytes: &[u8]) -> Vec<u8> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

/// A single-page PDF whose catalog/pages/page objects live inside a
/// `/Type /ObjStm` (ids 1-3) and whose cross-reference section is a
/// `/Type /XRef` stream (id 6) with `/Filter /FlateDecode` and no predictor,
/// covering both compressed-object and compressed-xref machinery in one
/// fixture (spec.md §4.C/§4.D).
pub fn objstm_pdf() -> Vec<u8> {
    let mut pdf = Vec::new();
    pdf.extend_from_slice(b"%PDF-1.5\n");

    let obj4_off = pdf.len();
    let content = b"q Q";
    pdf.extend_from_slice(format!("4 0 obj\n<< /Length {} >>\nstream\n", content.len()).as_bytes());
    pdf.extend_from_slice(content);
    pdf.extend_from_slice(b"\nendstream\nendobj\n");

    // Build the ObjStm body: three bare dictionaries (no "id gen obj"
    // wrapper) preceded by their "id offset" header pairs.
    let obj1_text = b"<< /Type /Catalog /Pages 2 0 R >>".to_vec();
    let obj2_text = b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_vec();
    let obj3_text = b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R >>".to_vec();

    let off1 = 0usize;
    let off2 = obj1_text.len() + 1;
    let off3 = off2 + obj2_text.len() + 1;
    let header = format!("1 {off1}\n2 {off2}\n3 {off3}\n");
    let first = header.len();

    let mut decoded_objstm = Vec::new();
    decoded_objstm.extend_from_slice(header.as_bytes());
    decoded_objstm.extend_from_slice(&obj1_text);
    decoded_objstm.push(b'\n');
    decoded_objstm.extend_from_slice(&obj2_text);
    decoded_objstm.push(b'\n');
    decoded_objstm.extend_from_slice(&obj3_text);

    let objstm_raw = flate_compress(&decoded_objstm);
    let obj5_off = pdf.len();
    pdf.extend_from_slice(
        format!(
            "5 0 obj\n<< /Type /ObjStm /N 3 /First {first} /Filter /FlateDecode /Length {} >>\nstream\n",
            objstm_raw.len()
        )
        .as_bytes(),
    );
    pdf.extend_from_slice(&objstm_raw);
    pdf.extend_from_slice(b"\nendstream\nendobj\n");

    // Cross-reference stream, /W = [1 4 2]: 1-byte type, 4-byte field2,
    // 2-byte field3. Entries for ids 0..=6 (Size 7).
    let obj6_off = pdf.len();
    let mut rows: Vec<(u64, u64, u64)> = Vec::new();
    rows.push((0, 0, 0)); // id 0: free list head
    rows.push((2, 5, 0)); // id 1: compressed in objstm 5, index 0
    rows.push((2, 5, 1)); // id 2
    rows.push((2, 5, 2)); // id 3
    rows.push((1, obj4_off as u64, 0)); // id 4: classic
    rows.push((1, obj5_off as u64, 0)); // id 5: classic (the objstm itself)
    rows.push((1, obj6_off as u64, 0)); // id 6: classic (this xref stream)

    let mut decoded_xref = Vec::new();
    for (ty, f2, f3) in rows {
        decoded_xref.extend(be_bytes(ty, 1));
        decoded_xref.extend(be_bytes(f2, 4));
        decoded_xref.extend(be_bytes(f3, 2));
    }
    let xref_raw = flate_compress(&decoded_xref);
    pdf.extend_from_slice(
        format!(
            "6 0 obj\n<< /Type /XRef /W [1 4 2] /Index [0 7] /Size 7 /Root 1 0 R /Filter /FlateDecode /Length {} >>\nstream\n",
            xref_raw.len()
        )
        .as_bytes(),
    );
    pdf.extend_from_slice(&xref_raw);
    pdf.extend_from_slice(b"\nendstream\nendobj\n");

    pdf.extend_from_slice(format!("startxref\n{obj6_off}\n%%EOF").as_bytes());
    pdf
}
