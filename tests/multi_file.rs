mod common;

use xoimport::{BoxName, ImportOptions, Importer};

/// Template ids are assigned in a single sequence across every open source
/// file, and a later file's copied objects start numbering right after the
/// earlier file's once `set_next_object_id` is advanced by the host
/// (spec.md §4.H).
#[test]
fn templates_and_objects_stay_distinct_across_source_files() {
    let pdf_a = common::classic_single_page_pdf([0.0, 0.0, 612.0, 792.0], &[], None, b"q Q");
    let pdf_b = common::classic_single_page_pdf([0.0, 0.0, 200.0, 100.0], &[], None, b"Q q");
    let path_a = common::write_temp_pdf("multi_a", &pdf_a);
    let path_b = common::write_temp_pdf("multi_b", &pdf_b);

    let mut importer = Importer::new(ImportOptions::default());
    let tpl_a = importer.import_page_default_box(&path_a, 0).unwrap();
    let (name_a, xobj_a) = importer.put_form_xobject(tpl_a).unwrap();

    // The host has now written `xobj_a` plus whatever else lived below it;
    // tell the importer where the next file's numbering should continue.
    importer.set_next_object_id(xobj_a + 1);
    let tpl_b = importer.import_page_default_box(&path_b, 0).unwrap();
    let (name_b, xobj_b) = importer.put_form_xobject(tpl_b).unwrap();

    assert_ne!(tpl_a, tpl_b);
    assert_ne!(name_a, name_b, "template ids are globally monotonic, so names never collide");
    assert!(xobj_b > xobj_a, "file b's objects ({xobj_b}) must start after file a's ({xobj_a})");

    let objects = importer.imported_objects().unwrap();
    assert_eq!(objects.len(), 2, "one entry per open source file");

    // Re-importing the same (path, page, box) from file a is still cached
    // and doesn't disturb file b's numbering.
    let tpl_a_again = importer.import_page_default_box(&path_a, 0).unwrap();
    assert_eq!(tpl_a, tpl_a_again);
}

#[test]
fn same_page_from_the_same_file_never_gets_a_second_template() {
    let pdf = common::classic_single_page_pdf([0.0, 0.0, 300.0, 400.0], &[], None, b"q Q");
    let path = common::write_temp_pdf("idempotent", &pdf);

    let mut importer = Importer::new(ImportOptions::default());
    let first = importer.import_page(&path, 0, BoxName::CropBox).unwrap();
    let second = importer.import_page(&path, 0, BoxName::CropBox).unwrap();
    let different_box = importer.import_page(&path, 0, BoxName::MediaBox).unwrap();

    assert_eq!(first, second);
    assert_ne!(first, different_box, "a different box on the same page is a distinct template");
}

/// `clear_imported_objects` drops copied objects but keeps the template
/// cache and the source file open (SPEC_FULL.md §5's `ClearImportedObjects`).
#[test]
fn clear_imported_objects_resets_copies_but_keeps_templates() {
    let pdf = common::classic_single_page_pdf([0.0, 0.0, 300.0, 400.0], &[], None, b"q Q");
    let path = common::write_temp_pdf("clear", &pdf);

    let mut importer = Importer::new(ImportOptions::default());
    let tpl = importer.import_page_default_box(&path, 0).unwrap();
    let _ = importer.put_form_xobject(tpl).unwrap();
    assert!(!importer.imported_objects().unwrap().values().next().unwrap().is_empty());

    importer.clear_imported_objects();
    assert!(importer.imported_objects().unwrap().values().next().unwrap().is_empty());

    // The template itself is still known; placement still works.
    let placement = importer.use_template(tpl, 0.0, 0.0, 0.0, 0.0).unwrap();
    assert_eq!((placement.width, placement.height), (300.0, 400.0));
}
