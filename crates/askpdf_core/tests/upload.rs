use std::fs;

use askpdf_core::upload::{validate_pdf_filename, UploadStore};
use tempfile::tempdir;

#[test]
fn accepts_pdf_suffix_in_any_case() {
    assert!(validate_pdf_filename("report.pdf").is_ok());
    assert!(validate_pdf_filename("REPORT.PDF").is_ok());
    assert!(validate_pdf_filename("notes.Pdf").is_ok());
}

#[test]
fn rejects_other_files() {
    for name in ["", "report.txt", "report.pdf.exe", "pdf", "report"] {
        let err = validate_pdf_filename(name).expect_err(name);
        assert_eq!(err.code, "UPLOAD_INVALID");
        assert_eq!(err.message, "Please upload a PDF file.");
    }
}

#[test]
fn commit_keeps_only_the_final_path_component() {
    let dir = tempdir().unwrap();
    let store = UploadStore::open(dir.path().join("uploads"));

    let staged = store.stage("../../etc/evil.pdf", b"%PDF-1.4").expect("stage");
    assert_eq!(staged.name(), "evil.pdf");
    let path = staged.commit().expect("commit");
    assert_eq!(path, dir.path().join("uploads").join("evil.pdf"));
    assert_eq!(fs::read(&path).unwrap(), b"%PDF-1.4");

    let path = store
        .stage("C:\\Users\\me\\doc.pdf", b"x")
        .and_then(|s| s.commit())
        .expect("windows name");
    assert_eq!(path.file_name().unwrap(), "doc.pdf");
}

#[test]
fn stage_rejects_non_pdf_before_touching_disk() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("uploads");
    let store = UploadStore::open(root.clone());
    let err = store.stage("notes.txt", b"hello").expect_err("non-pdf");
    assert_eq!(err.code, "UPLOAD_INVALID");
    assert!(!root.exists());
}

#[test]
fn same_name_uploads_stage_separately() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("uploads");
    let store = UploadStore::open(root.clone());

    let first = store.stage("doc.pdf", b"first").expect("stage first");
    let second = store.stage("doc.pdf", b"second").expect("stage second");
    assert_ne!(first.path(), second.path());
    assert_eq!(fs::read(first.path()).unwrap(), b"first");
    assert_eq!(fs::read(second.path()).unwrap(), b"second");

    second.commit().expect("commit second");
    first.commit().expect("commit first");
    assert_eq!(fs::read(root.join("doc.pdf")).unwrap(), b"first");

    let names: Vec<String> = fs::read_dir(&root)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["doc.pdf".to_string()]);
}

#[test]
fn dropping_an_uncommitted_upload_removes_it() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("uploads");
    let store = UploadStore::open(root.clone());

    let staged = store.stage("doc.pdf", b"bytes").expect("stage");
    let path = staged.path().to_path_buf();
    assert!(path.exists());
    drop(staged);

    assert!(!path.exists());
    assert!(!root.join("doc.pdf").exists());
}
