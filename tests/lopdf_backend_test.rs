//! Comparison of real PDF files on disk.

use std::path::Path;

use lopdf::{dictionary, Document, Object, Stream};
use pdfcompare::{
    compare_files, compare_files_with_options, extract_words, CompareOptions, DocumentBackend,
    Error, LopdfBackend, PageSelection,
};
use tempfile::TempDir;

/// Write a PDF with one page per entry, each page showing its lines of text
/// 20 points apart.
fn write_pdf(path: &Path, pages: &[&[&str]]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for lines in pages {
        let mut content = String::from("BT /F1 12 Tf 20 TL 72 720 Td ");
        for line in lines.iter() {
            content.push_str(&format!("({}) Tj T* ", line));
        }
        content.push_str("ET");

        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new(a: &[&[&str]], b: &[&[&str]]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        write_pdf(&dir.path().join("a.pdf"), a);
        write_pdf(&dir.path().join("b.pdf"), b);
        Self { dir }
    }

    fn path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }

    /// `(Subtype, Contents)` of every annotation on a page of an output file.
    fn annotations(&self, name: &str, page: u32) -> Vec<(String, String)> {
        let backend = LopdfBackend::load_file(self.path(name)).unwrap();
        let doc = backend.document();
        let page_id = doc.get_pages()[&(page + 1)];
        let Ok(annots) = doc.get_dictionary(page_id).unwrap().get(b"Annots") else {
            return Vec::new();
        };
        annots
            .as_array()
            .unwrap()
            .iter()
            .map(|r| {
                let annot = doc.get_dictionary(r.as_reference().unwrap()).unwrap();
                let subtype =
                    String::from_utf8_lossy(annot.get(b"Subtype").unwrap().as_name().unwrap())
                        .to_string();
                let contents = match annot.get(b"Contents").unwrap() {
                    Object::String(bytes, _) => decode(bytes),
                    _ => String::new(),
                };
                (subtype, contents)
            })
            .collect()
    }
}

fn decode(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => String::from_utf8_lossy(bytes).to_string(),
    }
}

#[test]
fn test_extract_words_reading_order() {
    let fixture = Fixture::new(&[&["Miel Pot 200ml", "Lot 4"]], &[&[]]);
    let pages = extract_words(fixture.path("a.pdf")).unwrap();

    assert_eq!(pages.len(), 1);
    let texts: Vec<&str> = pages[0].iter().map(|w| w.text.as_str()).collect();
    assert_eq!(texts, vec!["Miel", "Pot", "200ml", "Lot", "4"]);

    // Second line is 20 points lower on the page.
    let gap = pages[0][3].bbox.y0 - pages[0][0].bbox.y0;
    assert!((gap - 20.0).abs() < 1e-3);
    assert!(pages[0][0].bbox.y0 > 60.0 && pages[0][0].bbox.y1 < 80.0);
}

#[test]
fn test_compare_files_annotates_both_outputs() {
    let fixture = Fixture::new(
        &[&["Miel Brun 200ml", "Vanille Bourbon"]],
        &[&["Miel TES 200ml"]],
    );

    let report = compare_files(
        fixture.path("a.pdf"),
        fixture.path("b.pdf"),
        fixture.path("a_out.pdf"),
        fixture.path("b_out.pdf"),
    )
    .unwrap();

    assert_eq!(report.pages_a, 1);
    assert_eq!(report.pages_b, 1);
    assert_eq!(report.all_failures().count(), 0);

    let on_b = fixture.annotations("b_out.pdf", 0);
    assert!(on_b.contains(&("Highlight".to_string(), "Changed: Brun → TES".to_string())));
    assert!(on_b.contains(&(
        "Text".to_string(),
        "DELETED/REMOVED from original:\n\n• Vanille Bourbon".to_string()
    )));

    let on_a = fixture.annotations("a_out.pdf", 0);
    assert!(on_a.contains(&("Highlight".to_string(), "Changed: Brun → TES".to_string())));
    assert!(on_a.contains(&("Highlight".to_string(), "Deleted: Vanille Bourbon".to_string())));
    assert!(on_a.iter().all(|(kind, _)| kind == "Highlight"));

    // Inputs are left untouched.
    assert!(fixture.annotations("a.pdf", 0).is_empty());
}

#[test]
fn test_identical_documents_get_no_annotations() {
    let pages: &[&[&str]] = &[&["Miel de fleurs 500g"], &["Confiture Fraise"]];
    let fixture = Fixture::new(pages, pages);

    let report = compare_files(
        fixture.path("a.pdf"),
        fixture.path("b.pdf"),
        fixture.path("a_out.pdf"),
        fixture.path("b_out.pdf"),
    )
    .unwrap();

    assert_eq!(report.a_to_b.region_count(), 0);
    assert_eq!(report.b_to_a.region_count(), 0);
    for page in 0..2 {
        assert!(fixture.annotations("a_out.pdf", page).is_empty());
        assert!(fixture.annotations("b_out.pdf", page).is_empty());
    }
}

#[test]
fn test_page_selection_on_files() {
    let fixture = Fixture::new(
        &[&["Miel Brun"], &["Confiture Brun"]],
        &[&["Miel TES"], &["Confiture TES"]],
    );

    compare_files_with_options(
        fixture.path("a.pdf"),
        fixture.path("b.pdf"),
        fixture.path("a_out.pdf"),
        fixture.path("b_out.pdf"),
        CompareOptions::default().with_pages(PageSelection::parse("2").unwrap()),
    )
    .unwrap();

    assert!(fixture.annotations("b_out.pdf", 0).is_empty());
    assert_eq!(fixture.annotations("b_out.pdf", 1).len(), 1);
}

#[test]
fn test_unreadable_input_is_fatal() {
    let fixture = Fixture::new(&[&["Miel"]], &[&["Miel"]]);
    std::fs::write(fixture.path("a.pdf"), b"not a pdf at all").unwrap();

    let result = compare_files(
        fixture.path("a.pdf"),
        fixture.path("b.pdf"),
        fixture.path("a_out.pdf"),
        fixture.path("b_out.pdf"),
    );
    assert!(matches!(result, Err(Error::BackendUnavailable(_))));
    assert!(!fixture.path("b_out.pdf").exists());
}

#[test]
fn test_backend_page_count() {
    let fixture = Fixture::new(&[&["Un"], &["Deux"], &["Trois"]], &[&[]]);
    let backend = LopdfBackend::load_file(fixture.path("a.pdf")).unwrap();
    assert_eq!(backend.page_count().unwrap(), 3);
    assert_eq!(backend.get_words(2).unwrap()[0].text, "Trois");
}
