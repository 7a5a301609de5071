//! PDF document backend built on lopdf.

use std::path::Path;

use chrono::Utc;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, StringFormat};

use super::extract::{extract_page_words, group_words_into_lines};
use super::{DocumentBackend, Highlight, Note};
use crate::detect::{sniff_bytes, sniff_path};
use crate::error::{Error, Result};
use crate::model::{BBox, Color, PageWord};

/// US Letter, used when a page has no usable media box.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Side of the note icon in points.
const NOTE_SIZE: f32 = 20.0;

/// Annotation flag: print.
const FLAG_PRINT: i64 = 4;

/// A PDF document opened with lopdf.
///
/// Words are read from the page content streams; annotations are added to the
/// in-memory document and written out by [`DocumentBackend::save`].
pub struct LopdfBackend {
    doc: Document,
    /// Page object ids in page order
    pages: Vec<ObjectId>,
}

impl LopdfBackend {
    /// Open a PDF file.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let header = sniff_path(path)?;
        log::debug!("opening {} ({})", path.display(), header);

        let doc = Document::load(path)?;
        Self::from_document(doc)
    }

    /// Open a PDF held in memory.
    pub fn load_bytes(data: &[u8]) -> Result<Self> {
        sniff_bytes(data)?;
        let doc = Document::load_mem(data)?;
        Self::from_document(doc)
    }

    /// Wrap an already loaded document.
    pub fn from_document(doc: Document) -> Result<Self> {
        if doc.is_encrypted() {
            return Err(Error::Encrypted);
        }
        // get_pages is keyed by one-based page number in order
        let pages = doc.get_pages().into_values().collect();
        Ok(Self { doc, pages })
    }

    /// The underlying lopdf document.
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Width and height of a page in points.
    pub fn page_size(&self, page: u32) -> Result<(f32, f32)> {
        let [llx, lly, urx, ury] = self.media_box(self.page_id(page)?);
        Ok((urx - llx, ury - lly))
    }

    fn page_id(&self, page: u32) -> Result<ObjectId> {
        self.pages
            .get(page as usize)
            .copied()
            .ok_or(Error::PageOutOfRange(page, self.pages.len() as u32))
    }

    /// Media box of a page, inherited from the page tree when absent.
    fn media_box(&self, page_id: ObjectId) -> [f32; 4] {
        let mut current = Some(page_id);
        // Bounded walk; a malformed tree may contain a Parent cycle.
        for _ in 0..32 {
            let Some(id) = current else { break };
            let Ok(dict) = self.doc.get_dictionary(id) else {
                break;
            };
            if let Some(media_box) = dict
                .get(b"MediaBox")
                .ok()
                .and_then(|obj| self.resolve(obj).as_array().ok())
                .and_then(|arr| parse_rect(arr))
            {
                return media_box;
            }
            current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        }
        DEFAULT_MEDIA_BOX
    }

    fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        match obj {
            Object::Reference(id) => self.doc.get_object(*id).unwrap_or(obj),
            _ => obj,
        }
    }

    /// Convert a top-left origin box to PDF user space `[x0 y0 x1 y1]`.
    fn to_user_space(&self, page_id: ObjectId, bbox: &BBox) -> [f32; 4] {
        let [llx, _, _, ury] = self.media_box(page_id);
        [
            bbox.x0 + llx,
            ury - bbox.y1,
            bbox.x1 + llx,
            ury - bbox.y0,
        ]
    }

    /// Add an annotation dictionary to a page's `Annots` array.
    fn attach(&mut self, page: u32, annot: Dictionary) -> Result<()> {
        let page_id = self.page_id(page)?;
        let write_error = |message: String| Error::AnnotationWrite { page, message };

        // Annots may be an indirect array shared with nothing else.
        let indirect = match self.doc.get_dictionary(page_id) {
            Ok(dict) => dict.get(b"Annots").and_then(Object::as_reference).ok(),
            Err(e) => return Err(write_error(e.to_string())),
        };

        let annot_id = self.doc.add_object(Object::Dictionary(annot));

        if let Some(array_id) = indirect {
            match self.doc.get_object_mut(array_id) {
                Ok(Object::Array(arr)) => {
                    arr.push(Object::Reference(annot_id));
                    return Ok(());
                }
                _ => return Err(write_error("Annots is not an array".to_string())),
            }
        }

        let page_dict = self
            .doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| write_error(e.to_string()))?;
        match page_dict.get_mut(b"Annots") {
            Ok(Object::Array(arr)) => arr.push(Object::Reference(annot_id)),
            _ => page_dict.set("Annots", Object::Array(vec![Object::Reference(annot_id)])),
        }
        Ok(())
    }
}

impl DocumentBackend for LopdfBackend {
    fn page_count(&self) -> Result<u32> {
        Ok(self.pages.len() as u32)
    }

    fn get_words(&self, page: u32) -> Result<Vec<PageWord>> {
        let page_id = self.page_id(page)?;
        let [llx, lly, _, ury] = self.media_box(page_id);

        let words = extract_page_words(&self.doc, page_id).map_err(|e| Error::Extraction {
            page,
            message: e.to_string(),
        })?;

        let words = words
            .iter()
            .map(|w| w.to_page_word((llx, lly), ury))
            .collect();
        Ok(group_words_into_lines(words).into_iter().flatten().collect())
    }

    fn add_highlight(&mut self, page: u32, highlight: &Highlight) -> Result<()> {
        let page_id = self.page_id(page)?;
        let [x0, y0, x1, y1] = self.to_user_space(page_id, &highlight.bbox);

        let annot = dictionary! {
            "Type" => "Annot",
            "Subtype" => "Highlight",
            "Rect" => reals(&[x0, y0, x1, y1]),
            // upper-left, upper-right, lower-left, lower-right
            "QuadPoints" => reals(&[x0, y1, x1, y1, x0, y0, x1, y0]),
            "C" => color_array(highlight.color),
            "CA" => Object::Real(highlight.opacity),
            "T" => text_string(&highlight.title),
            "Subj" => text_string(&highlight.subject),
            "Contents" => text_string(&highlight.content),
            "M" => text_string(&pdf_date()),
            "F" => FLAG_PRINT,
        };
        self.attach(page, annot)
    }

    fn add_note(&mut self, page: u32, note: &Note) -> Result<()> {
        let page_id = self.page_id(page)?;
        let icon = BBox::new(note.at.x, note.at.y, note.at.x + NOTE_SIZE, note.at.y + NOTE_SIZE);
        let rect = self.to_user_space(page_id, &icon);

        let annot = dictionary! {
            "Type" => "Annot",
            "Subtype" => "Text",
            "Rect" => reals(&rect),
            "Name" => "Comment",
            "Open" => false,
            "C" => color_array(note.color),
            "T" => text_string(&note.title),
            "Subj" => text_string(&note.subject),
            "Contents" => text_string(&note.content),
            "M" => text_string(&pdf_date()),
            "F" => FLAG_PRINT,
        };
        self.attach(page, annot)
    }

    fn save(&mut self, path: &Path) -> Result<()> {
        self.doc.save(path)?;
        log::info!("saved {}", path.display());
        Ok(())
    }
}

fn parse_rect(arr: &[Object]) -> Option<[f32; 4]> {
    let values: Vec<f32> = arr.iter().filter_map(|o| o.as_float().ok()).collect();
    match values.as_slice() {
        &[x0, y0, x1, y1] => Some([x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)]),
        _ => None,
    }
}

fn reals(values: &[f32]) -> Object {
    Object::Array(values.iter().map(|v| Object::Real(*v)).collect())
}

fn color_array(color: Color) -> Object {
    reals(&color.components())
}

/// Encode a PDF text string: literal for ASCII, UTF-16BE with BOM otherwise.
fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::String(text.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn pdf_date() -> String {
    Utc::now().format("D:%Y%m%d%H%M%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::extract::decode_text_simple;
    use crate::model::Point;
    use lopdf::{Stream, StringFormat};

    fn sample_pdf(content: &str, media_box_on_parent: bool) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.as_bytes().to_vec()));

        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        };
        let media_box = Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]);
        let mut pages = dictionary! {
            "Type" => "Pages",
            "Count" => 1,
        };
        if media_box_on_parent {
            pages.set("MediaBox", media_box);
        } else {
            page.set("MediaBox", media_box);
        }
        let page_id = doc.add_object(page);
        pages.set("Kids", vec![Object::Reference(page_id)]);
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    fn string_of(dict: &Dictionary, key: &[u8]) -> String {
        match dict.get(key).unwrap() {
            Object::String(bytes, _) => decode_text_simple(bytes),
            other => panic!("not a string: {:?}", other),
        }
    }

    #[test]
    fn test_get_words_top_left_origin() {
        let pdf = sample_pdf("BT /F1 10 Tf 100 700 Td (Miel Pot 200ml) Tj ET", false);
        let backend = LopdfBackend::load_bytes(&pdf).unwrap();
        assert_eq!(backend.page_count().unwrap(), 1);
        assert_eq!(backend.page_size(0).unwrap(), (612.0, 792.0));

        let words = backend.get_words(0).unwrap();
        let texts: Vec<&str> = words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["Miel", "Pot", "200ml"]);
        assert_eq!(words[0].bbox, BBox::new(100.0, 84.0, 120.0, 94.0));
    }

    #[test]
    fn test_media_box_inherited_from_parent() {
        let pdf = sample_pdf("BT /F1 10 Tf 100 700 Td (Lot) Tj ET", true);
        let backend = LopdfBackend::load_bytes(&pdf).unwrap();
        assert_eq!(backend.page_size(0).unwrap(), (612.0, 792.0));
        assert_eq!(backend.get_words(0).unwrap()[0].bbox.y0, 84.0);
    }

    #[test]
    fn test_page_out_of_range() {
        let pdf = sample_pdf("", false);
        let backend = LopdfBackend::load_bytes(&pdf).unwrap();
        assert!(matches!(
            backend.get_words(3),
            Err(Error::PageOutOfRange(3, 1))
        ));
    }

    #[test]
    fn test_not_a_pdf() {
        assert!(matches!(
            LopdfBackend::load_bytes(b"<html></html>"),
            Err(Error::UnknownFormat)
        ));
    }

    #[test]
    fn test_add_highlight_and_note() {
        let pdf = sample_pdf("BT /F1 10 Tf 100 700 Td (TES) Tj ET", false);
        let mut backend = LopdfBackend::load_bytes(&pdf).unwrap();

        backend
            .add_highlight(
                0,
                &Highlight {
                    bbox: BBox::new(100.0, 84.0, 115.0, 94.0),
                    color: Color::ADDED,
                    opacity: 0.3,
                    title: "Changed".to_string(),
                    subject: "Was: Brun".to_string(),
                    content: "Changed: Brun → TES".to_string(),
                },
            )
            .unwrap();
        backend
            .add_note(
                0,
                &Note {
                    at: Point::new(15.0, 15.0),
                    color: Color::NOTE,
                    title: "Removed".to_string(),
                    subject: "1 items deleted".to_string(),
                    content: "DELETED/REMOVED from original:\n\n• Vanille".to_string(),
                },
            )
            .unwrap();

        let doc = backend.document();
        let page_id = backend.page_id(0).unwrap();
        let annots = doc
            .get_dictionary(page_id)
            .unwrap()
            .get(b"Annots")
            .unwrap()
            .as_array()
            .unwrap();
        assert_eq!(annots.len(), 2);

        let highlight = doc
            .get_dictionary(annots[0].as_reference().unwrap())
            .unwrap();
        assert_eq!(highlight.get(b"Subtype").unwrap().as_name().unwrap(), b"Highlight");
        let rect: Vec<f32> = highlight
            .get(b"Rect")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o.as_float().unwrap())
            .collect();
        assert_eq!(rect, vec![100.0, 698.0, 115.0, 708.0]);
        assert_eq!(string_of(highlight, b"Contents"), "Changed: Brun → TES");
        assert!(matches!(
            highlight.get(b"Contents").unwrap(),
            Object::String(_, StringFormat::Hexadecimal)
        ));
        assert_eq!(string_of(highlight, b"T"), "Changed");

        let note = doc.get_dictionary(annots[1].as_reference().unwrap()).unwrap();
        assert_eq!(note.get(b"Subtype").unwrap().as_name().unwrap(), b"Text");
        assert_eq!(note.get(b"Name").unwrap().as_name().unwrap(), b"Comment");
        assert_eq!(string_of(note, b"Subj"), "1 items deleted");
    }

    #[test]
    fn test_save_round_trip() {
        let pdf = sample_pdf("BT /F1 10 Tf 100 700 Td (TES) Tj ET", false);
        let mut backend = LopdfBackend::load_bytes(&pdf).unwrap();
        backend
            .add_highlight(
                0,
                &Highlight {
                    bbox: BBox::new(100.0, 84.0, 115.0, 94.0),
                    color: Color::MOVED,
                    opacity: 0.3,
                    title: "Moved".to_string(),
                    subject: String::new(),
                    content: "Moved: TES".to_string(),
                },
            )
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotated.pdf");
        backend.save(&path).unwrap();

        let reopened = LopdfBackend::load_file(&path).unwrap();
        assert_eq!(reopened.get_words(0).unwrap()[0].text, "TES");
        let page_id = reopened.page_id(0).unwrap();
        let annots = reopened
            .document()
            .get_dictionary(page_id)
            .unwrap()
            .get(b"Annots")
            .unwrap()
            .as_array()
            .unwrap()
            .len();
        assert_eq!(annots, 1);
    }

    #[test]
    fn test_text_string_encoding() {
        assert!(matches!(
            text_string("Added"),
            Object::String(ref b, StringFormat::Literal) if b == b"Added"
        ));
        match text_string("é") {
            Object::String(bytes, _) => assert_eq!(bytes, vec![0xFE, 0xFF, 0x00, 0xE9]),
            other => panic!("unexpected {:?}", other),
        }
    }
}
