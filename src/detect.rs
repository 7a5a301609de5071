//! PDF header sniffing.
//!
//! Both inputs of a comparison are checked before a backend is opened so a
//! wrong file (an image, an HTML export) fails fast with a clear error rather
//! than a parser message.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// PDF header information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfHeader {
    /// PDF version (e.g., "1.7", "2.0")
    pub version: String,
    /// Byte offset of the `%PDF-` marker (non-zero when junk precedes it)
    pub offset: usize,
}

impl std::fmt::Display for PdfHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PDF {}", self.version)
    }
}

const PDF_MAGIC: &[u8] = b"%PDF-";
const VERSION_LEN: usize = 3;

/// Readers accept the marker anywhere in the first kilobyte.
const HEADER_WINDOW: usize = 1024;

/// Sniff the PDF header of a file.
pub fn sniff_path<P: AsRef<Path>>(path: P) -> Result<PdfHeader> {
    let mut file = File::open(path)?;
    let mut window = Vec::with_capacity(HEADER_WINDOW);
    file.by_ref()
        .take(HEADER_WINDOW as u64)
        .read_to_end(&mut window)?;
    sniff_bytes(&window)
}

/// Sniff the PDF header of an in-memory document.
pub fn sniff_bytes(data: &[u8]) -> Result<PdfHeader> {
    let window = &data[..data.len().min(HEADER_WINDOW)];
    let offset = window
        .windows(PDF_MAGIC.len())
        .position(|w| w == PDF_MAGIC)
        .ok_or(Error::UnknownFormat)?;

    let start = offset + PDF_MAGIC.len();
    let version_bytes = window
        .get(start..start + VERSION_LEN)
        .ok_or(Error::UnknownFormat)?;
    let version = String::from_utf8_lossy(version_bytes).to_string();

    if !is_valid_version(&version) {
        return Err(Error::UnsupportedVersion(version));
    }

    Ok(PdfHeader { version, offset })
}

fn is_valid_version(version: &str) -> bool {
    let bytes = version.as_bytes();
    bytes.len() == 3 && bytes[0].is_ascii_digit() && bytes[1] == b'.' && bytes[2].is_ascii_digit()
}

/// Check if bytes start like a PDF document.
pub fn is_pdf_bytes(data: &[u8]) -> bool {
    sniff_bytes(data).is_ok()
}
