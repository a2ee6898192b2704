//! # MIME Classification
//!
//! Two-step classification of a resource:
//!
//! 1. Match the lower-cased resource string against a table of
//!    filename-suffix patterns. First match wins.
//! 2. Only when step 1 found nothing and the caller forced detection,
//!    read the leading bytes and match them against magic signatures.
//!
//! The outcome, including "nothing matched", is cached on the handle.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::types::MimeState;
use crate::{MimeType, ResourceRead};

/// Bytes read for signature matching.
pub const MAGIC_PROBE_LEN: usize = 8;

/// Offset of the sub-format marker inside an OLE2 compound document.
const OLE2_SUBHEADER_OFFSET: usize = 512;

/// `(mime, suffix pattern, canonical extension)`, in priority order.
const EXTENSION_TABLE: &[(&str, &str, &str)] = &[
    ("application/epub+zip", r"\.epub$", "epub"),
    ("application/pdf", r"\.pdf$", "pdf"),
    ("application/x-mobipocket-ebook", r"\.(mobi|prc|azw|azw3)$", "mobi"),
    ("application/x-fictionbook+xml", r"\.fb2$", "fb2"),
    ("application/x-cbz", r"\.cbz$", "cbz"),
    ("application/x-cbr", r"\.cbr$", "cbr"),
    ("application/zip", r"\.zip$", "zip"),
    ("application/x-rar-compressed", r"\.rar$", "rar"),
    ("application/rtf", r"\.rtf$", "rtf"),
    ("application/msword", r"\.doc$", "doc"),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        r"\.docx$",
        "docx",
    ),
    ("application/vnd.ms-excel", r"\.xls$", "xls"),
    ("application/vnd.oasis.opendocument.text", r"\.odt$", "odt"),
    ("image/jpeg", r"\.(jpg|jpeg|jpe)$", "jpg"),
    ("image/png", r"\.png$", "png"),
    ("image/gif", r"\.gif$", "gif"),
    ("image/bmp", r"\.bmp$", "bmp"),
    ("image/tiff", r"\.(tif|tiff)$", "tif"),
    ("image/vnd.adobe.photoshop", r"\.psd$", "psd"),
    ("image/x-portable-bitmap", r"\.pbm$", "pbm"),
    ("image/x-portable-graymap", r"\.pgm$", "pgm"),
    ("image/x-portable-pixmap", r"\.ppm$", "ppm"),
    ("image/jbig2", r"\.(jb2|jbig2)$", "jb2"),
    ("text/html", r"\.(html|htm|xhtml)$", "html"),
    ("text/xml", r"\.xml$", "xml"),
    ("text/css", r"\.css$", "css"),
    ("text/plain", r"\.(txt|text|log)$", "txt"),
];

/// `(mime, signature)`; a signature matches as a prefix of the content.
const MAGIC_TABLE: &[(&str, &[u8])] = &[
    ("image/gif", b"GIF8"),
    ("image/png", &[0x89, 0x50]),
    ("image/jpeg", &[0xFF, 0xD8]),
    ("image/bmp", b"BM"),
    ("image/tiff", &[0x4D, 0x4D, 0x00, 0x2A]),
    ("image/tiff", &[0x49, 0x49, 0x2A, 0x00]),
    ("image/vnd.adobe.photoshop", b"8BPS"),
    ("image/jbig2", &[0x97, 0x4A, 0x42, 0x32, 0x0D, 0x0A, 0x1A, 0x0A]),
    ("application/pdf", b"%PDF"),
];

const OLE2_SIGNATURE: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const WORD_SUBHEADER: &[u8] = &[0xEC, 0xA5, 0xC1, 0x00];
const EXCEL_SUBHEADERS: &[&[u8]] = &[
    &[0x09, 0x08, 0x10, 0x00, 0x00, 0x06, 0x05, 0x00],
    &[0xFD, 0xFF, 0xFF, 0xFF],
];

lazy_static! {
    static ref EXTENSION_PATTERNS: Vec<(MimeType, Regex)> = EXTENSION_TABLE
        .iter()
        .filter_map(|(mime, pattern, _)| Regex::new(pattern)
            .ok()
            .map(|re| (MimeType::new(mime), re)))
        .collect();
}

/// Classify a resource string by its suffix alone.
///
/// # Example
///
/// ```rust
/// use mufs::mime::from_name;
///
/// assert_eq!(from_name("/books/Notes.TXT").unwrap().as_str(), "text/plain");
/// assert!(from_name("/books/notes.v2").is_none());
/// ```
pub fn from_name(resource: &str) -> Option<MimeType> {
    let lower = resource.to_lowercase();
    EXTENSION_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(&lower))
        .map(|(mime, _)| mime.clone())
}

/// Classify content by its leading bytes.
///
/// `head` should hold at least [`MAGIC_PROBE_LEN`] bytes; `ole2_subheader`
/// holds the bytes at offset 512 and is only consulted for OLE2 documents.
pub fn from_magic(head: &[u8], ole2_subheader: Option<&[u8]>) -> Option<MimeType> {
    if head.starts_with(OLE2_SIGNATURE) {
        return Some(MimeType::new(classify_ole2(ole2_subheader.unwrap_or_default())));
    }
    if let Some((mime, _)) = MAGIC_TABLE.iter().find(|(_, sig)| head.starts_with(sig)) {
        return Some(MimeType::new(mime));
    }
    if let Some(mime) = portable_anymap(head) {
        return Some(MimeType::new(mime));
    }
    markup(head).map(MimeType::new)
}

/// The canonical file extension of a MIME type from the extension table.
pub fn extension_for(mime: &MimeType) -> Option<&'static str> {
    EXTENSION_TABLE
        .iter()
        .find(|(m, _, _)| *m == mime.as_str())
        .map(|(_, _, ext)| *ext)
}

fn classify_ole2(subheader: &[u8]) -> &'static str {
    if subheader.starts_with(WORD_SUBHEADER) {
        "application/msword"
    } else if EXCEL_SUBHEADERS.iter().any(|sig| subheader.starts_with(sig)) {
        "application/vnd.ms-excel"
    } else {
        "application/x-ole-storage"
    }
}

/// PBM/PGM/PPM: `P1`..`P6` followed by whitespace.
fn portable_anymap(head: &[u8]) -> Option<&'static str> {
    match head {
        [b'P', kind, ws, ..] if ws.is_ascii_whitespace() => match kind {
            b'1' | b'4' => Some("image/x-portable-bitmap"),
            b'2' | b'5' => Some("image/x-portable-graymap"),
            b'3' | b'6' => Some("image/x-portable-pixmap"),
            _ => None,
        },
        _ => None,
    }
}

fn markup(head: &[u8]) -> Option<&'static str> {
    let text = String::from_utf8_lossy(head).to_ascii_lowercase();
    let text = text.trim_start_matches('\u{feff}').trim_start();
    if text.starts_with("<?xml") {
        Some("text/xml")
    } else if text.starts_with("<html") || text.starts_with("<!doctyp") || text.starts_with("<head")
    {
        Some("text/html")
    } else {
        None
    }
}

/// Read the probe bytes from a resource and run [`from_magic`].
fn probe<R: ResourceRead + ?Sized>(resource: &R) -> Option<MimeType> {
    let head = match resource.read_bytes_limited(OLE2_SUBHEADER_OFFSET + MAGIC_PROBE_LEN) {
        Ok(head) => head,
        Err(e) => {
            debug!(resource = resource.resource_string(), error = %e, "magic probe failed");
            return None;
        }
    };
    let sub = head.get(OLE2_SUBHEADER_OFFSET..);
    let lead = &head[..head.len().min(MAGIC_PROBE_LEN)];
    from_magic(lead, sub)
}

/// Classify a resource, consulting and updating its cached state.
pub(crate) fn cached_mime_type<R: ResourceRead + ?Sized>(resource: &R, force: bool) -> Option<MimeType> {
    let attrs = resource.attributes();
    if let MimeState::Known { mime, forced } = attrs.mime_state() {
        if mime.is_some() || forced || !force {
            return mime;
        }
    }

    let mut mime = from_name(resource.resource_string());
    if mime.is_none() && force && !resource.is_directory() {
        mime = probe(resource);
    }
    attrs.set_mime_state(MimeState::Known {
        mime: mime.clone(),
        forced: force,
    });
    mime
}
