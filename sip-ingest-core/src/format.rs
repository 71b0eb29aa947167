//! Format classification by file extension.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Canonical format tag of a staged file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatTag {
    Pdf,
    Doc,
    Docx,
    Odt,
    Txt,
    Xml,
    Rtf,
    Jpg,
    Png,
    Gif,
    Dwg,
    Other,
}

impl FormatTag {
    pub fn as_str(self) -> &'static str {
        match self {
            FormatTag::Pdf => "pdf",
            FormatTag::Doc => "doc",
            FormatTag::Docx => "docx",
            FormatTag::Odt => "odt",
            FormatTag::Txt => "txt",
            FormatTag::Xml => "xml",
            FormatTag::Rtf => "rtf",
            FormatTag::Jpg => "jpg",
            FormatTag::Png => "png",
            FormatTag::Gif => "gif",
            FormatTag::Dwg => "dwg",
            FormatTag::Other => "other",
        }
    }

    /// Documents and raster images are handed to the normalizer; `Other` never is.
    pub fn is_convertible(self) -> bool {
        !matches!(self, FormatTag::Other)
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps the lower-cased extension of `file_name` to its [`FormatTag`].
///
/// Total: names without an extension or with an unknown one map to [`FormatTag::Other`].
pub fn classify(file_name: &str) -> FormatTag {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("pdf") => FormatTag::Pdf,
        Some("doc") => FormatTag::Doc,
        Some("docx") => FormatTag::Docx,
        Some("odt") => FormatTag::Odt,
        Some("txt") => FormatTag::Txt,
        Some("xml") => FormatTag::Xml,
        Some("rtf") => FormatTag::Rtf,
        Some("jpg") | Some("jpeg") => FormatTag::Jpg,
        Some("png") => FormatTag::Png,
        Some("gif") => FormatTag::Gif,
        Some("dwg") => FormatTag::Dwg,
        _ => FormatTag::Other,
    }
}
