//! Filename canonicalization.
//!
//! [`sanitize_filename`] turns an arbitrary human file name into an ASCII name that is
//! safe to use both on the staging filesystem and as the last segment of a storage key:
//!
//! 1. NFKD-decompose and drop everything outside ASCII (strips diacritics).
//! 2. Remove every character that is not a word character, whitespace, `.` or `-`.
//! 3. Trim surrounding whitespace.
//! 4. Collapse runs of `-` and whitespace to a single `_`.
//! 5. Collapse runs of `.` to a single `.`.
//!
//! The result never contains path separators or control characters, and applying the
//! function to its own output is a no-op. When the steps above leave nothing usable
//! (empty or a bare `.`), a deterministic `file_<hash>` name derived from the original
//! is returned instead.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

static DISALLOWED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s.-]").expect("valid regex"));
static SEPARATOR_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-\s]+").expect("valid regex"));
static DOT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.+").expect("valid regex"));

pub fn sanitize_filename(name: &str) -> String {
    let ascii: String = name.nfkd().filter(char::is_ascii).collect();
    let kept = DISALLOWED.replace_all(&ascii, "");
    let kept = kept.trim();
    let joined = SEPARATOR_RUN.replace_all(kept, "_");
    let collapsed = DOT_RUN.replace_all(&joined, ".").into_owned();

    if collapsed.is_empty() || collapsed == "." {
        return fallback_name(name);
    }
    collapsed
}

fn fallback_name(original: &str) -> String {
    let digest = Sha256::digest(original.as_bytes());
    let short: String = digest[..4].iter().map(|b| format!("{b:02x}")).collect();
    format!("file_{short}")
}
