//! Upload file safety and naming.
//!
//! Uploads are checked in layers:
//! 1. Size limit
//! 2. Extension blocklist
//! 3. Magic byte detection for executables
//!
//! Stored names are derived from the client filename with every character
//! outside `[A-Za-z0-9_-]` replaced by `_`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Magic byte signatures for executable files
pub const MAGIC_SIGNATURES: &[(&str, &[u8])] = &[
    ("Windows PE/MZ", &[0x4D, 0x5A]),           // MZ header
    ("ELF", &[0x7F, 0x45, 0x4C, 0x46]),         // Linux ELF
    ("Mach-O 32", &[0xFE, 0xED, 0xFA, 0xCE]),   // macOS 32-bit
    ("Mach-O 64", &[0xFE, 0xED, 0xFA, 0xCF]),   // macOS 64-bit
    ("Mach-O Fat", &[0xCA, 0xFE, 0xBA, 0xBE]),  // Universal binary, also Java class
    ("WebAssembly", &[0x00, 0x61, 0x73, 0x6D]), // WASM
];

/// Blocked file extensions (case-insensitive)
static BLOCKED_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // Windows executables
        "exe", "dll", "scr", "pif", "com", "msi", "bat", "cmd", "ps1",
        // Unix binaries and scripts
        "so", "dylib", "out", "sh", "bin",
        // JVM
        "jar", "war", "class",
        // Packages
        "deb", "rpm", "apk", "app", "dmg", "pkg",
        // Server-side scripts that a static file server must never host
        "php", "phtml", "cgi", "pl", "hta",
    ]
    .into_iter()
    .collect()
});

static UNSAFE_NAME_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9\-_]").unwrap());

/// Outcome of an upload safety check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileVerdict {
    Allowed,
    Blocked { reason: String },
}

impl FileVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, FileVerdict::Allowed)
    }

    fn blocked(reason: impl Into<String>) -> Self {
        FileVerdict::Blocked {
            reason: reason.into(),
        }
    }
}

/// Check an uploaded file against the size limit and executable rules.
pub fn validate_file(filename: &str, data: &[u8], max_size_bytes: u64) -> FileVerdict {
    if data.len() as u64 > max_size_bytes {
        return FileVerdict::blocked(format!(
            "File exceeds maximum size of {} bytes",
            max_size_bytes
        ));
    }

    if let Some(ext) = extension(filename) {
        if BLOCKED_EXTENSIONS.contains(ext.as_str()) {
            return FileVerdict::blocked(format!("File extension .{} is not allowed", ext));
        }
    }

    for (name, magic) in MAGIC_SIGNATURES {
        if data.starts_with(magic) {
            return FileVerdict::blocked(format!("Executable file detected: {}", name));
        }
    }

    FileVerdict::Allowed
}

/// Lowercased extension of `filename`, if it has one.
pub fn extension(filename: &str) -> Option<String> {
    let base = base_name(filename);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Filename without directory components or extension, made safe for storage.
///
/// Falls back to `file` when nothing usable is left.
pub fn clean_file_stem(filename: &str) -> String {
    let base = base_name(filename);
    let stem = match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base,
    };
    let cleaned = UNSAFE_NAME_CHARS.replace_all(stem, "_");
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.into_owned()
    }
}

/// Extension to store a file under: the client's extension when present,
/// otherwise one inferred from the magic bytes, otherwise `bin`.
pub fn storage_extension(filename: &str, data: &[u8]) -> String {
    let ext = extension(filename)
        .or_else(|| infer::get(data).map(|kind| kind.extension().to_string()))
        .unwrap_or_else(|| "bin".to_string());
    UNSAFE_NAME_CHARS.replace_all(&ext, "_").into_owned()
}

/// Detect the content type from magic bytes, falling back to `claimed`.
pub fn detect_content_type(data: &[u8], claimed: &str) -> String {
    match infer::get(data) {
        Some(kind) => kind.mime_type().to_string(),
        None => claimed.to_string(),
    }
}

fn base_name(filename: &str) -> &str {
    filename.rsplit(['/', '\\']).next().unwrap_or(filename)
}
