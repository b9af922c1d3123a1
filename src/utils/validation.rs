use std::path::Path;
use thiserror::Error;

/// Longest sanitized base name kept; leaves room for the ingestion token prefix
pub const MAX_BASE_NAME_LEN: usize = 200;

/// Dangerous file extensions that should never be stored, whatever the declared type
const BLOCKED_EXTENSIONS: &[&str] = &[
    // Executables
    "exe", "dll", "so", "dylib", "bin", "com", "bat", "cmd", "ps1", "sh", "bash",
    // Scripts/Code
    "js", "mjs", "ts", "py", "rb", "php", "phtml", "pl", "cgi", "asp", "aspx", "jsp", "jar",
    // Markup served inline by browsers
    "html", "htm", "xhtml", "shtml", "svg", "xml", "xsl", "xslt",
    // Server config
    "htaccess", "htpasswd",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("Filename is empty after sanitization")]
    Empty,

    #[error("Hidden files (starting with '.') are not allowed")]
    Hidden,

    #[error("File extension '.{0}' is not allowed")]
    BlockedExtension(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContentError {
    #[error("File contains executable content which is not allowed")]
    Executable,

    #[error("File content looks like {detected} but was declared as {declared}")]
    Mismatch { declared: String, detected: String },
}

/// Returns the normalized essence of a declared MIME type ("image/PNG; x=y" -> "image/png")
pub fn normalize_mime(content_type: &str) -> Option<String> {
    content_type
        .parse::<mime::Mime>()
        .ok()
        .map(|m| m.essence_str().to_lowercase())
}

/// Checks a declared MIME type against the configured allowlist
pub fn is_mime_allowed(content_type: &str, allowed: &[String]) -> bool {
    normalize_mime(content_type).is_some_and(|m| allowed.iter().any(|a| *a == m))
}

/// Sanitizes filename to prevent path traversal and injection attacks.
/// Returns the sanitized base name or an error if nothing safe is left.
pub fn sanitize_filename(filename: &str) -> Result<String, NameError> {
    // Keep only the last path component, whichever separator the client used
    let base = filename.rsplit(['/', '\\']).next().unwrap_or("");

    if base != filename {
        tracing::warn!("Path components stripped from uploaded filename: {:?}", filename);
    }

    let stripped: String = base
        .chars()
        .filter(|&c| {
            !(c.is_control()
                || c == ':'
                || c == '*'
                || c == '?'
                || c == '"'
                || c == '<'
                || c == '>'
                || c == '|'
                || c == ';')
        })
        .collect();

    // Windows drops trailing dots and spaces; "." and ".." collapse to nothing here too
    let trimmed = stripped.trim().trim_end_matches(['.', ' ']);

    if trimmed.is_empty() {
        return Err(NameError::Empty);
    }

    if trimmed.starts_with('.') {
        return Err(NameError::Hidden);
    }

    // Limit length safely for UTF-8
    let mut end = trimmed.len().min(MAX_BASE_NAME_LEN);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    let sanitized = &trimmed[..end];

    if let Some(ext) = Path::new(sanitized).extension().and_then(|e| e.to_str()) {
        let ext_lower = ext.to_lowercase();
        if BLOCKED_EXTENSIONS.contains(&ext_lower.as_str()) {
            return Err(NameError::BlockedExtension(ext_lower));
        }
    }

    Ok(sanitized.to_string())
}

/// Checks leading bytes against the declared type.
/// Content whose type cannot be detected is let through.
pub fn verify_magic_bytes(header: &[u8], declared_mime: &str) -> Result<(), ContentError> {
    if is_executable_content(header) {
        return Err(ContentError::Executable);
    }

    let Some(kind) = infer::get(header) else {
        tracing::debug!(
            "No magic bytes match for declared MIME type '{}', allowing anyway",
            declared_mime
        );
        return Ok(());
    };

    let declared = normalize_mime(declared_mime).unwrap_or_default();
    if kind.mime_type() == declared {
        return Ok(());
    }

    Err(ContentError::Mismatch {
        declared,
        detected: kind.mime_type().to_string(),
    })
}

/// Checks if file content appears to be executable
pub fn is_executable_content(header: &[u8]) -> bool {
    const SIGNATURES: &[&[u8]] = &[
        &[0x7F, 0x45, 0x4C, 0x46], // ELF
        &[0x4D, 0x5A],             // PE/COFF
        &[0xFE, 0xED, 0xFA, 0xCE], // Mach-O
        &[0xFE, 0xED, 0xFA, 0xCF],
        &[0xCE, 0xFA, 0xED, 0xFE],
        &[0xCF, 0xFA, 0xED, 0xFE],
        b"#!", // shebang
    ];

    header.len() >= 2 && SIGNATURES.iter().any(|sig| header.starts_with(sig))
}

/// Content type to serve a stored file with, derived from its extension
pub fn content_type_for(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}
