//! Utility functions for file names and archive paths

use std::collections::HashSet;

/// Decode a percent-encoded file name
///
/// Names that fail to decode (e.g. the bytes are not valid UTF-8) are
/// returned unchanged rather than failing the caller.
///
/// # Examples
///
/// ```
/// use attachment_tree::utils::decode_file_name;
///
/// assert_eq!(decode_file_name("annual%20report.pdf"), "annual report.pdf");
/// assert_eq!(decode_file_name("%FF%FE.bin"), "%FF%FE.bin");
/// ```
pub fn decode_file_name(name: &str) -> String {
    match urlencoding::decode(name) {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
            tracing::debug!(name, error = %e, "file name is not valid percent-encoding, keeping raw");
            name.to_string()
        }
    }
}

/// Split a file name into stem and extension at the last dot
///
/// A leading dot (".env") does not start an extension.
fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}

/// Get a name not yet present in `taken`, appending ` (1)`, ` (2)`, … before the extension
///
/// The returned name is inserted into `taken`.
///
/// # Examples
///
/// ```
/// use std::collections::HashSet;
/// use attachment_tree::utils::unique_name;
///
/// let mut taken = HashSet::new();
/// assert_eq!(unique_name("scan.pdf", &mut taken), "scan.pdf");
/// assert_eq!(unique_name("scan.pdf", &mut taken), "scan (1).pdf");
/// assert_eq!(unique_name("scan.pdf", &mut taken), "scan (2).pdf");
/// ```
pub fn unique_name(name: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.to_string()) {
        return name.to_string();
    }

    let (stem, extension) = split_extension(name);
    let mut i: u32 = 1;
    loop {
        let candidate = match extension {
            Some(ext) => format!("{} ({}).{}", stem, i, ext),
            None => format!("{} ({})", stem, i),
        };
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        i += 1;
    }
}

/// Make a node name safe to use as one archive path segment
///
/// Path separators become `_`, and names that are empty or consist only of
/// dots (which would escape or collapse the folder) become `_`.
pub fn sanitize_segment(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        cleaned
    }
}
