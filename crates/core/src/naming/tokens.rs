//! Numeric token extraction and path helpers.
//!
//! Paths use `/` as the canonical separator; `\` is tolerated on input but
//! never produced.

use once_cell::sync::Lazy;
use regex_lite::Regex;

static DIGIT_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

/// Extract every maximal digit run from `name`, left to right.
///
/// `"S01E02 - 1080p"` yields `["01", "02", "1080"]`.
pub fn extract_numbers(name: &str) -> Vec<String> {
    DIGIT_RUNS
        .find_iter(name)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Apply a signed adjustment to a zero-padded episode token.
///
/// The result keeps the original digit width, growing it only when the
/// adjusted value needs more digits: `"02" + 1 -> "03"`, `"9" + 1 -> "10"`.
/// Returns `None` when the token does not fit an integer.
pub fn shift_episode(source: &str, adjustment: i64) -> Option<String> {
    let value: i64 = source.parse().ok()?;
    Some(format!(
        "{:0width$}",
        value + adjustment,
        width = source.len()
    ))
}

/// The top-level folder of a path inside a torrent, or `""` for a bare file.
pub fn top_folder(path: &str) -> &str {
    match path.find(['/', '\\']) {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// The last path segment.
pub fn base_name(path: &str) -> &str {
    path.rfind(['/', '\\'])
        .map(|idx| &path[idx + 1..])
        .unwrap_or(path)
}

/// The extension of the last path segment (text after the final dot).
pub fn extension(path: &str) -> &str {
    let base = base_name(path);
    base.rsplit('.').next().unwrap_or(base)
}

/// Replace the file name of `path`, keeping its top-level folder when present.
pub fn with_file_name(path: &str, file_name: &str) -> String {
    let folder = top_folder(path);
    if folder.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", folder, file_name)
    }
}
