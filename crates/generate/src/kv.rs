//! Key/value sources: `K=V` literals, `[key=]path` file sources and env files.

use once_cell::sync::Lazy;
use regex::Regex;

static DATA_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-._a-zA-Z0-9]+$").expect("valid regex"));
static ENV_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-._a-zA-Z][-._a-zA-Z0-9]*$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("key {0:?} is reserved")]
    ReservedKey(String),
    #[error("invalid key {0:?}: must consist of alphanumerics, '-', '_' or '.'")]
    InvalidKey(String),
    #[error("invalid literal source {0:?}, expected key=value")]
    MissingEquals(String),
    #[error("invalid literal source {0:?}, empty key")]
    EmptyLiteralKey(String),
    #[error("file source {0:?} has an empty key")]
    EmptyFileKey(String),
    #[error("file source {0:?} has an empty path")]
    EmptyFilePath(String),
    #[error("file source {0:?} has no file name")]
    NoFileName(String),
    #[error("env file is not UTF-8: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),
    #[error("line {line}: invalid variable name {name:?}")]
    InvalidEnvName { line: usize, name: String },
}

/// ConfigMap/Secret data keys: alphanumerics plus `-`, `_` and `.`; `.` and `..` are reserved.
pub fn validate_key(key: &str) -> Result<(), SourceError> {
    if key == "." || key == ".." {
        return Err(SourceError::ReservedKey(key.to_string()));
    }
    if !DATA_KEY.is_match(key) {
        return Err(SourceError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Parse `key=value`, dropping one pair of matching surrounding quotes from the value.
pub fn parse_literal(src: &str) -> Result<(String, String), SourceError> {
    let (key, value) = src
        .split_once('=')
        .ok_or_else(|| SourceError::MissingEquals(src.to_string()))?;
    if key.is_empty() {
        return Err(SourceError::EmptyLiteralKey(src.to_string()));
    }
    Ok((key.to_string(), unquote(value).to_string()))
}

fn unquote(v: &str) -> &str {
    for q in ['"', '\''] {
        if v.len() >= 2 && v.starts_with(q) && v.ends_with(q) {
            return &v[1..v.len() - 1];
        }
    }
    v
}

/// Parse `path` or `key=path`. A bare path uses its file name as the key.
pub fn parse_file_source(src: &str) -> Result<(String, String), SourceError> {
    match src.split_once('=') {
        Some((key, path)) => {
            if key.is_empty() { return Err(SourceError::EmptyFileKey(src.to_string())); }
            if path.is_empty() { return Err(SourceError::EmptyFilePath(src.to_string())); }
            Ok((key.to_string(), path.to_string()))
        }
        None => {
            let key = std::path::Path::new(src)
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| SourceError::NoFileName(src.to_string()))?;
            Ok((key.to_string(), src.to_string()))
        }
    }
}

/// Parse an env file. Blank lines and `#` comments are skipped; `KEY` without `=`
/// is looked up in the process environment through `lookup` and skipped when unset.
pub fn parse_env<F>(content: &[u8], lookup: F) -> Result<Vec<(String, String)>, SourceError>
where
    F: Fn(&str) -> Option<String>,
{
    let text = std::str::from_utf8(content)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut out = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim_start();
        if line.is_empty() || line.starts_with('#') { continue; }
        let (key, value) = match line.split_once('=') {
            Some((k, v)) => (k, Some(v.to_string())),
            None => (line.trim_end(), None),
        };
        if !ENV_NAME.is_match(key) {
            return Err(SourceError::InvalidEnvName { line: i + 1, name: key.to_string() });
        }
        match value.or_else(|| lookup(key)) {
            Some(v) => out.push((key.to_string(), v)),
            None => continue,
        }
    }
    Ok(out)
}
