use std::fmt;

/// One `;`-separated piece of a connection string body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DsnSegment {
    /// `key=value`
    Pair(String, String),
    /// A bare value without key, e.g. an ODBC catalog name or a SQLite path.
    Bare(String),
}

impl DsnSegment {
    pub fn pair(key: impl Into<String>, value: impl fmt::Display) -> Self {
        DsnSegment::Pair(key.into(), value.to_string())
    }

    pub fn bare(value: impl Into<String>) -> Self {
        DsnSegment::Bare(value.into())
    }
}

/// Joins segments in order as `key=value;` / `value;` with the surrounding
/// separators trimmed.
pub fn build_dsn(segments: &[DsnSegment]) -> String {
    let mut dsn = String::new();
    for segment in segments {
        match segment {
            DsnSegment::Pair(k, v) => {
                dsn.push_str(k);
                dsn.push('=');
                dsn.push_str(v);
            }
            DsnSegment::Bare(v) => dsn.push_str(v),
        }
        dsn.push(';');
    }
    dsn.trim_matches(';').to_string()
}
