use std::fmt;
use std::sync::LazyLock;
use std::time::UNIX_EPOCH;

use axum::http::{HeaderMap, HeaderName};
use axum::http::header::{IF_NONE_MATCH, IF_RANGE, RANGE};
use regex::Regex;

use crate::storage::FileSnapshot;

static BYTE_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^bytes=(\d*)-(\d*)$").expect("byte range pattern is valid"));

/// Strong entity tag, stored in its quoted wire form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityTag(String);

impl EntityTag {
    /// Derives the tag from the length and modification time of a snapshot.
    pub fn from_snapshot(snapshot: &FileSnapshot) -> Self {
        let nanos = snapshot
            .modified()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or_default();
        EntityTag(format!("\"{:x}-{:x}\"", snapshot.len(), nanos))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Conditional request headers presented by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preconditions {
    pub if_range: Option<String>,
    pub range: Option<String>,
    pub if_none_match: Vec<String>,
}

impl Preconditions {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let text = |name: HeaderName| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let if_none_match = headers
            .get_all(IF_NONE_MATCH)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect();

        Preconditions {
            if_range: text(IF_RANGE),
            range: text(RANGE),
            if_none_match,
        }
    }

    /// True only when both `If-Range` and `Range` are present and the
    /// `If-Range` tag is the current tag. Otherwise the range is ignored.
    pub fn is_range_request(&self, tag: &EntityTag) -> bool {
        match (&self.if_range, &self.range) {
            (Some(if_range), Some(_)) => if_range == tag.as_str(),
            _ => false,
        }
    }

    /// True when the `If-None-Match` set contains the current tag exactly.
    pub fn is_not_modified(&self, tag: &EntityTag) -> bool {
        self.if_none_match
            .iter()
            .any(|candidate| candidate == tag.as_str())
    }
}

/// A single satisfiable byte range, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Parses `bytes=a-b`, `bytes=a-` or `bytes=-n` against a resource of
    /// `len` bytes. Multiple ranges and unsatisfiable ranges yield `None`.
    pub fn parse(header: &str, len: u64) -> Option<Self> {
        let captures = BYTE_RANGE.captures(header.trim())?;
        let first = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        let last = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
        if len == 0 {
            return None;
        }

        let (start, end) = match (first.is_empty(), last.is_empty()) {
            (true, true) => return None,
            (true, false) => {
                let suffix: u64 = last.parse().ok()?;
                if suffix == 0 {
                    return None;
                }
                (len.saturating_sub(suffix), len - 1)
            }
            (false, true) => (first.parse().ok()?, len - 1),
            (false, false) => {
                let end: u64 = last.parse().ok()?;
                (first.parse().ok()?, end.min(len - 1))
            }
        };

        if start > end || start >= len {
            return None;
        }
        Some(ByteRange { start, end })
    }

    pub fn byte_count(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}
