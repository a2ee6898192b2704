//! # Natural Ordering
//!
//! Alphanumeric comparison where runs of digits compare as numbers, plus
//! the handle sorting and hierarchy helpers built on it.
//!
//! ```rust
//! use mufs::natural_cmp;
//! use std::cmp::Ordering;
//!
//! assert_eq!(natural_cmp("file2", "file10"), Ordering::Less);
//! assert_eq!(natural_cmp("a", "a"), Ordering::Equal);
//! ```

use std::cmp::Ordering;
use std::time::UNIX_EPOCH;

use crate::{ResourceHandle, ResourceRead, SortKey};

/// Split off the leading run of digits or non-digits.
fn next_chunk(s: &str) -> (&str, &str) {
    let Some(first) = s.chars().next() else {
        return ("", "");
    };
    let digits = first.is_ascii_digit();
    let end = s
        .char_indices()
        .find(|(_, c)| c.is_ascii_digit() != digits)
        .map_or(s.len(), |(i, _)| i);
    s.split_at(end)
}

fn is_numeric(chunk: &str) -> bool {
    chunk.bytes().next().is_some_and(|b| b.is_ascii_digit())
}

/// Compare two strings chunk by chunk.
///
/// Digit runs compare by length first and then digit by digit, which is
/// numeric ordering without parsing, so arbitrarily long runs never
/// overflow. Other runs compare lexicographically. When every compared
/// chunk is equal the shorter string sorts first.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut rest_a, mut rest_b) = (a, b);
    while !rest_a.is_empty() && !rest_b.is_empty() {
        let (chunk_a, tail_a) = next_chunk(rest_a);
        let (chunk_b, tail_b) = next_chunk(rest_b);

        let ord = if is_numeric(chunk_a) && is_numeric(chunk_b) {
            chunk_a
                .len()
                .cmp(&chunk_b.len())
                .then_with(|| chunk_a.cmp(chunk_b))
        } else {
            chunk_a.cmp(chunk_b)
        };
        if ord != Ordering::Equal {
            return ord;
        }
        rest_a = tail_a;
        rest_b = tail_b;
    }
    a.len().cmp(&b.len())
}

/// The string a handle contributes for `key`.
fn sort_string<R: ResourceRead + ?Sized>(handle: &R, key: SortKey) -> String {
    match key {
        SortKey::Name => handle.name(),
        SortKey::Size => handle
            .size()
            .ok()
            .flatten()
            .unwrap_or_default()
            .to_string(),
        SortKey::Modified => handle
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_millis())
            .to_string(),
        SortKey::Mime => handle
            .mime_type(false)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default(),
    }
}

/// Compare two handles by `key` using [`natural_cmp`] over the key's string form.
pub fn compare_by_key<A, B>(a: &A, b: &B, key: SortKey) -> Ordering
where
    A: ResourceRead + ?Sized,
    B: ResourceRead + ?Sized,
{
    natural_cmp(&sort_string(a, key), &sort_string(b, key))
}

/// Sort handles: directories first, then files, each naturally ordered by name.
///
/// The two groups never interleave, and sorting twice gives the same order.
pub fn sort_handles(handles: impl IntoIterator<Item = ResourceHandle>) -> Vec<ResourceHandle> {
    sort_handles_by(handles, SortKey::Name)
}

/// Like [`sort_handles`] with a selectable key inside each group.
pub fn sort_handles_by(
    handles: impl IntoIterator<Item = ResourceHandle>,
    key: SortKey,
) -> Vec<ResourceHandle> {
    let (mut dirs, mut files): (Vec<_>, Vec<_>) =
        handles.into_iter().partition(|h| h.is_directory());
    let cmp = |a: &ResourceHandle, b: &ResourceHandle| {
        compare_by_key(a.as_ref(), b.as_ref(), key)
            .then_with(|| natural_cmp(a.resource_string(), b.resource_string()))
    };
    dirs.sort_by(cmp);
    files.sort_by(cmp);
    dirs.extend(files);
    dirs
}

/// Ancestors of `handle`, nearest first, up to the root.
pub fn ancestors(handle: &ResourceHandle) -> Vec<ResourceHandle> {
    let mut chain = Vec::new();
    let mut current = handle.parent();
    while let Some(parent) = current {
        current = parent.parent();
        chain.push(parent);
    }
    chain
}

/// Whether `ancestor` appears on the parent chain of `handle`.
pub fn is_descendant_of(handle: &ResourceHandle, ancestor: &ResourceHandle) -> bool {
    ancestors(handle)
        .iter()
        .any(|a| a.resource_string() == ancestor.resource_string())
}
