//! Fast hashing utilities using xxHash3.
//!
//! Used for macro change detection and for deriving per-file scope ids.

use xxhash_rust::xxh3::xxh3_64;

/// Compute a 64-bit hash of the given string using xxHash3.
#[inline]
pub fn hash_str(data: &str) -> u64 {
    xxh3_64(data.as_bytes())
}

/// Convert a hash to a hex string (16 characters).
#[inline]
pub fn hash_to_hex(hash: u64) -> String {
    format!("{:016x}", hash)
}

/// Compute hash of a string and return as hex.
#[inline]
pub fn content_hash(content: &str) -> String {
    hash_to_hex(hash_str(content))
}

/// Hash an ordered sequence of fragments.
///
/// Fragments are length-prefixed so that `["ab", "c"]` and `["a", "bc"]`
/// never collide. Returns `None` for an empty sequence.
pub fn hash_fragments<'a, I>(fragments: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut buf = String::new();
    let mut any = false;
    for fragment in fragments {
        any = true;
        buf.push_str(&fragment.len().to_string());
        buf.push(':');
        buf.push_str(fragment);
    }
    any.then(|| content_hash(&buf))
}

/// Short 8-character hash, used for scope ids.
#[inline]
pub fn short_hash(content: &str) -> String {
    let mut hex = content_hash(content);
    hex.truncate(8);
    hex
}
