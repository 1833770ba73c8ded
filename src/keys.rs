//! Length-prefixed key encoding for LMDB storage.
//!
//! Composite keys are encoded as: [len1][bytes1][len2][bytes2]...
//! - No delimiters, no escaping: endpoint patterns may contain `/` and `:` freely
//! - A prefix built from the first N parts scans every key that starts with them
//! - Each part is limited to 255 bytes

use crate::constants::MAX_KEY_PART;
use crate::error::{PathbitError, Result};

/// Build a length-prefixed key from parts
///
/// # Example
/// ```
/// let key = pathbit::keys::build_key(&["GET", "/reports"]).unwrap();
/// assert_eq!(key, b"\x03GET\x08/reports".to_vec());
/// ```
pub fn build_key(parts: &[&str]) -> Result<Vec<u8>> {
    let total_len: usize = parts.iter().map(|p| 1 + p.len()).sum();
    let mut key = Vec::with_capacity(total_len);
    for part in parts {
        if part.len() > MAX_KEY_PART {
            return Err(PathbitError::Invalid(format!(
                "key part longer than {} bytes",
                MAX_KEY_PART
            )));
        }
        key.push(part.len() as u8);
        key.extend_from_slice(part.as_bytes());
    }
    Ok(key)
}

/// Build a prefix for scanning (same as build_key, just clearer intent)
#[inline]
pub fn build_prefix(parts: &[&str]) -> Result<Vec<u8>> {
    build_key(parts)
}

/// Parse a length-prefixed key into parts. Stops at the first truncated or non-UTF-8 part.
pub fn parse_key(bytes: &[u8]) -> Vec<&str> {
    let mut parts = Vec::with_capacity(2);
    let mut i = 0;
    while i < bytes.len() {
        let len = bytes[i] as usize;
        if i + 1 + len > bytes.len() {
            break;
        }
        match std::str::from_utf8(&bytes[i + 1..i + 1 + len]) {
            Ok(part) => parts.push(part),
            Err(_) => break,
        }
        i += 1 + len;
    }
    parts
}

/// Get the Nth part from a key without allocating
#[inline]
pub fn get_part(bytes: &[u8], n: usize) -> Option<&str> {
    let mut i = 0;
    let mut count = 0;
    while i < bytes.len() {
        let len = bytes[i] as usize;
        if i + 1 + len > bytes.len() {
            return None;
        }
        if count == n {
            return std::str::from_utf8(&bytes[i + 1..i + 1 + len]).ok();
        }
        i += 1 + len;
        count += 1;
    }
    None
}

// ============================================================================
// Domain keys
// ============================================================================

/// Association row key: [owner][member]
#[inline]
pub fn pair_key(owner: &str, member: &str) -> Result<Vec<u8>> {
    build_key(&[owner, member])
}

/// Route index key: [METHOD][pattern]
#[inline]
pub fn route_key(method: &str, pattern: &str) -> Result<Vec<u8>> {
    build_key(&[method, pattern])
}

/// Uniqueness index key: [field][value], e.g. [email][alice@example.com]
#[inline]
pub fn unique_key(field: &str, value: &str) -> Result<Vec<u8>> {
    build_key(&[field, value])
}
