//! Shared bucket and key validation for storage backends.

use crate::traits::{StorageError, StorageResult};

/// Validate a bucket name: 3-63 characters of lowercase letters, digits,
/// hyphens and dots, starting and ending with a letter or digit.
pub fn validate_bucket(bucket: &str) -> StorageResult<()> {
    let valid_len = (3..=63).contains(&bucket.len());
    let valid_chars = bucket
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
    let valid_edges = bucket
        .chars()
        .next()
        .zip(bucket.chars().last())
        .map(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric())
        .unwrap_or(false);

    if !(valid_len && valid_chars && valid_edges) || bucket.contains("..") {
        return Err(StorageError::InvalidKey(format!(
            "Invalid bucket name '{}'",
            bucket
        )));
    }
    Ok(())
}

/// Validate an object key. Rejects empty keys, traversal sequences, absolute
/// paths, backslashes and NUL bytes.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty()
        || key.contains("..")
        || key.starts_with('/')
        || key.contains('\\')
        || key.contains('\0')
    {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}
