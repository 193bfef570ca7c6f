//! # Caller Tier Metadata
//!
//! Parsing of the caller's tier from inbound gRPC metadata.
use crate::policy::TierError;
use tonic::metadata::MetadataMap;

/// Reads the caller's tier from the `key` metadata entry.
///
/// The value must be a base-10 integer in the `u32` range, with no sign or surrounding
/// whitespace. When the entry is repeated only the first value is considered.
pub fn caller_tier(metadata: &MetadataMap, key: &str) -> Result<u32, TierError> {
    let value = metadata
        .get(key)
        .ok_or_else(|| TierError::MissingTier(key.to_string()))?;

    let malformed = |value: String| TierError::MalformedTier {
        key: key.to_string(),
        value,
    };

    let value = value
        .to_str()
        .map_err(|_| malformed(String::from_utf8_lossy(value.as_bytes()).into_owned()))?;

    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(value.to_string()));
    }

    value.parse().map_err(|_| malformed(value.to_string()))
}
