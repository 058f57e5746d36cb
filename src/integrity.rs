use sha2::{Digest, Sha256};

/// Checksummed envelope for persisted payloads
///
/// The file-backed store writes every key through this envelope so that a
/// truncated or hand-edited file is detected on read instead of being
/// parsed into half a log:
/// 1. A SHA-256 checksum is computed when the payload is written
/// 2. The checksum is re-validated when the payload is read back
/// 3. Mismatches are reported and the payload is discarded
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChecksummedEntry {
    /// The stored payload (JSON string)
    pub data: String,
    /// SHA-256 checksum of the payload (hex encoded)
    pub checksum: String,
}

impl ChecksummedEntry {
    pub fn new(data: String) -> Self {
        let checksum = checksum(&data);
        Self { data, checksum }
    }

    /// Returns true if the checksum still matches the payload
    pub fn is_valid(&self) -> bool {
        checksum(&self.data) == self.checksum
    }

    pub fn serialize(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses an envelope and validates it.
    ///
    /// Returns `Some(data)` if valid, `None` if the envelope is not JSON or
    /// the checksum does not match.
    pub fn deserialize_and_validate(serialized: &str) -> Option<String> {
        let entry: ChecksummedEntry = serde_json::from_str(serialized).ok()?;

        if entry.is_valid() {
            Some(entry.data)
        } else {
            tracing::warn!(
                "Stored payload failed checksum validation. Expected: {}, Data length: {}",
                entry.checksum,
                entry.data.len()
            );
            None
        }
    }
}

/// Hex-encoded SHA-256 of a string. Also used as the export ETag.
pub fn checksum(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_validation() {
        let data = r#"[{"name": "Jane"}]"#.to_string();
        let entry = ChecksummedEntry::new(data.clone());

        assert!(entry.is_valid());
        assert_eq!(entry.data, data);
    }

    #[test]
    fn test_serialize_deserialize() {
        let data = r#"[]"#.to_string();
        let serialized = ChecksummedEntry::new(data.clone()).serialize().unwrap();

        assert_eq!(
            ChecksummedEntry::deserialize_and_validate(&serialized),
            Some(data)
        );
    }

    #[test]
    fn test_tampered_payload_returns_none() {
        let serialized = ChecksummedEntry::new(r#"[{"email": "a@b.co"}]"#.to_string())
            .serialize()
            .unwrap();
        let tampered = serialized.replace("a@b.co", "x@y.co");

        assert_eq!(ChecksummedEntry::deserialize_and_validate(&tampered), None);
        assert_eq!(ChecksummedEntry::deserialize_and_validate("not json"), None);
    }

    #[test]
    fn test_checksum_consistency() {
        assert_eq!(checksum("test data"), checksum("test data"));
        assert_ne!(checksum("test data"), checksum("test data "));
        assert_eq!(checksum("").len(), 64);
    }
}
