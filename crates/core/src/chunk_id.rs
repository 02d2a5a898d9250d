use sha2::{Digest, Sha256};

pub const DEFAULT_HASH_PREFIX_CHARS: usize = 256;

const SEPARATOR: &[u8] = b"\x1f";

/// Deterministic chunk id: hex SHA-256 over source path, page, the first 256
/// characters of the content and the sequence index.
pub fn identify(source_path: &str, page_number: &str, content: &str, sequence_index: u64) -> String {
    identify_with_prefix(
        source_path,
        page_number,
        content,
        sequence_index,
        DEFAULT_HASH_PREFIX_CHARS,
    )
}

pub fn identify_with_prefix(
    source_path: &str,
    page_number: &str,
    content: &str,
    sequence_index: u64,
    prefix_chars: usize,
) -> String {
    let prefix: String = content.chars().take(prefix_chars).collect();

    let mut hasher = Sha256::new();
    hasher.update(source_path.as_bytes());
    hasher.update(SEPARATOR);
    hasher.update(page_number.as_bytes());
    hasher.update(SEPARATOR);
    hasher.update(prefix.as_bytes());
    hasher.update(SEPARATOR);
    hasher.update(sequence_index.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}
