//! Instance identifier generation
//!
//! Identifiers are the decimal rendering of a 32-bit FNV-1a hash of
//! `"{schema_id}:{sequence}"`. The sequence is owned by the store, starts at
//! zero and is never reused, so ids stay opaque strings while repeated
//! instantiation cannot hand out the same id twice.

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Candidate identifier for a schema at a given sequence number
pub fn candidate_id(schema_id: &str, sequence: u64) -> String {
    let key = format!("{}:{}", schema_id, sequence);
    fnv1a_32(key.as_bytes()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a_reference_vectors() {
        assert_eq!(fnv1a_32(b""), 0x811c_9dc5);
        assert_eq!(fnv1a_32(b"a"), 0xe40c_292c);
        assert_eq!(fnv1a_32(b"foobar"), 0xbf9c_f968);
    }

    #[test]
    fn test_candidate_id_is_decimal_hash() {
        let id = candidate_id("test", 0);
        assert_eq!(id, fnv1a_32(b"test:0").to_string());
        assert!(id.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_candidate_id_varies_with_sequence() {
        assert_ne!(candidate_id("test", 0), candidate_id("test", 1));
        assert_ne!(candidate_id("a", 0), candidate_id("b", 0));
    }
}
