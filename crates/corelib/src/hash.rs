//! The ring's wire-contract hash function.
//!
//! Per spec §4.1 the ring hash must be deterministic across implementations and
//! independent of host byte order. FNV-1a 32-bit is the recommended choice
//! (spec §9 Open Questions) and is what every participant in a LoopCache
//! deployment must agree on — this is part of the wire contract, not an
//! implementation detail, so it is not pluggable.

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a over UTF-8/raw bytes, producing the 32-bit ring position used for
/// both key lookups and virtual-node placement.
pub fn fnv1a32(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &b in bytes {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_fnv1a32_vectors() {
        // Standard FNV-1a 32-bit test vectors.
        assert_eq!(fnv1a32(b""), 0x811c_9dc5);
        assert_eq!(fnv1a32(b"a"), 0xe40c_292c);
        assert_eq!(fnv1a32(b"foobar"), 0xbf9c_f968);
    }

    #[test]
    fn is_deterministic() {
        assert_eq!(fnv1a32(b"loopcache"), fnv1a32(b"loopcache"));
    }
}
