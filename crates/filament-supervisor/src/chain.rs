//! Chain identity.

use filament_common::unix_millis;

/// Allocates a chain id of the form `<initiator-uid>-<unix-ms>-<8 hex>`.
///
/// The millisecond timestamp plus 32 bits of entropy make collisions across
/// the fabric vanishingly unlikely (~2^-32 per millisecond per initiator).
pub fn allocate_chain_id(uid: &str) -> String {
    format!("{}-{}-{:08x}", uid, unix_millis(), rand::random::<u32>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn parts(chain_id: &str, uid: &str) -> (String, String) {
        let rest = chain_id.strip_prefix(&format!("{}-", uid)).unwrap();
        let (millis, hex) = rest.split_once('-').unwrap();
        (millis.to_string(), hex.to_string())
    }

    #[test]
    fn test_chain_id_shape() {
        let chain_id = allocate_chain_id("ci");
        let (millis, hex) = parts(&chain_id, "ci");
        assert!(millis.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(hex.len(), 8);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_uid_with_dashes_survives() {
        let chain_id = allocate_chain_id("peer-eu-1");
        assert!(chain_id.starts_with("peer-eu-1-"));
    }

    #[test]
    fn test_chain_ids_unique_under_stress() {
        let mut seen = HashSet::new();
        for _ in 0..1_000_000 {
            assert!(seen.insert(allocate_chain_id("ci")), "duplicate chain id");
        }
    }
}
