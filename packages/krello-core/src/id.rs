/// Entity identifiers.
///
/// Format: `{tag}_{millis in base36}_{8 hex chars}`, e.g. `card_m1x9k2ab_3fa09c17`.
/// The suffix hashes a process-wide counter with the nanosecond clock, so two
/// ids minted in the same millisecond still differ.
use std::sync::atomic::{AtomicU64, Ordering};

use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    Desk,
    Column,
    Card,
}

impl IdKind {
    pub fn tag(self) -> &'static str {
        match self {
            IdKind::Desk => "desk",
            IdKind::Column => "col",
            IdKind::Card => "card",
        }
    }
}

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn new_id(kind: IdKind) -> String {
    let seq = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let now = chrono::Utc::now();
    let millis = now.timestamp_millis().max(0) as u64;
    let nanos = now.timestamp_subsec_nanos();

    let mut hasher = Sha256::new();
    hasher.update(seq.to_le_bytes());
    hasher.update(nanos.to_le_bytes());
    hasher.update(millis.to_le_bytes());
    let hash = hasher.finalize();

    format!("{}_{}_{}", kind.tag(), to_base36(millis), hex::encode(&hash[..4]))
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_id_has_kind_prefix() {
        assert!(new_id(IdKind::Desk).starts_with("desk_"));
        assert!(new_id(IdKind::Column).starts_with("col_"));
        assert!(new_id(IdKind::Card).starts_with("card_"));
    }

    #[test]
    fn test_id_shape() {
        let id = new_id(IdKind::Card);
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_ids_unique_in_burst() {
        let ids: HashSet<String> = (0..500).map(|_| new_id(IdKind::Card)).collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }
}
