//! Random opaque tokens used to replace identifying text.
//!
//! Stateless: every call draws from the thread-local generator. Output is
//! intentionally different on every build; collisions are tolerated.

use rand::Rng;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const HEX: &[u8] = b"0123456789abcdef";

/// A string of `len` characters drawn from `[a-z0-9]`.
pub fn random_identifier(len: usize) -> String {
    draw(ALPHABET, len)
}

/// An identifier such as `_0x3fa9c1`: `prefix` followed by `len` hex digits.
pub fn random_hex_name(prefix: &str, len: usize) -> String {
    let mut name = String::with_capacity(prefix.len() + len);
    name.push_str(prefix);
    name.push_str(&draw(HEX, len));
    name
}

fn draw(alphabet: &[u8], len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| alphabet[rng.random_range(0..alphabet.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_has_requested_length_and_alphabet() {
        for len in [0, 1, 6, 10, 16, 64] {
            let id = random_identifier(len);
            assert_eq!(id.len(), len);
            assert!(id
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn identifiers_vary_between_calls() {
        let a = random_identifier(16);
        let b = random_identifier(16);
        assert_ne!(a, b);
    }

    #[test]
    fn hex_name_is_a_valid_js_identifier() {
        let name = random_hex_name("_0x", 6);
        assert!(name.starts_with("_0x"));
        assert_eq!(name.len(), 9);
        assert!(name[3..].chars().all(|c| c.is_ascii_hexdigit()));
    }
}
