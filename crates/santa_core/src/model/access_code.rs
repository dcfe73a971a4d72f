//! Human-facing access codes for groups and participants.

use rand::Rng;

/// Alphabet without look-alike characters (`0/O`, `1/I`).
pub const ACCESS_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const GROUP_CODE_LEN: usize = 6;
pub const PARTICIPANT_CODE_LEN: usize = 8;

/// Generates a random code of `len` characters from [`ACCESS_CODE_ALPHABET`].
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| {
            let index = rng.gen_range(0..ACCESS_CODE_ALPHABET.len());
            char::from(ACCESS_CODE_ALPHABET[index])
        })
        .collect()
}

/// Normalizes user-typed codes for lookup (codes are stored upper-case).
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::{generate_code, normalize_code, ACCESS_CODE_ALPHABET, GROUP_CODE_LEN};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn generated_codes_use_alphabet_and_length() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let code = generate_code(&mut rng, GROUP_CODE_LEN);
            assert_eq!(code.len(), GROUP_CODE_LEN);
            assert!(code.bytes().all(|b| ACCESS_CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn normalize_code_uppercases_and_trims() {
        assert_eq!(normalize_code("  ab3xyz "), "AB3XYZ");
    }
}
