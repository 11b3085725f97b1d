// src/utils/code.rs

use rand::Rng;

/// 32-symbol alphabet for class join codes. Visually ambiguous characters
/// (0/O, 1/I) are excluded so codes survive being read aloud or copied by
/// hand.
pub const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const JOIN_CODE_LEN: usize = 6;

/// Draws a join code uniformly at random (with replacement) from the
/// alphabet.
pub fn generate_join_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..JOIN_CODE_LEN)
        .map(|_| JOIN_CODE_ALPHABET[rng.random_range(0..JOIN_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Picks a join code, avoiding codes that `is_taken` reports as in use.
///
/// On collision the code is regenerated exactly once and the second draw is
/// accepted unconditionally, so a residual collision probability remains.
/// The surrounding check-then-insert is not atomic either; duplicate codes
/// under concurrent class creation are an accepted limitation.
pub fn pick_join_code<R, F>(rng: &mut R, is_taken: F) -> String
where
    R: Rng + ?Sized,
    F: Fn(&str) -> bool,
{
    let code = generate_join_code(rng);
    if is_taken(&code) {
        generate_join_code(rng)
    } else {
        code
    }
}
