//! Room identifiers

use rand::Rng;

/// Room code symbols. No I, O, 0 or 1.
pub const ROOM_CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const ROOM_CODE_LEN: usize = 6;

/// Attempts before giving up on finding an unused code
pub const MAX_CODE_ATTEMPTS: usize = 16;

/// Random human-enterable room code
pub fn generate_room_code<R: Rng>(rng: &mut R) -> String {
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Generate codes until one is not taken
pub fn generate_unique_room_code<R, F>(rng: &mut R, is_taken: F) -> Option<String>
where
    R: Rng,
    F: Fn(&str) -> bool,
{
    (0..MAX_CODE_ATTEMPTS)
        .map(|_| generate_room_code(rng))
        .find(|code| !is_taken(code))
}

/// Random token for rooms formed by matchmaking. Never collides with a code.
pub fn random_room_id<R: Rng>(rng: &mut R) -> String {
    format!("m-{:016x}", rng.gen::<u64>())
}

/// Canonical form of a typed room code, `None` if blank
pub fn normalize_room_code(raw: &str) -> Option<String> {
    let code = raw.trim();
    if code.is_empty() {
        None
    } else {
        Some(code.to_ascii_uppercase())
    }
}
