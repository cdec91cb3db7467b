use rand::RngCore;

/// Symbols used for generated ids (RFC 4648 base32, no padding).
pub const SESSION_ID_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Length of a generated id. 26 symbols of 5 bits each cover 128 bits.
pub const SESSION_ID_LEN: usize = 26;

/// Generate a fresh session id from the thread-local CSPRNG.
///
/// The result is always [`SESSION_ID_LEN`] uppercase base32 characters, so it
/// can be embedded in resource URIs and derived branch ids without escaping.
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
        .iter()
        .map(|b| SESSION_ID_ALPHABET[usize::from(b % 32)] as char)
        .collect()
}
