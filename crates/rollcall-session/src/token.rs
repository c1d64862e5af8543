//! Attendance token generation.
//!
//! Tokens are short so students can type them from the classroom screen:
//! 8 characters from `A–Z0–9` by default, about 41 bits.
//!
//! # Randomness
//!
//! Characters come from `rand::rng()`, rand's thread-local ChaCha-based
//! CSPRNG, reseeded from the OS. A non-cryptographic generator would let
//! someone who has seen a few tokens predict the next one. Short length
//! plus the TTL is still what bounds guessing; a token is a classroom
//! secret, not an account credential.

use rand::Rng;
use rollcall_protocol::Token;

/// The 36 symbols a token is drawn from.
pub const TOKEN_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generates a token of `length` symbols drawn uniformly from
/// [`TOKEN_ALPHABET`].
pub fn generate_token(length: usize) -> Token {
    let mut rng = rand::rng();
    let token: String = (0..length)
        .map(|_| TOKEN_ALPHABET[rng.random_range(0..TOKEN_ALPHABET.len())] as char)
        .collect();
    Token::new(token)
}
