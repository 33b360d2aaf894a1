//! Room code generation.

use imposter_protocol::{MAX_CODE_LEN, ProtocolError, RoomCode};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Letters and digits that can't be mistaken for one another when read
/// aloud or off a phone screen: no `0`/`O`, no `1`/`I`.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Produces candidate room codes.
///
/// Uniqueness is not the generator's job: the registry retries whenever a
/// candidate collides with a live room.
pub trait CodeGenerator: Send + 'static {
    fn next_code(&mut self) -> Result<RoomCode, ProtocolError>;
}

/// Random fixed-length codes over [`CODE_ALPHABET`].
#[derive(Debug)]
pub struct AlphabetCodes {
    length: usize,
    rng: StdRng,
}

impl AlphabetCodes {
    /// Codes of `length` characters, clamped to what a [`RoomCode`] allows.
    pub fn new(length: usize) -> Self {
        Self::with_rng(length, StdRng::from_os_rng())
    }

    /// Same, with a caller-supplied generator for reproducible codes.
    pub fn with_rng(length: usize, rng: StdRng) -> Self {
        Self {
            length: length.clamp(1, MAX_CODE_LEN),
            rng,
        }
    }
}

impl CodeGenerator for AlphabetCodes {
    fn next_code(&mut self) -> Result<RoomCode, ProtocolError> {
        let raw: String = (0..self.length)
            .map(|_| char::from(CODE_ALPHABET[self.rng.random_range(0..CODE_ALPHABET.len())]))
            .collect();
        RoomCode::parse(&raw)
    }
}
