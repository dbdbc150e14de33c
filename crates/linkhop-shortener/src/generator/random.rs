use crate::error::{Result, ShortenerError};
use crate::generator::Generator;
use linkhop_core::short_id::MAX_LENGTH;
use linkhop_core::ShortId;
use rand::distr::Alphanumeric;
use rand::Rng;

/// Shortest id the generator will produce. 62^7 (about 3.5e12) names keep
/// the collision probability negligible at the expected scale.
pub const MIN_GENERATED_LENGTH: usize = 7;

/// Generates ids from `[0-9A-Za-z]` using the thread-local CSPRNG.
#[derive(Debug, Clone)]
pub struct RandomGenerator {
    length: usize,
}

impl RandomGenerator {
    /// Creates a generator producing ids of [`MIN_GENERATED_LENGTH`].
    pub fn new() -> Self {
        Self {
            length: MIN_GENERATED_LENGTH,
        }
    }

    /// Creates a generator producing ids of `length` characters.
    pub fn with_length(length: usize) -> Result<Self> {
        if !(MIN_GENERATED_LENGTH..=MAX_LENGTH).contains(&length) {
            return Err(ShortenerError::InvalidConfig(format!(
                "short id length must be between {} and {}, got {}",
                MIN_GENERATED_LENGTH, MAX_LENGTH, length
            )));
        }
        Ok(Self { length })
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for RandomGenerator {
    type Output = ShortId;

    fn generate(&self) -> ShortId {
        let id: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect();
        ShortId::new_unchecked(id)
    }
}
