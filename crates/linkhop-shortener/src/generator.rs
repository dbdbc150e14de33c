pub mod random;

use linkhop_core::ShortId;

/// Trait for generating candidate short ids.
///
/// Implementations are pure generators that don't interact with storage.
/// Candidates are allowed to collide with existing ids; the allocator claims
/// them with set-if-absent and asks for another on conflict.
pub trait Generator: Send + Sync + 'static {
    type Output: Into<ShortId>;
    /// Generates a candidate that can be converted into a short id.
    fn generate(&self) -> Self::Output;
}
