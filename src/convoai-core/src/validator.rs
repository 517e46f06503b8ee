//! Acceptance check for generated utterances.

/// Minimum trimmed length, in characters, of an acceptable reply.
pub const MIN_RESPONSE_CHARS: usize = 15;

/// Whether a cleaned generation is long enough to be spoken.
pub fn is_acceptable(text: &str) -> bool {
    text.trim().chars().count() >= MIN_RESPONSE_CHARS
}
