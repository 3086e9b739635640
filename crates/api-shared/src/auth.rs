/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing API key")]
    Missing,
    #[error("invalid API key")]
    Invalid,
}

/// Validates the provided API key against the configured one.
///
/// Returns `Ok(())` if the key matches, or an error if it is missing or different.
pub fn validate_api_key(provided_key: Option<&str>, expected_key: &str) -> Result<(), AuthError> {
    let provided_key = provided_key.ok_or(AuthError::Missing)?;
    if keys_match(provided_key.as_bytes(), expected_key.as_bytes()) {
        Ok(())
    } else {
        Err(AuthError::Invalid)
    }
}

/// Compares without short-circuiting on the first differing byte.
fn keys_match(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
