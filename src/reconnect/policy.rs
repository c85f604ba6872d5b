//! Retry predicate.

use crate::common::error::ConnectError;
use crate::reconnect::config::ReconnectConfig;

/// Decide whether a failure warrants another attempt.
///
/// Matching is a case-insensitive substring test of every
/// `retry_on_errors` entry against both the error's class token and its
/// message, so coarse categories like `"NetworkError"` match without exact
/// type identity.
pub fn should_retry(error: &ConnectError, attempts_so_far: u32, config: &ReconnectConfig) -> bool {
    if !config.enable_auto_reconnect {
        return false;
    }
    if attempts_so_far >= config.max_retries {
        return false;
    }

    let class = error.class().to_lowercase();
    let message = error.message().to_lowercase();

    config
        .retry_on_errors
        .iter()
        .map(|token| token.to_lowercase())
        .any(|token| class.contains(&token) || message.contains(&token))
}
