use vits_core::Language;

use crate::error::ApiError;

/// Slowest and fastest accepted speaking rate.
const MIN_SPEED: f32 = 0.1;
const MAX_SPEED: f32 = 10.0;

/// Validate a TTS request and resolve its language.
///
/// Text length is checked by the service itself so that over-long text
/// reports the same error through every entry point.
pub fn validate_tts_request(
    model_name: &str,
    language: Option<&str>,
    speed: Option<f32>,
    default_language: Language,
) -> Result<(Language, f32), ApiError> {
    if model_name.trim().is_empty() {
        return Err(ApiError::InvalidInput("model_name cannot be empty".to_string()));
    }

    let language = match language {
        Some(label) => label.parse::<Language>()?,
        None => default_language,
    };

    let speed = speed.unwrap_or(1.0);
    if !speed.is_finite() || !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
        return Err(ApiError::InvalidInput(format!(
            "speed must be between {MIN_SPEED} and {MAX_SPEED}"
        )));
    }

    Ok((language, speed))
}
