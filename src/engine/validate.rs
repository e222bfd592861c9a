// src/engine/validate.rs

use serde::Deserialize;

use crate::engine::ValidationResult;
use crate::error::PipelineError;
use crate::lang::Language;

/// Request body as it arrives on the wire. Both fields are optional here so
/// a missing one produces our own message rather than a decoder error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VisualizeRequest {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

impl VisualizeRequest {
    pub fn new(code: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            language: Some(language.into()),
        }
    }
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub code: String,
    pub language: Language,
}

pub fn validate_request(
    req: &VisualizeRequest,
    max_code_bytes: usize,
) -> Result<ExecutionRequest, PipelineError> {
    let mut result = ValidationResult::ok();

    let (code, language) = match (req.code.as_deref(), req.language.as_deref()) {
        (Some(code), Some(language)) => (code, language),
        _ => {
            result.push_error("FIELDS_MISSING", "Code and language are required");
            return Err(result.into_error());
        }
    };

    let language = match language.parse::<Language>() {
        Ok(l) => Some(l),
        Err(_) => {
            result.push_error(
                "LANGUAGE_UNSUPPORTED",
                r#"Language must be either "python" or "r""#,
            );
            None
        }
    };

    if code.trim().is_empty() {
        result.push_error("CODE_EMPTY", "Code must not be empty");
    } else if code.len() > max_code_bytes {
        result.push_error(
            "CODE_TOO_LARGE",
            format!(
                "Code too large (max {} bytes, got {} bytes)",
                max_code_bytes,
                code.len()
            ),
        );
    }

    match language {
        Some(language) if result.is_valid() => Ok(ExecutionRequest {
            code: code.to_string(),
            language,
        }),
        _ => Err(result.into_error()),
    }
}
