use crate::error::AppError;

const MAX_FILENAME_LENGTH: usize = 255;

/// Reduce a caller-supplied filename to its final path component.
///
/// Rejects names that are empty after stripping, have a `..` path
/// component, or contain control characters.
pub fn sanitize_filename(raw: &str) -> Result<String, AppError> {
    if raw.split(['/', '\\']).any(|component| component.trim() == "..") {
        return Err(AppError::Validation(format!(
            "Filename '{}' must not contain a '..' component",
            raw
        )));
    }

    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() {
        return Err(AppError::Validation("Filename cannot be empty".to_string()));
    }

    if name.chars().any(char::is_control) {
        return Err(AppError::Validation(
            "Filename must not contain control characters".to_string(),
        ));
    }

    if name.chars().count() > MAX_FILENAME_LENGTH {
        return Err(AppError::Validation(format!(
            "Filename exceeds maximum length of {} characters",
            MAX_FILENAME_LENGTH
        )));
    }

    Ok(name.to_string())
}
