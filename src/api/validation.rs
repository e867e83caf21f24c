use crate::api::errors::ApiError;
use crate::db::paths;

pub(crate) const MIN_PASSWORD_LEN: usize = 4;

pub(crate) fn validate_password_len(password: &str) -> Result<(), ApiError> {
    if password.chars().count() >= MIN_PASSWORD_LEN {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )))
    }
}

/// Names and ids become document keys.
pub(crate) fn validate_key(field: &str, value: &str) -> Result<(), ApiError> {
    paths::validate_segment(value)
        .map_err(|_| ApiError::BadRequest(format!("{field} must be a non-empty name without '/'")))
}

pub(crate) fn validate_dataset_id(value: &str) -> Result<(), ApiError> {
    paths::validate_dataset_id(value).map_err(|_| {
        ApiError::BadRequest(format!("Invalid book id {value:?}: use a name without '/' or '.'"))
    })
}

pub(crate) fn validate_color(color: &str) -> Result<(), ApiError> {
    let hex = color.strip_prefix('#').unwrap_or_default();
    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!("Invalid color {color:?}; expected #RRGGBB")))
    }
}
