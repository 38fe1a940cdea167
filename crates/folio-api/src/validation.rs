//! Request field rules.
//!
//! Each check returns a field-tagged [`Error::Validation`] so the client
//! can attach the message to the right input.

use serde_json::Value as JsonValue;

use folio_core::defaults::{
    BIO_MAX_LEN, LEAD_MAX_LEN, NAME_MAX_LEN, PASSWORD_MIN_LEN, TITLE_MAX_LEN, USERNAME_MAX_LEN,
};
use folio_core::{is_content_tree, Error, Result};

/// Trimmed `value` with a length between 1 and `max` characters.
pub fn required_text(field: &str, value: &str, max: usize) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(field, format!("The {} field is required.", field)));
    }
    if trimmed.chars().count() > max {
        return Err(Error::validation(
            field,
            format!("The {} may not be greater than {} characters.", field, max),
        ));
    }
    Ok(trimmed.to_string())
}

pub fn title(value: &str) -> Result<String> {
    required_text("title", value, TITLE_MAX_LEN)
}

pub fn lead(value: &str) -> Result<String> {
    required_text("lead", value, LEAD_MAX_LEN)
}

/// Content must be a JSON object or array.
pub fn content(value: &JsonValue) -> Result<()> {
    if is_content_tree(value) {
        Ok(())
    } else {
        Err(Error::validation(
            "content",
            "The content must be a JSON object or array.",
        ))
    }
}

pub fn name(field: &str, value: &str) -> Result<String> {
    required_text(field, value, NAME_MAX_LEN)
}

pub fn username(value: &str) -> Result<String> {
    required_text("username", value, USERNAME_MAX_LEN)
}

pub fn email(value: &str) -> Result<String> {
    let email = required_text("email", value, NAME_MAX_LEN)?;
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(Error::validation(
            "email",
            "The email must be a valid email address.",
        )),
    }
}

pub fn password(value: &str) -> Result<()> {
    if value.chars().count() < PASSWORD_MIN_LEN {
        return Err(Error::validation(
            "password",
            format!("The password must be at least {} characters.", PASSWORD_MIN_LEN),
        ));
    }
    Ok(())
}

/// Password plus its confirmation.
pub fn confirmed_password(value: &str, confirmation: Option<&str>) -> Result<()> {
    password(value)?;
    if confirmation != Some(value) {
        return Err(Error::validation(
            "password",
            "The password confirmation does not match.",
        ));
    }
    Ok(())
}

/// Optional bio; blank input clears it.
pub fn bio(value: Option<&str>) -> Result<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(bio) if bio.chars().count() > BIO_MAX_LEN => Err(Error::validation(
            "bio",
            format!("The bio may not be greater than {} characters.", BIO_MAX_LEN),
        )),
        Some(bio) => Ok(Some(bio.to_string())),
    }
}

/// At least one tag must be supplied.
pub fn non_empty_tags(tags: &[String]) -> Result<()> {
    if tags.is_empty() {
        return Err(Error::validation("tags", "The tags field is required."));
    }
    Ok(())
}
