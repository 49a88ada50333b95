//! Request validation rules that the `validator` derive does not cover, and
//! conversion of validation errors into the problem-details error map.

use std::borrow::Cow;

use common::receipt::ErrorMap;
use validator::{Validate, ValidationError, ValidationErrors};

fn error(code: &'static str, message: String) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Owned(message));
    err
}

/// The collection must be present, non-empty and free of null entries.
pub fn not_null_or_empty<T>(errors: &mut ValidationErrors, field: &'static str, items: Option<&[Option<T>]>) {
    let valid = matches!(items, Some(items) if !items.is_empty() && items.iter().all(Option::is_some));
    if !valid {
        errors.add(field, error("not_null_or_empty", format!("{field} must contain at least one element.")));
    }
}

/// When `flag` is set, `value` must be present and not blank.
pub fn required_if_true(errors: &mut ValidationErrors, field: &'static str, flag: bool, value: Option<&str>) {
    if flag && value.map_or(true, |v| v.trim().is_empty()) {
        errors.add(field, error("required_if_true", format!("The {field} field is required.")));
    }
}

/// Run the derived rules of `value`, then `extra`; errors from both are merged.
pub fn validate_with<T, F>(value: &T, extra: F) -> Result<(), ValidationErrors>
where
    T: Validate,
    F: FnOnce(&mut ValidationErrors),
{
    let mut errors = value.validate().err().unwrap_or_else(ValidationErrors::new);
    extra(&mut errors);
    if errors.errors().is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Flatten field errors into `field -> messages`. Errors without a message
/// get a generic one naming the failed rule.
pub fn validation_errors_map(errors: &ValidationErrors) -> ErrorMap {
    let mut map = ErrorMap::new();
    for (field, errs) in errors.field_errors() {
        let field = field.to_string();
        let messages = errs.iter().map(|e| match &e.message {
            Some(m) => m.to_string(),
            None => format!("The {field} field is invalid ({}).", e.code),
        });
        map.entry(field.clone()).or_default().extend(messages);
    }
    map
}
