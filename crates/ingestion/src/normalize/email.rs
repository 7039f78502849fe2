//! Email normalizer

use contracts::{Email, FieldFailure, RawValue, RejectionReason};

/// Canonical field name
pub const EMAIL_FIELD: &str = "email";

/// Normalize the identity field.
///
/// Absent or blank input is `MissingIdentity`; anything that does not match
/// the email grammar (numbers included) is `InvalidEmail`.
pub fn normalize_email(value: &RawValue) -> Result<Email, FieldFailure> {
    if value.is_absent() {
        return Err(FieldFailure::new(
            EMAIL_FIELD,
            RejectionReason::MissingIdentity,
            "email is missing",
        ));
    }

    match value {
        RawValue::Text(text) => Email::parse(text).ok_or_else(|| {
            FieldFailure::new(
                EMAIL_FIELD,
                RejectionReason::InvalidEmail,
                format!("'{}' is not a valid email address", text.trim()),
            )
        }),
        other => Err(FieldFailure::new(
            EMAIL_FIELD,
            RejectionReason::InvalidEmail,
            format!(
                "expected text, got {}",
                other.as_text().unwrap_or_default()
            ),
        )),
    }
}
