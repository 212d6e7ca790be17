use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{AuthError, FieldError};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Lowercase form used as both email and username.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Accumulates field errors so a request reports all of them at once.
#[derive(Default)]
pub(crate) struct Checks {
    errors: Vec<FieldError>,
}

impl Checks {
    /// Present and not blank. Returns the value when it passes.
    pub fn required<'a>(&mut self, field: &str, value: Option<&'a str>) -> Option<&'a str> {
        match value {
            None => {
                self.errors.push(FieldError::required(field));
                None
            }
            Some(v) if v.trim().is_empty() => {
                self.errors.push(FieldError::empty(field));
                None
            }
            Some(v) => Some(v),
        }
    }

    pub fn email(&mut self, field: &str, value: Option<&str>) {
        if let Some(v) = self.required(field, value) {
            if !is_valid_email(&normalize_email(v)) {
                self.errors.push(FieldError::invalid_email(field));
            }
        }
    }

    pub fn finish(self) -> Result<(), AuthError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AuthError::Validation(self.errors))
        }
    }
}
