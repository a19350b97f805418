use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Name,
    Email,
    Subject,
    Message,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Email => "email",
            Field::Subject => "subject",
            Field::Message => "message",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: Field,
    pub message: &'static str,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field.as_str(), self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

struct Bounds {
    field: Field,
    min: usize,
    max: usize,
    required: &'static str,
    too_short: &'static str,
    too_long: &'static str,
}

const TEXT_FIELDS: [Bounds; 3] = [
    Bounds {
        field: Field::Name,
        min: 2,
        max: 50,
        required: "Name is required",
        too_short: "Name must be at least 2 characters",
        too_long: "Name must be less than 50 characters",
    },
    Bounds {
        field: Field::Subject,
        min: 5,
        max: 100,
        required: "Subject is required",
        too_short: "Subject must be at least 5 characters",
        too_long: "Subject must be less than 100 characters",
    },
    Bounds {
        field: Field::Message,
        min: 10,
        max: 1000,
        required: "Message is required",
        too_short: "Message must be at least 10 characters",
        too_long: "Message must be less than 1000 characters",
    },
];

impl ContactForm {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            subject: subject.into(),
            message: message.into(),
        }
    }

    fn value(&self, field: Field) -> &str {
        match field {
            Field::Name => &self.name,
            Field::Email => &self.email,
            Field::Subject => &self.subject,
            Field::Message => &self.message,
        }
    }

    /// A copy with surrounding whitespace removed from every field.
    pub fn trimmed(&self) -> Self {
        Self::new(
            self.name.trim(),
            self.email.trim(),
            self.subject.trim(),
            self.message.trim(),
        )
    }

    /// Checks every field and reports all problems at once, in form order.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        for bounds in &TEXT_FIELDS {
            let length = self.value(bounds.field).trim().chars().count();
            let message = if length == 0 {
                Some(bounds.required)
            } else if length < bounds.min {
                Some(bounds.too_short)
            } else if length > bounds.max {
                Some(bounds.too_long)
            } else {
                None
            };
            if let Some(message) = message {
                errors.push(FieldError {
                    field: bounds.field,
                    message,
                });
            }
        }

        let email = self.email.trim();
        let email_error = if email.is_empty() {
            Some("Email is required")
        } else if !EMAIL.is_match(email) {
            Some("Please enter a valid email address")
        } else {
            None
        };
        if let Some(message) = email_error {
            errors.push(FieldError {
                field: Field::Email,
                message,
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            errors.sort_by_key(|e| e.field as u8);
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn valid() -> ContactForm {
        ContactForm::new(
            "Ada Lovelace",
            "ada@example.com",
            "Collaboration",
            "I would like to talk about engines.",
        )
    }

    #[test]
    fn test_valid_form() {
        assert_eq!(valid().validate(), Ok(()));
    }

    #[test]
    fn test_empty_form_reports_every_field() {
        let errors = ContactForm::default().validate().unwrap_err();
        let messages: Vec<_> = errors.iter().map(|e| e.message).collect();
        assert_eq!(
            messages,
            vec![
                "Name is required",
                "Email is required",
                "Subject is required",
                "Message is required"
            ]
        );
    }

    #[test]
    fn test_length_bounds_use_trimmed_values() {
        let mut form = valid();
        form.name = "  A  ".into();
        form.subject = "x".repeat(101);
        form.message = "short".into();

        let errors = form.validate().unwrap_err();
        assert_eq!(
            errors,
            vec![
                FieldError {
                    field: Field::Name,
                    message: "Name must be at least 2 characters"
                },
                FieldError {
                    field: Field::Subject,
                    message: "Subject must be less than 100 characters"
                },
                FieldError {
                    field: Field::Message,
                    message: "Message must be at least 10 characters"
                },
            ]
        );
    }

    #[test]
    fn test_email_shape() {
        for bad in ["ada", "ada@example", "ada @example.com", "@example.com"] {
            let mut form = valid();
            form.email = bad.into();
            let errors = form.validate().unwrap_err();
            assert_eq!(errors[0].message, "Please enter a valid email address", "{}", bad);
        }
    }

    #[test]
    fn test_trimmed() {
        let form = ContactForm::new(" a ", " b ", " c ", " d ");
        assert_eq!(form.trimmed(), ContactForm::new("a", "b", "c", "d"));
    }

    proptest! {
        #[test]
        fn name_length_rule(name in "[a-zA-Z]{0,80}") {
            let mut form = valid();
            form.name = name.clone();
            let name_ok = (2..=50).contains(&name.len());
            let has_name_error = form
                .validate()
                .err()
                .is_some_and(|errors| errors.iter().any(|e| e.field == Field::Name));
            prop_assert_eq!(name_ok, !has_name_error);
        }
    }
}
