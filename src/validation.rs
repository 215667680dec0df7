//! Input rules shared by the HTTP gateway, the WebSocket handler and the
//! command server.
//!
//! The rules are checked twice: once at the edge so that bad input never
//! reaches the bus, and again by the server before it touches the store.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::{CreateUserInput, UpdateUserInput, UserId};

/// Phone numbers: optional leading `+`, a digit, then 6–19 digits, spaces,
/// dashes or parentheses.
static PHONE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9][0-9\s\-()]{6,19}$").ok());

const NAME_MIN: usize = 2;
const NAME_MAX: usize = 50;

/// A rejected input. The message is safe to return to callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Parses a hyphenated UUID into a [`UserId`].
///
/// # Errors
///
/// Returns `id must be valid uuid` if `raw` is not a UUID.
pub fn parse_user_id(raw: &str) -> Result<UserId, ValidationError> {
    raw.parse()
        .map_err(|_| ValidationError::new("id must be valid uuid"))
}

/// Checks a create payload.
///
/// # Errors
///
/// Returns the first violated rule.
pub fn validate_create(input: &CreateUserInput) -> Result<(), ValidationError> {
    check_name("firstName", &input.first_name)?;
    check_name("lastName", &input.last_name)?;
    check_email(&input.email)?;
    check_phone(input.phone.as_deref())?;
    check_age(input.age)
}

/// Checks an update payload: at least one field must be set and every set
/// field follows the create rules. An empty phone is allowed and clears it.
///
/// # Errors
///
/// Returns the first violated rule.
pub fn validate_update(changes: &UpdateUserInput) -> Result<(), ValidationError> {
    if changes.is_empty() {
        return Err(ValidationError::new("at least one field is required"));
    }
    if let Some(first_name) = &changes.first_name {
        check_name("firstName", first_name)?;
    }
    if let Some(last_name) = &changes.last_name {
        check_name("lastName", last_name)?;
    }
    if let Some(email) = &changes.email {
        check_email(email)?;
    }
    check_phone(changes.phone.as_deref())?;
    check_age(changes.age)
}

fn check_name(field: &str, value: &str) -> Result<(), ValidationError> {
    let len = value.trim().chars().count();
    if (NAME_MIN..=NAME_MAX).contains(&len) {
        Ok(())
    } else {
        Err(ValidationError::new(format!(
            "{field} must be between {NAME_MIN} and {NAME_MAX} characters"
        )))
    }
}

fn check_email(value: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::new("email must be a valid email address");
    let (local, domain) = value.split_once('@').ok_or_else(invalid)?;
    let well_formed = !local.is_empty()
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        && !domain.ends_with('.');
    if well_formed { Ok(()) } else { Err(invalid()) }
}

fn check_phone(value: Option<&str>) -> Result<(), ValidationError> {
    match value {
        None | Some("") => Ok(()),
        Some(phone) if PHONE.as_ref().is_some_and(|re| re.is_match(phone)) => Ok(()),
        Some(_) => Err(ValidationError::new("phone must be a valid phone number")),
    }
}

fn check_age(value: Option<i32>) -> Result<(), ValidationError> {
    match value {
        Some(age) if age <= 0 => Err(ValidationError::new("age must be greater than 0")),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserStatus;

    fn valid() -> CreateUserInput {
        CreateUserInput {
            first_name: "Ana".to_string(),
            last_name: "Lee".to_string(),
            email: "a@x.io".to_string(),
            phone: Some("+1 (555) 010-0100".to_string()),
            age: Some(30),
            status: Some(UserStatus::Inactive),
        }
    }

    #[test]
    fn accepts_valid_create() {
        assert_eq!(validate_create(&valid()), Ok(()));
    }

    #[test]
    fn rejects_short_and_long_names() {
        let mut input = valid();
        input.first_name = "A".to_string();
        assert!(validate_create(&input).is_err());

        input.first_name = "x".repeat(51);
        assert!(validate_create(&input).is_err());

        input.first_name = "x".repeat(50);
        assert_eq!(validate_create(&input), Ok(()));
    }

    #[test]
    fn rejects_malformed_email() {
        for email in ["", "plain", "@x.io", "a@", "a@x", "a b@x.io", "a@x.", "a@@x.io"] {
            let mut input = valid();
            input.email = email.to_string();
            assert!(validate_create(&input).is_err(), "{email} accepted");
        }
    }

    #[test]
    fn phone_rules() {
        let mut input = valid();
        input.phone = Some("12".to_string());
        assert!(validate_create(&input).is_err());

        input.phone = Some("phone".to_string());
        assert!(validate_create(&input).is_err());

        input.phone = Some(String::new());
        assert_eq!(validate_create(&input), Ok(()));

        input.phone = None;
        assert_eq!(validate_create(&input), Ok(()));
    }

    #[test]
    fn age_must_be_positive() {
        let mut input = valid();
        input.age = Some(0);
        assert_eq!(
            validate_create(&input),
            Err(ValidationError("age must be greater than 0".to_string()))
        );
    }

    #[test]
    fn empty_update_is_rejected() {
        assert_eq!(
            validate_update(&UpdateUserInput::default()),
            Err(ValidationError("at least one field is required".to_string()))
        );
    }

    #[test]
    fn update_checks_present_fields_only() {
        let changes = UpdateUserInput {
            phone: Some(String::new()),
            ..UpdateUserInput::default()
        };
        assert_eq!(validate_update(&changes), Ok(()));

        let changes = UpdateUserInput {
            email: Some("nope".to_string()),
            ..UpdateUserInput::default()
        };
        assert!(validate_update(&changes).is_err());
    }

    #[test]
    fn user_id_must_be_uuid() {
        let id = parse_user_id("11111111-1111-1111-1111-111111111111");
        assert!(id.is_ok());
        assert_eq!(
            parse_user_id("not-a-uuid"),
            Err(ValidationError("id must be valid uuid".to_string()))
        );
    }
}
