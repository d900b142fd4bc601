//! Form validation
//!
//! Every form is a plain struct of raw submitted strings. `clean()` either
//! returns the validated write model or the field errors to redisplay.
//! Checks that need the store (uniqueness, referenced ids) happen at write
//! time and are folded back into `FormErrors` by the caller.
//!
//! License numbers must be:
//! - exactly 8 characters
//! - 3 uppercase letters followed by 5 digits

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};

use crate::password;
use crate::types::{EntityId, NewCar, NewDriver, NewManufacturer};

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";

const LICENSE_LEN: usize = 8;
const LICENSE_PREFIX_LEN: usize = 3;
const USERNAME_MAX_LEN: usize = 150;
const PASSWORD_MIN_LEN: usize = 8;

/// Passwords rejected outright at registration
static COMMON_PASSWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "password", "password1", "password123", "passw0rd",
        "12345678", "123456789", "1234567890", "87654321",
        "qwerty123", "qwertyuiop", "1q2w3e4r", "1qaz2wsx",
        "iloveyou", "sunshine", "princess", "football",
        "baseball", "welcome1", "letmein1", "trustno1",
        "abc12345", "admin123", "superman", "starwars",
    ]
    .into_iter()
    .collect()
});

// ============================================================================
// Field errors
// ============================================================================

/// Field name -> messages, plus errors not tied to a field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: BTreeMap<String, Vec<String>>,
    non_field: Vec<String>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn add_non_field(&mut self, message: impl Into<String>) {
        self.non_field.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.non_field.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn non_field(&self) -> &[String] {
        &self.non_field
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for FormErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts: Vec<String> = self.non_field.clone();
        for (field, messages) in &self.fields {
            for msg in messages {
                parts.push(format!("{}: {}", field, msg));
            }
        }
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for FormErrors {}

/// Trimmed value, or a "required" error when blank
fn required(errors: &mut FormErrors, field: &str, value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, REQUIRED);
    }
    value.to_string()
}

// ============================================================================
// License numbers
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicenseError {
    WrongLength { expected: usize, got: usize },
    InvalidPrefix,
    InvalidSuffix,
}

impl std::fmt::Display for LicenseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WrongLength { expected, got } => write!(
                f,
                "License number should consist of {} characters (got {})",
                expected, got
            ),
            Self::InvalidPrefix => write!(f, "First 3 characters should be uppercase letters"),
            Self::InvalidSuffix => write!(f, "Last 5 characters should be digits"),
        }
    }
}

impl std::error::Error for LicenseError {}

/// Validate a driver's license number
pub fn validate_license_number(license: &str) -> Result<String, LicenseError> {
    let license = license.trim();
    let chars: Vec<char> = license.chars().collect();

    if chars.len() != LICENSE_LEN {
        return Err(LicenseError::WrongLength {
            expected: LICENSE_LEN,
            got: chars.len(),
        });
    }

    let (prefix, suffix) = chars.split_at(LICENSE_PREFIX_LEN);
    if !prefix.iter().all(|c| c.is_ascii_uppercase()) {
        return Err(LicenseError::InvalidPrefix);
    }
    if !suffix.iter().all(|c| c.is_ascii_digit()) {
        return Err(LicenseError::InvalidSuffix);
    }

    Ok(license.to_string())
}

fn clean_license(errors: &mut FormErrors, value: &str) -> String {
    let license = required(errors, "license_number", value);
    if license.is_empty() {
        return license;
    }
    match validate_license_number(&license) {
        Ok(l) => l,
        Err(e) => {
            errors.add("license_number", e.to_string());
            license
        }
    }
}

// ============================================================================
// Usernames and passwords
// ============================================================================

fn clean_username(errors: &mut FormErrors, value: &str) -> String {
    let username = required(errors, "username", value);
    if username.chars().count() > USERNAME_MAX_LEN {
        errors.add(
            "username",
            format!("Ensure this value has at most {} characters.", USERNAME_MAX_LEN),
        );
    } else if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }
    username
}

/// Strength rules applied to a new password
pub fn password_problems(password: &str, username: &str) -> Vec<String> {
    let mut problems = Vec::new();

    if password.chars().count() < PASSWORD_MIN_LEN {
        problems.push(format!(
            "This password is too short. It must contain at least {} characters.",
            PASSWORD_MIN_LEN
        ));
    }
    if !username.is_empty() && password.eq_ignore_ascii_case(username) {
        problems.push("The password is too similar to the username.".to_string());
    }
    if COMMON_PASSWORDS.contains(password.to_lowercase().as_str()) {
        problems.push("This password is too common.".to_string());
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        problems.push("This password is entirely numeric.".to_string());
    }

    problems
}

// ============================================================================
// Forms
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ManufacturerForm {
    pub name: String,
    pub country: String,
}

impl ManufacturerForm {
    pub fn clean(&self) -> Result<NewManufacturer, FormErrors> {
        let mut errors = FormErrors::new();
        let name = required(&mut errors, "name", &self.name);
        let country = required(&mut errors, "country", &self.country);
        errors.finish(|| NewManufacturer { name, country })
    }
}

/// Registration form for a new driver
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DriverCreationForm {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub license_number: String,
    pub password1: String,
    pub password2: String,
}

impl DriverCreationForm {
    /// Validates and hashes the password
    pub fn clean(&self) -> Result<NewDriver, FormErrors> {
        let mut errors = FormErrors::new();
        let username = clean_username(&mut errors, &self.username);
        let license_number = clean_license(&mut errors, &self.license_number);

        // Passwords are taken verbatim; whitespace is significant.
        if self.password1.is_empty() {
            errors.add("password1", REQUIRED);
        }
        if self.password2.is_empty() {
            errors.add("password2", REQUIRED);
        }
        if !self.password1.is_empty() && !self.password2.is_empty() {
            if self.password1 != self.password2 {
                errors.add("password2", "The two password fields didn't match.");
            } else {
                for problem in password_problems(&self.password2, &username) {
                    errors.add("password2", problem);
                }
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(NewDriver {
            username,
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            license_number,
            password_hash: password::hash_password(&self.password1),
        })
    }
}

/// Restricted update form: only the license number can change
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DriverLicenseUpdateForm {
    pub license_number: String,
}

impl DriverLicenseUpdateForm {
    pub fn is_valid(&self) -> bool {
        self.clean().is_ok()
    }

    pub fn clean(&self) -> Result<String, FormErrors> {
        let mut errors = FormErrors::new();
        let license = clean_license(&mut errors, &self.license_number);
        errors.finish(|| license)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CarForm {
    pub model: String,
    pub manufacturer: String,
    pub drivers: Vec<String>,
}

impl CarForm {
    /// Parses ids only; whether they exist is checked by the store
    pub fn clean(&self) -> Result<NewCar, FormErrors> {
        let mut errors = FormErrors::new();
        let model = required(&mut errors, "model", &self.model);

        let manufacturer = required(&mut errors, "manufacturer", &self.manufacturer);
        let manufacturer_id = if manufacturer.is_empty() {
            0
        } else {
            match parse_id(&manufacturer) {
                Some(id) => id,
                None => {
                    errors.add("manufacturer", INVALID_CHOICE);
                    0
                }
            }
        };

        let mut driver_ids: Vec<EntityId> = Vec::new();
        for raw in self.drivers.iter().map(|d| d.trim()).filter(|d| !d.is_empty()) {
            match parse_id(raw) {
                Some(id) if !driver_ids.contains(&id) => driver_ids.push(id),
                Some(_) => {}
                None => errors.add(
                    "drivers",
                    format!("\u{201c}{}\u{201d} is not a valid value.", raw),
                ),
            }
        }

        errors.finish(|| NewCar {
            model,
            manufacturer_id,
            driver_ids,
        })
    }

    pub fn selected_driver(&self, id: EntityId) -> bool {
        self.drivers.iter().any(|d| parse_id(d) == Some(id))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    pub fn clean(&self) -> Result<(String, String), FormErrors> {
        let mut errors = FormErrors::new();
        let username = required(&mut errors, "username", &self.username);
        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        }
        errors.finish(|| (username, self.password.clone()))
    }
}

/// Positive integer id from a form value
pub fn parse_id(raw: &str) -> Option<EntityId> {
    raw.trim().parse::<EntityId>().ok().filter(|id| *id > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_license_numbers() {
        assert_eq!(validate_license_number("ABC12345").unwrap(), "ABC12345");
        assert_eq!(validate_license_number(" CBA54321 ").unwrap(), "CBA54321");
    }

    #[test]
    fn test_license_length() {
        assert!(matches!(
            validate_license_number("ABC1234"),
            Err(LicenseError::WrongLength { expected: 8, got: 7 })
        ));
        assert!(matches!(
            validate_license_number("ABC123456"),
            Err(LicenseError::WrongLength { expected: 8, got: 9 })
        ));
    }

    #[test]
    fn test_license_prefix_and_suffix() {
        assert_eq!(
            validate_license_number("abc12345"),
            Err(LicenseError::InvalidPrefix)
        );
        assert_eq!(
            validate_license_number("AB123456"),
            Err(LicenseError::InvalidPrefix)
        );
        assert_eq!(
            validate_license_number("ABCD1234"),
            Err(LicenseError::InvalidSuffix)
        );
        assert_eq!(
            validate_license_number("ABC1234X"),
            Err(LicenseError::InvalidSuffix)
        );
    }

    #[test]
    fn test_license_update_form() {
        let form = DriverLicenseUpdateForm {
            license_number: "CBA54321".to_string(),
        };
        assert!(form.is_valid());

        let form = DriverLicenseUpdateForm {
            license_number: "cba54321".to_string(),
        };
        let errors = form.clean().unwrap_err();
        assert_eq!(
            errors.get("license_number"),
            ["First 3 characters should be uppercase letters".to_string()]
        );

        let form = DriverLicenseUpdateForm::default();
        assert_eq!(form.clean().unwrap_err().get("license_number"), [REQUIRED]);
    }

    fn driver_form() -> DriverCreationForm {
        DriverCreationForm {
            username: "test".to_string(),
            license_number: "ABC12345".to_string(),
            password1: "Test1234q".to_string(),
            password2: "Test1234q".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_driver_creation_form_valid() {
        let new = driver_form().clean().unwrap();
        assert_eq!(new.username, "test");
        assert_eq!(new.license_number, "ABC12345");
        assert!(password::verify_password("Test1234q", &new.password_hash));
    }

    #[test]
    fn test_driver_creation_requires_fields() {
        let form = DriverCreationForm {
            username: "test".to_string(),
            ..Default::default()
        };
        let errors = form.clean().unwrap_err();
        assert!(errors.has("license_number"));
        assert!(errors.has("password1"));
        assert!(errors.has("password2"));
        assert!(!errors.has("username"));
    }

    #[test]
    fn test_driver_creation_password_mismatch() {
        let form = DriverCreationForm {
            password2: "Other1234q".to_string(),
            ..driver_form()
        };
        let errors = form.clean().unwrap_err();
        assert_eq!(
            errors.get("password2"),
            ["The two password fields didn't match.".to_string()]
        );
    }

    #[test]
    fn test_weak_passwords() {
        assert!(password_problems("Test1234q", "test").is_empty());
        assert_eq!(password_problems("short1", "x").len(), 1);
        assert!(!password_problems("12345678", "x").is_empty());
        assert!(!password_problems("Password", "x").is_empty());
        assert!(!password_problems("longusername", "LongUsername").is_empty());
    }

    #[test]
    fn test_invalid_username() {
        let form = DriverCreationForm {
            username: "bad name!".to_string(),
            ..driver_form()
        };
        assert!(form.clean().unwrap_err().has("username"));
    }

    #[test]
    fn test_manufacturer_form() {
        let form = ManufacturerForm {
            name: " Toyota ".to_string(),
            country: "Japan".to_string(),
        };
        let new = form.clean().unwrap();
        assert_eq!(new.name, "Toyota");

        let form = ManufacturerForm {
            name: "test".to_string(),
            country: String::new(),
        };
        let errors = form.clean().unwrap_err();
        assert_eq!(errors.get("country"), [REQUIRED]);
        assert!(errors.get("name").is_empty());
    }

    #[test]
    fn test_car_form() {
        let form = CarForm {
            model: "Camry".to_string(),
            manufacturer: "1".to_string(),
            drivers: vec!["2".to_string(), "2".to_string(), "3".to_string()],
        };
        let new = form.clean().unwrap();
        assert_eq!(new.manufacturer_id, 1);
        assert_eq!(new.driver_ids, vec![2, 3]);
        assert!(form.selected_driver(3));
        assert!(!form.selected_driver(1));

        let form = CarForm {
            model: "test".to_string(),
            ..Default::default()
        };
        assert_eq!(form.clean().unwrap_err().get("manufacturer"), [REQUIRED]);

        let form = CarForm {
            model: "test".to_string(),
            manufacturer: "abc".to_string(),
            drivers: vec!["-1".to_string()],
        };
        let errors = form.clean().unwrap_err();
        assert_eq!(errors.get("manufacturer"), [INVALID_CHOICE]);
        assert!(errors.has("drivers"));
    }

    #[test]
    fn test_form_errors_display() {
        let mut errors = FormErrors::single("name", REQUIRED);
        errors.add_non_field("Please correct the errors below.");
        assert_eq!(
            errors.to_string(),
            "Please correct the errors below.; name: This field is required."
        );
    }
}
