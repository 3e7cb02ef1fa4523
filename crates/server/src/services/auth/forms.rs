//! Registration, login and profile forms.
//!
//! Each form validates every field and reports one message per failing
//! field, keyed by the field's wire name.

use serde::Deserialize;

use nowaste_core::{Email, Role, ValidationErrors, lenient};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Sign-up form.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationForm {
    #[serde(deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(deserialize_with = "lenient::text")]
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(deserialize_with = "lenient::text")]
    pub role: String,
}

/// A registration that passed validation.
#[derive(Debug)]
pub struct Registration {
    pub name: String,
    pub email: Email,
    pub password: String,
    pub role: Role,
}

impl RegistrationForm {
    /// Validate every field.
    ///
    /// # Errors
    ///
    /// Returns the per-field messages when any field is invalid.
    pub fn validate(self) -> Result<Registration, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = self.name.trim().to_owned();
        if name.is_empty() {
            errors.add("name", "Name is required");
        }
        let email = check_email(&mut errors, &self.email);
        check_new_password(&mut errors, &self.password, &self.confirm_password, true);

        let role = match self.role.trim() {
            "" => {
                errors.add("role", "Please select a role");
                None
            }
            raw => match raw.parse::<Role>() {
                Ok(role) if role.is_self_service() => Some(role),
                _ => {
                    errors.add("role", "Role must be donor or receiver");
                    None
                }
            },
        };

        match (email, role) {
            (Some(email), Some(role)) if errors.is_empty() => Ok(Registration {
                name,
                email,
                password: self.password,
                role,
            }),
            _ => Err(errors),
        }
    }
}

/// Sign-in form.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoginForm {
    #[serde(deserialize_with = "lenient::text")]
    pub email: String,
    pub password: String,
}

impl LoginForm {
    /// Validate both fields and return the parsed email.
    ///
    /// # Errors
    ///
    /// Returns the per-field messages when any field is invalid.
    pub fn validate(&self) -> Result<Email, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let email = check_email(&mut errors, &self.email);

        if self.password.is_empty() {
            errors.add("password", "Password is required");
        } else if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            errors.add("password", "Password must be at least 6 characters");
        }

        match email {
            Some(email) if errors.is_empty() => Ok(email),
            _ => Err(errors),
        }
    }
}

/// Profile edit form. A blank password leaves the password unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileForm {
    #[serde(deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(deserialize_with = "lenient::text")]
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// A profile edit that passed validation.
#[derive(Debug)]
pub struct ProfileUpdate {
    pub name: String,
    pub email: Email,
    pub password: Option<String>,
}

impl ProfileForm {
    /// Validate every field.
    ///
    /// # Errors
    ///
    /// Returns the per-field messages when any field is invalid.
    pub fn validate(self) -> Result<ProfileUpdate, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = self.name.trim().to_owned();
        if name.is_empty() {
            errors.add("name", "Name is required");
        }
        let email = check_email(&mut errors, &self.email);
        check_new_password(&mut errors, &self.password, &self.confirm_password, false);

        match email {
            Some(email) if errors.is_empty() => Ok(ProfileUpdate {
                name,
                email,
                password: (!self.password.is_empty()).then_some(self.password),
            }),
            _ => Err(errors),
        }
    }
}

fn check_email(errors: &mut ValidationErrors, raw: &str) -> Option<Email> {
    if raw.trim().is_empty() {
        errors.add("email", "Email is required");
        return None;
    }
    errors.check("email", Email::parse(raw).map_err(|_| "Email is invalid"))
}

fn check_new_password(
    errors: &mut ValidationErrors,
    password: &str,
    confirm: &str,
    required: bool,
) {
    if password.is_empty() {
        if required {
            errors.add("password", "Password is required");
            if confirm.is_empty() {
                errors.add("confirmPassword", "Please confirm your password");
            }
        }
        return;
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.add("password", "Password must be at least 6 characters");
    }
    if required && confirm.is_empty() {
        errors.add("confirmPassword", "Please confirm your password");
    } else if password != confirm {
        errors.add("confirmPassword", "Passwords do not match");
    }
}
