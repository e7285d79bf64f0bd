//! Form checks run before credentials leave the client.
//!
//! The server validates again; these only catch obvious mistakes early and
//! return the first problem found as a user-facing message.

/// Minimum name length for registration
const MIN_NAME_LENGTH: usize = 3;

/// Minimum password length for registration and sign-in
const MIN_PASSWORD_LENGTH: usize = 6;

pub fn validate_sign_in(email: &str, password: &str) -> Result<(), String> {
    check_email(email)?;
    if password.is_empty() {
        return Err("Password is required".to_string());
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }
    Ok(())
}

pub fn validate_registration(
    name: &str,
    email: &str,
    password: &str,
    confirm_password: &str,
) -> Result<(), String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Name is required".to_string());
    }
    if name.chars().count() < MIN_NAME_LENGTH {
        return Err(format!("Name must be at least {} characters", MIN_NAME_LENGTH));
    }

    check_email(email)?;

    if password.is_empty() {
        return Err("Password is required".to_string());
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }
    if !password.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err("Must contain letters".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Must contain numbers".to_string());
    }
    if !password.chars().any(|c| !c.is_alphanumeric() && c != '_') {
        return Err("Must contain a special character".to_string());
    }

    if confirm_password.is_empty() {
        return Err("Confirm password is required".to_string());
    }
    if password != confirm_password {
        return Err("Passwords must match".to_string());
    }
    Ok(())
}

fn check_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if !looks_like_email(email) {
        return Err("Invalid email format".to_string());
    }
    Ok(())
}

/// Loose shape check: one '@', non-empty local part, dotted domain
fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}
