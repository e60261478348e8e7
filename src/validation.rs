use std::borrow::Cow;

use validator::ValidationError;

pub const MIN_PASSWORD_LENGTH: u64 = 6;
pub const MAX_PASSWORD_LENGTH: u64 = 64;

const PASSWORD_SPECIAL_CHARS: &str = "!@#$%^&*(),.?\":{}|<>";

/// Misspellings of popular mail domains, keyed by the intended domain.
const DOMAIN_TYPOS: &[(&str, &[&str])] = &[
    (
        "gmail.com",
        &[
            "gmaih.com", "gmaul.com", "gmial.com", "gmeil.com", "gmai.com", "gmall.com",
            "gmil.com", "gmaill.com", "gnail.com", "gmal.com", "gamil.com", "gmaiil.com",
            "gmailo.com",
        ],
    ),
    ("yahoo.com", &["yaho.com", "yahooo.com", "yhoo.com", "yhaoo.com", "yahou.com"]),
    ("outlook.com", &["outlok.com", "outloo.com", "outlookk.com", "outluk.com"]),
    (
        "hotmail.com",
        &["hotmial.com", "hotmal.com", "hotmaii.com", "hotmil.com", "homail.com"],
    ),
];

/// Returns the domain the user most likely meant, if `email` uses a known misspelling.
pub fn suggested_domain(email: &str) -> Option<&'static str> {
    let domain = email.rsplit_once('@')?.1.to_ascii_lowercase();
    DOMAIN_TYPOS
        .iter()
        .find(|(_, typos)| typos.contains(&domain.as_str()))
        .map(|(correct, _)| *correct)
}

pub fn validate_email_domain(email: &str) -> Result<(), ValidationError> {
    match suggested_domain(email) {
        Some(correct) => {
            let domain = email.rsplit_once('@').map(|(_, d)| d).unwrap_or_default();
            Err(ValidationError::new("email_typo").with_message(Cow::Owned(format!(
                "email looks misspelled, did you mean @{correct} instead of @{domain}?"
            ))))
        }
        None => Ok(()),
    }
}

pub fn is_strong_password(password: &str) -> bool {
    password.chars().count() as u64 >= MIN_PASSWORD_LENGTH
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| PASSWORD_SPECIAL_CHARS.contains(c))
}

pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    if is_strong_password(password) {
        Ok(())
    } else {
        Err(ValidationError::new("weak_password").with_message(Cow::Borrowed(
            "password needs at least 6 characters, one uppercase letter and one special character",
        )))
    }
}
