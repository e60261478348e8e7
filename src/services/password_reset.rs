use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};

use password_hash::rand_core::{OsRng, RngCore};

/// In-memory one-time codes for the forgot-password flow, keyed by lowercase email.
/// Codes do not survive a restart.
#[derive(Clone)]
pub struct ResetCodes {
    ttl: Duration,
    entries: Arc<Mutex<HashMap<String, ResetEntry>>>,
}

#[derive(Debug, Clone)]
struct ResetEntry {
    code: String,
    expires_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeCheck {
    Valid,
    Missing,
    Expired,
    Mismatch,
}

impl CodeCheck {
    pub fn message(self) -> &'static str {
        match self {
            CodeCheck::Valid => "Verification code is valid",
            CodeCheck::Missing => "No password reset was requested for this email",
            CodeCheck::Expired => "Verification code has expired, request a new one",
            CodeCheck::Mismatch => "Verification code is incorrect",
        }
    }
}

impl ResetCodes {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ResetEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Issues a fresh six-digit code, replacing any pending one.
    pub fn issue(&self, email: &str) -> String {
        let code = (OsRng.next_u32() % 900_000 + 100_000).to_string();
        self.insert(email, code.clone(), Instant::now() + self.ttl);
        code
    }

    fn insert(&self, email: &str, code: String, expires_at: Instant) {
        let mut entries = self.lock();
        entries.retain(|_, entry| entry.expires_at > Instant::now());
        entries.insert(email.to_ascii_lowercase(), ResetEntry { code, expires_at });
    }

    /// Checks a code without consuming it. Expired entries are evicted.
    pub fn check(&self, email: &str, code: &str) -> CodeCheck {
        self.check_at(email, code, Instant::now())
    }

    fn check_at(&self, email: &str, code: &str, now: Instant) -> CodeCheck {
        let key = email.to_ascii_lowercase();
        let mut entries = self.lock();
        let Some(entry) = entries.get(&key) else {
            return CodeCheck::Missing;
        };
        if now > entry.expires_at {
            entries.remove(&key);
            return CodeCheck::Expired;
        }
        if entry.code != code.trim() {
            return CodeCheck::Mismatch;
        }
        CodeCheck::Valid
    }

    pub fn consume(&self, email: &str) {
        self.lock().remove(&email.to_ascii_lowercase());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_code_is_six_digits_and_verifies() {
        let codes = ResetCodes::new(Duration::from_secs(60));
        let code = codes.issue("Driver@Example.com");
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(codes.check("driver@example.com", &code), CodeCheck::Valid);
    }

    #[test]
    fn wrong_code_is_a_mismatch_and_keeps_the_entry() {
        let codes = ResetCodes::new(Duration::from_secs(60));
        let code = codes.issue("a@b.com");
        let wrong = if code == "123456" { "654321" } else { "123456" };
        assert_eq!(codes.check("a@b.com", wrong), CodeCheck::Mismatch);
        assert_eq!(codes.check("a@b.com", &code), CodeCheck::Valid);
    }

    #[test]
    fn expired_code_is_evicted() {
        let codes = ResetCodes::new(Duration::from_secs(60));
        let past = Instant::now();
        codes.insert("a@b.com", "111111".into(), past);
        let later = past + Duration::from_secs(1);
        assert_eq!(codes.check_at("a@b.com", "111111", later), CodeCheck::Expired);
        assert_eq!(codes.check("a@b.com", "111111"), CodeCheck::Missing);
    }

    #[test]
    fn consumed_code_is_gone() {
        let codes = ResetCodes::new(Duration::from_secs(60));
        let code = codes.issue("a@b.com");
        codes.consume("A@B.com");
        assert_eq!(codes.check("a@b.com", &code), CodeCheck::Missing);
    }
}
