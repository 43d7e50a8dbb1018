use crate::error::Error;

/// Cost factor shared by hashing and verification. Changing it only
/// affects newly hashed passwords; existing hashes carry their own cost.
const BCRYPT_COST: u32 = 10;

// Verified against when a login names an unknown email, so the response
// time matches a real verification instead of returning early.
const DUMMY_HASH: &str = "$2b$10$EixZaYVK1fsbw1ZfbX3OXePaWxn96p36WQoeG6Lruj3vjPGga31lW";

pub fn hash_password(plaintext: &str) -> Result<String, Error> {
    Ok(bcrypt::hash(plaintext, BCRYPT_COST)?)
}

/// Compares a submitted password against a stored salted hash. The hash
/// computation dominates the comparison time, so string content does not
/// leak through timing.
pub fn verify_password(plaintext: &str, stored_hash: &str) -> Result<bool, Error> {
    Ok(bcrypt::verify(plaintext, stored_hash)?)
}

/// Burns the same bcrypt work as a real verification without a user row.
pub fn dummy_verify(plaintext: &str) {
    let _ = bcrypt::verify(plaintext, DUMMY_HASH);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    Upper,
    Lower,
    Digit,
    Symbol,
}

impl CharClass {
    fn matches(&self, c: char) -> bool {
        match self {
            CharClass::Upper => c.is_ascii_uppercase(),
            CharClass::Lower => c.is_ascii_lowercase(),
            CharClass::Digit => c.is_ascii_digit(),
            CharClass::Symbol => !c.is_ascii_alphanumeric(),
        }
    }

    fn violation(&self) -> &'static str {
        match self {
            CharClass::Upper => "Password must contain an uppercase letter",
            CharClass::Lower => "Password must contain a lowercase letter",
            CharClass::Digit => "Password must contain a digit",
            CharClass::Symbol => "Password must contain a symbol",
        }
    }
}

/// Enumerable password strength policy. Each rule is checked
/// independently and every failure is reported, not just the first.
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub required_classes: Vec<CharClass>,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            required_classes: vec![
                CharClass::Upper,
                CharClass::Lower,
                CharClass::Digit,
                CharClass::Symbol,
            ],
        }
    }
}

impl PasswordPolicy {
    /// Returns every rule the candidate violates, as human-readable
    /// messages. Empty means the password is acceptable.
    pub fn violations(&self, candidate: &str) -> Vec<String> {
        let mut violations = Vec::new();

        if candidate.chars().count() < self.min_length {
            violations.push(format!("Password must be at least {} characters", self.min_length));
        }

        for class in &self.required_classes {
            if !candidate.chars().any(|c| class.matches(c)) {
                violations.push(class.violation().to_string());
            }
        }

        violations
    }

    pub fn check(&self, candidate: &str) -> Result<(), Error> {
        let violations = self.violations(candidate);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidInput { violations })
        }
    }
}
