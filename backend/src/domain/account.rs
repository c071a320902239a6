//! Account data model and credential handling.

use std::fmt;
use std::sync::OnceLock;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

/// Validation errors returned by the account newtype constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountValidationError {
    EmptyName,
    NameTooLong { max: usize },
    EmptyEmail,
    InvalidEmail,
    PasswordTooShort { min: usize },
    PasswordTooLong { max: usize },
}

impl fmt::Display for AccountValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "name must not be empty"),
            Self::NameTooLong { max } => {
                write!(f, "name must be at most {max} characters")
            }
            Self::EmptyEmail => write!(f, "email must not be empty"),
            Self::InvalidEmail => write!(f, "email must be a valid email address"),
            Self::PasswordTooShort { min } => {
                write!(f, "password must be at least {min} characters")
            }
            Self::PasswordTooLong { max } => {
                write!(f, "password must be at most {max} characters")
            }
        }
    }
}

impl std::error::Error for AccountValidationError {}

/// Stable account identifier assigned by the storage layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct AccountId(i64);

impl AccountId {
    /// Wrap a storage-assigned identifier.
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Access the raw identifier.
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maximum allowed length for an account name.
pub const NAME_MAX: usize = 100;

/// Human-readable display name for the account holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AccountName(String);

impl AccountName {
    /// Validate and construct an [`AccountName`].
    pub fn new(name: impl Into<String>) -> Result<Self, AccountValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AccountValidationError::EmptyName);
        }
        if name.chars().count() > NAME_MAX {
            return Err(AccountValidationError::NameTooLong { max: NAME_MAX });
        }
        Ok(Self(name))
    }
}

impl AsRef<str> for AccountName {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        // Deliberately permissive; definitive validation happens when the
        // activation mail is delivered.
        let pattern = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";
        Regex::new(pattern)
            .unwrap_or_else(|error| panic!("email regex failed to compile: {error}"))
    })
}

/// Unique, validated email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Validate and construct an [`Email`]. The address is lower-cased so
    /// uniqueness checks are case-insensitive.
    pub fn new(email: impl AsRef<str>) -> Result<Self, AccountValidationError> {
        let email = email.as_ref().trim().to_lowercase();
        if email.is_empty() {
            return Err(AccountValidationError::EmptyEmail);
        }
        if !email_regex().is_match(&email) {
            return Err(AccountValidationError::InvalidEmail);
        }
        Ok(Self(email))
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// Minimum allowed password length.
pub const PASSWORD_MIN: usize = 8;
/// Maximum allowed password length.
pub const PASSWORD_MAX: usize = 72;

/// Plaintext password held only for the duration of hashing or verification.
///
/// The debug representation is redacted; the plaintext never reaches logs
/// or storage.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    /// Validate and construct a [`Password`].
    pub fn new(password: impl Into<String>) -> Result<Self, AccountValidationError> {
        let password = password.into();
        let length = password.chars().count();
        if length < PASSWORD_MIN {
            return Err(AccountValidationError::PasswordTooShort { min: PASSWORD_MIN });
        }
        if length > PASSWORD_MAX {
            return Err(AccountValidationError::PasswordTooLong { max: PASSWORD_MAX });
        }
        Ok(Self(password))
    }

    fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}

/// Failures raised while hashing or verifying a password.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    /// The hashing backend rejected the input.
    #[error("failed to hash password: {message}")]
    Hash { message: String },
    /// A stored digest is not a parseable PHC string.
    #[error("stored password digest is malformed: {message}")]
    MalformedDigest { message: String },
}

/// Salted argon2id digest of an account password, in PHC string format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordDigest(String);

impl PasswordDigest {
    /// Hash a plaintext password with a fresh random salt.
    pub fn generate(password: &Password) -> Result<Self, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_str().as_bytes(), &salt)
            .map(|hash| Self(hash.to_string()))
            .map_err(|err| CredentialError::Hash {
                message: err.to_string(),
            })
    }

    /// Rehydrate a digest previously produced by [`PasswordDigest::generate`].
    pub fn from_phc_string(phc: impl Into<String>) -> Self {
        Self(phc.into())
    }

    /// Check a candidate password against this digest.
    pub fn matches(&self, candidate: &Password) -> Result<bool, CredentialError> {
        let parsed = PasswordHash::new(&self.0).map_err(|err| CredentialError::MalformedDigest {
            message: err.to_string(),
        })?;
        Ok(Argon2::default()
            .verify_password(candidate.as_str().as_bytes(), &parsed)
            .is_ok())
    }

    /// The PHC string persisted by storage adapters.
    pub fn as_phc_string(&self) -> &str {
        self.0.as_str()
    }
}

/// A registered account.
///
/// ## Invariants
/// - `version` increments by exactly one on every successful persisted
///   mutation and never decrements.
/// - `activated` is flipped at most once, by activation-token redemption.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    id: AccountId,
    name: AccountName,
    email: Email,
    password: PasswordDigest,
    activated: bool,
    created_at: DateTime<Utc>,
    version: u32,
}

impl Account {
    /// Assemble an account from storage-provided parts.
    pub fn from_parts(
        id: AccountId,
        name: AccountName,
        email: Email,
        password: PasswordDigest,
        activated: bool,
        created_at: DateTime<Utc>,
        version: u32,
    ) -> Self {
        Self {
            id,
            name,
            email,
            password,
            activated,
            created_at,
            version,
        }
    }

    /// Stable account identifier.
    pub fn id(&self) -> AccountId {
        self.id
    }

    /// Display name.
    pub fn name(&self) -> &AccountName {
        &self.name
    }

    /// Unique email address.
    pub fn email(&self) -> &Email {
        &self.email
    }

    /// Stored password digest.
    pub fn password(&self) -> &PasswordDigest {
        &self.password
    }

    /// Whether the activation token has been redeemed.
    pub fn is_activated(&self) -> bool {
        self.activated
    }

    /// Registration timestamp.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Current version counter, used as the optimistic-lock precondition.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Flip the activation flag. Persisting the change is the caller's job.
    pub fn mark_activated(&mut self) {
        self.activated = true;
    }

    /// Replace the stored credential. Persisting the change is the caller's
    /// job.
    pub fn replace_password(&mut self, digest: PasswordDigest) {
        self.password = digest;
    }

    /// Advance the version counter after a successful conditioned update.
    pub fn advance_version(&mut self) {
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ada@example.com")]
    #[case("Ada.Lovelace+catalog@sub.example.org")]
    fn email_accepts_reasonable_addresses(#[case] input: &str) {
        let email = Email::new(input).expect("valid email");
        assert_eq!(email.as_ref(), input.to_lowercase());
    }

    #[rstest]
    #[case("", AccountValidationError::EmptyEmail)]
    #[case("   ", AccountValidationError::EmptyEmail)]
    #[case("not-an-email", AccountValidationError::InvalidEmail)]
    #[case("a@b", AccountValidationError::InvalidEmail)]
    #[case("spaces in@example.com", AccountValidationError::InvalidEmail)]
    fn email_rejects_malformed_addresses(
        #[case] input: &str,
        #[case] expected: AccountValidationError,
    ) {
        assert_eq!(Email::new(input).expect_err("must fail"), expected);
    }

    #[rstest]
    #[case("short")]
    #[case("1234567")]
    fn password_rejects_too_short(#[case] input: &str) {
        assert_eq!(
            Password::new(input).expect_err("must fail"),
            AccountValidationError::PasswordTooShort { min: PASSWORD_MIN }
        );
    }

    #[test]
    fn password_rejects_too_long() {
        let input = "x".repeat(PASSWORD_MAX + 1);
        assert_eq!(
            Password::new(input).expect_err("must fail"),
            AccountValidationError::PasswordTooLong { max: PASSWORD_MAX }
        );
    }

    #[test]
    fn password_debug_output_is_redacted() {
        let password = Password::new("correct-horse-battery").expect("valid");
        assert_eq!(format!("{password:?}"), "Password(<redacted>)");
    }

    #[test]
    fn digest_verifies_matching_password_only() {
        let password = Password::new("correct-horse-battery").expect("valid");
        let digest = PasswordDigest::generate(&password).expect("hashes");

        assert!(digest.as_phc_string().starts_with("$argon2"));
        assert!(digest.matches(&password).expect("verifies"));

        let wrong = Password::new("wrong-password-entirely").expect("valid");
        assert!(!digest.matches(&wrong).expect("verifies"));
    }

    #[test]
    fn digest_uses_a_fresh_salt_each_time() {
        let password = Password::new("same-password").expect("valid");
        let first = PasswordDigest::generate(&password).expect("hashes");
        let second = PasswordDigest::generate(&password).expect("hashes");
        assert_ne!(first.as_phc_string(), second.as_phc_string());
    }

    #[test]
    fn malformed_digest_is_an_error_not_a_mismatch() {
        let digest = PasswordDigest::from_phc_string("not-a-phc-string");
        let password = Password::new("irrelevant-password").expect("valid");
        assert!(matches!(
            digest.matches(&password),
            Err(CredentialError::MalformedDigest { .. })
        ));
    }
}
