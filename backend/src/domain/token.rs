//! Opaque bearer-token issuance, hashing, and shape validation.
//!
//! Plaintext tokens are 26 characters drawn from the RFC 4648 base32
//! alphabet (130 bits of entropy). Only the SHA-256 digest of a token is
//! ever persisted; the plaintext is surfaced exactly once, in the response
//! that issues it.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use super::account::AccountId;

/// Fixed plaintext token length.
pub const TOKEN_LENGTH: usize = 26;

const TOKEN_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// The operation class a token is valid for. Tokens are never accepted
/// outside their issued scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenScope {
    /// Authenticates ordinary API requests.
    Authentication,
    /// Redeems account activation.
    Activation,
    /// Redeems a password reset.
    PasswordReset,
}

impl TokenScope {
    /// Stable code used as the storage discriminator.
    pub const fn as_code(self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Activation => "activation",
            Self::PasswordReset => "password-reset",
        }
    }

    /// Parse a storage discriminator back into a scope.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "authentication" => Some(Self::Authentication),
            "activation" => Some(Self::Activation),
            "password-reset" => Some(Self::PasswordReset),
            _ => None,
        }
    }
}

impl fmt::Display for TokenScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

/// SHA-256 digest of a plaintext token, used as the storage lookup key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenDigest([u8; 32]);

impl TokenDigest {
    /// Wrap raw digest bytes read back from storage.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Digest bytes for storage adapters.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for TokenDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenDigest({})", hex::encode(self.0))
    }
}

/// The persisted half of an issued token.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenRecord {
    digest: TokenDigest,
    account_id: AccountId,
    expiry: DateTime<Utc>,
    scope: TokenScope,
}

impl TokenRecord {
    /// Assemble a record from storage-provided parts.
    pub fn from_parts(
        digest: TokenDigest,
        account_id: AccountId,
        expiry: DateTime<Utc>,
        scope: TokenScope,
    ) -> Self {
        Self {
            digest,
            account_id,
            expiry,
            scope,
        }
    }

    /// Storage lookup key.
    pub fn digest(&self) -> &TokenDigest {
        &self.digest
    }

    /// Owning account.
    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    /// Instant after which the token no longer resolves.
    pub fn expiry(&self) -> DateTime<Utc> {
        self.expiry
    }

    /// Issued scope.
    pub fn scope(&self) -> TokenScope {
        self.scope
    }
}

/// A freshly issued token: the plaintext for the caller, the record for
/// storage.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    plaintext: String,
    record: TokenRecord,
}

impl IssuedToken {
    /// The one-time plaintext. Never persisted.
    pub fn plaintext(&self) -> &str {
        self.plaintext.as_str()
    }

    /// The record to hand to the token repository.
    pub fn record(&self) -> &TokenRecord {
        &self.record
    }
}

/// Issue a new token for `account_id` with the given time-to-live and scope.
///
/// Persistence is the caller's responsibility via the token repository.
pub fn issue(account_id: AccountId, ttl: TimeDelta, scope: TokenScope) -> IssuedToken {
    let mut rng = OsRng;
    let plaintext: String = (0..TOKEN_LENGTH)
        .map(|_| {
            // Masking to 5 bits indexes the 32-character alphabet uniformly.
            let index = (rng.next_u32() & 31) as usize;
            TOKEN_ALPHABET[index] as char
        })
        .collect();

    let record = TokenRecord {
        digest: digest(&plaintext),
        account_id,
        expiry: Utc::now() + ttl,
        scope,
    };

    IssuedToken { plaintext, record }
}

/// Deterministic one-way digest of a plaintext token.
///
/// Used at issuance and at verification time so the plaintext is never
/// stored.
pub fn digest(plaintext: &str) -> TokenDigest {
    let hash = Sha256::digest(plaintext.as_bytes());
    TokenDigest(hash.into())
}

/// Cheap shape check run before any storage lookup: fixed length, fixed
/// alphabet.
pub fn has_valid_shape(plaintext: &str) -> bool {
    plaintext.len() == TOKEN_LENGTH && plaintext.bytes().all(|b| TOKEN_ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rstest::rstest;

    use super::*;

    fn account() -> AccountId {
        AccountId::new(1)
    }

    #[test]
    fn issued_plaintext_has_a_valid_shape() {
        let issued = issue(account(), TimeDelta::hours(24), TokenScope::Authentication);
        assert!(has_valid_shape(issued.plaintext()));
    }

    #[test]
    fn digest_is_deterministic() {
        let issued = issue(account(), TimeDelta::hours(24), TokenScope::Authentication);
        assert_eq!(
            digest(issued.plaintext()).as_bytes(),
            issued.record().digest().as_bytes()
        );
        assert_eq!(digest("ABCDEFGHIJKLMNOPQRSTUVWXYZ"), digest("ABCDEFGHIJKLMNOPQRSTUVWXYZ"));
    }

    #[test]
    fn expiry_reflects_the_requested_ttl() {
        let before = Utc::now();
        let issued = issue(account(), TimeDelta::minutes(30), TokenScope::PasswordReset);
        let after = Utc::now();

        assert!(issued.record().expiry() >= before + TimeDelta::minutes(30));
        assert!(issued.record().expiry() <= after + TimeDelta::minutes(30));
    }

    #[test]
    fn ten_thousand_issuances_never_collide() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let issued = issue(account(), TimeDelta::hours(1), TokenScope::Authentication);
            assert!(
                seen.insert(issued.plaintext().to_owned()),
                "duplicate plaintext issued"
            );
        }
    }

    #[rstest]
    #[case("")]
    #[case("TOOSHORT")]
    #[case("abcdefghijklmnopqrstuvwxyz")] // lower case is outside the alphabet
    #[case("ABCDEFGHIJKLMNOPQRSTUVWX01")] // 0 and 1 are outside the alphabet
    #[case("ABCDEFGHIJKLMNOPQRSTUVWXYZ2")] // 27 characters
    fn malformed_plaintext_fails_the_shape_check(#[case] input: &str) {
        assert!(!has_valid_shape(input));
    }

    #[rstest]
    #[case(TokenScope::Authentication, "authentication")]
    #[case(TokenScope::Activation, "activation")]
    #[case(TokenScope::PasswordReset, "password-reset")]
    fn scope_codes_round_trip(#[case] scope: TokenScope, #[case] code: &str) {
        assert_eq!(scope.as_code(), code);
        assert_eq!(TokenScope::from_code(code), Some(scope));
    }

    #[test]
    fn unknown_scope_code_is_rejected() {
        assert_eq!(TokenScope::from_code("refresh"), None);
    }
}
