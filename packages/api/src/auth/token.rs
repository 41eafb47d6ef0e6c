use chrono::{DateTime, Duration, Utc};
use oauth2::{AccessToken, RefreshToken};
use serde::{Deserialize, Serialize};

/// A linked account, identified by its e-mail address.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// E-mail addresses are compared case-insensitively.
    pub fn new(email: impl AsRef<str>) -> Self {
        Self(email.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Credentials for one account. `Debug` never prints the secrets.
#[derive(Clone, Debug)]
pub struct TokenSet {
    pub access_token: AccessToken,
    pub refresh_token: Option<RefreshToken>,
    pub expires_at: DateTime<Utc>,
}

impl TokenSet {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: AccessToken::new(access_token.into()),
            refresh_token: refresh_token.map(RefreshToken::new),
            expires_at,
        }
    }

    /// When a refresh should happen, `margin` ahead of expiry.
    pub fn refresh_due(&self, margin: Duration) -> DateTime<Utc> {
        self.expires_at - margin
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_normalizes_email() {
        assert_eq!(AccountId::new("  Ada@Example.COM "), AccountId::new("ada@example.com"));
        assert_eq!(AccountId::new("Ada@Example.com").to_string(), "ada@example.com");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let tokens = TokenSet::new("sekrit-access", Some("sekrit-refresh".into()), Utc::now());
        let printed = format!("{tokens:?}");
        assert!(!printed.contains("sekrit"));
        assert_eq!(tokens.access_token.secret(), "sekrit-access");
    }

    #[test]
    fn test_refresh_due_and_expiry() {
        let now = Utc::now();
        let tokens = TokenSet::new("a", None, now + Duration::hours(1));
        assert_eq!(
            tokens.refresh_due(Duration::minutes(5)),
            now + Duration::minutes(55)
        );
        assert!(!tokens.is_expired(now));
        assert!(tokens.is_expired(now + Duration::hours(1)));
    }
}
