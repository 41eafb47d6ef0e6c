use thiserror::Error;

use super::token::AccountId;

#[derive(Debug, Error)]
pub enum AuthError {
    /// The provider refused the refresh token (revoked, expired, wrong client).
    #[error("refresh rejected: {0}")]
    Rejected(String),

    #[error("token endpoint unreachable: {0}")]
    Network(String),

    #[error("account {0} is not tracked")]
    UnknownAccount(AccountId),

    #[error("account {0} has no refresh token")]
    NoRefreshToken(AccountId),
}
