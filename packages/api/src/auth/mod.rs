//! Account credentials and token refresh.

mod error;
mod refresh;
mod token;

pub use error::AuthError;
pub use refresh::{AccountStatus, RefreshEvent, RefreshPolicy, TokenExchange, TokenRefresher};
pub use token::{AccountId, TokenSet};
