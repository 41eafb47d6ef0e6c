//! # API crate — linked accounts and their credentials
//!
//! Notes can be shared with remote services through linked accounts. This
//! crate keeps those accounts' access tokens fresh; talking to the provider's
//! token endpoint is left to a [`TokenExchange`] supplied by the host.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`auth`] | Account ids, token sets and the [`TokenRefresher`] service |
//! | [`clock`] | Wall-clock abstraction so refresh scheduling can be tested |

pub mod auth;
pub mod clock;

pub use auth::{
    AccountId, AccountStatus, AuthError, RefreshEvent, RefreshPolicy, TokenExchange,
    TokenRefresher, TokenSet,
};
pub use clock::{Clock, ManualClock, SystemClock};
