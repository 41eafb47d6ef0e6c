//! # Token refresh service
//!
//! [`TokenRefresher`] keeps the access tokens of linked accounts valid. Each
//! tracked account gets one timer that fires `margin` before its token
//! expires and trades the refresh token for a new [`TokenSet`] through the
//! host's [`TokenExchange`].
//!
//! A failed exchange is retried after `retry_delay`, up to `max_attempts`
//! attempts in total. After that, or straight away for an account without a
//! refresh token, the account is marked [`AccountStatus::NeedsReauth`] and
//! no timer runs for it until new tokens are tracked.
//!
//! The service is owned explicitly: `start()` arms timers, `stop()` (or
//! dropping the service) cancels them. Timer tasks only hold a weak handle, so
//! they never keep a dropped service alive.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use oauth2::{AccessToken, RefreshToken};
use store::AuthConfig;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::error::AuthError;
use super::token::{AccountId, TokenSet};
use crate::clock::Clock;

/// Talks to the provider's token endpoint.
pub trait TokenExchange: Send + Sync + 'static {
    fn refresh(
        &self,
        account: &AccountId,
        refresh_token: &RefreshToken,
    ) -> impl Future<Output = Result<TokenSet, AuthError>> + Send;
}

/// Timing of refreshes and retries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub margin: Duration,
    pub retry_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self::from(&AuthConfig::default())
    }
}

impl From<&AuthConfig> for RefreshPolicy {
    fn from(config: &AuthConfig) -> Self {
        Self {
            margin: Duration::from_secs(config.refresh_margin_secs),
            retry_delay: Duration::from_secs(config.retry_delay_secs),
            max_attempts: config.max_refresh_attempts.max(1),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccountStatus {
    Active { expires_at: DateTime<Utc> },
    /// The user has to sign in again.
    NeedsReauth { reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefreshEvent {
    Refreshed {
        account: AccountId,
        expires_at: DateTime<Utc>,
    },
    RetryScheduled {
        account: AccountId,
        attempt: u32,
        reason: String,
    },
    NeedsReauth {
        account: AccountId,
        reason: String,
    },
}

struct Entry {
    tokens: TokenSet,
    status: AccountStatus,
    timer: Option<JoinHandle<()>>,
}

impl Entry {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

struct Inner<E, C> {
    exchange: E,
    clock: C,
    policy: RefreshPolicy,
    accounts: Mutex<HashMap<AccountId, Entry>>,
    running: AtomicBool,
    events: broadcast::Sender<RefreshEvent>,
}

/// Keeps linked accounts' access tokens fresh.
pub struct TokenRefresher<E: TokenExchange, C: Clock> {
    inner: Arc<Inner<E, C>>,
}

impl<E: TokenExchange, C: Clock> TokenRefresher<E, C> {
    pub fn new(exchange: E, clock: C, policy: RefreshPolicy) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                exchange,
                clock,
                policy,
                accounts: Mutex::new(HashMap::new()),
                running: AtomicBool::new(false),
                events,
            }),
        }
    }

    pub fn exchange(&self) -> &E {
        &self.inner.exchange
    }

    /// Arm a timer for every active account. Must be called within a Tokio runtime.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut accounts = self.inner.accounts();
        for (account, entry) in accounts.iter_mut() {
            if matches!(entry.status, AccountStatus::Active { .. }) {
                Inner::schedule(&self.inner, account, entry);
            }
        }
        tracing::info!(accounts = accounts.len(), "token refresher started");
    }

    /// Cancel every timer. Tracked accounts are kept.
    pub fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        for entry in self.inner.accounts().values_mut() {
            entry.cancel_timer();
        }
        tracing::info!("token refresher stopped");
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Track `account` with fresh tokens, replacing anything tracked before.
    pub fn track(&self, account: AccountId, tokens: TokenSet) {
        let mut accounts = self.inner.accounts();
        if let Some(mut old) = accounts.remove(&account) {
            old.cancel_timer();
        }

        let mut entry = Entry {
            status: AccountStatus::Active {
                expires_at: tokens.expires_at,
            },
            tokens,
            timer: None,
        };

        if entry.tokens.refresh_token.is_none() {
            let reason = "no refresh token".to_string();
            tracing::warn!(%account, "account cannot be refreshed: {reason}");
            entry.status = AccountStatus::NeedsReauth {
                reason: reason.clone(),
            };
            self.inner.emit(RefreshEvent::NeedsReauth {
                account: account.clone(),
                reason,
            });
        } else if self.is_running() {
            Inner::schedule(&self.inner, &account, &mut entry);
        }

        accounts.insert(account, entry);
    }

    /// Stop tracking `account`. Returns false if it was not tracked.
    pub fn forget(&self, account: &AccountId) -> bool {
        match self.inner.accounts().remove(account) {
            Some(mut entry) => {
                entry.cancel_timer();
                true
            }
            None => false,
        }
    }

    /// The current access token, if the account is active.
    pub fn access_token(&self, account: &AccountId) -> Option<AccessToken> {
        let accounts = self.inner.accounts();
        let entry = accounts.get(account)?;
        match entry.status {
            AccountStatus::Active { .. } => Some(entry.tokens.access_token.clone()),
            AccountStatus::NeedsReauth { .. } => None,
        }
    }

    pub fn status(&self, account: &AccountId) -> Option<AccountStatus> {
        self.inner
            .accounts()
            .get(account)
            .map(|entry| entry.status.clone())
    }

    pub fn accounts(&self) -> Vec<AccountId> {
        let mut ids: Vec<_> = self.inner.accounts().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.inner.events.subscribe()
    }

    /// Refresh `account` immediately, outside its schedule.
    ///
    /// One attempt; on failure the account's status and timer are unchanged.
    pub async fn refresh_now(&self, account: &AccountId) -> Result<DateTime<Utc>, AuthError> {
        let refresh_token = self.inner.refresh_token(account)?;
        let tokens = self.inner.exchange.refresh(account, &refresh_token).await?;
        Ok(self.inner.store_refreshed(account, tokens))
    }
}

impl<E: TokenExchange, C: Clock> Drop for TokenRefresher<E, C> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<E: TokenExchange, C: Clock> Inner<E, C> {
    fn accounts(&self) -> MutexGuard<'_, HashMap<AccountId, Entry>> {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: RefreshEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn refresh_token(&self, account: &AccountId) -> Result<RefreshToken, AuthError> {
        let accounts = self.accounts();
        let entry = accounts
            .get(account)
            .ok_or_else(|| AuthError::UnknownAccount(account.clone()))?;
        entry
            .tokens
            .refresh_token
            .clone()
            .ok_or_else(|| AuthError::NoRefreshToken(account.clone()))
    }

    /// Replace the timer of `entry` with one due `margin` before its expiry.
    fn schedule(this: &Arc<Self>, account: &AccountId, entry: &mut Entry) {
        entry.cancel_timer();

        let margin = chrono::Duration::from_std(this.policy.margin).unwrap_or(chrono::Duration::zero());
        let due = entry.tokens.refresh_due(margin);
        let delay = (due - this.clock.now()).to_std().unwrap_or(Duration::ZERO);
        tracing::debug!(%account, %due, "scheduled token refresh");

        let weak = Arc::downgrade(this);
        let account = account.clone();
        entry.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            Self::run_refresh(weak, account).await;
        }));
    }

    async fn run_refresh(weak: Weak<Self>, account: AccountId) {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if !inner.running.load(Ordering::SeqCst) {
                return;
            }
            let Ok(refresh_token) = inner.refresh_token(&account) else {
                return;
            };

            let result = inner.exchange.refresh(&account, &refresh_token).await;
            match result {
                Ok(tokens) => {
                    // Detach this task's own handle so re-arming does not abort it
                    if let Some(entry) = inner.accounts().get_mut(&account) {
                        entry.timer = None;
                    }
                    inner.store_refreshed(&account, tokens);
                    return;
                }
                Err(err) if attempt < inner.policy.max_attempts => {
                    tracing::warn!(%account, attempt, "token refresh failed, retrying: {err}");
                    inner.emit(RefreshEvent::RetryScheduled {
                        account: account.clone(),
                        attempt,
                        reason: err.to_string(),
                    });
                    let delay = inner.policy.retry_delay;
                    drop(inner);
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    tracing::warn!(%account, attempt, "token refresh failed, re-authentication needed: {err}");
                    inner.mark_needs_reauth(&account, err.to_string());
                    return;
                }
            }
        }
    }

    /// Install refreshed tokens and re-arm the account's timer.
    fn store_refreshed(self: &Arc<Self>, account: &AccountId, mut tokens: TokenSet) -> DateTime<Utc> {
        let expires_at = tokens.expires_at;
        {
            let mut accounts = self.accounts();
            let Some(entry) = accounts.get_mut(account) else {
                return expires_at;
            };
            // Providers may omit the refresh token when it did not rotate
            if tokens.refresh_token.is_none() {
                tokens.refresh_token = entry.tokens.refresh_token.take();
            }
            entry.tokens = tokens;
            entry.status = AccountStatus::Active { expires_at };
            entry.cancel_timer();
            if self.running.load(Ordering::SeqCst) {
                Self::schedule(self, account, entry);
            }
        }
        tracing::debug!(%account, %expires_at, "token refreshed");
        self.emit(RefreshEvent::Refreshed {
            account: account.clone(),
            expires_at,
        });
        expires_at
    }

    fn mark_needs_reauth(&self, account: &AccountId, reason: String) {
        if let Some(entry) = self.accounts().get_mut(account) {
            entry.status = AccountStatus::NeedsReauth {
                reason: reason.clone(),
            };
            entry.timer = None;
        }
        self.emit(RefreshEvent::NeedsReauth {
            account: account.clone(),
            reason,
        });
    }
}
