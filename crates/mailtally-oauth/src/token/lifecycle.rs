//! Token lifecycle state machine.
//!
//! A persisted token moves through
//! `absent -> obtained -> valid -> expired -> refreshed | reobtained`.
//! [`TokenState::classify`] is pure: it looks only at the token and the clock,
//! so the refresh-versus-reauthorize decision can be tested without I/O.

use chrono::{DateTime, Utc};

use super::Token;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Where a stored token stands at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// Nothing stored.
    Absent,
    /// Stored and usable as is.
    Valid,
    /// Expired, but a refresh token is available.
    Refreshable,
    /// Expired with no way to refresh.
    Stale,
}

/// What the caller should do next to end up with a usable token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAction {
    /// Use the stored token.
    Use,
    /// Exchange the refresh token silently.
    Refresh,
    /// Run the interactive authorization flow.
    Authorize,
}

impl TokenState {
    /// Classifies an optional stored token against `clock`.
    #[must_use]
    pub fn classify(token: Option<&Token>, clock: &dyn Clock) -> Self {
        match token {
            None => Self::Absent,
            Some(token) if !token.is_expired_at(clock.now()) => Self::Valid,
            Some(token) if token.can_refresh() => Self::Refreshable,
            Some(_) => Self::Stale,
        }
    }

    /// Returns the transition out of this state.
    #[must_use]
    pub const fn action(self) -> TokenAction {
        match self {
            Self::Valid => TokenAction::Use,
            Self::Refreshable => TokenAction::Refresh,
            Self::Absent | Self::Stale => TokenAction::Authorize,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
    }

    #[test]
    fn absent_token_needs_authorization() {
        let state = TokenState::classify(None, &clock());
        assert_eq!(state, TokenState::Absent);
        assert_eq!(state.action(), TokenAction::Authorize);
    }

    #[test]
    fn unexpired_token_is_used() {
        let clock = clock();
        let token = Token::new("a", "Bearer").with_expires_at(clock.0 + Duration::hours(1));
        let state = TokenState::classify(Some(&token), &clock);
        assert_eq!(state, TokenState::Valid);
        assert_eq!(state.action(), TokenAction::Use);
    }

    #[test]
    fn expired_token_with_refresh_is_refreshed() {
        let clock = clock();
        let token = Token::new("a", "Bearer")
            .with_expires_at(clock.0 - Duration::minutes(5))
            .with_refresh_token("r");
        let state = TokenState::classify(Some(&token), &clock);
        assert_eq!(state, TokenState::Refreshable);
        assert_eq!(state.action(), TokenAction::Refresh);
    }

    #[test]
    fn expired_token_without_refresh_is_reobtained() {
        let clock = clock();
        let token = Token::new("a", "Bearer").with_expires_at(clock.0 - Duration::minutes(5));
        let state = TokenState::classify(Some(&token), &clock);
        assert_eq!(state, TokenState::Stale);
        assert_eq!(state.action(), TokenAction::Authorize);
    }

    #[test]
    fn token_inside_expiry_margin_counts_as_expired() {
        let clock = clock();
        let token = Token::new("a", "Bearer")
            .with_expires_at(clock.0 + Duration::seconds(10))
            .with_refresh_token("r");
        assert_eq!(
            TokenState::classify(Some(&token), &clock),
            TokenState::Refreshable
        );
    }
}
