use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, NaiveDate, Utc};

use prep_core::model::{SubscriptionTier, UserId};

use crate::error::RateLimitError;

pub const DEFAULT_COOLDOWN_SECS: u32 = 10;

#[derive(Debug, Clone, Copy)]
struct Window {
    last_request_at: DateTime<Utc>,
    day: NaiveDate,
    requests_today: u32,
}

/// Per-user cooldown plus a daily cap that depends on the subscription tier.
///
/// State lives in process memory and resets on restart.
#[derive(Debug)]
pub struct RateLimiter {
    cooldown: Duration,
    windows: Mutex<HashMap<UserId, Window>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN_SECS)
    }
}

impl RateLimiter {
    #[must_use]
    pub fn new(cooldown_secs: u32) -> Self {
        Self {
            cooldown: Duration::seconds(i64::from(cooldown_secs)),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Admit a request at `now`, recording it on success.
    ///
    /// # Errors
    ///
    /// Returns `RateLimitError::CooldownActive` inside the cooldown and
    /// `RateLimitError::DailyCapReached` once the tier's daily cap is used up.
    pub fn check(
        &self,
        user_id: UserId,
        tier: SubscriptionTier,
        now: DateTime<Utc>,
    ) -> Result<(), RateLimitError> {
        let today = now.date_naive();
        let cap = tier.daily_generation_cap();
        let mut windows = self.lock();
        // Windows from earlier days only matter while their cooldown runs.
        windows.retain(|_, w| w.day == today || w.last_request_at + self.cooldown > now);

        if let Some(window) = windows.get(&user_id) {
            let ready_at = window.last_request_at + self.cooldown;
            if ready_at > now {
                let remaining = (ready_at - now).num_seconds().max(1);
                return Err(RateLimitError::CooldownActive {
                    remaining_secs: u32::try_from(remaining).unwrap_or(u32::MAX),
                });
            }
            if window.day == today && window.requests_today >= cap {
                return Err(RateLimitError::DailyCapReached { cap });
            }
        }

        let window = windows.entry(user_id).or_insert(Window {
            last_request_at: now,
            day: today,
            requests_today: 0,
        });
        if window.day != today {
            window.day = today;
            window.requests_today = 0;
        }
        window.last_request_at = now;
        window.requests_today += 1;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<UserId, Window>> {
        // A panic while holding the lock cannot leave a window half-written.
        self.windows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
