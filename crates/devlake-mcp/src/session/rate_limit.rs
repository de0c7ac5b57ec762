//! Sliding-window call limiter keyed by caller channel

use std::collections::{HashMap, VecDeque};
use std::num::NonZeroU32;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use super::ChannelId;
use crate::observability::AUDIT_TARGET;
use crate::{Error, Result};

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct RateLimiter {
    limit: NonZeroU32,
    window: Duration,
    calls: Mutex<HashMap<ChannelId, VecDeque<Instant>>>,
}

impl RateLimiter {
    /// `limit` calls per channel in any one-minute window
    #[must_use]
    pub fn per_minute(limit: NonZeroU32) -> Self {
        Self {
            limit,
            window: WINDOW,
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Count one call for `channel`, refusing it once the window is full.
    pub fn check(&self, channel: &ChannelId) -> Result<()> {
        let now = Instant::now();
        let mut calls = self.calls.lock();
        let history = calls.entry(channel.clone()).or_default();

        while history
            .front()
            .is_some_and(|&at| now.duration_since(at) >= self.window)
        {
            history.pop_front();
        }

        if history.len() >= self.limit.get() as usize {
            drop(calls);
            tracing::warn!(
                target: AUDIT_TARGET,
                event = "rate_limited",
                channel = %channel,
                limit = self.limit.get(),
                "Caller exceeded the per-minute call limit"
            );
            return Err(Error::RateLimited);
        }

        history.push_back(now);
        Ok(())
    }

    /// Drop channels with no calls inside the window.
    pub fn prune(&self) {
        let now = Instant::now();
        self.calls.lock().retain(|_, history| {
            history
                .back()
                .is_some_and(|&at| now.duration_since(at) < self.window)
        });
    }

    #[must_use]
    pub fn tracked_channels(&self) -> usize {
        self.calls.lock().len()
    }
}
