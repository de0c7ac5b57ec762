//! Session Tracker: per-channel session tokens with a background sweep.
//!
//! One task owns the session registry and performs every insert and
//! eviction. After each change it publishes an immutable copy through
//! `ArcSwap`, so readers never wait on the writer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{ChannelId, RateLimiter, SecurityStats, StatsSnapshot};
use crate::Result;
use crate::observability::AUDIT_TARGET;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Created,
    Active,
    Expired,
    Evicted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    pub ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub channel: ChannelId,
    pub created_at: Instant,
    pub expires_at: Instant,
    state: SessionState,
}

impl Session {
    fn new(channel: ChannelId, now: Instant, ttl: Duration) -> Self {
        Self {
            token: uuid::Uuid::new_v4().to_string(),
            channel,
            created_at: now,
            expires_at: now + ttl,
            state: SessionState::Created,
        }
    }

    /// State as of `now`; expiry is fixed at creation and never extended.
    #[must_use]
    pub fn state_at(&self, now: Instant) -> SessionState {
        if now >= self.expires_at {
            SessionState::Expired
        } else {
            self.state
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state_at(Instant::now())
    }
}

#[derive(Debug, Clone, Default)]
struct Registry {
    by_channel: HashMap<ChannelId, Session>,
    by_token: HashMap<String, ChannelId>,
}

impl Registry {
    fn session_for_token(&self, token: &str) -> Option<&Session> {
        self.by_token
            .get(token)
            .and_then(|channel| self.by_channel.get(channel))
    }

    /// Returns true when the registry changed.
    fn touch(&mut self, channel: ChannelId, now: Instant, ttl: Duration) -> bool {
        if let Some(session) = self.by_channel.get_mut(&channel) {
            match session.state_at(now) {
                SessionState::Created => {
                    session.state = SessionState::Active;
                    return true;
                }
                SessionState::Active => return false,
                SessionState::Expired | SessionState::Evicted => {
                    // An expired token is never revived; the channel starts over.
                    let token = session.token.clone();
                    self.by_token.remove(&token);
                }
            }
        }

        let session = Session::new(channel.clone(), now, ttl);
        tracing::debug!(channel = %channel, "Session created");
        self.by_token.insert(session.token.clone(), channel.clone());
        self.by_channel.insert(channel, session);
        true
    }

    fn sweep(&mut self, now: Instant) -> usize {
        let expired: Vec<ChannelId> = self
            .by_channel
            .iter()
            .filter(|(_, session)| session.state_at(now) == SessionState::Expired)
            .map(|(channel, _)| channel.clone())
            .collect();

        for channel in &expired {
            if let Some(mut session) = self.by_channel.remove(channel) {
                session.state = SessionState::Evicted;
                self.by_token.remove(&session.token);
            }
        }
        expired.len()
    }

    fn active_count(&self, now: Instant) -> usize {
        self.by_channel
            .values()
            .filter(|session| session.state_at(now) != SessionState::Expired)
            .count()
    }
}

enum Command {
    Touch { channel: ChannelId, at: Instant },
    Sweep,
    Flush(oneshot::Sender<()>),
}

/// Handle to the tracker task. Cheap to share behind an `Arc`.
pub struct SessionTracker {
    commands: mpsc::UnboundedSender<Command>,
    view: Arc<ArcSwap<Registry>>,
    stats: SecurityStats,
    limiter: Arc<RateLimiter>,
    settings: TrackerSettings,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SessionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTracker")
            .field("settings", &self.settings)
            .field("sessions", &self.view.load().by_channel.len())
            .finish_non_exhaustive()
    }
}

impl SessionTracker {
    /// Start the tracker task on the current tokio runtime.
    #[must_use]
    pub fn spawn(settings: TrackerSettings, limiter: RateLimiter) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let view = Arc::new(ArcSwap::from_pointee(Registry::default()));
        let limiter = Arc::new(limiter);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run(
            receiver,
            Arc::clone(&view),
            Arc::clone(&limiter),
            settings,
            cancel.clone(),
        ));

        Self {
            commands,
            view,
            stats: SecurityStats::new(),
            limiter,
            settings,
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    #[must_use]
    pub const fn settings(&self) -> TrackerSettings {
        self.settings
    }

    #[must_use]
    pub const fn stats(&self) -> &SecurityStats {
        &self.stats
    }

    /// Admit one call from `channel`: applies the rate limit, then records
    /// activity. Never waits on the tracker task.
    pub fn admit(&self, channel: &ChannelId) -> Result<()> {
        if let Err(e) = self.limiter.check(channel) {
            self.stats.record_rate_limited();
            return Err(e);
        }
        self.touch(channel);
        Ok(())
    }

    /// Record activity; the first contact from a channel creates its session.
    pub fn touch(&self, channel: &ChannelId) {
        let command = Command::Touch {
            channel: channel.clone(),
            at: Instant::now(),
        };
        if self.commands.send(command).is_err() {
            tracing::debug!(channel = %channel, "Session tracker stopped; activity not recorded");
        }
    }

    #[must_use]
    pub fn session(&self, channel: &ChannelId) -> Option<Session> {
        self.view.load().by_channel.get(channel).cloned()
    }

    /// State of `token`, or `None` when it is unknown or already evicted.
    #[must_use]
    pub fn token_state(&self, token: &str) -> Option<SessionState> {
        self.view
            .load()
            .session_for_token(token)
            .map(Session::state)
    }

    /// True only for tokens that are live: created or active and not expired.
    #[must_use]
    pub fn validate_token(&self, token: &str) -> bool {
        matches!(
            self.token_state(token),
            Some(SessionState::Created | SessionState::Active)
        )
    }

    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.view.load().active_count(Instant::now())
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot(self.active_sessions())
    }

    /// Ask the task to sweep now rather than at the next tick.
    pub fn sweep_now(&self) {
        let _ = self.commands.send(Command::Sweep);
    }

    /// Wait until every command sent so far has been applied.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Stop the sweeper after a final sweep.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            tracing::warn!(error = %e, "Session tracker task ended abnormally");
        }
    }
}

impl Drop for SessionTracker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    mut commands: mpsc::UnboundedReceiver<Command>,
    view: Arc<ArcSwap<Registry>>,
    limiter: Arc<RateLimiter>,
    settings: TrackerSettings,
    cancel: CancellationToken,
) {
    let mut registry = Registry::default();
    let mut ticker = tokio::time::interval_at(
        Instant::now() + settings.sweep_interval,
        settings.sweep_interval,
    );
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::debug!(
        ttl_secs = settings.ttl.as_secs(),
        sweep_secs = settings.sweep_interval.as_secs(),
        "Session tracker started"
    );

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                sweep(&mut registry, &view);
                limiter.prune();
            }
            command = commands.recv() => match command {
                Some(Command::Touch { channel, at }) => {
                    if registry.touch(channel, at, settings.ttl) {
                        view.store(Arc::new(registry.clone()));
                    }
                }
                Some(Command::Sweep) => sweep(&mut registry, &view),
                Some(Command::Flush(done)) => {
                    let _ = done.send(());
                }
                None => break,
            },
        }
    }

    sweep(&mut registry, &view);
    tracing::debug!(remaining = registry.by_channel.len(), "Session tracker stopped");
}

fn sweep(registry: &mut Registry, view: &ArcSwap<Registry>) {
    let evicted = registry.sweep(Instant::now());
    if evicted > 0 {
        view.store(Arc::new(registry.clone()));
        tracing::info!(
            target: AUDIT_TARGET,
            event = "session_evicted",
            count = evicted,
            remaining = registry.by_channel.len(),
            "Evicted expired sessions"
        );
    }
}
