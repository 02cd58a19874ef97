//! Reasoning-block extraction and timing.
//!
//! Assistant output may open with a `<think>...</think>` section. The parser
//! works on the whole accumulated buffer each time it changes, so it gives the
//! same answer for partial and complete text without keeping state.

use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

pub const THINK_OPEN: &str = "<think>";
pub const THINK_CLOSE: &str = "</think>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockState {
    /// The buffer does not open with a reasoning block.
    Absent,
    /// Opening marker seen, closing marker not yet.
    Streaming,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThinkingSplit<'a> {
    pub reasoning: Option<&'a str>,
    pub main: &'a str,
    pub state: BlockState,
}

pub fn split_thinking(buffer: &str) -> ThinkingSplit<'_> {
    let Some(after_open) = buffer.trim_start().strip_prefix(THINK_OPEN) else {
        return ThinkingSplit {
            reasoning: None,
            main: buffer,
            state: BlockState::Absent,
        };
    };

    match after_open.find(THINK_CLOSE) {
        Some(end) => ThinkingSplit {
            reasoning: Some(&after_open[..end]),
            main: &after_open[end + THINK_CLOSE.len()..],
            state: BlockState::Complete,
        },
        None => ThinkingSplit {
            reasoning: Some(after_open),
            main: "",
            state: BlockState::Streaming,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTransition {
    None,
    Started(Instant),
    Stopped(u64),
}

/// RUNNING while the block streams, STOPPED otherwise. The start instant is
/// taken once per turn and the final duration is frozen once.
#[derive(Debug, Clone, Default)]
pub struct ThinkingTimer {
    started_at: Option<Instant>,
    final_seconds: Option<u64>,
    running: bool,
}

impl ThinkingTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timer for a message loaded from history.
    pub fn from_persisted(seconds: Option<u64>) -> Self {
        Self {
            final_seconds: seconds,
            ..Self::default()
        }
    }

    pub fn observe(&mut self, state: BlockState) -> TimerTransition {
        self.observe_at(state, Instant::now())
    }

    pub fn observe_at(&mut self, state: BlockState, now: Instant) -> TimerTransition {
        match state {
            BlockState::Streaming => {
                if self.running {
                    return TimerTransition::None;
                }
                self.running = true;
                let start = *self.started_at.get_or_insert(now);
                TimerTransition::Started(start)
            }
            BlockState::Complete => self.stop_at(now),
            BlockState::Absent if self.running => self.stop_at(now),
            BlockState::Absent => TimerTransition::None,
        }
    }

    fn stop_at(&mut self, now: Instant) -> TimerTransition {
        self.running = false;
        if self.final_seconds.is_some() {
            return TimerTransition::None;
        }
        let seconds = self
            .started_at
            .map(|start| now.saturating_duration_since(start).as_secs())
            .unwrap_or(0);
        self.final_seconds = Some(seconds);
        TimerTransition::Stopped(seconds)
    }

    /// Stop a timer that is still running and return the frozen duration.
    pub fn finish(&mut self) -> Option<u64> {
        if self.running {
            self.stop_at(Instant::now());
        }
        self.final_seconds
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn final_seconds(&self) -> Option<u64> {
        self.final_seconds
    }

    pub fn display_seconds_at(&self, now: Instant) -> u64 {
        match (self.running, self.started_at) {
            (true, Some(start)) => now.saturating_duration_since(start).as_secs(),
            _ => self.final_seconds.unwrap_or(0),
        }
    }

    pub fn label_at(&self, now: Instant) -> String {
        let seconds = self.display_seconds_at(now);
        if self.running {
            format!("Thinking for {seconds}s")
        } else {
            format!("Thought for {seconds}s")
        }
    }
}

/// Publishes elapsed whole seconds on a fixed period until stopped or dropped.
/// Display only; the frozen duration comes from [`ThinkingTimer`].
pub struct ElapsedTicker {
    cancel: CancellationToken,
    elapsed: watch::Receiver<u64>,
}

impl ElapsedTicker {
    pub const PERIOD: Duration = Duration::from_secs(1);

    pub fn start(started_at: Instant, period: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let (tx, elapsed) = watch::channel(started_at.elapsed().as_secs());
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        if tx.send(started_at.elapsed().as_secs()).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        Self { cancel, elapsed }
    }

    /// Receiver that sees every published value; closes once the ticker stops.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.elapsed.clone()
    }

    /// Fires when the ticker is stopped.
    pub fn stop_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ElapsedTicker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
