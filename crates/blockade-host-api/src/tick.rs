//! Tick sources that pace the enforcement monitor

use async_trait::async_trait;
use blockade_util::PackageId;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};

/// One trigger for a decision cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// Periodic wake-up; the detector is queried for the foreground
    Interval,

    /// The host reported a foreground change; no detector query is needed
    ForegroundChanged { package: Option<PackageId> },
}

/// Source of ticks for the monitor loop.
///
/// `None` means the source is exhausted and the loop should end.
#[async_trait]
pub trait TickSource: Send {
    async fn next_tick(&mut self) -> Option<Tick>;
}

/// Polling discipline: a tick every `period`, first tick immediately.
///
/// Missed ticks are skipped, so a slow cycle never leaves a backlog behind it.
pub struct IntervalTicks {
    period: Duration,
    interval: Option<Interval>,
}

impl IntervalTicks {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

#[async_trait]
impl TickSource for IntervalTicks {
    async fn next_tick(&mut self) -> Option<Tick> {
        // Created lazily so construction does not need a runtime
        let period = self.period;
        let interval = self.interval.get_or_insert_with(|| {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });
        interval.tick().await;
        Some(Tick::Interval)
    }
}

/// Event-driven discipline: ticks pushed through a channel.
///
/// Ends when every sender has been dropped.
pub struct ChannelTicks {
    rx: mpsc::UnboundedReceiver<Tick>,
}

impl ChannelTicks {
    pub fn new(rx: mpsc::UnboundedReceiver<Tick>) -> Self {
        Self { rx }
    }

    /// Create a sender and its tick source
    pub fn channel() -> (mpsc::UnboundedSender<Tick>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl TickSource for ChannelTicks {
    async fn next_tick(&mut self) -> Option<Tick> {
        self.rx.recv().await
    }
}

/// Fixed sequence of ticks, then exhausted
pub struct ScriptedTicks {
    ticks: std::collections::VecDeque<Tick>,
}

impl ScriptedTicks {
    pub fn new(ticks: impl IntoIterator<Item = Tick>) -> Self {
        Self {
            ticks: ticks.into_iter().collect(),
        }
    }

    /// `count` interval ticks
    pub fn intervals(count: usize) -> Self {
        Self::new(std::iter::repeat_n(Tick::Interval, count))
    }
}

#[async_trait]
impl TickSource for ScriptedTicks {
    async fn next_tick(&mut self) -> Option<Tick> {
        self.ticks.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn interval_ticks_fire_immediately_then_periodically() {
        let mut ticks = IntervalTicks::new(Duration::from_secs(5));
        let start = tokio::time::Instant::now();

        assert_eq!(ticks.next_tick().await, Some(Tick::Interval));
        assert_eq!(start.elapsed(), Duration::ZERO);

        assert_eq!(ticks.next_tick().await, Some(Tick::Interval));
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn channel_ticks_end_when_senders_drop() {
        let (tx, mut ticks) = ChannelTicks::channel();
        tx.send(Tick::ForegroundChanged {
            package: Some(PackageId::new("com.x")),
        })
        .unwrap();
        drop(tx);

        assert_eq!(
            ticks.next_tick().await,
            Some(Tick::ForegroundChanged {
                package: Some(PackageId::new("com.x"))
            })
        );
        assert_eq!(ticks.next_tick().await, None);
    }

    #[tokio::test]
    async fn scripted_ticks_are_exhausted() {
        let mut ticks = ScriptedTicks::intervals(2);
        assert!(ticks.next_tick().await.is_some());
        assert!(ticks.next_tick().await.is_some());
        assert!(ticks.next_tick().await.is_none());
    }
}
