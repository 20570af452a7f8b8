//! Per-channel emission and cooldown tracking.
//!
//! # States
//!
//! Each scent channel moves through three phases:
//!
//! - `Idle`: never emitted, or the cooldown has elapsed
//! - `Emitting`: between the emission start and `emission_end`
//! - `Cooling`: between `emission_end` and `cooldown_end`
//!
//! ```text
//!  Idle ──start──► Emitting ──(duration)──► Cooling ──(cooldown)──► Idle
//!    ▲                                                                │
//!    └──────────────────────── reset (stop) ◄─────────────────────────┘
//! ```
//!
//! A start request while the channel is not `Idle` is a soft rejection: no
//! command is sent and nothing changes. Availability is a pure function of
//! `now` against `cooldown_end`, so it never needs a timer.

use olfactory_core::constants::CHANNEL_COUNT;
use olfactory_core::{ChannelIndex, Result};
use std::fmt;
use std::time::{Duration, Instant};

/// Phase of a scent channel at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelPhase {
    Idle,
    Emitting,
    Cooling,
}

impl fmt::Display for ChannelPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Emitting => write!(f, "Emitting"),
            Self::Cooling => write!(f, "Cooling"),
        }
    }
}

/// Timestamps of a channel's last emission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelState {
    emission_end: Option<Instant>,
    cooldown_end: Option<Instant>,
    last_duration: Duration,
}

impl ChannelState {
    pub fn phase(&self, now: Instant) -> ChannelPhase {
        match (self.emission_end, self.cooldown_end) {
            (Some(emission_end), _) if now < emission_end => ChannelPhase::Emitting,
            (_, Some(cooldown_end)) if now < cooldown_end => ChannelPhase::Cooling,
            _ => ChannelPhase::Idle,
        }
    }

    pub fn is_available(&self, now: Instant) -> bool {
        self.cooldown_end.is_none_or(|end| now >= end)
    }

    /// Time left until the channel is available again.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.cooldown_end
            .map(|end| end.saturating_duration_since(now))
            .unwrap_or_default()
    }

    pub fn last_duration(&self) -> Duration {
        self.last_duration
    }
}

/// Outcome of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartDecision {
    /// The command was sent and the channel is now emitting.
    Started { cooldown_end: Instant },

    /// The channel is still busy; nothing was sent.
    CoolingDown { remaining: Duration },
}

impl StartDecision {
    pub fn started(&self) -> bool {
        matches!(self, Self::Started { .. })
    }
}

/// Cooldown state for the channels of one device session.
#[derive(Debug, Clone)]
pub struct AvailabilityTracker {
    channels: [ChannelState; CHANNEL_COUNT],
    cooldown: Duration,
}

impl AvailabilityTracker {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            channels: [ChannelState::default(); CHANNEL_COUNT],
            cooldown,
        }
    }

    pub fn channel(&self, channel: ChannelIndex) -> &ChannelState {
        &self.channels[channel.as_usize()]
    }

    pub fn is_available(&self, channel: ChannelIndex, now: Instant) -> bool {
        self.channel(channel).is_available(now)
    }

    /// Whether every channel is available.
    pub fn all_available(&self, now: Instant) -> bool {
        self.channels.iter().all(|state| state.is_available(now))
    }

    /// Start an emission if the channel is idle.
    ///
    /// `send` runs only when the channel is available, and the channel's
    /// timestamps are updated only if it succeeds. A busy channel yields
    /// [`StartDecision::CoolingDown`] without calling `send`.
    ///
    /// # Errors
    ///
    /// Returns whatever `send` returns; the channel is left untouched.
    pub fn try_start<F>(
        &mut self,
        channel: ChannelIndex,
        duration: Duration,
        now: Instant,
        send: F,
    ) -> Result<StartDecision>
    where
        F: FnOnce() -> Result<()>,
    {
        let state = &mut self.channels[channel.as_usize()];
        if !state.is_available(now) {
            return Ok(StartDecision::CoolingDown {
                remaining: state.remaining(now),
            });
        }

        send()?;

        let emission_end = now + duration;
        let cooldown_end = emission_end + self.cooldown;
        *state = ChannelState {
            emission_end: Some(emission_end),
            cooldown_end: Some(cooldown_end),
            last_duration: duration,
        };
        Ok(StartDecision::Started { cooldown_end })
    }

    /// Forget every channel's timestamps.
    pub fn reset(&mut self) {
        self.channels = [ChannelState::default(); CHANNEL_COUNT];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use olfactory_core::Error;
    use rstest::rstest;

    const COOLDOWN: Duration = Duration::from_secs(6);

    fn ch(i: u8) -> ChannelIndex {
        ChannelIndex::new(i).unwrap()
    }

    #[test]
    fn test_never_emitted_is_available() {
        let tracker = AvailabilityTracker::new(COOLDOWN);
        let now = Instant::now();

        for channel in ChannelIndex::all() {
            assert!(tracker.is_available(channel, now));
            assert_eq!(tracker.channel(channel).phase(now), ChannelPhase::Idle);
        }
        assert!(tracker.all_available(now));
    }

    #[rstest]
    #[case(Duration::ZERO, ChannelPhase::Emitting, false)]
    #[case(Duration::from_millis(999), ChannelPhase::Emitting, false)]
    #[case(Duration::from_secs(1), ChannelPhase::Cooling, false)]
    #[case(Duration::from_millis(6999), ChannelPhase::Cooling, false)]
    #[case(Duration::from_secs(7), ChannelPhase::Idle, true)]
    fn test_phase_timeline(
        #[case] elapsed: Duration,
        #[case] phase: ChannelPhase,
        #[case] available: bool,
    ) {
        let mut tracker = AvailabilityTracker::new(COOLDOWN);
        let start = Instant::now();
        tracker
            .try_start(ch(0), Duration::from_secs(1), start, || Ok(()))
            .unwrap();

        let state = tracker.channel(ch(0));
        assert_eq!(state.phase(start + elapsed), phase);
        assert_eq!(state.is_available(start + elapsed), available);
    }

    #[test]
    fn test_busy_channel_rejects_softly() {
        let mut tracker = AvailabilityTracker::new(COOLDOWN);
        let start = Instant::now();
        tracker
            .try_start(ch(1), Duration::from_secs(1), start, || Ok(()))
            .unwrap();

        let mut sent = false;
        let later = start + Duration::from_secs(2);
        let decision = tracker
            .try_start(ch(1), Duration::from_secs(3), later, || {
                sent = true;
                Ok(())
            })
            .unwrap();

        assert!(!sent);
        assert_eq!(
            decision,
            StartDecision::CoolingDown {
                remaining: Duration::from_secs(5)
            }
        );
        assert_eq!(tracker.channel(ch(1)).last_duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_channels_are_independent() {
        let mut tracker = AvailabilityTracker::new(COOLDOWN);
        let now = Instant::now();
        tracker
            .try_start(ch(0), Duration::from_secs(1), now, || Ok(()))
            .unwrap();

        assert!(!tracker.is_available(ch(0), now));
        assert!(tracker.is_available(ch(1), now));
        assert!(!tracker.all_available(now));

        let decision = tracker
            .try_start(ch(1), Duration::from_secs(1), now, || Ok(()))
            .unwrap();
        assert!(decision.started());
    }

    #[test]
    fn test_failed_send_leaves_state_untouched() {
        let mut tracker = AvailabilityTracker::new(COOLDOWN);
        let now = Instant::now();

        let result = tracker.try_start(ch(2), Duration::from_secs(1), now, || {
            Err(Error::transmit_failed("dev", "broken pipe"))
        });

        assert!(matches!(result, Err(Error::TransmitFailed { .. })));
        assert!(tracker.is_available(ch(2), now));
    }

    #[test]
    fn test_reset_clears_every_channel() {
        let mut tracker = AvailabilityTracker::new(COOLDOWN);
        let now = Instant::now();
        for channel in ChannelIndex::all() {
            tracker
                .try_start(channel, Duration::from_secs(10), now, || Ok(()))
                .unwrap();
        }
        assert!(!tracker.all_available(now));

        tracker.reset();
        assert!(tracker.all_available(now));
    }
}
