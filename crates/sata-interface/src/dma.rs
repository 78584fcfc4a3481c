//! Per-direction DMA timelines.
//!
//! Each direction is a single channel: a transfer occupies it for its full link latency, and a
//! transfer issued while the channel is busy starts exactly when the previous one ends. Reads and
//! writes never wait for each other.

use crate::Tick;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DmaDirection {
    /// Memory -> device.
    Read,
    /// Device -> memory.
    Write,
}

/// Where a scheduled transfer landed on its timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DmaSlot {
    /// Time the transfer starts occupying the channel.
    pub begin: Tick,
    /// Time the transfer's effects become visible.
    pub end: Tick,
    /// Queueing delay past the requested issue time (zero when the channel was free).
    pub wait: Tick,
    /// Time the channel sat idle before `begin` (zero when backlogged).
    pub idle: Tick,
}

impl DmaSlot {
    pub fn latency(&self) -> Tick {
        self.end - self.begin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DmaTimeline {
    last_end: Tick,
}

impl DmaTimeline {
    pub const fn new() -> Self {
        Self { last_end: 0 }
    }

    /// Time the most recently scheduled transfer completes.
    pub fn last_end(&self) -> Tick {
        self.last_end
    }

    pub fn reset(&mut self) {
        self.last_end = 0;
    }

    /// Schedules a transfer occupying the channel for `latency`.
    ///
    /// `tick` is the earliest issue time the caller allows, or zero for "as soon as the channel
    /// is free". On return it holds the slot's end time so consecutive calls chain.
    pub fn schedule(&mut self, latency: Tick, tick: &mut Tick) -> DmaSlot {
        if *tick == 0 {
            *tick = self.last_end;
        }
        let requested = *tick;

        let slot = if self.last_end <= requested {
            let idle = requested - self.last_end;
            self.last_end = requested.saturating_add(latency);
            DmaSlot {
                begin: requested,
                end: self.last_end,
                wait: 0,
                idle,
            }
        } else {
            let begin = self.last_end;
            self.last_end = begin.saturating_add(latency);
            DmaSlot {
                begin,
                end: self.last_end,
                wait: begin - requested,
                idle: 0,
            }
        };

        *tick = slot.end;
        slot
    }
}
