//! Single-slot in-flight tracker
//!
//! At most one sync round runs per record. A request that arrives while a
//! round is running is remembered (depth one) and the running loop does one
//! more round against the latest local snapshot when it finishes. Requests
//! are never interleaved and never dropped: if the running loop is cancelled
//! with a request queued, the request stays pending for the next `begin`.

use parking_lot::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlotState {
    Idle,
    /// Idle, but a queued request outlived a cancelled loop
    Pending,
    InFlight,
    InFlightQueued,
}

/// Result of finishing one round
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// Nothing was queued; the slot is idle again
    Done,
    /// A request arrived mid-round; run another round
    RunAgain,
}

#[derive(Debug)]
pub struct SyncSlot {
    state: Mutex<SlotState>,
}

impl SyncSlot {
    pub fn new() -> Self {
        SyncSlot {
            state: Mutex::new(SlotState::Idle),
        }
    }

    /// Claim the slot. Returns `None` if a round is already running, in
    /// which case the request has been queued on that round.
    pub fn begin(&self) -> Option<SlotRun<'_>> {
        let mut state = self.state.lock();
        match *state {
            SlotState::Idle | SlotState::Pending => {
                *state = SlotState::InFlight;
                Some(SlotRun {
                    slot: self,
                    finished: false,
                })
            }
            SlotState::InFlight | SlotState::InFlightQueued => {
                *state = SlotState::InFlightQueued;
                None
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(
            *self.state.lock(),
            SlotState::InFlight | SlotState::InFlightQueued
        )
    }

    /// A request is waiting for a round, running or not
    pub fn has_queued(&self) -> bool {
        matches!(
            *self.state.lock(),
            SlotState::InFlightQueued | SlotState::Pending
        )
    }
}

impl Default for SyncSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Ownership of the slot for one sync loop.
/// Dropping it without completing (e.g. a cancelled future) frees the slot;
/// a request queued on it is kept as pending.
#[must_use]
#[derive(Debug)]
pub struct SlotRun<'a> {
    slot: &'a SyncSlot,
    finished: bool,
}

impl SlotRun<'_> {
    /// Finish the current round
    pub fn complete(&mut self) -> Completion {
        let mut state = self.slot.state.lock();
        match *state {
            SlotState::InFlightQueued => {
                *state = SlotState::InFlight;
                Completion::RunAgain
            }
            _ => {
                *state = SlotState::Idle;
                self.finished = true;
                Completion::Done
            }
        }
    }
}

impl Drop for SlotRun<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let mut state = self.slot.state.lock();
            *state = match *state {
                SlotState::InFlightQueued => SlotState::Pending,
                _ => SlotState::Idle,
            };
        }
    }
}
