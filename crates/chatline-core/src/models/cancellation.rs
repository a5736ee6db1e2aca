use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Lifecycle phase of the most recently started turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    UserMessageStaged,
    AwaitingFirstByte,
    Streaming,
    Aborted,
    Failed,
    Finalizing,
}

/// Handle held by a running turn.
///
/// The ticket identifies the turn so that a turn which was cancelled (and
/// possibly superseded by a newer one) cannot clear the newer turn's
/// in-flight flag or phase when it finalizes.
#[derive(Debug, Clone)]
pub struct TurnTicket {
    serial: u64,
    token: CancellationToken,
}

impl TurnTicket {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

struct TurnState {
    token: CancellationToken,
    in_flight: Option<u64>,
    phase_owner: u64,
    phase: TurnPhase,
    next_serial: u64,
}

/// Owns the in-flight flag and the single live cancellation token.
///
/// Exactly one token is live at a time. `cancel` trips it, clears the
/// in-flight flag and swaps in a fresh token for the next turn.
pub struct CancellationController {
    state: Mutex<TurnState>,
}

impl CancellationController {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TurnState {
                token: CancellationToken::new(),
                in_flight: None,
                phase_owner: 0,
                phase: TurnPhase::Idle,
                next_serial: 1,
            }),
        }
    }

    /// Mark a turn as in flight. Returns `None` if another turn already is.
    pub fn begin_turn(&self) -> Option<TurnTicket> {
        let mut state = self.state.lock();
        if state.in_flight.is_some() {
            return None;
        }

        let serial = state.next_serial;
        state.next_serial += 1;
        state.in_flight = Some(serial);
        state.phase_owner = serial;
        state.phase = TurnPhase::Idle;

        debug!(turn = serial, "Turn started");
        Some(TurnTicket {
            serial,
            token: state.token.clone(),
        })
    }

    /// Clear the in-flight flag if `ticket` still owns it
    pub fn finish_turn(&self, ticket: &TurnTicket) {
        let mut state = self.state.lock();
        if state.in_flight == Some(ticket.serial) {
            state.in_flight = None;
            debug!(turn = ticket.serial, "Turn released in-flight flag");
        }
    }

    /// Abort whatever holds the current token and reset for the next turn.
    ///
    /// Never fails, even when no turn is listening.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        state.token.cancel();
        state.token = CancellationToken::new();
        if let Some(serial) = state.in_flight.take() {
            debug!(turn = serial, "Turn cancelled");
        }
    }

    pub fn is_handling(&self) -> bool {
        self.state.lock().in_flight.is_some()
    }

    /// Clone of the live token
    pub fn current_token(&self) -> CancellationToken {
        self.state.lock().token.clone()
    }

    /// Record a phase transition for `ticket`; ignored once a newer turn started
    pub fn advance(&self, ticket: &TurnTicket, phase: TurnPhase) {
        let mut state = self.state.lock();
        if state.phase_owner == ticket.serial {
            state.phase = phase;
        }
    }

    pub fn phase(&self) -> TurnPhase {
        self.state.lock().phase
    }
}

impl Default for CancellationController {
    fn default() -> Self {
        Self::new()
    }
}
