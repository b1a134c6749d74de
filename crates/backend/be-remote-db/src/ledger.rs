//! Payment ledger state machine.
//!
//! ```text
//! Pending(0) --create--> Created(1) --perform--> Performed(2)
//!     |                      |
//!     +-------cancel---------+--> Canceled(-1)
//! ```
//!
//! `Performed` and `Canceled` are terminal. Replaying the event that led into
//! a terminal state is reported as [`Transition::Replay`] so callers can answer
//! the gateway without touching the row or re-applying the purchase effect.

use crate::types::Payment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[repr(i16)]
pub enum PaymentState {
    Canceled = -1,
    Pending = 0,
    Created = 1,
    Performed = 2,
}

impl PaymentState {
    pub fn code(self) -> i16 {
        self as i16
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PaymentState::Performed | PaymentState::Canceled)
    }

    pub fn on(self, event: LedgerEvent) -> Transition {
        use LedgerEvent::*;
        use PaymentState::*;

        match (self, event) {
            // A repeated create only refreshes the gateway transaction id.
            (Pending | Created, Create) => Transition::Advance { to: Created },
            (Performed | Canceled, Create) => Transition::Refused,

            (Pending | Created, Perform) => Transition::Advance { to: Performed },
            (Performed, Perform) => Transition::Replay,
            (Canceled, Perform) => Transition::Refused,

            (Pending | Created, Cancel) => Transition::Advance { to: Canceled },
            (Canceled, Cancel) => Transition::Replay,
            (Performed, Cancel) => Transition::Refused,
        }
    }
}

impl std::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentState::Canceled => write!(f, "canceled"),
            PaymentState::Pending => write!(f, "pending"),
            PaymentState::Created => write!(f, "created"),
            PaymentState::Performed => write!(f, "performed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEvent {
    Create,
    Perform,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Advance { to: PaymentState },
    Replay,
    Refused,
}

/// Result of driving one ledger event against a stored payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerOutcome {
    /// The row moved (or was refreshed) and any purchase effect was applied.
    Applied(Payment),
    /// The payment already sits in the state this event leads to.
    Replayed(Payment),
    /// The event is not allowed from the stored state; nothing was written.
    Refused(Payment),
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;
    use LedgerEvent::*;
    use PaymentState::*;

    #[test]
    fn state_codes_match_gateway_protocol() {
        assert_eq!(Canceled.code(), -1);
        assert_eq!(Pending.code(), 0);
        assert_eq!(Created.code(), 1);
        assert_eq!(Performed.code(), 2);
    }

    #[test]
    fn happy_path_advances() {
        assert_eq!(Pending.on(Create), Transition::Advance { to: Created });
        assert_eq!(Created.on(Perform), Transition::Advance { to: Performed });
    }

    #[test]
    fn repeated_create_stays_created() {
        assert_eq!(Created.on(Create), Transition::Advance { to: Created });
    }

    #[test]
    fn perform_is_idempotent() {
        assert_eq!(Performed.on(Perform), Transition::Replay);
    }

    #[test]
    fn terminal_states_never_leave() {
        for event in [Create, Perform, Cancel] {
            for state in [Performed, Canceled] {
                assert!(
                    !matches!(state.on(event), Transition::Advance { .. }),
                    "{state} must not advance on {event:?}"
                );
            }
        }
    }

    #[test]
    fn cancel_from_open_states() {
        assert_eq!(Pending.on(Cancel), Transition::Advance { to: Canceled });
        assert_eq!(Created.on(Cancel), Transition::Advance { to: Canceled });
        assert_eq!(Canceled.on(Cancel), Transition::Replay);
        assert_eq!(Performed.on(Cancel), Transition::Refused);
    }

    #[test]
    fn perform_after_cancel_is_refused() {
        assert_eq!(Canceled.on(Perform), Transition::Refused);
        assert_eq!(Canceled.on(Create), Transition::Refused);
    }
}
