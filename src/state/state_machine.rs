use thiserror::Error;

use crate::dao::models::RoomStatus;

/// Events that move a room between lifecycle statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomEvent {
    /// A second player attached to the room.
    GuestJoined,
    /// The game begins and the first question is drawn.
    StartGame,
    /// A party lost its connection.
    Pause,
    /// The disconnected party came back.
    Resume,
    /// The game is over, whatever the reason.
    EndGame,
}

/// Outcome of feeding an event to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Move to the given status.
    To(RoomStatus),
    /// The event does not apply in this status and must be ignored without touching the room.
    Ignore,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while {from:?}")]
pub struct InvalidTransition {
    /// The status the room was in when the invalid event was received.
    pub from: RoomStatus,
    /// The event that cannot be applied from this status.
    pub event: RoomEvent,
}

/// Compute the transition triggered by `event` in `from`.
///
/// Connectivity signals (pause, resume) and repeated end requests arrive duplicated or out of
/// order from the transport, so they resolve to [`Transition::Ignore`] outside the status they
/// apply to. Player-driven events are rejected instead.
pub fn compute_transition(
    from: RoomStatus,
    event: RoomEvent,
) -> Result<Transition, InvalidTransition> {
    use RoomStatus::*;

    let next = match (from, event) {
        (Waiting, RoomEvent::GuestJoined) => Transition::To(Ready),
        (Waiting | Ready, RoomEvent::StartGame) => Transition::To(Playing),
        (Playing, RoomEvent::Pause) => Transition::To(Paused),
        (_, RoomEvent::Pause) => Transition::Ignore,
        (Paused, RoomEvent::Resume) => Transition::To(Playing),
        (_, RoomEvent::Resume) => Transition::Ignore,
        (Finished, RoomEvent::EndGame) => Transition::Ignore,
        (_, RoomEvent::EndGame) => Transition::To(Finished),
        (from, event) => return Err(InvalidTransition { from, event }),
    };

    Ok(next)
}
