//! # Swap State Machine
//!
//! Legal-edge enforcement for the swap lifecycle. A transition is an
//! atomic tuple of (new status, optional escrow metadata); the store
//! applies it under the order's key lock so observed status always
//! progresses along one legal path.

use crosslock_types::{EscrowRecord, EscrowSide, SwapError, SwapState, SwapStatus};

/// One atomic step through the state machine.
#[derive(Clone, Debug)]
pub struct Transition {
    /// Target status.
    pub to: SwapStatus,
    /// Escrow metadata recorded together with the status change.
    pub escrow: Option<EscrowRecord>,
}

impl Transition {
    /// Status-only transition.
    pub fn to(status: SwapStatus) -> Self {
        Self {
            to: status,
            escrow: None,
        }
    }

    /// Transition that also records an escrow.
    pub fn with_escrow(status: SwapStatus, escrow: EscrowRecord) -> Self {
        Self {
            to: status,
            escrow: Some(escrow),
        }
    }
}

/// Reject transitions outside the legal edge set.
pub fn guard_transition(from: SwapStatus, to: SwapStatus) -> Result<(), SwapError> {
    if !from.can_transition_to(to) {
        return Err(SwapError::IllegalTransition { from, to });
    }
    Ok(())
}

/// Apply a transition to the aggregate, attaching any escrow to the
/// side it belongs to. `now` is wall clock and only feeds
/// `updated_at`.
pub fn apply_transition(
    state: &mut SwapState,
    transition: Transition,
    now: u64,
) -> Result<(), SwapError> {
    guard_transition(state.status, transition.to)?;

    if let Some(escrow) = transition.escrow {
        match escrow.side {
            EscrowSide::Src => state.src_escrow = Some(escrow),
            EscrowSide::Dst => state.dst_escrow = Some(escrow),
        }
    }
    state.status = transition.to;
    state.updated_at = now;
    Ok(())
}

/// Apply a transition to one part of a partial-fill order.
///
/// Parts run the same edge set independently; a part reaching a
/// terminal state never alters its siblings.
pub fn apply_part_transition(
    state: &mut SwapState,
    part_id: u8,
    transition: Transition,
    now: u64,
) -> Result<(), SwapError> {
    let part = state
        .part_state_mut(part_id)
        .ok_or_else(|| SwapError::Validation(format!("unknown part id {part_id}")))?;

    guard_transition(part.status, transition.to)?;

    if let Some(escrow) = transition.escrow {
        match escrow.side {
            EscrowSide::Src => part.src_escrow = Some(escrow),
            EscrowSide::Dst => part.dst_escrow = Some(escrow),
        }
    }
    part.status = transition.to;
    match transition.to {
        SwapStatus::Completed => part.withdrawn = true,
        SwapStatus::Cancelled => part.cancelled = true,
        _ => {}
    }
    state.updated_at = now;
    Ok(())
}
