//! # Timelock Scheduler
//!
//! Deadline math for both escrow legs. All predicates compare against
//! chain block timestamps supplied by the caller; host wall clock never
//! participates.
//!
//! The schedule is asymmetric: `dst_cancellation < src_cancellation`.
//! By the time the source side becomes cancellable, the destination
//! side has either been claimed (the secret is public, so the source
//! can still be claimed too) or refunded.

use crosslock_types::{EscrowRecord, EscrowSide, SwapError, TimelockSchedule};

/// Default schedule, in seconds relative to each side's lock time.
///
/// The 10-second withdrawal offsets are the finality locks; the wide
/// gap between `dst_cancellation` and `src_cancellation` is the
/// maker-safety margin.
pub fn default_schedule() -> TimelockSchedule {
    TimelockSchedule {
        src_withdrawal: 10,
        src_public_withdrawal: 120,
        src_cancellation: 180,
        src_public_cancellation: 240,
        dst_withdrawal: 10,
        dst_public_withdrawal: 100,
        dst_cancellation: 120,
    }
}

/// Validate schedule ordering.
///
/// Within each side the offsets must be strictly increasing, and the
/// destination must become cancellable before the source does.
pub fn validate_schedule(schedule: &TimelockSchedule) -> Result<(), SwapError> {
    let src_ordered = schedule.src_withdrawal < schedule.src_public_withdrawal
        && schedule.src_public_withdrawal < schedule.src_cancellation
        && schedule.src_cancellation < schedule.src_public_cancellation;
    if !src_ordered {
        return Err(SwapError::Validation(
            "src timelock offsets must be strictly increasing".to_string(),
        ));
    }

    let dst_ordered = schedule.dst_withdrawal < schedule.dst_public_withdrawal
        && schedule.dst_public_withdrawal < schedule.dst_cancellation;
    if !dst_ordered {
        return Err(SwapError::Validation(
            "dst timelock offsets must be strictly increasing".to_string(),
        ));
    }

    if schedule.dst_cancellation >= schedule.src_cancellation {
        return Err(SwapError::Validation(format!(
            "dst_cancellation ({}) must precede src_cancellation ({})",
            schedule.dst_cancellation, schedule.src_cancellation
        )));
    }

    Ok(())
}

/// Scale every offset by `factor`. Used by test configs to compress
/// the schedule without disturbing its ordering.
pub fn scale_schedule(schedule: &TimelockSchedule, factor: u64) -> TimelockSchedule {
    TimelockSchedule {
        src_withdrawal: schedule.src_withdrawal * factor,
        src_public_withdrawal: schedule.src_public_withdrawal * factor,
        src_cancellation: schedule.src_cancellation * factor,
        src_public_cancellation: schedule.src_public_cancellation * factor,
        dst_withdrawal: schedule.dst_withdrawal * factor,
        dst_public_withdrawal: schedule.dst_public_withdrawal * factor,
        dst_cancellation: schedule.dst_cancellation * factor,
    }
}

fn withdrawal_offset(schedule: &TimelockSchedule, side: EscrowSide) -> u64 {
    match side {
        EscrowSide::Src => schedule.src_withdrawal,
        EscrowSide::Dst => schedule.dst_withdrawal,
    }
}

fn public_withdrawal_offset(schedule: &TimelockSchedule, side: EscrowSide) -> u64 {
    match side {
        EscrowSide::Src => schedule.src_public_withdrawal,
        EscrowSide::Dst => schedule.dst_public_withdrawal,
    }
}

fn cancellation_offset(schedule: &TimelockSchedule, side: EscrowSide) -> u64 {
    match side {
        EscrowSide::Src => schedule.src_cancellation,
        EscrowSide::Dst => schedule.dst_cancellation,
    }
}

/// Earliest chain timestamp at which the designated receiver may claim.
pub fn claimable_at(schedule: &TimelockSchedule, escrow: &EscrowRecord) -> u64 {
    escrow.deploy_time + withdrawal_offset(schedule, escrow.side)
}

/// Earliest chain timestamp at which the sender may refund.
pub fn refundable_at(schedule: &TimelockSchedule, escrow: &EscrowRecord) -> u64 {
    escrow.deploy_time + cancellation_offset(schedule, escrow.side)
}

/// Whether the finality lock has elapsed and a claim is permitted,
/// measured against `chain_now` (the escrow chain's block timestamp).
pub fn can_claim(schedule: &TimelockSchedule, escrow: &EscrowRecord, chain_now: u64) -> bool {
    chain_now >= claimable_at(schedule, escrow)
}

/// Whether anyone (not only the designated receiver) may claim with
/// the revealed secret.
pub fn can_publicly_claim(
    schedule: &TimelockSchedule,
    escrow: &EscrowRecord,
    chain_now: u64,
) -> bool {
    chain_now >= escrow.deploy_time + public_withdrawal_offset(schedule, escrow.side)
}

/// Whether the side's cancellation deadline has passed and a refund is
/// permitted.
pub fn can_refund(schedule: &TimelockSchedule, escrow: &EscrowRecord, chain_now: u64) -> bool {
    chain_now >= refundable_at(schedule, escrow)
}

/// Whether anyone may refund the source side (griefing disincentive).
/// Only the source schedule carries a public-cancellation stage.
pub fn should_publicly_refund(
    schedule: &TimelockSchedule,
    escrow: &EscrowRecord,
    chain_now: u64,
) -> bool {
    match escrow.side {
        EscrowSide::Src => chain_now >= escrow.deploy_time + schedule.src_public_cancellation,
        EscrowSide::Dst => false,
    }
}
