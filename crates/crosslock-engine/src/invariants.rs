//! # Domain Invariants
//!
//! Cross-field rules for swap orders. Checked at order creation and
//! re-checked by the test suite against arbitrary schedules.

use crate::secret::verify_secret;
use crate::timelock::validate_schedule;
use crosslock_types::{Amount, SwapError, SwapOrder, TimelockSchedule};

/// A swap must cross chains.
pub fn invariant_chains_distinct(order: &SwapOrder) -> Result<(), SwapError> {
    if order.src_chain == order.dst_chain {
        return Err(SwapError::Validation(format!(
            "src and dst chain must differ (both {})",
            order.src_chain
        )));
    }
    Ok(())
}

/// The committed hashlock must be SHA-256 of the order secret, and the
/// same for every part.
pub fn invariant_secret_binding(order: &SwapOrder) -> Result<(), SwapError> {
    if !verify_secret(&order.secret, &order.secret_hash) {
        return Err(SwapError::InvalidSecret);
    }
    for part in &order.fill_parts {
        if !verify_secret(&part.secret, &part.secret_hash) {
            return Err(SwapError::InvalidSecret);
        }
    }
    Ok(())
}

/// `dst_cancellation < src_cancellation`, plus intra-side ordering.
pub fn invariant_timelock_asymmetry(schedule: &TimelockSchedule) -> Result<(), SwapError> {
    validate_schedule(schedule)
}

/// Part amounts must sum exactly to the whole, with unique part ids.
pub fn invariant_parts_sum(order: &SwapOrder) -> Result<(), SwapError> {
    if order.fill_parts.is_empty() {
        return Ok(());
    }

    let mut seen = std::collections::HashSet::new();
    for part in &order.fill_parts {
        if !seen.insert(part.part_id) {
            return Err(SwapError::Validation(format!(
                "duplicate part id {}",
                part.part_id
            )));
        }
    }

    let src_sum = order
        .fill_parts
        .iter()
        .fold(Amount::zero(), |acc, p| acc.saturating_add(p.src_amount));
    if src_sum != order.src_amount {
        return Err(SwapError::Validation(format!(
            "part amounts sum to {src_sum}, order is {}",
            order.src_amount
        )));
    }

    let dst_sum = order
        .fill_parts
        .iter()
        .fold(Amount::zero(), |acc, p| acc.saturating_add(p.dst_amount));
    if dst_sum != order.dst_amount {
        return Err(SwapError::Validation(format!(
            "part dst amounts sum to {dst_sum}, order is {}",
            order.dst_amount
        )));
    }

    Ok(())
}
