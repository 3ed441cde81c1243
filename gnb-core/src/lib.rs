//! Slot-synchronous gNodeB scheduler core.
//!
//! Owns the per-cell resource grid, HARQ retransmission state, PDCCH
//! candidate allocation, the UE scheduler's ordered passes, and the RRC
//! mobility/fallback controller. Everything here is driven cooperatively by
//! slot-timing ticks delivered from the PHY (see `interfaces`); there is no
//! internal threading or global mutable state; each cell owns its own state
//! and is only ever touched by the task driving its slot ticks.

pub mod grid;
pub mod harq;
pub mod pdcch;
pub mod ue;
pub mod mac;
pub mod rrc;
pub mod ngap;

use thiserror::Error;

/// Errors raised by the scheduler core.
///
/// Transient and resource-exhaustion conditions (no free HARQ process, no
/// free PDCCH candidate, grid already booked) are deliberately *not*
/// represented here — they are `Ok(None)` / skip-this-UE-this-slot, per the
/// propagation policy: only UE-scope, cell-scope, and invariant-violation
/// failures get a typed error.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("unknown UE index: {0}")]
    UnknownUe(u32),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("UE radio link failure: ue={0}")]
    RadioLinkFailure(u32),

    #[error("scheduler invariant violated: {0}")]
    InvariantViolation(String),
}
