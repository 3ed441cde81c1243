//! Random Access handling: pending RAR tracking with a bounded response
//! window, RA-RNTI derivation, and Msg3 retransmission scheduling.
//!
//! Grounded on `lib/scheduler/common_scheduling/ra_scheduler.h`'s design: a
//! small table of in-flight RA procedures, each identified by the RA-RNTI
//! its preamble detection hashed to, carrying a temporary C-RNTI until Msg3
//! either succeeds (the UE graduates to a real UE context) or the RAR
//! window expires (the attempt is dropped).

use common::types::{Rnti, SlotPoint};
use tracing::{debug, warn};

/// 3GPP TS 38.321 §5.1.3 RA-RNTI derivation from the PRACH occasion the
/// preamble was detected in.
pub fn ra_rnti(symbol_index: u8, slot_index: u16, freq_domain_index: u8, ul_carrier_id: u8) -> Rnti {
    let value = 1u32
        + symbol_index as u32
        + 14 * slot_index as u32
        + 14 * 80 * freq_domain_index as u32
        + 14 * 80 * 8 * ul_carrier_id as u32;
    Rnti::new((value & 0xFFFF) as u16)
}

/// One in-flight random access procedure between preamble detection and
/// either Msg3 success or RAR-window expiry.
#[derive(Debug, Clone)]
pub struct PendingRa {
    pub ra_rnti: Rnti,
    pub preamble_id: u8,
    pub tc_rnti: Rnti,
    pub timing_advance: u16,
    /// Absolute slot count the preamble was detected in; the RAR window is
    /// measured from here.
    detected_at_slot: u64,
    msg3_retx_count: u8,
}

/// Tracks all pending RA procedures for one cell.
pub struct RaManager {
    pending: Vec<PendingRa>,
    next_tc_rnti: u16,
    rar_window_slots: u64,
    max_msg3_retx: u8,
}

impl RaManager {
    pub fn new(rar_window_slots: u64, max_msg3_retx: u8) -> Self {
        Self {
            pending: Vec::new(),
            // Temporary C-RNTIs are drawn from a range disjoint from normal
            // C-RNTI allocation (0xFFF1-0xFFFD reserved per 3GPP; here we use
            // a simple rolling counter starting above typical C-RNTI space).
            next_tc_rnti: 0x4601,
            rar_window_slots,
            max_msg3_retx,
        }
    }

    /// Register a newly detected preamble and allocate it a TC-RNTI.
    pub fn register_preamble(
        &mut self,
        preamble_id: u8,
        timing_advance: u16,
        now_slot: u64,
        symbol_index: u8,
        slot_index: u16,
        freq_domain_index: u8,
    ) -> PendingRa {
        let rnti = ra_rnti(symbol_index, slot_index, freq_domain_index, 0);
        let tc_rnti = Rnti::new(self.next_tc_rnti);
        self.next_tc_rnti = self.next_tc_rnti.wrapping_add(1).max(0x4601);

        let entry = PendingRa {
            ra_rnti: rnti,
            preamble_id,
            tc_rnti,
            timing_advance,
            detected_at_slot: now_slot,
            msg3_retx_count: 0,
        };
        debug!(ra_rnti = %rnti, tc_rnti = %tc_rnti, "registered RA preamble");
        self.pending.push(entry.clone());
        entry
    }

    /// Msg3 CRC passed: the procedure completes and is removed from tracking.
    pub fn complete(&mut self, tc_rnti: Rnti) -> Option<PendingRa> {
        let idx = self.pending.iter().position(|p| p.tc_rnti == tc_rnti)?;
        Some(self.pending.remove(idx))
    }

    /// Msg3 CRC failed: retry, or abandon after `max_msg3_retx`.
    pub fn msg3_failed(&mut self, tc_rnti: Rnti) -> Msg3Outcome {
        let Some(p) = self.pending.iter_mut().find(|p| p.tc_rnti == tc_rnti) else {
            return Msg3Outcome::Unknown;
        };
        p.msg3_retx_count += 1;
        if p.msg3_retx_count > self.max_msg3_retx {
            self.pending.retain(|p| p.tc_rnti != tc_rnti);
            Msg3Outcome::Abandoned
        } else {
            Msg3Outcome::Retry
        }
    }

    /// Drop any pending procedure whose RAR window has expired without a
    /// Msg3 grant being scheduled. Per spec, an expired window is not an
    /// error; the preamble is simply forgotten and the UE is expected to
    /// retry from scratch.
    pub fn expire_stale(&mut self, now_slot: u64) -> Vec<PendingRa> {
        let (expired, kept): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|p| now_slot.saturating_sub(p.detected_at_slot) > self.rar_window_slots);
        self.pending = kept;
        if !expired.is_empty() {
            warn!(count = expired.len(), "RAR window(s) expired without Msg3 completion");
        }
        expired
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Msg3Outcome {
    Retry,
    Abandoned,
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_complete() {
        let mut ra = RaManager::new(10, 3);
        let p = ra.register_preamble(5, 100, 0, 0, 0, 0);
        assert_eq!(ra.pending_count(), 1);
        assert!(ra.complete(p.tc_rnti).is_some());
        assert_eq!(ra.pending_count(), 0);
    }

    #[test]
    fn test_msg3_retries_then_abandons() {
        let mut ra = RaManager::new(10, 2);
        let p = ra.register_preamble(5, 100, 0, 0, 0, 0);
        assert_eq!(ra.msg3_failed(p.tc_rnti), Msg3Outcome::Retry);
        assert_eq!(ra.msg3_failed(p.tc_rnti), Msg3Outcome::Retry);
        assert_eq!(ra.msg3_failed(p.tc_rnti), Msg3Outcome::Abandoned);
        assert_eq!(ra.pending_count(), 0);
    }

    #[test]
    fn test_expire_stale_drops_old_entries() {
        let mut ra = RaManager::new(5, 3);
        let _p = ra.register_preamble(5, 100, 0, 0, 0, 0);
        assert!(ra.expire_stale(3).is_empty());
        let expired = ra.expire_stale(10);
        assert_eq!(expired.len(), 1);
        assert_eq!(ra.pending_count(), 0);
    }

    #[test]
    fn test_ra_rnti_formula() {
        let r = ra_rnti(0, 0, 0, 0);
        assert_eq!(r.value(), 1);
    }
}
