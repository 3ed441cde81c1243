//! Per-UE HARQ retransmission bookkeeping for DL and UL processes.
//!
//! Each UE owns a fixed pool of HARQ processes per direction (3GPP allows up
//! to 16). A process cycles: empty -> waiting for ACK/CRC -> either freed
//! (success, or abandoned after `max_retx`) or re-armed for retransmission
//! (failure). Timeouts are treated as a NACK rather than left pending
//! forever, so a lost feedback message can never strand a process.

use std::collections::HashMap;
use tracing::{debug, warn};

pub type HarqProcessId = u8;

/// Outcome of a single feedback event (DL ACK/NACK or UL CRC).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackOutcome {
    Ack,
    Nack,
    /// Discontinuous transmission: no feedback detected. Treated as a NACK
    /// for retransmission purposes, but reported distinctly for metrics.
    Dtx,
}

/// What the caller (link adaptation / UE scheduler) should do after a
/// feedback event or timeout is applied to a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarqCompletion {
    /// The process succeeded; its grant parameters should feed link adaptation.
    Succeeded,
    /// The process failed but is still under `max_retx`; a retransmission
    /// grant with the same HARQ id should be scheduled.
    NeedsRetx,
    /// The process exhausted `max_retx`; it is now empty and link adaptation
    /// should be notified of the failure exactly once.
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessState {
    Empty,
    WaitingFeedback,
}

#[derive(Debug, Clone, Copy)]
struct HarqProcess {
    state: ProcessState,
    retx_count: u8,
    redundancy_version: u8,
    /// Absolute slot count at which the grant carried by this process was sent.
    sent_at_slot: u64,
    /// Number of transport blocks bundled into this process (1 or 2, for
    /// spatial-bundling ACK/NACK combination on a single PUCCH bit).
    num_tbs: u8,
    /// Per-TB pending ACK state, only meaningful while `num_tbs == 2`.
    tb_acked: [bool; 2],
    /// CQI the grant was scheduled at, recorded so a later CSI report can be
    /// compared against it to decide whether the channel has degraded
    /// sharply enough to cancel the pending retransmission (DL only).
    recorded_cqi: u8,
}

impl HarqProcess {
    fn empty() -> Self {
        Self {
            state: ProcessState::Empty,
            retx_count: 0,
            redundancy_version: 0,
            sent_at_slot: 0,
            num_tbs: 1,
            tb_acked: [false, false],
            recorded_cqi: 0,
        }
    }
}

/// A pool of HARQ processes for one UE, one direction.
struct HarqProcessPool {
    processes: Vec<HarqProcess>,
    max_retx: u8,
    /// Feedback timeout in slots; a process waiting longer than this without
    /// an ACK/NACK/CRC report is treated as NACK.
    timeout_slots: u64,
}

impl HarqProcessPool {
    fn new(num_processes: u8, max_retx: u8, timeout_slots: u64) -> Self {
        Self {
            processes: vec![HarqProcess::empty(); num_processes as usize],
            max_retx,
            timeout_slots,
        }
    }

    fn find_waiting(&self) -> Option<HarqProcessId> {
        self.processes
            .iter()
            .position(|p| p.state == ProcessState::WaitingFeedback)
            .map(|i| i as HarqProcessId)
    }

    fn allocate_new(&mut self, now_slot: u64, num_tbs: u8, cqi: u8) -> Option<HarqProcessId> {
        let idx = self.processes.iter().position(|p| p.state == ProcessState::Empty)?;
        self.processes[idx] = HarqProcess {
            state: ProcessState::WaitingFeedback,
            retx_count: 0,
            redundancy_version: 0,
            sent_at_slot: now_slot,
            num_tbs,
            tb_acked: [false, false],
            recorded_cqi: cqi,
        };
        Some(idx as HarqProcessId)
    }

    fn apply_feedback(&mut self, id: HarqProcessId, tb_index: u8, outcome: FeedbackOutcome) -> Option<HarqCompletion> {
        let p = self.processes.get_mut(id as usize)?;
        if p.state != ProcessState::WaitingFeedback {
            return None;
        }
        if outcome == FeedbackOutcome::Ack {
            p.tb_acked[tb_index.min(1) as usize] = true;
        }
        let all_acked = (0..p.num_tbs).all(|i| p.tb_acked[i as usize]);
        if all_acked {
            *p = HarqProcess::empty();
            return Some(HarqCompletion::Succeeded);
        }
        // NACK or DTX on any TB fails the bundle; decide retx vs abandon.
        p.retx_count += 1;
        if p.retx_count > self.max_retx {
            warn!(harq_id = id, retx = p.retx_count, "HARQ process abandoned after max retx");
            *p = HarqProcess::empty();
            return Some(HarqCompletion::Abandoned);
        }
        p.redundancy_version = next_redundancy_version(p.redundancy_version);
        Some(HarqCompletion::NeedsRetx)
    }

    fn check_timeouts(&mut self, now_slot: u64) -> Vec<(HarqProcessId, HarqCompletion)> {
        let mut completions = Vec::new();
        for (idx, p) in self.processes.iter_mut().enumerate() {
            if p.state == ProcessState::WaitingFeedback
                && now_slot.saturating_sub(p.sent_at_slot) > self.timeout_slots
            {
                debug!(harq_id = idx, "HARQ feedback timeout, treating as NACK");
                p.retx_count += 1;
                if p.retx_count > self.max_retx {
                    *p = HarqProcess::empty();
                    completions.push((idx as HarqProcessId, HarqCompletion::Abandoned));
                } else {
                    p.redundancy_version = next_redundancy_version(p.redundancy_version);
                    p.sent_at_slot = now_slot;
                    completions.push((idx as HarqProcessId, HarqCompletion::NeedsRetx));
                }
            }
        }
        completions
    }

    fn cancel(&mut self, id: HarqProcessId) {
        if let Some(p) = self.processes.get_mut(id as usize) {
            *p = HarqProcess::empty();
        }
    }

    fn cancel_all(&mut self) {
        for p in &mut self.processes {
            *p = HarqProcess::empty();
        }
    }

    /// Cancel every waiting process whose recorded CQI has dropped by at
    /// least `threshold` relative to `new_cqi`, returning their ids so the
    /// caller can re-queue the data for a fresh first transmission at the
    /// lower MCS (spec §4.2/§4.4: CQI/rank drop cancels in-flight retx).
    fn cancel_degraded(&mut self, new_cqi: u8, threshold: u8) -> Vec<HarqProcessId> {
        let mut cancelled = Vec::new();
        for (idx, p) in self.processes.iter_mut().enumerate() {
            if p.state == ProcessState::WaitingFeedback && p.recorded_cqi.saturating_sub(new_cqi) >= threshold {
                *p = HarqProcess::empty();
                cancelled.push(idx as HarqProcessId);
            }
        }
        cancelled
    }
}

/// RV sequence per 3GPP TS 38.212 Table 5.4.2.1-2: 0, 2, 3, 1.
fn next_redundancy_version(current: u8) -> u8 {
    match current {
        0 => 2,
        2 => 3,
        3 => 1,
        _ => 0,
    }
}

/// Per-UE DL and UL HARQ process pools.
pub struct UeHarqState {
    dl: HarqProcessPool,
    ul: HarqProcessPool,
}

impl UeHarqState {
    pub fn new(num_dl_processes: u8, num_ul_processes: u8, max_retx: u8, timeout_slots: u64) -> Self {
        Self {
            dl: HarqProcessPool::new(num_dl_processes, max_retx, timeout_slots),
            ul: HarqProcessPool::new(num_ul_processes, max_retx, timeout_slots),
        }
    }

    pub fn find_dl_waiting_ack(&self) -> Option<HarqProcessId> {
        self.dl.find_waiting()
    }

    pub fn find_ul_waiting_ack(&self) -> Option<HarqProcessId> {
        self.ul.find_waiting()
    }

    pub fn allocate_new_dl(&mut self, now_slot: u64, num_tbs: u8, cqi: u8) -> Option<HarqProcessId> {
        self.dl.allocate_new(now_slot, num_tbs, cqi)
    }

    pub fn allocate_new_ul(&mut self, now_slot: u64) -> Option<HarqProcessId> {
        self.ul.allocate_new(now_slot, 1, 0)
    }

    pub fn dl_ack_info(&mut self, id: HarqProcessId, tb_index: u8, outcome: FeedbackOutcome) -> Option<HarqCompletion> {
        self.dl.apply_feedback(id, tb_index, outcome)
    }

    pub fn ul_crc_info(&mut self, id: HarqProcessId, crc_ok: bool) -> Option<HarqCompletion> {
        let outcome = if crc_ok { FeedbackOutcome::Ack } else { FeedbackOutcome::Nack };
        self.ul.apply_feedback(id, 0, outcome)
    }

    pub fn check_dl_timeouts(&mut self, now_slot: u64) -> Vec<(HarqProcessId, HarqCompletion)> {
        self.dl.check_timeouts(now_slot)
    }

    pub fn check_ul_timeouts(&mut self, now_slot: u64) -> Vec<(HarqProcessId, HarqCompletion)> {
        self.ul.check_timeouts(now_slot)
    }

    /// Cancel all pending retransmissions, e.g. on a CQI/rank drop severe
    /// enough that the previously-chosen MCS/layer count is no longer valid.
    pub fn cancel_retxs(&mut self) {
        self.dl.cancel_all();
        self.ul.cancel_all();
    }

    pub fn cancel_dl(&mut self, id: HarqProcessId) {
        self.dl.cancel(id);
    }

    pub fn cancel_ul(&mut self, id: HarqProcessId) {
        self.ul.cancel(id);
    }

    /// CSI-report ingestion: cancel pending DL retransmissions whose
    /// recorded CQI has dropped sharply relative to `new_cqi` (spec §4.2).
    pub fn cancel_degraded_dl(&mut self, new_cqi: u8, threshold: u8) -> Vec<HarqProcessId> {
        self.dl.cancel_degraded(new_cqi, threshold)
    }
}

/// HARQ state for every UE in a cell, keyed by UE index.
#[derive(Default)]
pub struct HarqManager {
    ues: HashMap<u32, UeHarqState>,
}

impl HarqManager {
    pub fn new() -> Self {
        Self { ues: HashMap::new() }
    }

    pub fn add_ue(&mut self, ue_index: u32, num_dl: u8, num_ul: u8, max_retx: u8, timeout_slots: u64) {
        self.ues.insert(ue_index, UeHarqState::new(num_dl, num_ul, max_retx, timeout_slots));
    }

    pub fn remove_ue(&mut self, ue_index: u32) {
        self.ues.remove(&ue_index);
    }

    pub fn get_mut(&mut self, ue_index: u32) -> Option<&mut UeHarqState> {
        self.ues.get_mut(&ue_index)
    }

    pub fn get(&self, ue_index: u32) -> Option<&UeHarqState> {
        self.ues.get(&ue_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_tb_ack_frees_process() {
        let mut ue = UeHarqState::new(8, 8, 4, 8);
        let id = ue.allocate_new_dl(0, 1, 10).unwrap();
        assert_eq!(ue.find_dl_waiting_ack(), Some(id));
        let completion = ue.dl_ack_info(id, 0, FeedbackOutcome::Ack).unwrap();
        assert_eq!(completion, HarqCompletion::Succeeded);
        assert_eq!(ue.find_dl_waiting_ack(), None);
    }

    #[test]
    fn test_nack_triggers_retx_then_abandon() {
        let mut ue = UeHarqState::new(8, 8, 2, 8);
        let id = ue.allocate_new_dl(0, 1, 10).unwrap();
        assert_eq!(ue.dl_ack_info(id, 0, FeedbackOutcome::Nack), Some(HarqCompletion::NeedsRetx));
        assert_eq!(ue.dl_ack_info(id, 0, FeedbackOutcome::Nack), Some(HarqCompletion::NeedsRetx));
        assert_eq!(ue.dl_ack_info(id, 0, FeedbackOutcome::Nack), Some(HarqCompletion::Abandoned));
        assert_eq!(ue.find_dl_waiting_ack(), None);
    }

    #[test]
    fn test_spatial_bundling_requires_both_tbs_acked() {
        let mut ue = UeHarqState::new(8, 8, 4, 8);
        let id = ue.allocate_new_dl(0, 2, 10).unwrap();
        // Only TB0 acked: the bundle as a whole still fails and needs a retx.
        assert_eq!(ue.dl_ack_info(id, 0, FeedbackOutcome::Ack), Some(HarqCompletion::NeedsRetx));
        // TB1 now acked on the retransmission: the whole bundle succeeds.
        assert_eq!(ue.dl_ack_info(id, 1, FeedbackOutcome::Ack), Some(HarqCompletion::Succeeded));
    }

    #[test]
    fn test_timeout_treated_as_nack() {
        let mut ue = UeHarqState::new(8, 8, 4, 8);
        let id = ue.allocate_new_dl(0, 1, 10).unwrap();
        let completions = ue.check_dl_timeouts(100);
        assert_eq!(completions, vec![(id, HarqCompletion::NeedsRetx)]);
    }

    #[test]
    fn test_cancel_retxs_clears_all_pending() {
        let mut ue = UeHarqState::new(8, 8, 4, 8);
        let _ = ue.allocate_new_dl(0, 1, 10).unwrap();
        let _ = ue.allocate_new_ul(0).unwrap();
        ue.cancel_retxs();
        assert_eq!(ue.find_dl_waiting_ack(), None);
        assert_eq!(ue.find_ul_waiting_ack(), None);
    }

    /// Scenario: a DL HARQ process is waiting for feedback at CQI=12; a CSI
    /// report brings CQI down to 4 before the retransmission lands, which
    /// should cancel the process outright rather than retransmit blind at a
    /// now-invalid MCS.
    #[test]
    fn test_cqi_drop_cancels_degraded_retx() {
        let mut ue = UeHarqState::new(8, 8, 4, 8);
        let id = ue.allocate_new_dl(0, 1, 12).unwrap();
        let cancelled = ue.cancel_degraded_dl(4, 6);
        assert_eq!(cancelled, vec![id]);
        assert_eq!(ue.find_dl_waiting_ack(), None);
    }

    #[test]
    fn test_cqi_drop_below_threshold_does_not_cancel() {
        let mut ue = UeHarqState::new(8, 8, 4, 8);
        let id = ue.allocate_new_dl(0, 1, 12).unwrap();
        let cancelled = ue.cancel_degraded_dl(10, 6);
        assert!(cancelled.is_empty());
        assert_eq!(ue.find_dl_waiting_ack(), Some(id));
    }

    #[test]
    fn test_manager_tracks_per_ue_state() {
        let mut mgr = HarqManager::new();
        mgr.add_ue(7, 8, 8, 4, 8);
        assert!(mgr.get_mut(7).is_some());
        assert!(mgr.get_mut(8).is_none());
        mgr.remove_ue(7);
        assert!(mgr.get_mut(7).is_none());
    }
}
