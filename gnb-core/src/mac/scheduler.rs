//! The UE scheduler: the four ordered per-slot passes that decide what gets
//! transmitted this slot (system signals & RA, DL UE selection, UL UE
//! selection, UCI placement), plus the link adaptation and power control
//! bookkeeping that feeds grant parameters.
//!
//! Passes run strictly in this order because each commits resources to the
//! shared [`ResourceGrid`] that later passes must treat as already booked:
//! broadcast/RA traffic gets first claim on the grid (it can't be delayed
//! without breaking UE cell search), then DL data, then UL data, then UCI
//! feedback placement for whatever HARQ processes are now due for feedback.

use super::sib1::{Sib1Config, Sib1Generator};
use crate::grid::{Direction, ResourceGrid};
use crate::harq::{FeedbackOutcome, HarqCompletion, HarqManager};
use crate::mac::ra::RaManager;
use crate::pdcch::{allocate_pdcch, CoresetLayout, PdcchCandidate};
use crate::ue::{UeActivityState, UeContext};
use crate::CoreError;
use common::types::{Bandwidth, CellId, RbInterval, Rnti, SlotPoint, SubcarrierSpacing, SymbolRange};
use interfaces::sched_result::{
    DciDlInfo, DciUlInfo, PdcchAllocation, PdcchDlInfo, PdschInfo, PucchFormat, PucchInfo, PuschInfo,
    SchedResult,
};

fn to_pdcch_allocation(candidate: PdcchCandidate, rnti: Rnti) -> PdcchAllocation {
    PdcchAllocation {
        rnti,
        aggregation_level: candidate.aggregation_level,
        candidate_index: candidate.candidate_index,
        cce_start: candidate.cce_start,
    }
}
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info, warn};

/// CORESET#0 configuration based on 3GPP TS 38.213
#[derive(Debug, Clone, Copy)]
pub struct Coreset0Config {
    pub num_rbs: u32,
    pub num_symbols: u32,
    pub rb_offset: u32,
}

impl Coreset0Config {
    /// CORESET#0 configuration from table index (3GPP TS 38.213 Table 13-1,
    /// {15, 15} kHz SCS subset).
    pub fn from_index(index: u8) -> Result<Self, CoreError> {
        let config = match index {
            0 => Self { num_rbs: 24, num_symbols: 2, rb_offset: 0 },
            1 => Self { num_rbs: 24, num_symbols: 2, rb_offset: 2 },
            2 => Self { num_rbs: 24, num_symbols: 2, rb_offset: 4 },
            3 => Self { num_rbs: 24, num_symbols: 3, rb_offset: 0 },
            4 => Self { num_rbs: 24, num_symbols: 3, rb_offset: 2 },
            5 => Self { num_rbs: 24, num_symbols: 3, rb_offset: 4 },
            6 => Self { num_rbs: 48, num_symbols: 1, rb_offset: 12 },
            7 => Self { num_rbs: 48, num_symbols: 1, rb_offset: 16 },
            8 => Self { num_rbs: 48, num_symbols: 2, rb_offset: 12 },
            9 => Self { num_rbs: 48, num_symbols: 2, rb_offset: 16 },
            10 => Self { num_rbs: 48, num_symbols: 3, rb_offset: 12 },
            11 => Self { num_rbs: 48, num_symbols: 3, rb_offset: 16 },
            12 => Self { num_rbs: 96, num_symbols: 1, rb_offset: 38 },
            13 => Self { num_rbs: 96, num_symbols: 2, rb_offset: 38 },
            14 => Self { num_rbs: 96, num_symbols: 3, rb_offset: 38 },
            _ => return Err(CoreError::InvalidConfiguration(format!("invalid CORESET#0 index: {}", index))),
        };
        Ok(config)
    }
}

/// Configuration a [`CellScheduler`] needs beyond what's in `common::types`.
#[derive(Debug, Clone)]
pub struct CellSchedulerConfig {
    pub cell_id: CellId,
    pub scs: SubcarrierSpacing,
    pub bandwidth: Bandwidth,
    /// Common search-space CORESET, the only one fallback-mode UEs may be
    /// scheduled against (spec §3 invariant).
    pub coreset: CoresetLayout,
    /// UE-dedicated search-space CORESET, used once a UE has graduated out
    /// of fallback mode.
    pub dedicated_coreset: CoresetLayout,
    pub ssb_period_ms: u32,
    pub sib1_period_ms: u32,
    pub coreset0: Coreset0Config,
    pub sib1: Sib1Config,
    pub max_ul_grants_per_slot: u8,
    pub max_pucchs_per_slot: u8,
    pub max_retx: u8,
    pub harq_timeout_slots: u64,
    pub num_dl_harq_processes: u8,
    pub num_ul_harq_processes: u8,
    pub rar_window_slots: u64,
    pub max_msg3_retx: u8,
    /// k1: slots between a DL grant and the uplink slot its HARQ-ACK is due.
    pub dl_feedback_k1_slots: u64,
    /// CQI drop (current vs. recorded-at-grant) that cancels a pending DL
    /// HARQ retransmission outright rather than retransmitting blind.
    pub cqi_drop_cancel_threshold: u8,
}

/// Crude transport-block size estimate (bytes), standing in for the real
/// TBS lookup table (3GPP TS 38.214 Table 5.1.3.2-2) without reproducing it
/// entry-by-entry: bytes scale with RBs, symbols, and a per-MCS spectral
/// efficiency bucket.
fn estimate_tbs_bytes(num_rbs: u16, num_symbols: u8, mcs: u8) -> u32 {
    let bits_per_re = 0.15 + (mcs as f32 / 27.0) * 5.6;
    let res = num_rbs as f32 * 12.0 * num_symbols as f32;
    ((res * bits_per_re) / 8.0) as u32
}

/// CQI-to-MCS mapping (monotonic, coarse stand-in for 3GPP TS 38.214 Table
/// 5.2.2.1-3).
fn mcs_from_cqi(cqi: u8, la_offset: i8) -> u8 {
    let base = (cqi as i16) * 2 - 1;
    (base + la_offset as i16).clamp(0, 27) as u8
}

/// Lowest MCS whose estimated TBS covers the SIB1 payload, so a bigger
/// generated message (more PLMNs, more frequency bands) doesn't silently
/// get truncated against a fixed MCS.
fn sib1_mcs_for_payload(payload_len: usize, num_rbs: u16, num_symbols: u8) -> u8 {
    (0..=27u8)
        .find(|&mcs| estimate_tbs_bytes(num_rbs, num_symbols, mcs) as usize >= payload_len)
        .unwrap_or(27)
}

/// A DL grant booked in a prior slot whose HARQ-ACK is due once `due_slot`
/// is reached, per §4.4(d)'s k1-delay UCI placement rule.
struct PendingUci {
    ue_index: u32,
    rnti: Rnti,
    harq_id: u8,
    due_slot: u64,
}

/// The slot-synchronous scheduler for one cell.
pub struct CellScheduler {
    config: CellSchedulerConfig,
    grid: ResourceGrid,
    harq: HarqManager,
    ra: RaManager,
    ues: HashMap<u32, UeContext>,
    sib1_gen: Sib1Generator,
    /// DL grants awaiting their k1-delayed UCI placement slot, oldest first.
    pending_uci: VecDeque<PendingUci>,
    /// UEs whose HARQ process was abandoned (max retx exhausted) since the
    /// last [`CellScheduler::take_radio_link_failures`] drain.
    radio_link_failures: Vec<u32>,
    /// UE scheduling order, rotated one position per DL pass for round-robin
    /// fairness across UEs contending for the same slot (tie-break order is
    /// otherwise unspecified by 3GPP and is this scheduler's own choice).
    rr_cursor: usize,
}

impl CellScheduler {
    pub fn new(config: CellSchedulerConfig) -> Self {
        let sib1_gen = Sib1Generator::new(config.sib1.clone());
        Self {
            harq: HarqManager::new(),
            ra: RaManager::new(config.rar_window_slots, config.max_msg3_retx),
            grid: ResourceGrid::new(8),
            ues: HashMap::new(),
            sib1_gen,
            pending_uci: VecDeque::new(),
            radio_link_failures: Vec::new(),
            rr_cursor: 0,
            config,
        }
    }

    /// Register a new UE. Panics if `ue_index` is already registered: a
    /// duplicate registration is a caller programming error, not a runtime
    /// outcome (spec §7/§9: invariant breaches halt rather than degrade).
    pub fn add_ue(&mut self, ctx: UeContext) {
        if self.ues.contains_key(&ctx.ue_index) {
            panic!(
                "{}",
                CoreError::InvariantViolation(format!("duplicate UE index {} registered", ctx.ue_index))
            );
        }
        self.harq.add_ue(
            ctx.ue_index,
            self.config.num_dl_harq_processes,
            self.config.num_ul_harq_processes,
            self.config.max_retx,
            self.config.harq_timeout_slots,
        );
        self.ues.insert(ctx.ue_index, ctx);
    }

    pub fn remove_ue(&mut self, ue_index: u32) {
        self.harq.remove_ue(ue_index);
        self.ues.remove(&ue_index);
    }

    pub fn ue_mut(&mut self, ue_index: u32) -> Option<&mut UeContext> {
        self.ues.get_mut(&ue_index)
    }

    /// Graduate a UE out of fallback scheduling onto the dedicated CORESET,
    /// cancelling any HARQ retransmission booked under the prior mode (spec
    /// §4.4: a fallback-mode transition cancels the other mode's in-flight
    /// retx, since its search-space assignment is no longer valid).
    pub fn graduate_ue(&mut self, ue_index: u32) {
        if let Some(ue) = self.ues.get_mut(&ue_index) {
            ue.graduate_from_fallback();
        }
        if let Some(harq) = self.harq.get_mut(ue_index) {
            harq.cancel_retxs();
        }
    }

    pub fn deactivate_ue(&mut self, ue_index: u32) {
        if let Some(ue) = self.ues.get_mut(&ue_index) {
            ue.deactivate();
        }
        if let Some(harq) = self.harq.get_mut(ue_index) {
            harq.cancel_retxs();
        }
    }

    /// CSI-report ingestion (spec §4.2/§4.4): updates the UE's tracked CQI
    /// and cancels any in-flight DL HARQ retransmission whose recorded CQI
    /// has degraded past the configured threshold. The cancelled process
    /// goes straight back to empty, so the next DL pass allocates a brand
    /// new first transmission at the (now lower) CQI-derived MCS.
    pub fn csi_report(&mut self, ue_index: u32, cqi: u8) {
        if let Some(harq) = self.harq.get_mut(ue_index) {
            for id in harq.cancel_degraded_dl(cqi, self.config.cqi_drop_cancel_threshold) {
                debug!(ue = ue_index, harq_id = id, "CQI drop cancelled pending DL retransmission");
            }
        }
        if let Some(ue) = self.ues.get_mut(&ue_index) {
            ue.cqi = cqi;
        }
    }

    /// Drain UEs whose HARQ process was abandoned since the last call
    /// (spec §7: UE-scope radio link failure releases the UE).
    pub fn take_radio_link_failures(&mut self) -> Vec<u32> {
        std::mem::take(&mut self.radio_link_failures)
    }

    fn is_ssb_slot(&self, slot: SlotPoint) -> bool {
        let period_frames = self.config.ssb_period_ms / 10;
        (slot.sfn() as u32 % period_frames.max(1)) == 0 && slot.slot_in_frame() == 0
    }

    fn is_sib1_slot(&self, slot: SlotPoint) -> bool {
        let period_frames = self.config.sib1_period_ms / 10;
        (slot.sfn() as u32 % period_frames.max(1)) == 0 && slot.slot_in_frame() == 2
    }

    /// Pass 1: system signals and random access. Has first claim on the
    /// grid every slot.
    fn system_signals_pass(&mut self, slot: SlotPoint, result: &mut SchedResult) {
        if self.is_sib1_slot(slot) {
            let rbs = RbInterval::new(
                self.config.coreset0.rb_offset as u16,
                (self.config.coreset0.rb_offset + self.config.coreset0.num_rbs) as u16,
            );
            let symbols = SymbolRange::new(
                self.config.coreset0.num_symbols as u8,
                self.config.coreset0.num_symbols as u8 + 4,
            );
            if let (Some(rbs), Some(symbols)) = (rbs, symbols) {
                match self.sib1_gen.generate_sib1() {
                    Ok(payload) => {
                        if self.grid.reserve(slot, Direction::Downlink, rbs, symbols) {
                            let mcs = sib1_mcs_for_payload(payload.len(), rbs.len(), symbols.len());
                            result.dl.bc.sib1 = Some(PdschInfo {
                                rnti: common::types::Rnti::new(0xFFFF), // SI-RNTI
                                rbs,
                                symbols,
                                mcs,
                                harq_id: 0,
                                is_retx: false,
                            });
                            info!(cell = self.config.cell_id.0, slot = %slot, bytes = payload.len(), "scheduled SIB1");
                        }
                    }
                    Err(err) => warn!(%err, "failed to generate SIB1 payload"),
                }
            }
        }

        for expired in self.ra.expire_stale(Self::slot_count(slot)) {
            warn!(tc_rnti = %expired.tc_rnti, "dropped RA attempt: RAR window expired");
        }
    }

    fn slot_count(slot: SlotPoint) -> u64 {
        slot.sfn() as u64 * slot.scs().slots_per_frame() as u64 + slot.slot_in_frame() as u64
    }

    /// Pass 2: DL UE selection. Round-robin across active UEs with pending
    /// downlink data or a HARQ process waiting on a retransmission.
    /// Inactive UEs are never scheduled; fallback-mode UEs are restricted to
    /// the common CORESET, non-fallback UEs to the dedicated one (spec §3
    /// invariant, §4.4.b.1).
    fn dl_pass(&mut self, slot: SlotPoint, order: &[u32], result: &mut SchedResult) {
        let mut booked_common = Vec::new();
        let mut booked_dedicated = Vec::new();
        let now = Self::slot_count(slot);
        let total_rbs = self.config.bandwidth.num_rbs(self.config.scs).unwrap_or(106);
        const DL_GRANT_WIDTH: u16 = 20;
        let mut rb_cursor: u16 = 0;

        for &ue_index in order {
            if rb_cursor + DL_GRANT_WIDTH > total_rbs {
                break;
            }
            let Some(ue) = self.ues.get(&ue_index) else { continue };
            if ue.state == UeActivityState::Inactive {
                continue;
            }
            let rnti = ue.rnti;
            let cqi = ue.cqi;
            let la_offset = ue.link_adaptation.offset();
            let fallback = ue.state == UeActivityState::ActiveFallback;
            let Some(harq) = self.harq.get_mut(ue_index) else { continue };

            // Timeouts first: a process stuck waiting too long frees itself
            // (as a NACK, or abandons outright past max retx) before we
            // consider granting it anything new.
            for (_, completion) in harq.check_dl_timeouts(now) {
                if completion == HarqCompletion::Abandoned {
                    self.radio_link_failures.push(ue_index);
                }
            }

            let harq_id = harq.find_dl_waiting_ack().or_else(|| harq.allocate_new_dl(now, 1, cqi));
            let Some(harq_id) = harq_id else { continue };

            // Each UE gets the next disjoint RB window this slot; passes
            // never reuse a window once it's handed out.
            let rbs = RbInterval::new(rb_cursor, rb_cursor + DL_GRANT_WIDTH).unwrap();
            let symbols = SymbolRange::new(2, 12).unwrap();
            if !self.grid.reserve(slot, Direction::Downlink, rbs, symbols) {
                continue;
            }
            rb_cursor += DL_GRANT_WIDTH;
            let (coreset, booked_cces) = if fallback {
                (&self.config.coreset, &mut booked_common)
            } else {
                (&self.config.dedicated_coreset, &mut booked_dedicated)
            };
            let Some(candidate) = allocate_pdcch(&mut self.grid, slot, rnti, cqi, coreset, booked_cces) else {
                continue;
            };
            let mcs = mcs_from_cqi(cqi, la_offset);
            let _ = estimate_tbs_bytes(rbs.len(), symbols.len(), mcs);

            result.dl.dl_pdcchs.push(PdcchDlInfo {
                pdcch: to_pdcch_allocation(candidate, rnti),
                dci: DciDlInfo { harq_id, new_data: true, redundancy_version: 0, mcs, tpc_command: 0 },
            });
            result.dl.ue_grants.push(PdschInfo { rnti, rbs, symbols, mcs, harq_id, is_retx: false });
            self.pending_uci.push_back(PendingUci {
                ue_index,
                rnti,
                harq_id,
                due_slot: now + self.config.dl_feedback_k1_slots,
            });
            debug!(ue = ue_index, harq_id, mcs, "DL grant allocated");
        }
    }

    /// Pass 3: UL UE selection, bounded by `max_ul_grants_per_slot`.
    fn ul_pass(&mut self, slot: SlotPoint, order: &[u32], result: &mut SchedResult) {
        let now = Self::slot_count(slot);
        let mut granted = 0u8;
        let total_rbs = self.config.bandwidth.num_rbs(self.config.scs).unwrap_or(106);
        const UL_GRANT_WIDTH: u16 = 15;
        let mut rb_cursor: u16 = 0;
        let mut booked_common = Vec::new();
        let mut booked_dedicated = Vec::new();

        for &ue_index in order {
            if granted >= self.config.max_ul_grants_per_slot {
                break;
            }
            if rb_cursor + UL_GRANT_WIDTH > total_rbs {
                break;
            }
            let Some(ue) = self.ues.get(&ue_index) else { continue };
            if ue.state == UeActivityState::Inactive {
                continue;
            }
            let rnti = ue.rnti;
            let cqi = ue.cqi;
            let tpc = ue.power_control.next_tpc_command();
            let fallback = ue.state == UeActivityState::ActiveFallback;
            let Some(harq) = self.harq.get_mut(ue_index) else { continue };

            for (_, completion) in harq.check_ul_timeouts(now) {
                if completion == HarqCompletion::Abandoned {
                    self.radio_link_failures.push(ue_index);
                }
            }
            let harq_id = harq.find_ul_waiting_ack().or_else(|| harq.allocate_new_ul(now));
            let Some(harq_id) = harq_id else { continue };

            let rbs = RbInterval::new(rb_cursor, rb_cursor + UL_GRANT_WIDTH).unwrap();
            let symbols = SymbolRange::new(0, 10).unwrap();
            if !self.grid.reserve(slot, Direction::Uplink, rbs, symbols) {
                continue;
            }
            rb_cursor += UL_GRANT_WIDTH;
            let mcs = mcs_from_cqi(cqi, 0);
            result.ul.puschs.push(PuschInfo { rnti, rbs, symbols, mcs, harq_id, is_retx: false, harq_ack_bits: 0 });
            let (coreset, booked_cces) = if fallback {
                (&self.config.coreset, &mut booked_common)
            } else {
                (&self.config.dedicated_coreset, &mut booked_dedicated)
            };
            if let Some(candidate) = allocate_pdcch(&mut self.grid, slot, rnti, cqi, coreset, booked_cces) {
                result.dl.ul_pdcchs.push(interfaces::sched_result::PdcchUlInfo {
                    pdcch: to_pdcch_allocation(candidate, rnti),
                    dci: DciUlInfo { harq_id, new_data: true, redundancy_version: 0, mcs, tpc_command: tpc },
                });
            }
            granted += 1;
            debug!(ue = ue_index, harq_id, mcs, "UL grant allocated");
        }
    }

    /// Pass 4: UCI placement, bounded by `max_pucchs_per_slot`. Every DL
    /// grant booked in a prior pass whose feedback is due this slot (k1
    /// slots after it was granted) needs its HARQ-ACK carried back, either
    /// piggybacked on a PUSCH this UE already has scheduled this slot, or on
    /// a dedicated PUCCH occasion (spec §4.4.d, §3 invariant: UCI bits
    /// placed in slot t all come from grants whose feedback slot is t).
    fn uci_pass(&mut self, slot: SlotPoint, result: &mut SchedResult) {
        let now = Self::slot_count(slot);
        let mut placed = 0u8;

        while let Some(front) = self.pending_uci.front() {
            if front.due_slot > now {
                break;
            }
            let due = self.pending_uci.pop_front().expect("front checked above");

            if let Some(pusch) = result.ul.puschs.iter_mut().find(|p| p.rnti.value() == due.rnti.value()) {
                pusch.harq_ack_bits = 1;
                debug!(ue = due.ue_index, harq_id = due.harq_id, "HARQ-ACK piggybacked on PUSCH");
                continue;
            }

            if placed >= self.config.max_pucchs_per_slot {
                warn!(ue = due.ue_index, "dropping HARQ-ACK UCI: PUCCH occasions exhausted this slot");
                continue;
            }
            let Some(symbols) = SymbolRange::new(13, 14) else { continue };
            result.ul.pucchs.push(PucchInfo {
                rnti: due.rnti,
                format: PucchFormat::Format1,
                symbols,
                harq_ack_bits: 1,
                sr_bit: false,
                csi_bits: 0,
            });
            placed += 1;
        }
    }

    fn scheduling_order(&mut self) -> Vec<u32> {
        let mut keys: Vec<u32> = self.ues.keys().copied().collect();
        keys.sort_unstable();
        if keys.is_empty() {
            return keys;
        }
        self.rr_cursor %= keys.len();
        keys.rotate_left(self.rr_cursor);
        self.rr_cursor = (self.rr_cursor + 1) % keys.len();
        keys
    }

    /// Run all four passes for `slot`, returning the committed scheduling
    /// decision.
    pub fn run_slot(&mut self, slot: SlotPoint) -> SchedResult {
        self.grid.slot_indication(slot);
        let mut result = SchedResult::empty(self.config.cell_id, slot);
        let order = self.scheduling_order();

        self.system_signals_pass(slot, &mut result);
        self.dl_pass(slot, &order, &mut result);
        self.ul_pass(slot, &order, &mut result);
        self.uci_pass(slot, &mut result);

        result
    }

    /// Apply DL HARQ-ACK feedback reported for a UE's PUCCH/PUSCH-piggyback.
    pub fn dl_ack_info(&mut self, ue_index: u32, harq_id: u8, ack: bool) -> Option<HarqCompletion> {
        let outcome = if ack { FeedbackOutcome::Ack } else { FeedbackOutcome::Nack };
        let completion = self.harq.get_mut(ue_index)?.dl_ack_info(harq_id, 0, outcome)?;
        if let Some(ue) = self.ues.get_mut(&ue_index) {
            match completion {
                HarqCompletion::Succeeded => ue.link_adaptation.on_ack(),
                HarqCompletion::NeedsRetx | HarqCompletion::Abandoned => ue.link_adaptation.on_nack(),
            }
        }
        if completion == HarqCompletion::Abandoned {
            self.radio_link_failures.push(ue_index);
        }
        Some(completion)
    }

    pub fn ra_manager_mut(&mut self) -> &mut RaManager {
        &mut self.ra
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::sib1::default_sib1_config;
    use common::types::Rnti;

    fn test_config() -> CellSchedulerConfig {
        CellSchedulerConfig {
            cell_id: CellId(1),
            scs: SubcarrierSpacing::Scs15,
            bandwidth: Bandwidth::Bw20,
            coreset: CoresetLayout {
                num_cces: 48,
                rbs: RbInterval::new(0, 24).unwrap(),
                symbols: SymbolRange::new(0, 2).unwrap(),
            },
            dedicated_coreset: CoresetLayout {
                num_cces: 48,
                rbs: RbInterval::new(24, 48).unwrap(),
                symbols: SymbolRange::new(0, 2).unwrap(),
            },
            ssb_period_ms: 20,
            sib1_period_ms: 160,
            coreset0: Coreset0Config::from_index(1).unwrap(),
            sib1: default_sib1_config(CellId(1)),
            max_ul_grants_per_slot: 8,
            max_pucchs_per_slot: 8,
            max_retx: 4,
            harq_timeout_slots: 16,
            num_dl_harq_processes: 8,
            num_ul_harq_processes: 8,
            rar_window_slots: 10,
            max_msg3_retx: 4,
            dl_feedback_k1_slots: 4,
            cqi_drop_cancel_threshold: 6,
        }
    }

    #[test]
    fn test_coreset0_config() {
        let config = Coreset0Config::from_index(1).unwrap();
        assert_eq!(config.num_rbs, 24);
        assert!(Coreset0Config::from_index(20).is_err());
    }

    #[test]
    fn test_sib1_scheduled_in_expected_slot() {
        let mut sched = CellScheduler::new(test_config());
        let sib1_slot = SlotPoint::new(SubcarrierSpacing::Scs15, 0, 2);
        let result = sched.run_slot(sib1_slot);
        assert!(result.dl.bc.sib1.is_some());

        let other_slot = SlotPoint::new(SubcarrierSpacing::Scs15, 0, 3);
        let result = sched.run_slot(other_slot);
        assert!(result.dl.bc.sib1.is_none());
    }

    #[test]
    fn test_dl_pass_grants_active_ue() {
        let mut sched = CellScheduler::new(test_config());
        sched.add_ue(UeContext::new(1, Rnti::new(0x4601)));
        let slot = SlotPoint::new(SubcarrierSpacing::Scs15, 0, 5);
        let result = sched.run_slot(slot);
        assert_eq!(result.dl.ue_grants.len(), 1);
        assert_eq!(result.dl.ue_grants[0].rnti.value(), 0x4601);
    }

    #[test]
    fn test_inactive_ue_is_not_scheduled() {
        let mut sched = CellScheduler::new(test_config());
        sched.add_ue(UeContext::new(1, Rnti::new(0x4601)));
        sched.deactivate_ue(1);
        let slot = SlotPoint::new(SubcarrierSpacing::Scs15, 0, 5);
        let result = sched.run_slot(slot);
        assert!(result.dl.ue_grants.is_empty());
    }

    #[test]
    fn test_fallback_ue_uses_common_coreset_non_fallback_uses_dedicated() {
        let mut sched = CellScheduler::new(test_config());
        sched.add_ue(UeContext::new(1, Rnti::new(0x4601)));
        sched.add_ue(UeContext::new(2, Rnti::new(0x4602)));
        sched.graduate_ue(2);

        let slot = SlotPoint::new(SubcarrierSpacing::Scs15, 0, 5);
        let result = sched.run_slot(slot);
        assert_eq!(result.dl.ue_grants.len(), 2);

        let common_range = 0..24u16;
        let dedicated_range = 24..48u16;
        for pdcch in &result.dl.dl_pdcchs {
            if pdcch.pdcch.rnti.value() == 0x4601 {
                assert!(common_range.contains(&pdcch.pdcch.cce_start));
            } else {
                assert!(dedicated_range.contains(&pdcch.pdcch.cce_start));
            }
        }
    }

    #[test]
    fn test_uci_placed_k1_slots_after_dl_grant_not_same_slot() {
        let mut sched = CellScheduler::new(test_config());
        sched.add_ue(UeContext::new(1, Rnti::new(0x4601)));

        let grant_slot = SlotPoint::new(SubcarrierSpacing::Scs15, 0, 0);
        let same_slot_result = sched.run_slot(grant_slot);
        assert!(same_slot_result.dl.ue_grants.len() == 1);
        assert!(same_slot_result.ul.pucchs.is_empty(), "UCI must not land in the same slot as the DL grant");

        for n in 1..4 {
            let result = sched.run_slot(SlotPoint::new(SubcarrierSpacing::Scs15, 0, n));
            assert!(result.ul.pucchs.is_empty());
        }

        let due_slot = SlotPoint::new(SubcarrierSpacing::Scs15, 0, 4);
        let due_result = sched.run_slot(due_slot);
        assert_eq!(due_result.ul.pucchs.len(), 1);
        assert_eq!(due_result.ul.pucchs[0].rnti.value(), 0x4601);
    }

    #[test]
    fn test_round_robin_rotates_order() {
        let mut sched = CellScheduler::new(test_config());
        sched.add_ue(UeContext::new(1, Rnti::new(0x4601)));
        sched.add_ue(UeContext::new(2, Rnti::new(0x4602)));
        let order1 = sched.scheduling_order();
        let order2 = sched.scheduling_order();
        assert_ne!(order1, order2);
    }

    #[test]
    #[should_panic(expected = "duplicate UE index")]
    fn test_add_ue_panics_on_duplicate_index() {
        let mut sched = CellScheduler::new(test_config());
        sched.add_ue(UeContext::new(1, Rnti::new(0x4601)));
        sched.add_ue(UeContext::new(1, Rnti::new(0x4602)));
    }
}
