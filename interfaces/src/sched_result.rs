//! Committed scheduling result handed down from the scheduler core to the PHY.
//!
//! Mirrors the shape of `scheduler_slot_handler.h`'s `sched_result` family:
//! one result per cell per slot, split into a downlink half (PDCCH
//! candidates, PDSCH grants for broadcast/RAR/UE traffic) and an uplink half
//! (PUSCH/PUCCH/SRS grants), plus the opaque bits the PHY needs to actually
//! place IQ samples on the grid (RB interval, symbol range, MCS) without the
//! scheduler knowing anything about modulation.

use common::types::{CellId, Rnti, RbInterval, SlotPoint, SymbolRange};
use serde::{Deserialize, Serialize};

/// HARQ process identifier, 0..=15 (4-bit field in DCI).
pub type HarqProcessId = u8;

/// Downlink Control Information carried on a PDCCH candidate for a DL grant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DciDlInfo {
    pub harq_id: HarqProcessId,
    pub new_data: bool,
    pub redundancy_version: u8,
    pub mcs: u8,
    pub tpc_command: i8,
}

/// Downlink Control Information carried on a PDCCH candidate for a UL grant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DciUlInfo {
    pub harq_id: HarqProcessId,
    pub new_data: bool,
    pub redundancy_version: u8,
    pub mcs: u8,
    pub tpc_command: i8,
}

/// One allocated PDCCH candidate, whichever DCI direction it carries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PdcchAllocation {
    pub rnti: Rnti,
    pub aggregation_level: u8,
    pub candidate_index: u8,
    pub cce_start: u16,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PdcchDlInfo {
    pub pdcch: PdcchAllocation,
    pub dci: DciDlInfo,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PdcchUlInfo {
    pub pdcch: PdcchAllocation,
    pub dci: DciUlInfo,
}

/// A committed PDSCH grant, UE-addressed, broadcast, or for a RAR.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PdschInfo {
    pub rnti: Rnti,
    pub rbs: RbInterval,
    pub symbols: SymbolRange,
    pub mcs: u8,
    pub harq_id: HarqProcessId,
    pub is_retx: bool,
}

/// A committed PUSCH grant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PuschInfo {
    pub rnti: Rnti,
    pub rbs: RbInterval,
    pub symbols: SymbolRange,
    pub mcs: u8,
    pub harq_id: HarqProcessId,
    pub is_retx: bool,
    /// Piggybacked HARQ-ACK bits for a DL grant whose k1 feedback slot lands
    /// on this PUSCH's slot, instead of a separate PUCCH occasion (0 if none).
    pub harq_ack_bits: u8,
}

/// PUCCH format used for a UCI placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PucchFormat {
    /// Format 0/1: small payload (SR and/or up to 2 HARQ-ACK bits).
    Format1,
    /// Format 2/3/4: larger payload (CSI, many HARQ-ACK bits).
    Format2,
}

/// A committed PUCCH (uplink control) grant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PucchInfo {
    pub rnti: Rnti,
    pub format: PucchFormat,
    pub symbols: SymbolRange,
    pub harq_ack_bits: u8,
    pub sr_bit: bool,
    pub csi_bits: u8,
}

/// A scheduled grant in a Random Access Response, addressed to a TC-RNTI.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RarGrantInfo {
    pub ra_preamble_id: u8,
    pub tc_rnti: Rnti,
    pub timing_advance: u16,
    /// Msg3 UL grant RB interval and symbols, reserved for retransmission.
    pub msg3_rbs: RbInterval,
    pub msg3_symbols: SymbolRange,
}

/// A Random Access Response grouped by its RA-RNTI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RarInfo {
    pub ra_rnti: Rnti,
    pub grants: Vec<RarGrantInfo>,
}

/// Broadcast information scheduled this slot (SIB1 only; MIB/SSB are a PHY
/// timing concern, not a scheduler grant).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BroadcastInfo {
    pub sib1: Option<PdschInfo>,
}

/// The downlink half of a committed slot result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlSchedResult {
    pub slot: u32,
    pub dl_pdcchs: Vec<PdcchDlInfo>,
    pub ul_pdcchs: Vec<PdcchUlInfo>,
    pub bc: BroadcastInfo,
    pub rar_grants: Vec<RarInfo>,
    pub ue_grants: Vec<PdschInfo>,
}

/// The uplink half of a committed slot result, for the slot whose PUSCH/PUCCH
/// occasions land `k2`/`k1` slots after the DL slot that scheduled them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UlSchedResult {
    pub slot: u32,
    pub puschs: Vec<PuschInfo>,
    pub pucchs: Vec<PucchInfo>,
}

/// The full per-cell, per-slot scheduling decision handed to the PHY.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedResult {
    pub cell: CellId,
    pub dl: DlSchedResult,
    pub ul: UlSchedResult,
}

impl SchedResult {
    pub fn empty(cell: CellId, slot: SlotPoint) -> Self {
        Self {
            cell,
            dl: DlSchedResult {
                slot: slot.slot_index(),
                dl_pdcchs: Vec::new(),
                ul_pdcchs: Vec::new(),
                bc: BroadcastInfo { sib1: None },
                rar_grants: Vec::new(),
                ue_grants: Vec::new(),
            },
            ul: UlSchedResult {
                slot: slot.slot_index(),
                puschs: Vec::new(),
                pucchs: Vec::new(),
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.dl.dl_pdcchs.is_empty()
            && self.dl.ul_pdcchs.is_empty()
            && self.dl.bc.sib1.is_none()
            && self.dl.rar_grants.is_empty()
            && self.dl.ue_grants.is_empty()
            && self.ul.puschs.is_empty()
            && self.ul.pucchs.is_empty()
    }
}
