//! PHY timing notifications and upward control-plane message envelopes.
//!
//! These are the two input surfaces a cell scheduler is driven by: symbol
//! timing ticks from the PHY ("slot indications"), and opaque control-plane
//! messages handed up from/to PDCP-RRC/NGAP, which this crate deliberately
//! does not decode (3GPP ASN.1 wire encoding is an external collaborator's
//! job, not the scheduler's).

use common::types::{CellId, SlotPoint};
use serde::{Deserialize, Serialize};

/// A new downlink OFDM symbol boundary has been reached for a cell.
#[derive(Debug, Clone, Copy)]
pub struct NewSymbolIndication {
    pub cell: CellId,
    pub slot: SlotPoint,
    pub symbol_index: u8,
}

/// A new uplink OFDM symbol boundary has been reached for a cell.
#[derive(Debug, Clone, Copy)]
pub struct NewUplinkSymbolIndication {
    pub cell: CellId,
    pub slot: SlotPoint,
    pub symbol_index: u8,
}

/// PRACH detection results for a configured RACH occasion window.
#[derive(Debug, Clone)]
pub struct PrachWindowData {
    pub cell: CellId,
    pub slot: SlotPoint,
    /// Detected preambles: (preamble index, timing advance estimate in Ts units).
    pub detected_preambles: Vec<(u8, u16)>,
}

/// Direction tag for an opaque control-plane message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ControlPlaneDirection {
    /// gNB to core network / CU (e.g. NGAP UE Context Release Request).
    Uplink,
    /// Core network / CU to gNB (e.g. RRC Reconfiguration to relay).
    Downlink,
}

/// An opaque control-plane message exchanged with PDCP-RRC/NGAP collaborators.
///
/// The scheduler core treats `payload` as an uninterpreted byte string: it
/// only needs to know which UE and which procedure triggered it, not how to
/// encode or decode the ASN.1 contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPlaneMessage {
    pub direction: ControlPlaneDirection,
    pub cell: u16,
    pub ue_index: u32,
    pub procedure: ControlPlaneProcedure,
    pub payload: Vec<u8>,
}

/// The procedure a control-plane message belongs to. Named, not decoded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ControlPlaneProcedure {
    RrcSetup,
    RrcReestablishment,
    RrcReconfiguration,
    HandoverPreparation,
    HandoverCommand,
    UeContextReleaseRequest,
    UeContextReleaseCommand,
    InitialUeMessage,
    UplinkNasTransport,
    DownlinkNasTransport,
}
