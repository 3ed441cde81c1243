//! NGAP-facing message types and the narrow sink the RRC controller emits
//! UE Context Release Requests through.
//!
//! SCTP transport, ASN.1 PDU encoding, and the NG Setup procedure are a
//! collaborator's job (see this crate's Non-goals); this module only names
//! the procedures the scheduler core originates or consumes so that
//! [`crate::rrc::RrcController`] has something concrete to hand upward.

use interfaces::message_types::ControlPlaneMessage;
use interfaces::InterfaceError;
use tracing::debug;

/// NGAP procedure codes this gNB originates or reacts to (3GPP TS 38.413).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NgapProcedureCode {
    NgSetup = 21,
    InitialUeMessage = 15,
    DownlinkNasTransport = 4,
    UplinkNasTransport = 46,
    UeContextReleaseRequest = 41,
    UeContextReleaseCommand = 42,
}

/// Something that can accept a control-plane message bound for the core
/// network. Implemented by whatever owns the actual NGAP/SCTP transport;
/// this crate only needs to hand messages off.
pub trait NgapSink {
    fn send(&self, msg: ControlPlaneMessage) -> Result<(), InterfaceError>;
}

/// A sink that logs and discards, for standalone testing of the scheduler
/// core without a real NGAP transport wired up.
#[derive(Default)]
pub struct NullNgapSink;

impl NgapSink for NullNgapSink {
    fn send(&self, msg: ControlPlaneMessage) -> Result<(), InterfaceError> {
        debug!(ue_index = msg.ue_index, procedure = ?msg.procedure, "discarding NGAP message (null sink)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interfaces::message_types::{ControlPlaneDirection, ControlPlaneProcedure};

    #[test]
    fn test_null_sink_accepts_release_request() {
        let sink = NullNgapSink;
        let msg = ControlPlaneMessage {
            direction: ControlPlaneDirection::Uplink,
            cell: 1,
            ue_index: 7,
            procedure: ControlPlaneProcedure::UeContextReleaseRequest,
            payload: Vec::new(),
        };
        assert!(sink.send(msg).is_ok());
    }
}
