//! Per-UE scheduler-facing state: activity state machine, link adaptation
//! outer loop, and uplink power control.

use common::types::Rnti;
use tracing::debug;

/// The UE scheduler's activity state machine (spec: `inactive` ->
/// `active, fallback` -> `active, non-fallback` -> `inactive`).
///
/// A UE enters `Fallback` on RRC setup/reestablishment (common search space,
/// conservative MCS, no non-fallback DCI formats) and graduates to
/// `NonFallback` once RRC reconfiguration completes and UE-specific search
/// space / CSI feedback are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UeActivityState {
    Inactive,
    ActiveFallback,
    ActiveNonFallback,
}

impl UeActivityState {
    pub fn can_graduate(&self) -> bool {
        matches!(self, UeActivityState::ActiveFallback)
    }
}

/// Outer-loop link adaptation: nudges an inner-loop CQI-derived MCS offset
/// up on sustained success and down sharply on failure, converging on a
/// target residual BLER (commonly 10%).
#[derive(Debug, Clone, Copy)]
pub struct LinkAdaptationState {
    /// Additive offset applied to the CQI-to-MCS table lookup index.
    offset: i8,
    step_up: i8,
    step_down: i8,
    min_offset: i8,
    max_offset: i8,
}

impl LinkAdaptationState {
    pub fn new(step_up: i8, step_down: i8, min_offset: i8, max_offset: i8) -> Self {
        Self { offset: 0, step_up, step_down, min_offset, max_offset }
    }

    pub fn offset(&self) -> i8 {
        self.offset
    }

    pub fn on_ack(&mut self) {
        self.offset = (self.offset + self.step_up).min(self.max_offset);
    }

    pub fn on_nack(&mut self) {
        self.offset = (self.offset - self.step_down).max(self.min_offset);
    }

    pub fn reset(&mut self) {
        self.offset = 0;
    }
}

/// Uplink power control: tracks the TPC command to send based on the gap
/// between a target received SINR and the last-reported measured SINR.
#[derive(Debug, Clone, Copy)]
pub struct PowerControlState {
    target_sinr_db: f32,
    last_measured_sinr_db: Option<f32>,
}

impl PowerControlState {
    pub fn new(target_sinr_db: f32) -> Self {
        Self { target_sinr_db, last_measured_sinr_db: None }
    }

    pub fn report_measured_sinr(&mut self, sinr_db: f32) {
        self.last_measured_sinr_db = Some(sinr_db);
    }

    /// Next TPC command (3GPP TS 38.213 §7.1.1: -1, 0, +1, +3 dB), clamped
    /// to the accumulation range a single command step can represent.
    pub fn next_tpc_command(&self) -> i8 {
        let Some(measured) = self.last_measured_sinr_db else {
            return 0;
        };
        let gap = self.target_sinr_db - measured;
        if gap > 3.0 {
            3
        } else if gap > 0.5 {
            1
        } else if gap < -0.5 {
            -1
        } else {
            0
        }
    }
}

/// Full scheduler-facing context for one UE.
pub struct UeContext {
    pub ue_index: u32,
    pub rnti: Rnti,
    pub state: UeActivityState,
    pub link_adaptation: LinkAdaptationState,
    pub power_control: PowerControlState,
    /// Last reported CQI index (0-15).
    pub cqi: u8,
}

impl UeContext {
    pub fn new(ue_index: u32, rnti: Rnti) -> Self {
        Self {
            ue_index,
            rnti,
            state: UeActivityState::ActiveFallback,
            link_adaptation: LinkAdaptationState::new(1, 3, -8, 8),
            power_control: PowerControlState::new(15.0),
            cqi: 6,
        }
    }

    /// Transition from fallback to non-fallback once RRC reconfiguration
    /// has completed; idempotent in any other state.
    pub fn graduate_from_fallback(&mut self) {
        if self.state.can_graduate() {
            debug!(ue = self.ue_index, "UE graduated to non-fallback scheduling");
            self.state = UeActivityState::ActiveNonFallback;
        }
    }

    pub fn deactivate(&mut self) {
        self.state = UeActivityState::Inactive;
        self.link_adaptation.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_machine_graduates_only_from_fallback() {
        let mut ue = UeContext::new(1, Rnti::new(0x4601));
        assert_eq!(ue.state, UeActivityState::ActiveFallback);
        ue.graduate_from_fallback();
        assert_eq!(ue.state, UeActivityState::ActiveNonFallback);
        ue.graduate_from_fallback();
        assert_eq!(ue.state, UeActivityState::ActiveNonFallback);
    }

    #[test]
    fn test_link_adaptation_converges_down_on_nack_faster_than_up() {
        let mut la = LinkAdaptationState::new(1, 3, -8, 8);
        la.on_ack();
        la.on_ack();
        assert_eq!(la.offset(), 2);
        la.on_nack();
        assert_eq!(la.offset(), -1);
    }

    #[test]
    fn test_power_control_tpc_direction() {
        let mut pc = PowerControlState::new(15.0);
        assert_eq!(pc.next_tpc_command(), 0);
        pc.report_measured_sinr(10.0);
        assert_eq!(pc.next_tpc_command(), 3);
        pc.report_measured_sinr(20.0);
        assert_eq!(pc.next_tpc_command(), -1);
    }
}
