//! End-to-end scenarios spanning more than one scheduler-core module:
//! random access through to a scheduled DL grant, HARQ feedback driving
//! link adaptation across several slots, RRC reestablishment followed by
//! scheduling resuming under the new C-RNTI, CQI-drop HARQ cancellation,
//! and radio-link-failure release.

use common::types::{Bandwidth, CellId, Pci, RbInterval, SlotPoint, SubcarrierSpacing, SymbolRange};
use gnb_core::mac::sib1::default_sib1_config;
use gnb_core::mac::{CellScheduler, CellSchedulerConfig, Coreset0Config};
use gnb_core::pdcch::CoresetLayout;
use gnb_core::rrc::RrcController;
use gnb_core::ue::UeContext;
use common::types::Rnti;

fn config() -> CellSchedulerConfig {
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

fn slot(n: u16) -> SlotPoint {
    SlotPoint::new(SubcarrierSpacing::Scs15, 0, n)
}

/// A UE's preamble is detected, Msg3 completes, and the resulting UE
/// context is granted a DL PDSCH on the very next slot it's scheduled in.
#[test]
fn test_random_access_to_first_dl_grant() {
    let mut sched = CellScheduler::new(config());
    let pending = sched.ra_manager_mut().register_preamble(3, 50, 0, 0, 0, 0);
    let completed = sched.ra_manager_mut().complete(pending.tc_rnti).expect("RA completes");

    sched.add_ue(UeContext::new(1, completed.tc_rnti));

    let result = sched.run_slot(slot(5));
    assert_eq!(result.dl.ue_grants.len(), 1);
    assert_eq!(result.dl.ue_grants[0].rnti.value(), completed.tc_rnti.value());
}

/// Three consecutive NACKs push link adaptation's offset down, and the
/// granted MCS for the UE's subsequent slot reflects the more conservative
/// offset (DCI's `mcs` field comes out lower than with no NACK history).
#[test]
fn test_sustained_nacks_lower_subsequent_grant_mcs() {
    let mut sched = CellScheduler::new(config());
    sched.add_ue(UeContext::new(1, Rnti::new(0x4601)));

    let first = sched.run_slot(slot(0));
    let harq_id = first.dl.dl_pdcchs[0].dci.harq_id;
    let mcs_before = first.dl.dl_pdcchs[0].dci.mcs;

    for _ in 0..3 {
        sched.dl_ack_info(1, harq_id, false);
    }

    let later = sched.run_slot(slot(1));
    let mcs_after = later.dl.dl_pdcchs[0].dci.mcs;
    assert!(mcs_after <= mcs_before);
}

/// After a successful reestablishment, the UE keeps getting scheduled
/// under its new C-RNTI without needing to re-admit through RA, and the
/// old context is gone.
#[test]
fn test_reestablishment_then_scheduler_uses_new_rnti() {
    let mut rrc = RrcController::new(CellId(1), Pci::new(10).unwrap(), 20);
    let old_rnti = Rnti::new(0x4601);
    let old_index = rrc.admit_new_ue(old_rnti);
    {
        let old_ctx = rrc.ue_mut(old_index).unwrap();
        old_ctx.amf_ue_id = Some(42);
        old_ctx.drbs.push(gnb_core::rrc::DrbId(1));
    }

    let new_rnti = Rnti::new(0x4602);
    let new_index = rrc.admit_new_ue(new_rnti);

    let (outcome, msg) = rrc.handle_reestablishment(new_index, old_rnti, Pci::new(10).unwrap()).unwrap();
    assert_eq!(outcome, gnb_core::rrc::ReestablishmentOutcome::Success);
    assert!(msg.is_none());
    assert!(rrc.ue(old_index).is_none());

    let mut sched = CellScheduler::new(config());
    sched.add_ue(UeContext::new(new_index, rrc.ue(new_index).unwrap().c_rnti));

    let result = sched.run_slot(slot(4));
    assert_eq!(result.dl.ue_grants[0].rnti.value(), new_rnti.value());
}

/// With several UEs active in the same cell, no two PDCCH allocations in a
/// slot ever collide on CCEs, and every active UE with a free HARQ process
/// gets a grant.
#[test]
fn test_multiple_ues_share_slot_without_pdcch_collisions() {
    let mut sched = CellScheduler::new(config());
    for i in 1..=4u32 {
        sched.add_ue(UeContext::new(i, Rnti::new(0x4600 + i as u16)));
        // Best channel quality so each UE asks for aggregation level 1,
        // which has the deepest candidate pool and is least likely to
        // exhaust the CORESET under contention from its cell-mates.
        sched.ue_mut(i).unwrap().cqi = 15;
    }

    let result = sched.run_slot(slot(6));
    assert!(!result.dl.ue_grants.is_empty());
    assert_eq!(result.dl.ue_grants.len(), result.dl.dl_pdcchs.len());

    let mut ranges: Vec<(u16, u16)> = result
        .dl
        .dl_pdcchs
        .iter()
        .map(|p| (p.pdcch.cce_start, p.pdcch.cce_start + p.pdcch.aggregation_level as u16))
        .collect();
    ranges.sort_by_key(|r| r.0);
    for pair in ranges.windows(2) {
        assert!(pair[0].1 <= pair[1].0, "PDCCH candidates overlap: {:?}", pair);
    }
}

/// A CSI report that drops CQI sharply cancels the UE's pending DL retx;
/// the freed process lets the very next DL pass allocate a brand new first
/// transmission rather than retransmitting blind at a stale MCS.
#[test]
fn test_csi_report_cqi_drop_frees_harq_process_for_new_grant() {
    let mut sched = CellScheduler::new(config());
    sched.add_ue(UeContext::new(1, Rnti::new(0x4601)));
    sched.ue_mut(1).unwrap().cqi = 14;

    let first = sched.run_slot(slot(0));
    let harq_id_before = first.dl.dl_pdcchs[0].dci.harq_id;

    // No ack/nack yet: the process is still waiting. A sharp CQI drop
    // should cancel it outright.
    sched.csi_report(1, 2);

    let after = sched.run_slot(slot(1));
    assert_eq!(after.dl.dl_pdcchs.len(), 1);
    // Same process slot index is free again and reused for a fresh first
    // transmission (not a retx) at a much lower MCS.
    assert_eq!(after.dl.dl_pdcchs[0].dci.harq_id, harq_id_before);
    assert!(!after.dl.ue_grants[0].is_retx);
    assert!(after.dl.dl_pdcchs[0].dci.mcs < first.dl.dl_pdcchs[0].dci.mcs);
}

/// A UE's DL HARQ process exhausts `max_retx`: the scheduler reports it as
/// a radio link failure, and the RRC controller releases the UE with an
/// NGAP release request.
#[test]
fn test_harq_exhaustion_drives_radio_link_failure_release() {
    let mut cfg = config();
    cfg.max_retx = 1;
    let mut sched = CellScheduler::new(cfg);
    sched.add_ue(UeContext::new(1, Rnti::new(0x4601)));

    let first = sched.run_slot(slot(0));
    let harq_id = first.dl.dl_pdcchs[0].dci.harq_id;
    sched.dl_ack_info(1, harq_id, false);
    sched.dl_ack_info(1, harq_id, false);

    let failures = sched.take_radio_link_failures();
    assert_eq!(failures, vec![1]);

    let mut rrc = RrcController::new(CellId(1), Pci::new(10).unwrap(), 20);
    let ue_index = rrc.admit_new_ue(Rnti::new(0x4601));
    let msg = rrc.radio_link_failure(ue_index);
    assert!(matches!(msg, Some(gnb_core::rrc::OutgoingMessage::ControlPlane(_))));
}

/// HARQ-ACK feedback for a DL grant is placed k1 slots later, never in the
/// same slot as the grant, and is piggybacked on a PUSCH when the UE also
/// has an uplink grant that slot.
#[test]
fn test_uci_piggybacks_on_pusch_when_available() {
    let mut sched = CellScheduler::new(config());
    sched.add_ue(UeContext::new(1, Rnti::new(0x4601)));

    let grant_slot = sched.run_slot(slot(0));
    assert_eq!(grant_slot.dl.ue_grants.len(), 1);
    assert!(grant_slot.ul.pucchs.is_empty());

    for n in 1..4 {
        sched.run_slot(slot(n));
    }

    let due = sched.run_slot(slot(4));
    assert_eq!(due.ul.puschs.len(), 1, "UE should have an UL grant to piggyback onto");
    assert_eq!(due.ul.puschs[0].harq_ack_bits, 1);
    assert!(due.ul.pucchs.is_empty(), "HARQ-ACK should ride the PUSCH, not a separate PUCCH");
}
