//! Albor Space 5G GNodeB Main Application
//!
//! Entry point for the slot-synchronous scheduler core: loads the YAML cell
//! configuration, builds the per-cell scheduler and RRC controller, and
//! drives both from a slot-timing loop. PHY sample processing and the RF
//! front end are a separate collaborator's responsibility; this binary only
//! ever deals in resource-grid bookings and control-plane procedures.

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use std::time::{Duration, Instant};

use common::types::{Bandwidth, CellId, PlmnId, Pci, RbInterval, SlotPoint, SubcarrierSpacing, SymbolRange};
use config::GnbConfig;
use gnb_core::mac::sib1::{CellSelectionInfo, Sib1Config};
use gnb_core::mac::{CellScheduler, CellSchedulerConfig, Coreset0Config};
use gnb_core::ngap::{NgapSink, NullNgapSink};
use gnb_core::pdcch::CoresetLayout;
use gnb_core::rrc::{OutgoingMessage, RrcController};

/// Albor Space 5G GNodeB
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML cell configuration file
    #[arg(short, long, default_value = "config.yml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn bandwidth_from_mhz(mhz: u32) -> Result<Bandwidth> {
    Ok(match mhz {
        5 => Bandwidth::Bw5,
        10 => Bandwidth::Bw10,
        15 => Bandwidth::Bw15,
        20 => Bandwidth::Bw20,
        25 => Bandwidth::Bw25,
        30 => Bandwidth::Bw30,
        40 => Bandwidth::Bw40,
        50 => Bandwidth::Bw50,
        60 => Bandwidth::Bw60,
        80 => Bandwidth::Bw80,
        100 => Bandwidth::Bw100,
        other => anyhow::bail!("unsupported channel bandwidth: {} MHz", other),
    })
}

fn scs_from_khz(khz: u32) -> Result<SubcarrierSpacing> {
    Ok(match khz {
        15 => SubcarrierSpacing::Scs15,
        30 => SubcarrierSpacing::Scs30,
        60 => SubcarrierSpacing::Scs60,
        120 => SubcarrierSpacing::Scs120,
        other => anyhow::bail!("unsupported subcarrier spacing: {} kHz", other),
    })
}

/// Build the scheduler's CORESET layout from the cell's CORESET#0 table
/// entry: 6 resource elements per CCE, so a CCE spans 6 REGs worth of RBs
/// across the CORESET's symbol span (3GPP TS 38.211 §7.3.2.2).
fn coreset_layout_from(coreset0: Coreset0Config) -> Result<CoresetLayout> {
    let rbs = RbInterval::new(coreset0.rb_offset as u16, (coreset0.rb_offset + coreset0.num_rbs) as u16)
        .context("invalid CORESET#0 RB range")?;
    let symbols = SymbolRange::new(0, coreset0.num_symbols as u8).context("invalid CORESET#0 symbol range")?;
    let regs_per_cce = 6u32;
    let num_cces = ((coreset0.num_rbs * coreset0.num_symbols) / regs_per_cce).max(1) as u16;
    Ok(CoresetLayout { num_cces, rbs, symbols })
}

/// Dedicated-search-space CORESET for UEs past fallback, carved out of the
/// band above the common CORESET (3GPP allows the network to place it
/// anywhere outside CORESET#0's own RBs; this picks the next contiguous
/// window of the same width).
fn dedicated_coreset_from(common: &CoresetLayout, total_rbs: u16) -> CoresetLayout {
    let width = common.rbs.len();
    let start = common.rbs.stop.min(total_rbs.saturating_sub(width));
    let stop = (start + width).min(total_rbs);
    let rbs = RbInterval::new(start, stop).unwrap_or(common.rbs);
    CoresetLayout { num_cces: common.num_cces, rbs, symbols: common.symbols }
}

/// Parse a PLMN digit string ("00101" or "310260") into a [`PlmnId`].
fn plmn_id_from_str(plmn: &str) -> Result<PlmnId> {
    if plmn.len() < 5 || plmn.len() > 6 {
        anyhow::bail!("invalid PLMN format: {}", plmn);
    }
    let digits: Vec<u8> = plmn
        .chars()
        .map(|c| c.to_digit(10).map(|d| d as u8))
        .collect::<Option<Vec<u8>>>()
        .ok_or_else(|| anyhow::anyhow!("PLMN must be all digits: {}", plmn))?;
    let mcc = [digits[0], digits[1], digits[2]];
    let (mnc, mnc_len) = if digits.len() == 5 { ([digits[3], digits[4], 0], 2) } else { ([digits[3], digits[4], digits[5]], 3) };
    PlmnId::new(mcc, mnc, mnc_len).ok_or_else(|| anyhow::anyhow!("invalid PLMN digits: {}", plmn))
}

fn build_scheduler_config(cfg: &GnbConfig) -> Result<CellSchedulerConfig> {
    let cell = &cfg.cell_cfg;
    let pci = Pci::new(cell.pci).ok_or_else(|| anyhow::anyhow!("invalid PCI: {}", cell.pci))?;
    let bandwidth = bandwidth_from_mhz(cell.channel_bandwidth_mhz)?;
    let scs = scs_from_khz(cell.common_scs)?;
    let coreset0 = Coreset0Config::from_index(cell.pdcch.common.coreset0_index)
        .map_err(|e| anyhow::anyhow!("invalid CORESET#0 index: {}", e))?;
    let coreset = coreset_layout_from(coreset0)?;
    let total_rbs = bandwidth.num_rbs(scs).unwrap_or(106);
    let dedicated_coreset = dedicated_coreset_from(&coreset, total_rbs);
    let plmn_id = plmn_id_from_str(&cell.plmn)?;
    let sib1 = Sib1Config {
        cell_id: CellId(0),
        plmn_id,
        tac: cell.tac,
        cell_selection_info: CellSelectionInfo::default(),
        freq_band_list: vec![cell.band],
    };
    let exp = &cell.scheduler;

    info!(pci = pci.0, bandwidth_mhz = cell.channel_bandwidth_mhz, scs_khz = cell.common_scs, "cell configuration loaded");

    Ok(CellSchedulerConfig {
        cell_id: CellId(0),
        scs,
        bandwidth,
        coreset,
        dedicated_coreset,
        ssb_period_ms: 20,
        sib1_period_ms: 160,
        coreset0,
        sib1,
        max_ul_grants_per_slot: exp.max_ul_grants_per_slot,
        max_pucchs_per_slot: exp.max_pucchs_per_slot,
        max_retx: exp.max_retx,
        harq_timeout_slots: exp.harq_timeout_slots,
        num_dl_harq_processes: exp.num_dl_harq_processes,
        num_ul_harq_processes: exp.num_ul_harq_processes,
        rar_window_slots: exp.rar_window_slots,
        max_msg3_retx: exp.max_msg3_retx,
        dl_feedback_k1_slots: exp.dl_feedback_k1_slots,
        cqi_drop_cancel_threshold: exp.cqi_drop_cancel_threshold,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("Starting Albor Space 5G GNodeB scheduler core");
    info!("Configuration file: {}", args.config);

    let cfg = GnbConfig::from_yaml_file(&args.config).context("loading cell configuration")?;
    let sched_config = build_scheduler_config(&cfg)?;
    let pci = Pci::new(cfg.cell_cfg.pci).expect("validated above");
    let cell_id = sched_config.cell_id;
    let scs = sched_config.scs;
    let slot_duration_us = scs.slot_duration_us();
    let handover_timeout_slots = cfg.cell_cfg.scheduler.handover_timeout_slots;

    let mut scheduler = CellScheduler::new(sched_config);
    let mut rrc = RrcController::new(cell_id, pci, handover_timeout_slots);
    let ngap_sink = NullNgapSink;

    info!("GNodeB initialized successfully, starting slot-tick loop");

    let mut slot = SlotPoint::new(scs, 0, 0);
    let slot_budget = Duration::from_micros(slot_duration_us as u64);
    let mut ticker = tokio::time::interval(slot_budget);
    let mut deadline_misses: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let tick_start = Instant::now();
                let result = scheduler.run_slot(slot);
                if !result.is_empty() {
                    tracing::debug!(
                        slot = %slot,
                        dl_grants = result.dl.ue_grants.len(),
                        ul_grants = result.ul.puschs.len(),
                        "slot scheduled"
                    );
                }
                for timed_out in rrc.tick_handovers() {
                    warn!(ue = timed_out, "handover timed out without completing");
                }

                for ue_index in scheduler.take_radio_link_failures() {
                    scheduler.remove_ue(ue_index);
                    if let Some(OutgoingMessage::ControlPlane(msg)) = rrc.radio_link_failure(ue_index) {
                        if let Err(err) = ngap_sink.send(msg) {
                            warn!(ue = ue_index, %err, "failed to send UE context release request");
                        }
                    }
                }

                let elapsed = tick_start.elapsed();
                if elapsed > slot_budget {
                    deadline_misses += 1;
                    warn!(
                        slot = %slot,
                        elapsed_us = elapsed.as_micros(),
                        budget_us = slot_budget.as_micros(),
                        total_deadline_misses = deadline_misses,
                        "slot processing deadline missed, catching up on next tick"
                    );
                }

                slot = slot.advance(1);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    if deadline_misses > 0 {
        warn!(total_deadline_misses = deadline_misses, "shutting down with outstanding slot deadline misses");
    }

    let metrics = rrc.metrics_report();
    info!(
        num_ues = metrics.num_ues,
        num_connected = metrics.num_connected,
        "GNodeB shutdown complete"
    );

    Ok(())
}
