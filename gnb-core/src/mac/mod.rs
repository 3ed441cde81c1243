//! Medium Access Control scheduling: system signals, random access, and the
//! per-slot UE scheduler.

pub mod ra;
pub mod scheduler;
pub mod sib1;

pub use ra::{ra_rnti, Msg3Outcome, PendingRa, RaManager};
pub use scheduler::{CellScheduler, CellSchedulerConfig, Coreset0Config};
pub use sib1::{default_sib1_config, Sib1Config, Sib1Generator};
