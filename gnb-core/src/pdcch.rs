//! PDCCH candidate allocation: deriving blind-decode candidate locations
//! (3GPP TS 38.213 §10.1 `Y_p` hash) and picking an aggregation level from
//! channel quality, then booking the CCEs on the resource grid so no two
//! UEs' candidates collide within a slot.

use crate::grid::{Direction, ResourceGrid};
use common::types::{RbInterval, Rnti, SlotPoint, SymbolRange};

/// Aggregation levels supported, in increasing order of robustness.
pub const AGGREGATION_LEVELS: [u8; 5] = [1, 2, 4, 8, 16];

/// Number of CCEs available in the CORESET's search space this component
/// allocates from (kept simple: one CORESET, no carrier aggregation).
#[derive(Debug, Clone, Copy)]
pub struct CoresetLayout {
    pub num_cces: u16,
    /// RB interval and symbol range the CORESET occupies on the grid, used
    /// only to book the PDCCH region as unavailable for PDSCH/PUSCH.
    pub rbs: RbInterval,
    pub symbols: SymbolRange,
}

/// Candidates available at one aggregation level within a search space.
fn num_candidates_for_level(level: u8, num_cces: u16) -> u16 {
    // A simplified, monotonically-decreasing candidate count per level,
    // following the shape of 3GPP TS 38.213 Table 10.1-2 for UE-specific
    // search spaces without naming every entry of that table.
    let max_by_capacity = num_cces / level.max(1) as u16;
    let nominal = match level {
        1 => 6,
        2 => 6,
        4 => 4,
        8 => 2,
        16 => 1,
        _ => 1,
    };
    nominal.min(max_by_capacity).max(if max_by_capacity > 0 { 1 } else { 0 })
}

/// 3GPP TS 38.213 §10.1 `Y_p` hash recursion, seeded by RNTI.
fn y_p(rnti: Rnti, slot_index: u32) -> u64 {
    const A_P: u64 = 39827; // coreset index 0 constant
    const D: u64 = 65537;
    let mut y: u64 = rnti.value() as u64;
    // Y_p is recomputed from the seed for each slot, iterating n_s+1 times
    // per the recursive definition Y_{-1} = nRNTI, Y_k = (A*Y_{k-1}) mod D.
    for _ in 0..=slot_index {
        y = (A_P * y) % D;
    }
    y
}

/// One candidate location, expressed as its starting CCE index.
#[derive(Debug, Clone, Copy)]
pub struct PdcchCandidate {
    pub aggregation_level: u8,
    pub candidate_index: u8,
    pub cce_start: u16,
}

/// Derive the blind-decode candidate set for a UE (or RA-RNTI / SI-RNTI) at
/// a given aggregation level, per the Y_p hash.
pub fn derive_candidates(rnti: Rnti, slot: SlotPoint, level: u8, coreset: &CoresetLayout) -> Vec<PdcchCandidate> {
    let n_cces = coreset.num_cces;
    let m_l = num_candidates_for_level(level, n_cces);
    if m_l == 0 || level == 0 {
        return Vec::new();
    }
    let y = y_p(rnti, slot.slot_index());
    let cces_per_level_window = (n_cces / level as u16).max(1);
    (0..m_l)
        .map(|m| {
            let offset = (m as u64 * n_cces as u64) / (level as u64 * m_l as u64);
            let n_cce = level as u64 * ((y + offset) % cces_per_level_window as u64);
            PdcchCandidate {
                aggregation_level: level,
                candidate_index: m as u8,
                cce_start: n_cce as u16,
            }
        })
        .collect()
}

/// Pick an aggregation level from a CQI index (0-15, 3GPP TS 38.214 Table
/// 5.2.2.1-2): higher CQI means better channel means a smaller (less
/// robust, more spectrally efficient) aggregation level suffices. The
/// mapping is monotonic in CQI, per the invariant that link quality can
/// only ever make PDCCH robustness requirements looser, never tighter.
pub fn select_aggregation_level(cqi: u8) -> u8 {
    match cqi {
        0..=3 => 16,
        4..=6 => 8,
        7..=9 => 4,
        10..=12 => 2,
        _ => 1,
    }
}

/// Try to book a PDCCH candidate for `rnti` at a CQI-derived aggregation
/// level, falling back to higher levels if the chosen one is fully booked
/// this slot, and to lower candidate indices (3GPP's tie-break: lowest
/// index first) within a level.
pub fn allocate_pdcch(
    grid: &mut ResourceGrid,
    slot: SlotPoint,
    rnti: Rnti,
    cqi: u8,
    coreset: &CoresetLayout,
    booked_cces: &mut Vec<(u16, u16)>,
) -> Option<PdcchCandidate> {
    let start_level_idx = AGGREGATION_LEVELS
        .iter()
        .position(|&l| l == select_aggregation_level(cqi))
        .unwrap_or(0);

    for &level in &AGGREGATION_LEVELS[start_level_idx..] {
        let candidates = derive_candidates(rnti, slot, level, coreset);
        for cand in candidates {
            let range = (cand.cce_start, cand.cce_start + level as u16);
            let free = booked_cces.iter().all(|&(s, e)| e <= range.0 || range.1 <= s);
            if free {
                booked_cces.push(range);
                let _ = grid.reserve(slot, Direction::Downlink, coreset.rbs, coreset.symbols);
                return Some(cand);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::SubcarrierSpacing;

    fn coreset() -> CoresetLayout {
        CoresetLayout {
            num_cces: 48,
            rbs: RbInterval::new(0, 24).unwrap(),
            symbols: SymbolRange::new(0, 2).unwrap(),
        }
    }

    #[test]
    fn test_aggregation_level_monotonic_in_cqi() {
        assert!(select_aggregation_level(1) >= select_aggregation_level(5));
        assert!(select_aggregation_level(5) >= select_aggregation_level(11));
        assert!(select_aggregation_level(11) >= select_aggregation_level(15));
    }

    #[test]
    fn test_candidates_stay_within_coreset() {
        let rnti = Rnti::new(0x4601);
        let slot = SlotPoint::new(SubcarrierSpacing::Scs30, 0, 3);
        let cs = coreset();
        for &level in &AGGREGATION_LEVELS {
            for cand in derive_candidates(rnti, slot, level, &cs) {
                assert!(cand.cce_start + level as u16 <= cs.num_cces);
            }
        }
    }

    #[test]
    fn test_allocate_avoids_collisions() {
        let mut grid = ResourceGrid::new(4);
        let slot = SlotPoint::new(SubcarrierSpacing::Scs30, 0, 0);
        grid.slot_indication(slot);
        let cs = coreset();
        let mut booked = Vec::new();

        let first = allocate_pdcch(&mut grid, slot, Rnti::new(0x4601), 8, &cs, &mut booked);
        assert!(first.is_some());
        let _second = allocate_pdcch(&mut grid, slot, Rnti::new(0x4602), 8, &cs, &mut booked);

        // No two booked CCE ranges may overlap, regardless of how many UEs
        // were allocated in this slot.
        for i in 0..booked.len() {
            for j in (i + 1)..booked.len() {
                let (s1, e1) = booked[i];
                let (s2, e2) = booked[j];
                assert!(e1 <= s2 || e2 <= s1, "booked CCE ranges overlap");
            }
        }
    }
}
