//! Resource grid bookkeeping: which RB × OFDM-symbol regions of a slot are
//! already booked, for DL and UL independently.
//!
//! This is a booking table, not a PHY sample buffer: PHY signal processing
//! lives outside this crate's scope entirely. The grid's only job is to let
//! every other scheduler component ask "is this region free?" and commit to
//! it atomically, so two components never double-book the same REs.

use common::types::{RbInterval, SlotPoint, SymbolRange};
use tracing::trace;

/// Direction a reservation is made in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Downlink,
    Uplink,
}

/// One booked region within a slot.
#[derive(Debug, Clone, Copy)]
struct Booking {
    rbs: RbInterval,
    symbols: SymbolRange,
}

/// Per-slot booking state for both directions.
#[derive(Debug, Clone, Default)]
struct SlotBookings {
    dl: Vec<Booking>,
    ul: Vec<Booking>,
}

impl SlotBookings {
    fn bookings(&self, dir: Direction) -> &Vec<Booking> {
        match dir {
            Direction::Downlink => &self.dl,
            Direction::Uplink => &self.ul,
        }
    }

    fn bookings_mut(&mut self, dir: Direction) -> &mut Vec<Booking> {
        match dir {
            Direction::Downlink => &mut self.dl,
            Direction::Uplink => &mut self.ul,
        }
    }

    fn is_free(&self, dir: Direction, rbs: RbInterval, symbols: SymbolRange) -> bool {
        self.bookings(dir)
            .iter()
            .all(|b| !b.rbs.overlaps(&rbs) || !b.symbols.overlaps(&symbols))
    }

    fn clear(&mut self) {
        self.dl.clear();
        self.ul.clear();
    }
}

/// A ring buffer of per-slot resource grids, indexed by slot count modulo
/// its capacity. Only a handful of slots are ever live at once (the PHY
/// processing pipeline delay plus a small safety margin), so the grid never
/// needs to remember history past that window — incoming slot indications
/// recycle the oldest entry.
pub struct ResourceGrid {
    capacity: usize,
    slots: Vec<SlotBookings>,
    /// Slot count (absolute, not the wrapped SFN) of `slots[0]`.
    base_count: u64,
}

impl ResourceGrid {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "resource grid needs at least one live slot");
        Self {
            capacity,
            slots: vec![SlotBookings::default(); capacity],
            base_count: 0,
        }
    }

    fn slot_count(slot: SlotPoint) -> u64 {
        // Absolute ordering within the SFN window is all we need here; the
        // ring buffer only ever holds `capacity` consecutive slots so modular
        // wraparound across the full 1024-frame period never matters.
        (slot.sfn() as u64) * slot.scs().slots_per_frame() as u64 + slot.slot_in_frame() as u64
    }

    /// Advance the live window to `slot`, recycling entries that fall out of it.
    pub fn slot_indication(&mut self, slot: SlotPoint) {
        let count = Self::slot_count(slot);
        if count < self.base_count {
            // Wrapped around the SFN period; treat as a fresh window.
            self.base_count = count;
            for s in &mut self.slots {
                s.clear();
            }
            return;
        }
        let advance = (count - self.base_count) as usize;
        if advance == 0 {
            return;
        }
        let to_clear = advance.min(self.capacity);
        for i in 0..to_clear {
            let idx = (self.index_of(self.base_count) + i) % self.capacity;
            self.slots[idx].clear();
        }
        self.base_count = count;
        trace!(slot = %slot, "resource grid advanced");
    }

    fn index_of(&self, count: u64) -> usize {
        (count % self.capacity as u64) as usize
    }

    fn slot_mut(&mut self, slot: SlotPoint) -> Option<&mut SlotBookings> {
        let count = Self::slot_count(slot);
        if count < self.base_count || count - self.base_count >= self.capacity as u64 {
            return None;
        }
        let idx = self.index_of(count);
        Some(&mut self.slots[idx])
    }

    fn slot_ref(&self, slot: SlotPoint) -> Option<&SlotBookings> {
        let count = Self::slot_count(slot);
        if count < self.base_count || count - self.base_count >= self.capacity as u64 {
            return None;
        }
        let idx = self.index_of(count);
        Some(&self.slots[idx])
    }

    /// Returns true if `rbs`/`symbols` is free of any existing booking for
    /// the given direction in `slot`.
    pub fn is_free(&self, slot: SlotPoint, dir: Direction, rbs: RbInterval, symbols: SymbolRange) -> bool {
        match self.slot_ref(slot) {
            Some(s) => s.is_free(dir, rbs, symbols),
            None => false,
        }
    }

    /// Attempt to reserve a region. Fails atomically (no partial booking) if
    /// the region overlaps an existing reservation in the same direction, or
    /// if `slot` has already rolled out of the live window.
    pub fn reserve(
        &mut self,
        slot: SlotPoint,
        dir: Direction,
        rbs: RbInterval,
        symbols: SymbolRange,
    ) -> bool {
        match self.slot_mut(slot) {
            Some(s) => {
                if !s.is_free(dir, rbs, symbols) {
                    return false;
                }
                s.bookings_mut(dir).push(Booking { rbs, symbols });
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::SubcarrierSpacing;

    fn slot(n: u16) -> SlotPoint {
        SlotPoint::new(SubcarrierSpacing::Scs30, 0, n)
    }

    #[test]
    fn test_reserve_rejects_overlap() {
        let mut grid = ResourceGrid::new(4);
        let s = slot(0);
        grid.slot_indication(s);
        let rbs = RbInterval::new(0, 10).unwrap();
        let syms = SymbolRange::new(0, 4).unwrap();
        assert!(grid.reserve(s, Direction::Downlink, rbs, syms));

        let overlap = RbInterval::new(5, 15).unwrap();
        assert!(!grid.reserve(s, Direction::Downlink, overlap, syms));

        // Same RBs, different direction: independent bitmaps.
        assert!(grid.reserve(s, Direction::Uplink, rbs, syms));
    }

    #[test]
    fn test_reserve_disjoint_symbols_allowed() {
        let mut grid = ResourceGrid::new(4);
        let s = slot(0);
        grid.slot_indication(s);
        let rbs = RbInterval::new(0, 10).unwrap();
        assert!(grid.reserve(s, Direction::Downlink, rbs, SymbolRange::new(0, 2).unwrap()));
        assert!(grid.reserve(s, Direction::Downlink, rbs, SymbolRange::new(2, 4).unwrap()));
    }

    #[test]
    fn test_slot_indication_recycles_old_slots() {
        let mut grid = ResourceGrid::new(2);
        let s0 = slot(0);
        grid.slot_indication(s0);
        let rbs = RbInterval::new(0, 10).unwrap();
        let syms = SymbolRange::new(0, 4).unwrap();
        assert!(grid.reserve(s0, Direction::Downlink, rbs, syms));

        // Advancing two slots recycles s0's bookings out of the live window.
        let s2 = slot(2);
        grid.slot_indication(s2);
        assert!(!grid.is_free(s0, Direction::Downlink, rbs, syms));
        assert!(grid.is_free(s2, Direction::Downlink, rbs, syms));
    }
}
