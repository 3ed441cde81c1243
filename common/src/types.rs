//! Common Types for 5G GNodeB
//!
//! Defines fundamental types used throughout the protocol stack

use serde::{Deserialize, Serialize};
use num_derive::{FromPrimitive, ToPrimitive};
use std::fmt;

/// Radio Network Temporary Identifier (RNTI)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rnti(pub u16);

impl Rnti {
    /// Create a new RNTI
    pub fn new(value: u16) -> Self {
        Self(value)
    }

    /// Get the RNTI value
    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for Rnti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// Cell Identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellId(pub u16);

/// Physical Cell Identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pci(pub u16);

impl Pci {
    /// Maximum valid PCI value (0-1007)
    pub const MAX: u16 = 1007;

    /// Create a new PCI with validation
    pub fn new(value: u16) -> Option<Self> {
        if value <= Self::MAX {
            Some(Self(value))
        } else {
            None
        }
    }
}

/// Subcarrier spacing values in kHz
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive, Serialize, Deserialize)]
pub enum SubcarrierSpacing {
    /// 15 kHz
    Scs15 = 15,
    /// 30 kHz
    Scs30 = 30,
    /// 60 kHz
    Scs60 = 60,
    /// 120 kHz
    Scs120 = 120,
}

impl SubcarrierSpacing {
    /// Number of slots per 10ms radio frame for this numerology
    pub fn slots_per_frame(&self) -> u16 {
        match self {
            SubcarrierSpacing::Scs15 => 10,
            SubcarrierSpacing::Scs30 => 20,
            SubcarrierSpacing::Scs60 => 40,
            SubcarrierSpacing::Scs120 => 80,
        }
    }

    /// Slot duration in microseconds
    pub fn slot_duration_us(&self) -> u32 {
        match self {
            SubcarrierSpacing::Scs15 => 1000,
            SubcarrierSpacing::Scs30 => 500,
            SubcarrierSpacing::Scs60 => 250,
            SubcarrierSpacing::Scs120 => 125,
        }
    }
}

/// Bandwidth values in MHz
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bandwidth {
    /// 5 MHz
    Bw5,
    /// 10 MHz
    Bw10,
    /// 15 MHz
    Bw15,
    /// 20 MHz
    Bw20,
    /// 25 MHz
    Bw25,
    /// 30 MHz
    Bw30,
    /// 40 MHz
    Bw40,
    /// 50 MHz
    Bw50,
    /// 60 MHz
    Bw60,
    /// 80 MHz
    Bw80,
    /// 100 MHz
    Bw100,
}

impl Bandwidth {
    /// Get bandwidth in Hz
    pub fn as_hz(&self) -> u32 {
        match self {
            Bandwidth::Bw5 => 5_000_000,
            Bandwidth::Bw10 => 10_000_000,
            Bandwidth::Bw15 => 15_000_000,
            Bandwidth::Bw20 => 20_000_000,
            Bandwidth::Bw25 => 25_000_000,
            Bandwidth::Bw30 => 30_000_000,
            Bandwidth::Bw40 => 40_000_000,
            Bandwidth::Bw50 => 50_000_000,
            Bandwidth::Bw60 => 60_000_000,
            Bandwidth::Bw80 => 80_000_000,
            Bandwidth::Bw100 => 100_000_000,
        }
    }

    /// Number of resource blocks for this bandwidth at the given SCS
    /// (3GPP TS 38.104 Table 5.3.2-1)
    pub fn num_rbs(&self, scs: SubcarrierSpacing) -> Option<u16> {
        use Bandwidth::*;
        use SubcarrierSpacing::*;
        let n = match (self, scs) {
            (Bw5, Scs15) => 25,
            (Bw5, Scs30) => 11,
            (Bw10, Scs15) => 52,
            (Bw10, Scs30) => 24,
            (Bw15, Scs15) => 79,
            (Bw15, Scs30) => 38,
            (Bw20, Scs15) => 106,
            (Bw20, Scs30) => 51,
            (Bw20, Scs60) => 24,
            (Bw25, Scs15) => 133,
            (Bw25, Scs30) => 65,
            (Bw30, Scs15) => 160,
            (Bw30, Scs30) => 78,
            (Bw40, Scs15) => 216,
            (Bw40, Scs30) => 106,
            (Bw50, Scs15) => 270,
            (Bw50, Scs30) => 133,
            (Bw50, Scs60) => 65,
            (Bw60, Scs30) => 162,
            (Bw60, Scs60) => 79,
            (Bw80, Scs30) => 217,
            (Bw80, Scs60) => 107,
            (Bw100, Scs30) => 273,
            (Bw100, Scs60) => 135,
            _ => return None,
        };
        Some(n)
    }
}

/// Duplex mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplexMode {
    /// Frequency Division Duplex
    Fdd,
    /// Time Division Duplex, governed by a per-slot direction pattern
    Tdd,
}

/// QoS Class Identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Qci(pub u8);

impl Qci {
    /// Voice QCI
    pub const VOICE: Self = Self(1);
    /// Video QCI
    pub const VIDEO: Self = Self(2);
    /// Default bearer QCI
    pub const DEFAULT: Self = Self(9);
}

/// Tracking Area Code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tac(pub u32);

/// PLMN Identity (MCC + MNC)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlmnId {
    /// Mobile Country Code
    pub mcc: [u8; 3],
    /// Mobile Network Code (2 or 3 digits)
    pub mnc: [u8; 3],
    /// MNC length (2 or 3)
    pub mnc_len: u8,
}

impl PlmnId {
    /// Create a new PLMN ID
    pub fn new(mcc: [u8; 3], mnc: [u8; 3], mnc_len: u8) -> Option<Self> {
        if mnc_len == 2 || mnc_len == 3 {
            Some(Self { mcc, mnc, mnc_len })
        } else {
            None
        }
    }

    /// Encode to 3-byte format used in 3GPP
    pub fn encode(&self) -> [u8; 3] {
        let mut encoded = [0u8; 3];
        encoded[0] = (self.mcc[1] << 4) | self.mcc[0];
        encoded[1] = if self.mnc_len == 2 {
            0xF0 | self.mcc[2]
        } else {
            (self.mnc[2] << 4) | self.mcc[2]
        };
        encoded[2] = (self.mnc[1] << 4) | self.mnc[0];
        encoded
    }
}

/// S-NSSAI (Single Network Slice Selection Assistance Information)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SNssai {
    /// Slice/Service Type
    pub sst: u8,
    /// Slice Differentiator (optional)
    pub sd: Option<u32>,
}

/// A totally-ordered (system-frame-number, slot-in-frame) pair.
///
/// The SFN wraps modulo 1024 frames (3GPP TS 38.331). Arithmetic is modular;
/// comparisons are only meaningful for slots within a sliding window of less
/// than half the wrap period, as is true of any sequence-number scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotPoint {
    scs: SubcarrierSpacing,
    /// Absolute slot count since SFN 0, slot 0, not itself wrapped.
    count: u32,
}

impl SlotPoint {
    pub const NOF_SFNS: u32 = 1024;

    pub fn new(scs: SubcarrierSpacing, sfn: u16, slot_in_frame: u16) -> Self {
        let spf = scs.slots_per_frame() as u32;
        let sfn = (sfn as u32) % Self::NOF_SFNS;
        Self { scs, count: sfn * spf + slot_in_frame as u32 }
    }

    pub fn scs(&self) -> SubcarrierSpacing {
        self.scs
    }

    pub fn sfn(&self) -> u16 {
        let spf = self.scs.slots_per_frame() as u32;
        ((self.count / spf) % Self::NOF_SFNS) as u16
    }

    pub fn slot_in_frame(&self) -> u16 {
        let spf = self.scs.slots_per_frame() as u32;
        (self.count % spf) as u16
    }

    /// Slot index within the current system frame, used by the RA-RNTI and
    /// PDCCH candidate hash functions (3GPP formulas operate on this, not on SFN).
    pub fn slot_index(&self) -> u32 {
        self.count % self.scs.slots_per_frame() as u32
    }

    /// Advance by `n` slots, wrapping modulo the SFN period.
    pub fn advance(&self, n: u32) -> Self {
        let spf = self.scs.slots_per_frame() as u32;
        let wrap = spf * Self::NOF_SFNS;
        Self { scs: self.scs, count: (self.count + n) % wrap }
    }

    /// Signed distance in slots from `self` to `other` on the wraparound ring.
    /// Positive means `other` is ahead of `self`.
    pub fn slots_until(&self, other: SlotPoint) -> i64 {
        debug_assert_eq!(self.scs, other.scs, "slot arithmetic across numerologies");
        let spf = self.scs.slots_per_frame() as i64;
        let wrap = spf * Self::NOF_SFNS as i64;
        let diff = other.count as i64 - self.count as i64;
        let half = wrap / 2;
        ((diff % wrap) + wrap + half) % wrap - half
    }

    pub fn is_before(&self, other: SlotPoint) -> bool {
        self.slots_until(other) > 0
    }
}

impl fmt::Display for SlotPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.sfn(), self.slot_in_frame())
    }
}

/// A half-open contiguous range `[start, stop)` on the frequency grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RbInterval {
    pub start: u16,
    pub stop: u16,
}

impl RbInterval {
    pub fn new(start: u16, stop: u16) -> Option<Self> {
        if start < stop {
            Some(Self { start, stop })
        } else {
            None
        }
    }

    pub fn len(&self) -> u16 {
        self.stop - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.stop
    }

    pub fn overlaps(&self, other: &RbInterval) -> bool {
        self.start < other.stop && other.start < self.stop
    }

    pub fn contains(&self, other: &RbInterval) -> bool {
        self.start <= other.start && other.stop <= self.stop
    }
}

/// A half-open contiguous range `[start, stop)` of OFDM symbols within a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolRange {
    pub start: u8,
    pub stop: u8,
}

impl SymbolRange {
    pub const SYMBOLS_PER_SLOT: u8 = 14;

    pub fn new(start: u8, stop: u8) -> Option<Self> {
        if start < stop && stop <= Self::SYMBOLS_PER_SLOT {
            Some(Self { start, stop })
        } else {
            None
        }
    }

    pub fn len(&self) -> u8 {
        self.stop - self.start
    }

    pub fn overlaps(&self, other: &SymbolRange) -> bool {
        self.start < other.stop && other.start < self.stop
    }
}
