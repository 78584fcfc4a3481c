//! PCI Express link serialization model.
//!
//! DMA latency is derived from how long the payload occupies the link: the payload is split into
//! TLPs, each TLP carries fixed framing/header/DLLP overhead, and the resulting byte stream is
//! sent through the line encoding at the per-lane transfer rate.

use serde::Deserialize;

use crate::Tick;

/// Largest TLP payload the link model uses when splitting a transfer.
pub const MAX_PAYLOAD_SIZE: u64 = 4096;

/// Per-TLP overhead in bytes (STP/END framing, sequence number, 3/4 DW header, LCRC, ECRC and the
/// amortized ACK DLLP).
pub const TLP_OVERHEAD: u64 = 36;

const PS_PER_US: u128 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum PcieGeneration {
    #[serde(rename = "gen1")]
    Gen1,
    #[serde(rename = "gen2")]
    Gen2,
    #[serde(rename = "gen3")]
    Gen3,
}

impl PcieGeneration {
    /// Raw per-lane transfer rate in MT/s.
    pub const fn transfer_rate_mts(self) -> u64 {
        match self {
            Self::Gen1 => 2500,
            Self::Gen2 => 5000,
            Self::Gen3 => 8000,
        }
    }

    /// Line encoding as `(payload bits, line bits)`.
    pub const fn encoding(self) -> (u64, u64) {
        match self {
            Self::Gen1 | Self::Gen2 => (8, 10),
            Self::Gen3 => (128, 130),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcieLink {
    generation: PcieGeneration,
    lanes: u8,
}

impl PcieLink {
    pub const VALID_LANES: [u8; 6] = [1, 2, 4, 8, 16, 32];

    /// Creates a link description.
    ///
    /// # Panics
    ///
    /// Panics if `lanes` is not a legal PCIe link width. Configuration loading validates this
    /// before reaching here.
    pub fn new(generation: PcieGeneration, lanes: u8) -> Self {
        assert!(
            Self::VALID_LANES.contains(&lanes),
            "invalid PCIe link width x{lanes}"
        );
        Self { generation, lanes }
    }

    pub fn generation(&self) -> PcieGeneration {
        self.generation
    }

    pub fn lanes(&self) -> u8 {
        self.lanes
    }

    /// Number of TLPs needed to move `bytes`. An empty transfer still costs one TLP.
    pub fn tlp_count(bytes: u64) -> u64 {
        bytes.div_ceil(MAX_PAYLOAD_SIZE).max(1)
    }

    /// Time the link is occupied moving `bytes` of payload, in ticks (picoseconds).
    pub fn transfer_latency(&self, bytes: u64) -> Tick {
        let (data_bits, line_bits) = self.generation.encoding();
        let wire_bytes =
            u128::from(bytes) + u128::from(Self::tlp_count(bytes)) * u128::from(TLP_OVERHEAD);
        let line_symbols = wire_bytes * 8 * u128::from(line_bits) / u128::from(data_bits);
        let rate = u128::from(self.generation.transfer_rate_mts()) * u128::from(self.lanes);

        // One transfer moves one line bit per lane; MT/s is bits per microsecond per lane.
        let latency = (line_symbols * PS_PER_US).div_ceil(rate);
        Tick::try_from(latency).unwrap_or(Tick::MAX)
    }
}

impl Default for PcieLink {
    fn default() -> Self {
        Self::new(PcieGeneration::Gen2, 4)
    }
}
