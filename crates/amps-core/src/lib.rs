//! # amps-core: Electrical Network Simulation Engine
//!
//! Fixed-timestep physics engine for aircraft-style electrical systems:
//! batteries, generators, transformer-rectifier units, inverters,
//! transformers, buses, loads, circuit breakers, shunts, ties and diodes.
//!
//! ## Design Philosophy
//!
//! Networks are an **arena of components** addressed by stable integer ids:
//! - Components hold their neighbor links as indices, never owning pointers,
//!   so bidirectional references and electrical loops cannot form ownership
//!   cycles.
//! - The component type set is **closed**: every traversal function matches
//!   exhaustively over [`CompType`], so adding a type forces an audit of
//!   every pass at compile time.
//! - Each simulation step runs two depth-first passes: voltage *painting*
//!   (sources outward) followed by current *integration* (loads back to
//!   sources). The pass order is fixed and load-bearing.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use amps_core::*;
//!
//! let configs = vec![
//!     CompConfig::batt("MAIN_BATT", BattConfig::new(25.4, 40.0 * 3600.0 * 24.0, 1000.0)),
//!     CompConfig::bus("DC_BUS", BusConfig::dc(["MAIN_BATT", "FEED_CB"])),
//!     CompConfig::cb("FEED_CB", CbConfig::new(10.0)),
//!     CompConfig::bus("LOAD_BUS", BusConfig::dc(["FEED_CB", "PITOT_HEAT"])),
//!     CompConfig::load("PITOT_HEAT", LoadConfig::dc_amps(5.0)),
//! ];
//! let sys = ElecSys::new(configs).unwrap();
//! sys.start().unwrap();
//! let volts = sys.comp("LOAD_BUS").unwrap().in_volts();
//! sys.stop();
//! # let _ = volts;
//! ```
//!
//! ## Modules
//!
//! - [`config`] - Immutable component descriptors and their validation
//! - [`network`] - Arena construction, link resolution, topology diagnostics
//! - [`state`] - Work/published electrical state and per-type dynamic state
//! - [`paint`] - Voltage propagation pass
//! - [`integrate`] - Current accumulation pass
//! - [`step`] - Per-tick phase orchestrator
//! - [`sched`] - Worker thread, public [`ElecSys`] handle
//! - [`snapshot`] - Session persistence keyed by component name
//!
//! ## Concurrency model
//!
//! One background worker thread runs the step loop at a fixed cadence. All
//! reader/mutator entry points go through fine-grained per-component locks;
//! the full step itself is serialized behind a single worker interlock. See
//! [`sched::ElecSys`] for the guarantees.

use serde::{Deserialize, Serialize};

pub mod config;
pub mod curve;
pub mod diagnostics;
pub mod error;
pub mod integrate;
pub mod network;
pub mod paint;
pub mod sched;
pub mod snapshot;
pub mod state;
pub mod step;

pub use config::{
    BattConfig, BusConfig, CbConfig, ChargerConfig, CompConfig, CompKind, DiodeConfig, GenConfig,
    InvConfig, LabelBoxConfig, LoadConfig, ShuntConfig, TieConfig, TruConfig, XfrmrConfig,
};
pub use curve::{filter_in, Curve};
pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{ElecError, ElecResult};
pub use network::{Network, TopologyStats};
pub use sched::{CompHandle, ElecSys};
pub use snapshot::SystemSnapshot;
pub use state::PowerState;

/// Maximum number of simultaneous power sources in one network.
///
/// Every source-capable component (battery, generator, TRU, inverter,
/// transformer) gets a small source index at construction; per-link current
/// bookkeeping is a fixed array of this size and source membership is a
/// plain `u64` bitmask.
pub const MAX_SRCS: usize = 64;

/// Hard traversal depth cap. Any well-formed network fits comfortably; the
/// cap exists to catch malformed (cyclic with respect to power direction)
/// configurations that slipped through construction.
pub const MAX_DEPTH: usize = 100;

/// Nominal worker step interval.
pub const STEP_INTERVAL: std::time::Duration = std::time::Duration::from_millis(50);

/// Stable arena index of a component. Assigned in descriptor order at
/// construction and never reused; valid for the lifetime of the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompId(pub(crate) usize);

impl CompId {
    #[inline]
    pub fn new(value: usize) -> Self {
        CompId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

/// Index into the network's source table (`< MAX_SRCS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SrcIdx(pub(crate) u8);

impl SrcIdx {
    #[inline]
    pub fn new(value: u8) -> Self {
        debug_assert!((value as usize) < MAX_SRCS);
        SrcIdx(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0 as usize
    }
    #[inline]
    pub fn mask(&self) -> u64 {
        1u64 << self.0
    }
}

/// The closed set of component types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompType {
    Batt,
    Gen,
    Tru,
    Inv,
    Xfrmr,
    Load,
    Bus,
    Cb,
    Shunt,
    Tie,
    Diode,
    LabelBox,
}

impl CompType {
    /// Short uppercase tag, used in diagnostics and DOT dumps.
    pub fn tag(&self) -> &'static str {
        match self {
            CompType::Batt => "BATT",
            CompType::Gen => "GEN",
            CompType::Tru => "TRU",
            CompType::Inv => "INV",
            CompType::Xfrmr => "XFRMR",
            CompType::Load => "LOAD",
            CompType::Bus => "BUS",
            CompType::Cb => "CB",
            CompType::Shunt => "SHUNT",
            CompType::Tie => "TIE",
            CompType::Diode => "DIODE",
            CompType::LabelBox => "LABEL_BOX",
        }
    }

    /// Whether this type can own a source index (can energize others).
    pub fn is_src_capable(&self) -> bool {
        matches!(
            self,
            CompType::Batt | CompType::Gen | CompType::Tru | CompType::Inv | CompType::Xfrmr
        )
    }
}

impl std::fmt::Display for CompType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// AC/DC electrical domain of a bus-side connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerDomain {
    Ac,
    Dc,
}

impl PowerDomain {
    #[inline]
    pub fn is_ac(&self) -> bool {
        matches!(self, PowerDomain::Ac)
    }
}

impl std::fmt::Display for PowerDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PowerDomain::Ac => f.write_str("AC"),
            PowerDomain::Dc => f.write_str("DC"),
        }
    }
}
