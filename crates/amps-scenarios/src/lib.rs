//! Canonical network layouts and network-file loading for amps-core.
//!
//! The builders produce descriptor lists for the electrical architectures
//! that come up again and again (single-battery feeders, generator channels
//! with TRUs, split-bus systems with cross-ties), both as starting points
//! for real configurations and as rigs for tests and benchmarks. The file
//! module reads whole networks from YAML or JSON.

pub mod builders;
pub mod file;

pub use builders::{dc_channel, dual_channel_with_tie, single_battery_feeder, DcChannelOptions};
pub use file::{load_network_from_path, load_system_from_path, NetworkFile};
