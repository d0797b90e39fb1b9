//! Descriptor-list builders for recurring electrical architectures.

use amps_core::{
    BattConfig, BusConfig, CbConfig, CompConfig, GenConfig, LoadConfig, TruConfig,
};

/// The simplest complete network: one battery feeding one load through a
/// breaker. Used everywhere as a smoke-test rig.
///
/// Components: `BATT`, `DC_BUS`, `FEED_CB`, `LOAD_BUS`, `LOAD`.
pub fn single_battery_feeder(
    batt_volts: f64,
    cb_amps: f64,
    load_amps: f64,
) -> Vec<CompConfig> {
    vec![
        CompConfig::batt(
            "BATT",
            BattConfig::new(batt_volts, 4.0e6, 1000.0),
        ),
        CompConfig::bus("DC_BUS", BusConfig::dc(["BATT", "FEED_CB"])),
        CompConfig::cb("FEED_CB", CbConfig::new(cb_amps)),
        CompConfig::bus("LOAD_BUS", BusConfig::dc(["FEED_CB", "LOAD"])),
        CompConfig::load("LOAD", LoadConfig::dc_amps(load_amps)),
    ]
}

/// Tunables for one generator channel.
#[derive(Debug, Clone)]
pub struct DcChannelOptions {
    pub ac_volts: f64,
    pub ac_freq: f64,
    pub dc_volts: f64,
    pub min_rpm: f64,
    pub max_rpm: f64,
    pub gen_pwr: f64,
    pub tru_pwr: f64,
}

impl Default for DcChannelOptions {
    fn default() -> Self {
        DcChannelOptions {
            ac_volts: 115.0,
            ac_freq: 400.0,
            dc_volts: 28.0,
            min_rpm: 4000.0,
            max_rpm: 6000.0,
            gen_pwr: 20_000.0,
            tru_pwr: 1500.0,
        }
    }
}

/// One engine-driven channel: AC generator onto an AC bus, TRU down to a DC
/// bus. Component names are prefixed so multiple channels coexist:
/// `<P>_GEN`, `<P>_AC_BUS`, `<P>_TRU`, `<P>_DC_BUS`.
pub fn dc_channel(prefix: &str, opts: &DcChannelOptions) -> Vec<CompConfig> {
    let gen = format!("{prefix}_GEN");
    let ac_bus = format!("{prefix}_AC_BUS");
    let tru = format!("{prefix}_TRU");
    let dc_bus = format!("{prefix}_DC_BUS");
    vec![
        CompConfig::gen(
            gen.clone(),
            GenConfig::ac(
                opts.ac_volts,
                opts.ac_freq,
                opts.min_rpm,
                opts.max_rpm,
                opts.gen_pwr,
            ),
        ),
        CompConfig::bus(ac_bus.clone(), BusConfig::ac([gen, tru.clone()])),
        CompConfig::tru(
            tru.clone(),
            TruConfig::new(
                opts.ac_volts,
                opts.dc_volts,
                opts.tru_pwr,
                ac_bus,
                dc_bus.clone(),
            ),
        ),
        CompConfig::bus(dc_bus, BusConfig::dc([tru])),
    ]
}

/// Two independent generator channels whose DC buses can be cross-tied,
/// each carrying one load. The tie (`XTIE`) starts open; close it to let
/// either channel carry both loads.
///
/// Channel prefixes are `L` and `R`; the loads are `L_LOAD` and `R_LOAD`.
pub fn dual_channel_with_tie(opts: &DcChannelOptions, load_amps: f64) -> Vec<CompConfig> {
    let mut configs = Vec::new();
    for prefix in ["L", "R"] {
        let mut channel = dc_channel(prefix, opts);
        // hang a load and the tie off each channel's DC bus
        let dc_bus = format!("{prefix}_DC_BUS");
        let load = format!("{prefix}_LOAD");
        for cfg in channel.iter_mut() {
            if cfg.name == dc_bus {
                if let amps_core::CompKind::Bus(bus) = &mut cfg.kind {
                    bus.comps.push(load.clone());
                    bus.comps.push("XTIE".to_string());
                }
            }
        }
        configs.extend(channel);
        configs.push(CompConfig::load(load, LoadConfig::dc_amps(load_amps)));
    }
    configs.push(CompConfig::tie("XTIE"));
    configs
}
