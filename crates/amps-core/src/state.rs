//! Dynamic electrical state.
//!
//! Every component carries two copies of [`PowerState`]: a *work* copy the
//! step passes mutate freely, and a *published* copy swapped in atomically at
//! the end of the step. Readers only ever see fully-integrated snapshots.
//!
//! Per-type dynamic state ([`TypeState`]) is work-side only; the quantities
//! readers care about (charge level, breaker temperature, tie positions) are
//! mirrored into the published side or the control block by the publisher.

use serde::{Deserialize, Serialize};

/// Electrical state of one component for one step.
///
/// "in" and "out" are relative to power flow direction, not wiring: for a
/// battery discharging, `out_volts`/`out_amps` face the bus; while charging,
/// current arrives on the *in* side instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PowerState {
    pub in_volts: f64,
    pub out_volts: f64,
    pub in_amps: f64,
    pub out_amps: f64,
    /// Portion of `out_amps` flowing into short circuits downstream.
    pub short_amps: f64,
    pub in_pwr: f64,
    pub out_pwr: f64,
    pub in_freq: f64,
    pub out_freq: f64,
    /// Bitmask of source-table indices currently energizing this component.
    pub src_mask: u64,
    /// The source whose voltage won the paint pass at this component; the
    /// integration pass only descends along matching ownership.
    pub paint_src: Option<crate::SrcIdx>,
    /// Neighbor the winning paint arrived through. Integration re-enters a
    /// component only from this side, so ring topologies cannot double-count
    /// a subtree even when one source owns the whole ring.
    pub paint_upstream: Option<crate::CompId>,
    /// Simulated failure flag. A failed component stops conducting (loads
    /// stop drawing); it is not an engine error.
    pub failed: bool,
    /// Simulated short to ground.
    pub shorted: bool,
    /// Fraction of current reaching the real consumer when shorted; the
    /// remainder leaks. 1.0 when not shorted.
    pub leak_factor: f64,
}

impl PowerState {
    pub fn new() -> Self {
        PowerState {
            leak_factor: 1.0,
            ..Default::default()
        }
    }

    /// Zero the per-step electrical quantities, keeping the fault flags
    /// (those are re-merged from the control block separately).
    pub fn clear_electrical(&mut self) {
        self.in_volts = 0.0;
        self.out_volts = 0.0;
        self.in_amps = 0.0;
        self.out_amps = 0.0;
        self.short_amps = 0.0;
        self.in_pwr = 0.0;
        self.out_pwr = 0.0;
        self.in_freq = 0.0;
        self.out_freq = 0.0;
        self.src_mask = 0;
        self.paint_src = None;
        self.paint_upstream = None;
    }

    /// A component is powered when voltage has been painted onto its input.
    #[inline]
    pub fn is_powered(&self) -> bool {
        self.in_volts > 0.0
    }
}

/// Battery work state.
#[derive(Debug, Clone)]
pub struct BattState {
    /// Output current of the previous step; the voltage-sag law needs the
    /// draw before this step's voltage can be painted.
    pub prev_amps: f64,
    /// Relative state of charge, 0..=1.
    pub chg_rel: f64,
    /// Recharge power absorbed this step, Watts.
    pub rechg_w: f64,
    /// Cell temperature in Kelvin.
    pub temp_k: f64,
}

impl BattState {
    pub fn new(init_temp: f64) -> Self {
        BattState {
            prev_amps: 0.0,
            chg_rel: 1.0,
            rechg_w: 0.0,
            temp_k: init_temp,
        }
    }
}

/// Generator work state. The stabilization bounds are derived once from the
/// rpm band at construction.
#[derive(Debug, Clone)]
pub struct GenState {
    /// Current drive rpm (set through the control block or a callback).
    pub rpm: f64,
    /// Center of the governed rpm band.
    pub ctr_rpm: f64,
    /// Governor authority limits: `ctr_rpm / max_rpm` and `ctr_rpm / min_rpm`.
    pub min_stab: f64,
    pub max_stab: f64,
    /// Lagged correction factors for voltage and frequency regulation.
    pub stab_factor_u: f64,
    pub stab_factor_f: f64,
    /// Conversion efficiency of the previous step.
    pub eff: f64,
}

impl GenState {
    pub fn new(min_rpm: f64, max_rpm: f64) -> Self {
        let ctr_rpm = (min_rpm + max_rpm) / 2.0;
        GenState {
            rpm: ctr_rpm,
            ctr_rpm,
            min_stab: ctr_rpm / max_rpm,
            max_stab: ctr_rpm / min_rpm,
            stab_factor_u: 1.0,
            stab_factor_f: 1.0,
            eff: 1.0,
        }
    }
}

/// TRU / inverter / transformer work state.
#[derive(Debug, Clone)]
pub struct TruState {
    /// Charger back-off factor, 0..=1. Stays 1.0 for plain TRUs.
    pub chgr_regul: f64,
    /// Conversion efficiency of the previous step.
    pub eff: f64,
}

impl TruState {
    pub fn new() -> Self {
        TruState {
            chgr_regul: 1.0,
            eff: 1.0,
        }
    }
}

impl Default for TruState {
    fn default() -> Self {
        Self::new()
    }
}

/// Load work state.
#[derive(Debug, Clone)]
pub struct LoadState {
    /// Voltage across the input capacitor (0 when the load has none).
    pub incap_u: f64,
    /// Charge moved into the capacitor this step, Coulombs.
    pub incap_d_q: f64,
    /// Slowly-drifting multiplier on the baseline demand, around 1.0.
    pub random_load_factor: f64,
    /// Externally injected demand for this step (Watts or Amps per the
    /// load's mode), staged by the reset phase from the control block.
    pub ext_demand: f64,
}

impl LoadState {
    pub fn new() -> Self {
        LoadState {
            incap_u: 0.0,
            incap_d_q: 0.0,
            random_load_factor: 1.0,
            ext_demand: 0.0,
        }
    }
}

impl Default for LoadState {
    fn default() -> Self {
        Self::new()
    }
}

/// Breaker work state.
#[derive(Debug, Clone)]
pub struct CbState {
    /// Closed/open position the physics uses this step. Copied from the
    /// control block at reset so a mid-step toggle can't split the pass.
    pub wk_set: bool,
    /// Thermal state, 0..; reaching 1.0 trips the breaker open.
    pub temp: f64,
    /// Latched open by overcurrent (distinguishes a trip from a pull).
    pub tripped: bool,
}

impl CbState {
    pub fn new() -> Self {
        CbState {
            wk_set: true,
            temp: 0.0,
            tripped: false,
        }
    }
}

impl Default for CbState {
    fn default() -> Self {
        Self::new()
    }
}

/// Tie work state: one closed/open flag per link, copied from the control
/// block at reset.
#[derive(Debug, Clone, Default)]
pub struct TieState {
    pub wk_state: Vec<bool>,
}

/// Work-side per-type dynamic state.
#[derive(Debug, Clone)]
pub enum TypeState {
    Batt(BattState),
    Gen(GenState),
    Tru(TruState),
    Load(LoadState),
    Cb(CbState),
    Tie(TieState),
    /// Buses, shunts, diodes and label boxes carry no extra state.
    Passive,
}

impl TypeState {
    pub fn as_batt(&self) -> Option<&BattState> {
        match self {
            TypeState::Batt(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_batt_mut(&mut self) -> Option<&mut BattState> {
        match self {
            TypeState::Batt(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_gen(&self) -> Option<&GenState> {
        match self {
            TypeState::Gen(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_gen_mut(&mut self) -> Option<&mut GenState> {
        match self {
            TypeState::Gen(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_tru(&self) -> Option<&TruState> {
        match self {
            TypeState::Tru(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_tru_mut(&mut self) -> Option<&mut TruState> {
        match self {
            TypeState::Tru(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_load(&self) -> Option<&LoadState> {
        match self {
            TypeState::Load(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_load_mut(&mut self) -> Option<&mut LoadState> {
        match self {
            TypeState::Load(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_cb(&self) -> Option<&CbState> {
        match self {
            TypeState::Cb(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_cb_mut(&mut self) -> Option<&mut CbState> {
        match self {
            TypeState::Cb(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_tie(&self) -> Option<&TieState> {
        match self {
            TypeState::Tie(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_tie_mut(&mut self) -> Option<&mut TieState> {
        match self {
            TypeState::Tie(s) => Some(s),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_keeps_fault_flags() {
        let mut ps = PowerState::new();
        ps.in_volts = 28.0;
        ps.out_amps = 3.0;
        ps.src_mask = 0b101;
        ps.failed = true;
        ps.shorted = true;
        ps.leak_factor = 0.97;
        ps.clear_electrical();
        assert_eq!(ps.in_volts, 0.0);
        assert_eq!(ps.out_amps, 0.0);
        assert_eq!(ps.src_mask, 0);
        assert!(ps.failed);
        assert!(ps.shorted);
        assert_eq!(ps.leak_factor, 0.97);
    }

    #[test]
    fn test_gen_stab_bounds() {
        let gs = GenState::new(2000.0, 6000.0);
        assert_eq!(gs.ctr_rpm, 4000.0);
        assert!((gs.min_stab - 4000.0 / 6000.0).abs() < 1e-12);
        assert!((gs.max_stab - 2.0).abs() < 1e-12);
        assert!(gs.min_stab < 1.0 && gs.max_stab > 1.0);
    }

    #[test]
    fn test_is_powered() {
        let mut ps = PowerState::new();
        assert!(!ps.is_powered());
        ps.in_volts = 0.1;
        assert!(ps.is_powered());
    }
}
