//! Per-tick phase orchestrator.
//!
//! One simulation step is a fixed sequence:
//!
//! 1. reset - clear electrical state, merge control inputs into work state
//! 2. source update - batteries and generators compute output voltage
//! 3. load randomization - demand factors drift
//! 4. paint - voltage propagation ([`crate::paint`])
//! 5. integrate - current accumulation ([`crate::integrate`])
//! 6. secondary update - battery energy, breaker heating, charger
//!    regulation, input capacitors
//!
//! Publication of the results is the scheduler's job. The orchestrator is
//! deliberately free of locks and wall clocks so it can be driven directly
//! in tests with a plain [`Network`], control blocks and a seeded RNG.

use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::Rng;
use tracing::info;

use crate::config::{c2kelvin, CompKind};
use crate::curve::{clamp, filter_in, Curve};
use crate::integrate::integrate;
use crate::network::Network;
use crate::paint::paint;
use crate::CompType;

/// Exponent of the battery voltage sag law: output voltage falls off as
/// `1 - I_rel^1.45` with relative current draw.
const BATT_SAG_EXP: f64 = 1.45;

/// Leak range of a shorted component: this fraction of the drawn current
/// still reaches the legitimate consumer, the rest goes to ground.
const SHORT_LEAK_RANGE: (f64, f64) = (0.97, 0.975);

/// Battery terminal voltage vs. relative state of charge.
static CHG_VOLT_CURVE: Lazy<Curve> = Lazy::new(|| {
    Curve::new([
        (0.00, 0.00),
        (0.04, 0.70),
        (0.10, 0.80),
        (0.20, 0.87),
        (0.30, 0.91),
        (0.45, 0.94),
        (0.60, 0.95),
        (0.80, 0.96),
        (0.90, 0.97),
        (1.00, 1.00),
    ])
});

/// Usable battery capacity vs. cell temperature (Kelvin).
static TEMP_ENERGY_CURVE: Lazy<Curve> = Lazy::new(|| {
    Curve::new([
        (c2kelvin(-75.0), 0.00),
        (c2kelvin(-50.0), 0.25),
        (c2kelvin(15.0), 0.95),
        (c2kelvin(40.0), 1.00),
        (c2kelvin(50.0), 1.00),
    ])
});

/// Per-component control inputs, staged into the work state at the top of
/// each step so mid-step mutation can never split a pass. The scheduler
/// keeps one behind a lock per component; trips and consumed overrides are
/// written back after the step.
#[derive(Debug, Clone)]
pub struct CompCtl {
    pub failed: bool,
    pub shorted: bool,
    /// Desired breaker position (closed = true).
    pub cb_set: bool,
    /// Desired tie link states, one per link.
    pub tie_state: Vec<bool>,
    /// Generator drive rpm.
    pub gen_rpm: f64,
    /// Gaussian jitter applied to generator output, as standard deviations.
    pub volts_stddev: f64,
    pub freq_stddev: f64,
    /// Pending battery state overrides, consumed at the next reset.
    pub batt_chg_rel: Option<f64>,
    pub batt_temp_k: Option<f64>,
    /// External demand added to the load's baseline this step.
    pub load_demand: f64,
}

impl Default for CompCtl {
    fn default() -> Self {
        CompCtl {
            failed: false,
            shorted: false,
            cb_set: true,
            tie_state: Vec::new(),
            gen_rpm: 0.0,
            volts_stddev: 0.0,
            freq_stddev: 0.0,
            batt_chg_rel: None,
            batt_temp_k: None,
            load_demand: 0.0,
        }
    }
}

/// Control blocks matching `net`, with per-type fields initialized (tie
/// link counts, generator rpm at band center).
pub fn default_ctls(net: &Network) -> Vec<CompCtl> {
    net.comps()
        .map(|c| {
            let mut ctl = CompCtl::default();
            if let Some(gs) = c.ts.as_gen() {
                ctl.gen_rpm = gs.ctr_rpm;
            }
            if c.typ == CompType::Tie {
                ctl.tie_state = vec![false; c.links.len()];
            }
            ctl
        })
        .collect()
}

/// Run one full simulation step of `d_t` seconds.
///
/// `ctls` is indexed by component id; breaker trips and consumed overrides
/// are written back into it.
pub fn step(net: &mut Network, ctls: &mut [CompCtl], rng: &mut StdRng, d_t: f64) {
    debug_assert_eq!(ctls.len(), net.len());
    reset(net, ctls, rng, d_t);
    srcs_update(net, ctls, rng, d_t);
    loads_randomize(net, rng, d_t);
    paint(net);
    integrate(net, d_t);
    post_update(net, ctls, d_t);
}

fn reset(net: &mut Network, ctls: &mut [CompCtl], rng: &mut StdRng, d_t: f64) {
    for i in 0..net.len() {
        let ctl = &mut ctls[i];
        let c = net.comp_mut(crate::CompId(i));
        c.ps.clear_electrical();
        for link in c.links.iter_mut() {
            link.src_amps.fill(0.0);
        }
        c.ps.failed = ctl.failed;
        c.ps.shorted = ctl.shorted;
        if ctl.shorted {
            let target = rng.gen_range(SHORT_LEAK_RANGE.0..SHORT_LEAK_RANGE.1);
            // Load shorts develop gradually; everything else arcs at once.
            c.ps.leak_factor = if c.typ == CompType::Load {
                filter_in(c.ps.leak_factor, target, d_t, 0.5)
            } else {
                target
            };
        } else {
            c.ps.leak_factor = 1.0;
        }
        match &mut c.ts {
            crate::state::TypeState::Cb(cb) => {
                cb.wk_set = ctl.cb_set && !ctl.failed;
                if ctl.cb_set {
                    cb.tripped = false;
                }
            }
            crate::state::TypeState::Tie(tie) => {
                for (slot, wk) in tie.wk_state.iter_mut().enumerate() {
                    *wk = ctl.tie_state.get(slot).copied().unwrap_or(false);
                }
            }
            crate::state::TypeState::Gen(gs) => {
                gs.rpm = ctl.gen_rpm;
            }
            crate::state::TypeState::Load(ls) => {
                ls.ext_demand = ctl.load_demand;
            }
            crate::state::TypeState::Batt(bs) => {
                if let Some(chg) = ctl.batt_chg_rel.take() {
                    bs.chg_rel = clamp(chg, 0.0, 1.0);
                }
                if let Some(temp) = ctl.batt_temp_k.take() {
                    bs.temp_k = temp;
                }
            }
            _ => {}
        }
    }
}

fn srcs_update(net: &mut Network, ctls: &[CompCtl], rng: &mut StdRng, d_t: f64) {
    for root in net.roots().to_vec() {
        let ctl = &ctls[root.0];
        let c = net.comp_mut(root);
        match &c.cfg.kind {
            CompKind::Batt(cfg) => {
                let Some(bs) = c.ts.as_batt() else { continue };
                if c.ps.failed {
                    c.ps.out_volts = 0.0;
                    continue;
                }
                // Sag with relative draw, scaled by the charge-state curve.
                let max_amps = cfg.max_pwr / cfg.volts;
                let i_rel = clamp(bs.prev_amps / max_amps, 0.0, 1.0);
                let u = cfg.volts
                    * (1.0 - i_rel.powf(BATT_SAG_EXP))
                    * CHG_VOLT_CURVE.value(bs.chg_rel);
                c.ps.out_volts = u;
                c.ps.out_freq = 0.0;
            }
            CompKind::Gen(cfg) => {
                let Some(gs) = c.ts.as_gen_mut() else { continue };
                if c.ps.failed || gs.rpm <= 0.0 {
                    c.ps.out_volts = 0.0;
                    c.ps.out_freq = 0.0;
                    continue;
                }
                // The governor chases the exact inverse of the rpm excess,
                // bounded by its authority, with independent response rates
                // for voltage and frequency regulation.
                let target = clamp(gs.ctr_rpm / gs.rpm, gs.min_stab, gs.max_stab);
                gs.stab_factor_u = filter_in(gs.stab_factor_u, target, d_t, cfg.stab_rate_u);
                gs.stab_factor_f = filter_in(gs.stab_factor_f, target, d_t, cfg.stab_rate_f);
                let rpm_rel = gs.rpm / gs.ctr_rpm;
                let mut volts = cfg.volts * rpm_rel * gs.stab_factor_u;
                let mut freq = cfg.freq * rpm_rel * gs.stab_factor_f;
                if ctl.volts_stddev > 0.0 {
                    volts += gaussian(rng, ctl.volts_stddev);
                }
                if cfg.domain.is_ac() && ctl.freq_stddev > 0.0 {
                    freq += gaussian(rng, ctl.freq_stddev);
                }
                c.ps.out_volts = volts.max(0.0);
                c.ps.out_freq = if cfg.domain.is_ac() { freq.max(0.0) } else { 0.0 };
            }
            _ => {}
        }
    }
}

fn loads_randomize(net: &mut Network, rng: &mut StdRng, d_t: f64) {
    for load in net.loads().to_vec() {
        let target = clamp(1.0 + gaussian(rng, 0.05), 0.8, 1.2);
        let c = net.comp_mut(load);
        if let Some(ls) = c.ts.as_load_mut() {
            ls.random_load_factor = filter_in(ls.random_load_factor, target, d_t, 0.25);
        }
    }
}

/// Post-integration bookkeeping: battery energy, breaker thermals, charger
/// regulation, input capacitors.
fn post_update(net: &mut Network, ctls: &mut [CompCtl], d_t: f64) {
    for i in 0..net.len() {
        let id = crate::CompId(i);
        match net.comp(id).typ {
            CompType::Batt => batt_post_update(net, id, d_t),
            CompType::Cb => cb_post_update(net, id, &mut ctls[i], d_t),
            CompType::Tru => chgr_post_update(net, id, d_t),
            CompType::Tie => tie_post_update(net, id),
            CompType::Load => incap_post_update(net, id),
            _ => {}
        }
    }
}

fn batt_post_update(net: &mut Network, id: crate::CompId, d_t: f64) {
    let c = net.comp_mut(id);
    let CompKind::Batt(cfg) = &c.cfg.kind else { return };
    let out_volts = c.ps.out_volts;
    let out_amps = c.ps.out_amps;
    let Some(bs) = c.ts.as_batt_mut() else { return };
    bs.prev_amps = out_amps;
    let j_max = cfg.capacity * TEMP_ENERGY_CURVE.value(bs.temp_k);
    if j_max <= 0.0 {
        bs.chg_rel = 0.0;
        return;
    }
    let mut j = bs.chg_rel * j_max;
    j -= out_volts * out_amps * d_t;
    j += bs.rechg_w * d_t;
    bs.rechg_w = 0.0;
    bs.chg_rel = clamp(j / j_max, 0.0, 1.0);
}

fn cb_post_update(net: &mut Network, id: crate::CompId, ctl: &mut CompCtl, d_t: f64) {
    let c = net.comp_mut(id);
    let CompKind::Cb(cfg) = &c.cfg.kind else { return };
    let name = c.cfg.name.clone();
    let out_amps = c.ps.out_amps;
    let fuse = cfg.fuse;
    let mut amps_rat = out_amps / cfg.max_amps;
    if cfg.triphase {
        amps_rat /= 3.0;
    }
    let rate = cfg.rate;
    let Some(cb) = c.ts.as_cb_mut() else { return };
    cb.temp = filter_in(cb.temp, amps_rat, d_t, rate);
    if cb.temp >= 1.0 && cb.wk_set {
        cb.wk_set = false;
        cb.tripped = true;
        ctl.cb_set = false;
        if fuse {
            // A blown fuse is gone for good.
            ctl.failed = true;
            c.ps.failed = true;
        }
        info!(breaker = %name, amps = out_amps, fuse, "breaker tripped");
    }
}

/// Battery chargers back off when the sensed battery's charge current
/// exceeds the limit, and stand down entirely when the battery-side breaker
/// is open (no sense line, no charging).
fn chgr_post_update(net: &mut Network, id: crate::CompId, d_t: f64) {
    let chgr_cfg = {
        let c = net.comp(id);
        match &c.cfg.kind {
            CompKind::Tru(t) => match &t.charger {
                Some(ch) => ch.clone(),
                None => return,
            },
            _ => return,
        }
    };
    let conn_closed = net
        .id_by_name(&chgr_cfg.batt_conn)
        .map(|cb_id| {
            let cb = net.comp(cb_id);
            !cb.ps.failed && cb.ts.as_cb().map(|s| s.wk_set).unwrap_or(false)
        })
        .unwrap_or(false);
    // The sense line reads the battery's own charge current, so current
    // drawn by other consumers on the charger's bus never throttles it.
    let batt_amps = net
        .id_by_name(&chgr_cfg.batt)
        .map(|b| net.comp(b).ps.in_amps);
    let c = net.comp_mut(id);
    let Some(ts) = c.ts.as_tru_mut() else { return };
    let target = match batt_amps {
        _ if !conn_closed => 0.0,
        None => 0.0,
        Some(amps) if amps > chgr_cfg.curr_lim => clamp(chgr_cfg.curr_lim / amps, 0.0, 1.0),
        Some(_) => 1.0,
    };
    ts.chgr_regul = filter_in(ts.chgr_regul, target, d_t, 0.25);
}

/// A tie closed in a simple pass-through (exactly two tied endpoints)
/// reports the net current crossing it: the signed difference between what
/// enters on one tied side and what enters on the other.
fn tie_post_update(net: &mut Network, id: crate::CompId) {
    let c = net.comp_mut(id);
    let Some(tie) = c.ts.as_tie() else { return };
    let tied: Vec<usize> = tie
        .wk_state
        .iter()
        .enumerate()
        .filter_map(|(slot, &closed)| closed.then_some(slot))
        .collect();
    if tied.len() != 2 {
        return;
    }
    let entering = |slot: usize| -> f64 {
        if c.ps.paint_upstream == Some(c.links[slot].peer) {
            c.links[slot].src_amps.iter().sum()
        } else {
            0.0
        }
    };
    let through = entering(tied[0]) - entering(tied[1]);
    c.ps.in_amps = through.abs();
    c.ps.out_amps = through.abs();
    c.ps.in_pwr = c.ps.in_volts * c.ps.in_amps;
    c.ps.out_pwr = c.ps.out_volts * c.ps.out_amps;
}

fn incap_post_update(net: &mut Network, id: crate::CompId) {
    let c = net.comp_mut(id);
    let CompKind::Load(cfg) = &c.cfg.kind else { return };
    if cfg.incap_farads <= 0.0 {
        return;
    }
    let in_volts = c.ps.in_volts;
    let Some(ls) = c.ts.as_load_mut() else { return };
    let mut u = ls.incap_u + ls.incap_d_q / cfg.incap_farads;
    if ls.incap_d_q > 0.0 {
        // Charging can never exceed the supply.
        u = u.min(in_volts.max(ls.incap_u));
    }
    ls.incap_u = u.max(0.0);
    ls.incap_d_q = 0.0;
}

/// One draw from a zero-mean gaussian via Box-Muller, scaled to `stddev`.
fn gaussian(rng: &mut StdRng, stddev: f64) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos() * stddev
}
