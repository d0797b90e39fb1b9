//! Worker thread and public system handle.
//!
//! [`ElecSys`] owns the whole engine behind an `Arc`, so handles are cheap
//! to clone and safe to hand to other threads. Internally:
//!
//! - The network, its work state and the RNG live behind one *core* mutex;
//!   a full simulation step holds it for the duration, so the step is
//!   always atomic with respect to every other entry point.
//! - Each component has a *published* electrical state and a *control*
//!   block behind their own small mutexes. Readers and mutators touch only
//!   those, never the core, so instrument polling at rendering rates never
//!   contends with the physics.
//! - Control inputs are staged into the step at its reset phase and results
//!   are published at its end; a reader sees either the complete previous
//!   step or the complete next one, never a half-integrated mix.
//!
//! The worker ticks at [`crate::STEP_INTERVAL`] scaled by the time factor;
//! a factor of zero pauses the simulation without stopping the thread, and
//! resuming resets the step clock so no giant catch-up step is generated.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::config::{CompConfig, CompKind};
use crate::error::{ElecError, ElecResult};
use crate::network::Network;
use crate::snapshot::{config_fingerprint, SystemSnapshot};
use crate::state::PowerState;
use crate::step::{default_ctls, step, CompCtl};
use crate::{CompType, PowerDomain, STEP_INTERVAL};

/// Injected load demand: called once per step with the step length, returns
/// Watts (stabilized loads) or Amps (constant-current loads).
pub type LoadDemandFn = Box<dyn Fn(f64) -> f64 + Send>;

/// User hook invoked before or after every step, outside the core lock, so
/// it may freely use any [`ElecSys`] or [`CompHandle`] API.
pub type StepHookFn = Box<dyn Fn(&ElecSys) + Send>;

/// Immutable per-component facts, copied out of the network at build time
/// so getters never need the core lock.
struct CompInfo {
    name: String,
    typ: CompType,
    location: String,
    autogen: bool,
    /// Names of linked peers, in link-slot order (tie control needs it).
    peer_names: Vec<String>,
    /// Band-center rpm for generators; 0.0 otherwise.
    ctr_rpm: f64,
    charger: bool,
    domain: Option<PowerDomain>,
}

/// Reader-visible results of the latest completed step.
#[derive(Debug, Clone, Default)]
struct Published {
    ps: PowerState,
    chg_rel: f64,
    batt_temp_k: f64,
    cb_temp: f64,
    cb_tripped: bool,
    tie_closed: Vec<bool>,
    incap_u: f64,
    eff: f64,
    chgr_regul: f64,
}

struct CompShared {
    published: Mutex<Published>,
    ctl: Mutex<CompCtl>,
    load_fn: Mutex<Option<LoadDemandFn>>,
}

struct EngineCore {
    net: Network,
    rng: StdRng,
}

struct SysInner {
    core: Mutex<EngineCore>,
    shared: Vec<CompShared>,
    infos: Vec<CompInfo>,
    name_idx: HashMap<String, usize>,
    /// Names of the source table entries, indexed by source index.
    src_names: Vec<String>,
    fingerprint: u64,
    started: AtomicBool,
    stop: AtomicBool,
    time_factor: Mutex<f64>,
    worker: Mutex<Option<JoinHandle<()>>>,
    pre_hooks: Mutex<Vec<StepHookFn>>,
    post_hooks: Mutex<Vec<StepHookFn>>,
}

/// Handle to a running (or stopped) electrical system.
#[derive(Clone)]
pub struct ElecSys {
    inner: Arc<SysInner>,
}

impl ElecSys {
    /// Build a system from a descriptor list. The system starts stopped;
    /// call [`ElecSys::start`] to spin up the worker.
    pub fn new(configs: Vec<CompConfig>) -> ElecResult<ElecSys> {
        Self::with_seed(configs, 0)
    }

    /// Like [`ElecSys::new`] with an explicit RNG seed, for reproducible
    /// runs. Two systems built from the same configuration and seed and
    /// stepped identically produce identical published states.
    pub fn with_seed(configs: Vec<CompConfig>, seed: u64) -> ElecResult<ElecSys> {
        let net = Network::build(configs)?;
        let ctls = default_ctls(&net);
        let fingerprint = config_fingerprint(&net);

        let mut infos = Vec::with_capacity(net.len());
        let mut name_idx = HashMap::with_capacity(net.len());
        for comp in net.comps() {
            name_idx.insert(comp.name().to_string(), comp.id.value());
            infos.push(CompInfo {
                name: comp.name().to_string(),
                typ: comp.typ,
                location: comp.cfg.location.clone(),
                autogen: comp.cfg.autogen,
                peer_names: comp
                    .links
                    .iter()
                    .map(|l| net.comp(l.peer).name().to_string())
                    .collect(),
                ctr_rpm: comp.ts.as_gen().map(|g| g.ctr_rpm).unwrap_or(0.0),
                charger: matches!(&comp.cfg.kind, CompKind::Tru(t) if t.charger.is_some()),
                domain: match &comp.cfg.kind {
                    CompKind::Batt(_) => Some(PowerDomain::Dc),
                    CompKind::Gen(g) => Some(g.domain),
                    CompKind::Load(l) => Some(l.domain),
                    CompKind::Bus(b) => Some(b.domain),
                    _ => None,
                },
            });
        }
        let src_names = net
            .srcs()
            .iter()
            .map(|&id| net.comp(id).name().to_string())
            .collect();

        let shared: Vec<CompShared> = net
            .comps()
            .zip(ctls.iter())
            .map(|(comp, ctl)| CompShared {
                published: Mutex::new(publish_one(comp)),
                ctl: Mutex::new(ctl.clone()),
                load_fn: Mutex::new(None),
            })
            .collect();

        Ok(ElecSys {
            inner: Arc::new(SysInner {
                core: Mutex::new(EngineCore {
                    net,
                    rng: StdRng::seed_from_u64(seed),
                }),
                shared,
                infos,
                name_idx,
                src_names,
                fingerprint,
                started: AtomicBool::new(false),
                stop: AtomicBool::new(false),
                time_factor: Mutex::new(1.0),
                worker: Mutex::new(None),
                pre_hooks: Mutex::new(Vec::new()),
                post_hooks: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Whether [`ElecSys::start`] would succeed right now.
    pub fn can_start(&self) -> bool {
        !self.is_started() && !self.inner.core.lock().net.is_empty()
    }

    /// Spin up the background worker.
    pub fn start(&self) -> ElecResult<()> {
        if self
            .inner
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ElecError::AlreadyRunning);
        }
        self.inner.stop.store(false, Ordering::SeqCst);
        let weak = Arc::downgrade(&self.inner);
        let handle = std::thread::Builder::new()
            .name("amps-worker".into())
            .spawn(move || worker_main(weak))
            .map_err(ElecError::Io)?;
        *self.inner.worker.lock() = Some(handle);
        info!("electrical system started");
        Ok(())
    }

    /// Stop the worker. Synchronous: when this returns, no step is running
    /// and none will run until the next [`ElecSys::start`]. Stopping a
    /// stopped system is a no-op.
    pub fn stop(&self) {
        if !self.inner.started.swap(false, Ordering::SeqCst) {
            return;
        }
        self.inner.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.inner.worker.lock().take() {
            let _ = handle.join();
        }
        info!("electrical system stopped");
    }

    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
    }

    /// Simulation speed multiplier. 1.0 is real time, 0.0 pauses. Resuming
    /// from pause resets the step clock, so no oversized catch-up step is
    /// ever taken.
    pub fn set_time_factor(&self, factor: f64) {
        *self.inner.time_factor.lock() = factor.max(0.0);
    }

    pub fn time_factor(&self) -> f64 {
        *self.inner.time_factor.lock()
    }

    /// Run exactly one step of `d_t` simulated seconds on the calling
    /// thread. Only valid while the worker is stopped; this is the
    /// deterministic driving mode for tests and batch analysis.
    pub fn step_once(&self, d_t: f64) -> ElecResult<()> {
        if self.is_started() {
            return Err(ElecError::AlreadyRunning);
        }
        run_one_step(self, d_t);
        Ok(())
    }

    /// Hook called before every step, outside the engine locks.
    pub fn add_pre_step_hook(&self, hook: StepHookFn) {
        self.inner.pre_hooks.lock().push(hook);
    }

    /// Hook called after every step's results are published.
    pub fn add_post_step_hook(&self, hook: StepHookFn) {
        self.inner.post_hooks.lock().push(hook);
    }

    /// Look up a component by name.
    pub fn comp(&self, name: &str) -> Option<CompHandle> {
        self.inner.name_idx.get(name).map(|&idx| CompHandle {
            inner: Arc::clone(&self.inner),
            idx,
        })
    }

    /// All components, in arena order.
    pub fn comps(&self) -> Vec<CompHandle> {
        (0..self.inner.infos.len())
            .map(|idx| CompHandle {
                inner: Arc::clone(&self.inner),
                idx,
            })
            .collect()
    }

    /// Component by arena index. Replication peers address components by
    /// index rather than name; indices follow descriptor order and are
    /// stable for the life of the system.
    pub fn comp_by_index(&self, idx: usize) -> Option<CompHandle> {
        (idx < self.inner.infos.len()).then(|| CompHandle {
            inner: Arc::clone(&self.inner),
            idx,
        })
    }

    /// Overwrite one component's electrical state by index, for replication
    /// consumers applying remotely published state. The overwrite lands in
    /// the work state and the published state together while the step
    /// interlock is held, so neither local readers nor the next step can see
    /// a half-applied injection; the failure flags are merged into the
    /// control block so the next reset keeps them.
    pub fn inject_state(&self, idx: usize, ps: PowerState) -> ElecResult<()> {
        if idx >= self.inner.infos.len() {
            return Err(ElecError::Validation(format!(
                "component index {idx} out of range"
            )));
        }
        let mut core = self.inner.core.lock();
        core.net.comp_mut(crate::CompId(idx)).ps = ps.clone();
        {
            let mut ctl = self.inner.shared[idx].ctl.lock();
            ctl.failed = ps.failed;
            ctl.shorted = ps.shorted;
        }
        self.inner.shared[idx].published.lock().ps = ps;
        drop(core);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.infos.is_empty()
    }

    /// Fingerprint of this system's configuration (see
    /// [`crate::snapshot::config_fingerprint`]).
    pub fn fingerprint(&self) -> u64 {
        self.inner.fingerprint
    }

    pub fn stats(&self) -> crate::network::TopologyStats {
        self.inner.core.lock().net.stats()
    }

    pub fn to_dot(&self) -> String {
        self.inner.core.lock().net.to_dot()
    }

    /// Construction warnings.
    pub fn diagnostics(&self) -> crate::diagnostics::Diagnostics {
        self.inner.core.lock().net.diagnostics().clone()
    }

    /// Capture a snapshot of the durable state.
    pub fn snapshot(&self) -> SystemSnapshot {
        let core = self.inner.core.lock();
        let ctls: Vec<CompCtl> = self.inner.shared.iter().map(|s| s.ctl.lock().clone()).collect();
        SystemSnapshot::capture(&core.net, &ctls)
    }

    /// Restore a snapshot. All-or-nothing: on error the system is
    /// untouched. The restored control state takes effect on the next step.
    pub fn restore(&self, snap: &SystemSnapshot) -> ElecResult<()> {
        let mut core = self.inner.core.lock();
        let mut ctls: Vec<CompCtl> = self.inner.shared.iter().map(|s| s.ctl.lock().clone()).collect();
        snap.apply(&mut core.net, &mut ctls)?;
        for (shared, ctl) in self.inner.shared.iter().zip(ctls) {
            *shared.ctl.lock() = ctl;
        }
        for (comp, shared) in core.net.comps().zip(&self.inner.shared) {
            *shared.published.lock() = publish_one(comp);
        }
        Ok(())
    }

    pub fn save_snapshot(&self, path: impl AsRef<std::path::Path>) -> ElecResult<()> {
        self.snapshot().save(path)
    }

    pub fn restore_snapshot(&self, path: impl AsRef<std::path::Path>) -> ElecResult<()> {
        let snap = SystemSnapshot::load(path)?;
        self.restore(&snap)
    }
}

impl std::fmt::Debug for ElecSys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElecSys")
            .field("comps", &self.inner.infos.len())
            .field("started", &self.is_started())
            .finish()
    }
}

fn worker_main(weak: Weak<SysInner>) {
    let mut last = Instant::now();
    loop {
        // Hold the system only for the duration of one iteration, so
        // dropping the last user handle shuts the worker down.
        let Some(inner) = weak.upgrade() else { return };
        if inner.stop.load(Ordering::SeqCst) {
            return;
        }
        let factor = *inner.time_factor.lock();
        if factor <= 0.0 {
            // Paused. Keep the clock pinned so resume starts fresh.
            drop(inner);
            std::thread::sleep(STEP_INTERVAL);
            last = Instant::now();
            continue;
        }
        let interval = STEP_INTERVAL.div_f64(factor);
        drop(inner);
        sleep_interruptible(&weak, interval);

        let Some(inner) = weak.upgrade() else { return };
        if inner.stop.load(Ordering::SeqCst) {
            return;
        }
        let now = Instant::now();
        let d_t = now.duration_since(last).as_secs_f64() * factor;
        last = now;
        let sys = ElecSys { inner };
        run_one_step(&sys, d_t);
    }
}

/// Sleep in small quanta so stop requests are honored promptly even at
/// small time factors.
fn sleep_interruptible(weak: &Weak<SysInner>, total: Duration) {
    let quantum = Duration::from_millis(10);
    let deadline = Instant::now() + total;
    loop {
        let Some(inner) = weak.upgrade() else { return };
        if inner.stop.load(Ordering::SeqCst) {
            return;
        }
        drop(inner);
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        std::thread::sleep(quantum.min(deadline - now));
    }
}

fn run_one_step(sys: &ElecSys, d_t: f64) {
    let inner = &sys.inner;
    run_hooks(&inner.pre_hooks, sys);

    // Injected demand closures run outside the core lock so they can read
    // published state.
    let demands: Vec<Option<f64>> = inner
        .shared
        .iter()
        .map(|s| s.load_fn.lock().as_ref().map(|f| f(d_t)))
        .collect();

    let mut core = inner.core.lock();
    let mut ctls: Vec<CompCtl> = inner
        .shared
        .iter()
        .zip(&demands)
        .map(|(s, demand)| {
            let mut ctl = s.ctl.lock().clone();
            if let Some(d) = demand {
                ctl.load_demand = *d;
            }
            ctl
        })
        .collect();
    // Remember what was staged, to merge step feedback without clobbering
    // control writes made while the step was running.
    let staged: Vec<(bool, bool, Option<f64>, Option<f64>)> = ctls
        .iter()
        .map(|c| (c.cb_set, c.failed, c.batt_chg_rel, c.batt_temp_k))
        .collect();

    let EngineCore { net, rng } = &mut *core;
    step(net, &mut ctls, rng, d_t);

    for (i, shared) in inner.shared.iter().enumerate() {
        let mut ctl = shared.ctl.lock();
        let (cb_before, failed_before, chg_before, temp_before) = staged[i];
        if ctls[i].cb_set != cb_before {
            ctl.cb_set = ctls[i].cb_set;
        }
        if ctls[i].failed != failed_before {
            ctl.failed = ctls[i].failed;
        }
        // Overrides the step consumed are cleared, unless re-set meanwhile.
        if ctls[i].batt_chg_rel.is_none() && ctl.batt_chg_rel == chg_before {
            ctl.batt_chg_rel = None;
        }
        if ctls[i].batt_temp_k.is_none() && ctl.batt_temp_k == temp_before {
            ctl.batt_temp_k = None;
        }
    }
    for (comp, shared) in core.net.comps().zip(&inner.shared) {
        *shared.published.lock() = publish_one(comp);
    }
    drop(core);

    run_hooks(&inner.post_hooks, sys);
    debug!(d_t, "step complete");
}

/// Run hooks without holding their list's lock, so a hook may register
/// further hooks. Hooks must not call [`ElecSys::stop`].
fn run_hooks(hooks: &Mutex<Vec<StepHookFn>>, sys: &ElecSys) {
    let current = std::mem::take(&mut *hooks.lock());
    for hook in &current {
        hook(sys);
    }
    let mut guard = hooks.lock();
    let added = std::mem::take(&mut *guard);
    *guard = current;
    guard.extend(added);
}

fn publish_one(comp: &crate::network::Comp) -> Published {
    let mut pubd = Published {
        ps: comp.ps.clone(),
        ..Default::default()
    };
    if let Some(bs) = comp.ts.as_batt() {
        pubd.chg_rel = bs.chg_rel;
        pubd.batt_temp_k = bs.temp_k;
    }
    if let Some(cb) = comp.ts.as_cb() {
        pubd.cb_temp = cb.temp;
        pubd.cb_tripped = cb.tripped;
    }
    if let Some(tie) = comp.ts.as_tie() {
        pubd.tie_closed = tie.wk_state.clone();
    }
    if let Some(ls) = comp.ts.as_load() {
        pubd.incap_u = ls.incap_u;
    }
    if let Some(gs) = comp.ts.as_gen() {
        pubd.eff = gs.eff;
    }
    if let Some(ts) = comp.ts.as_tru() {
        pubd.eff = ts.eff;
        pubd.chgr_regul = ts.chgr_regul;
    }
    pubd
}

/// Handle to one component of a system. Cheap to clone; all accessors are
/// lock-fine-grained and safe to call from any thread, including step
/// hooks.
#[derive(Clone)]
pub struct CompHandle {
    inner: Arc<SysInner>,
    idx: usize,
}

impl CompHandle {
    fn info(&self) -> &CompInfo {
        &self.inner.infos[self.idx]
    }

    fn published(&self) -> Published {
        self.inner.shared[self.idx].published.lock().clone()
    }

    fn ctl(&self) -> parking_lot::MutexGuard<'_, CompCtl> {
        self.inner.shared[self.idx].ctl.lock()
    }

    pub fn name(&self) -> &str {
        &self.info().name
    }

    /// Arena index of this component (the address replication peers use).
    pub fn index(&self) -> usize {
        self.idx
    }

    pub fn comp_type(&self) -> CompType {
        self.info().typ
    }

    pub fn location(&self) -> &str {
        &self.info().location
    }

    /// Whether this component was synthesized by configuration expansion
    /// (e.g. an auto-generated load feeder breaker).
    pub fn is_autogen(&self) -> bool {
        self.info().autogen
    }

    pub fn domain(&self) -> Option<PowerDomain> {
        self.info().domain
    }

    // --- electrical readers ------------------------------------------------

    pub fn in_volts(&self) -> f64 {
        self.published().ps.in_volts
    }

    pub fn out_volts(&self) -> f64 {
        self.published().ps.out_volts
    }

    pub fn in_amps(&self) -> f64 {
        self.published().ps.in_amps
    }

    pub fn out_amps(&self) -> f64 {
        self.published().ps.out_amps
    }

    pub fn in_pwr(&self) -> f64 {
        self.published().ps.in_pwr
    }

    pub fn out_pwr(&self) -> f64 {
        self.published().ps.out_pwr
    }

    pub fn in_freq(&self) -> f64 {
        self.published().ps.in_freq
    }

    pub fn out_freq(&self) -> f64 {
        self.published().ps.out_freq
    }

    pub fn short_amps(&self) -> f64 {
        self.published().ps.short_amps
    }

    pub fn is_powered(&self) -> bool {
        self.published().ps.is_powered()
    }

    /// Conversion efficiency of the latest step (generators, TRUs,
    /// inverters, transformers; 0.0 for other types).
    pub fn eff(&self) -> f64 {
        self.published().eff
    }

    /// Names of the sources that energized this component in the latest
    /// step.
    pub fn srcs(&self) -> Vec<String> {
        let mask = self.published().ps.src_mask;
        self.inner
            .src_names
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1u64 << i) != 0)
            .map(|(_, n)| n.clone())
            .collect()
    }

    // --- failure injection -------------------------------------------------

    pub fn set_failed(&self, failed: bool) {
        self.ctl().failed = failed;
    }

    pub fn failed(&self) -> bool {
        self.published().ps.failed
    }

    pub fn set_shorted(&self, shorted: bool) {
        self.ctl().shorted = shorted;
    }

    pub fn shorted(&self) -> bool {
        self.published().ps.shorted
    }

    // --- breakers ----------------------------------------------------------

    /// Set the breaker position (true = closed). Takes effect at the next
    /// step.
    pub fn set_cb(&self, closed: bool) {
        self.ctl().cb_set = closed;
    }

    /// Commanded breaker position (false after a trip pops it open).
    pub fn cb_set(&self) -> bool {
        self.ctl().cb_set
    }

    /// Relative thermal state; trips at 1.0.
    pub fn cb_temp(&self) -> f64 {
        self.published().cb_temp
    }

    pub fn cb_tripped(&self) -> bool {
        self.published().cb_tripped
    }

    // --- ties --------------------------------------------------------------

    /// Connect exactly the named buses through this tie; every other link
    /// opens. Unknown names are an error and nothing changes.
    pub fn set_tie_buses(&self, names: &[&str]) -> ElecResult<()> {
        let info = self.info();
        if info.typ != CompType::Tie {
            return Err(ElecError::Validation(format!(
                "{} is not a tie",
                info.name
            )));
        }
        let mut state = vec![false; info.peer_names.len()];
        for name in names {
            match info.peer_names.iter().position(|p| p == name) {
                Some(slot) => state[slot] = true,
                None => {
                    return Err(ElecError::Validation(format!(
                        "tie {} has no link to \"{name}\"",
                        info.name
                    )))
                }
            }
        }
        self.ctl().tie_state = state;
        Ok(())
    }

    /// Open or close every link of this tie at once.
    pub fn set_tie_all(&self, closed: bool) {
        let n = self.info().peer_names.len();
        self.ctl().tie_state = vec![closed; n];
    }

    /// Names of the buses currently connected through this tie.
    pub fn tie_buses(&self) -> Vec<String> {
        let info = self.info();
        self.ctl()
            .tie_state
            .iter()
            .zip(&info.peer_names)
            .filter(|(closed, _)| **closed)
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// True when every link of this tie is closed.
    pub fn tie_all_closed(&self) -> bool {
        let ctl = self.ctl();
        !ctl.tie_state.is_empty() && ctl.tie_state.iter().all(|&c| c)
    }

    // --- batteries ---------------------------------------------------------

    pub fn batt_chg_rel(&self) -> f64 {
        self.published().chg_rel
    }

    /// Override the battery's relative charge at the next step.
    pub fn set_batt_chg_rel(&self, chg_rel: f64) {
        self.ctl().batt_chg_rel = Some(chg_rel.clamp(0.0, 1.0));
    }

    pub fn batt_temp(&self) -> f64 {
        self.published().batt_temp_k
    }

    /// Set the battery cell temperature in Kelvin.
    pub fn set_batt_temp(&self, temp_k: f64) {
        self.ctl().batt_temp_k = Some(temp_k);
    }

    // --- generators --------------------------------------------------------

    /// Drive rpm, normally fed from the engine model every frame.
    pub fn set_gen_rpm(&self, rpm: f64) {
        self.ctl().gen_rpm = rpm.max(0.0);
    }

    /// Band-center rpm this generator regulates around.
    pub fn gen_ctr_rpm(&self) -> f64 {
        self.info().ctr_rpm
    }

    /// Gaussian jitter on the generator's output voltage/frequency, as
    /// standard deviations. Zero (the default) disables jitter.
    pub fn set_gen_stddev(&self, volts: f64, freq: f64) {
        let mut ctl = self.ctl();
        ctl.volts_stddev = volts.max(0.0);
        ctl.freq_stddev = freq.max(0.0);
    }

    // --- loads -------------------------------------------------------------

    /// Constant external demand added to the load's baseline (Watts for
    /// stabilized loads, Amps otherwise). Replaces any demand closure.
    pub fn set_load(&self, demand: f64) {
        *self.inner.shared[self.idx].load_fn.lock() = None;
        self.ctl().load_demand = demand.max(0.0);
    }

    /// Demand closure evaluated once per step. Replaces any constant
    /// demand.
    pub fn set_load_fn(&self, f: LoadDemandFn) {
        *self.inner.shared[self.idx].load_fn.lock() = Some(f);
    }

    /// Input capacitor voltage (0.0 for loads without one).
    pub fn incap_volts(&self) -> f64 {
        self.published().incap_u
    }

    // --- chargers ----------------------------------------------------------

    /// For battery-charger TRUs: whether the charger is powered and its
    /// battery sense line is intact.
    pub fn chgr_working(&self) -> bool {
        if !self.info().charger {
            return false;
        }
        let pubd = self.published();
        pubd.ps.is_powered() && pubd.chgr_regul > 0.01
    }
}

impl std::fmt::Debug for CompHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompHandle")
            .field("name", &self.name())
            .field("type", &self.comp_type())
            .finish()
    }
}
