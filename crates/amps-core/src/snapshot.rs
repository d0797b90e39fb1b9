//! Session persistence.
//!
//! A snapshot captures the *durable* state of a running system — fault
//! flags, breaker positions and thermal state, tie positions, battery charge
//! and temperature, input capacitor charge — keyed by component name, plus a
//! fingerprint of the configuration it was taken from. Transient electrical
//! state (volts/amps of the current step) is not persisted; it reconverges
//! within a step or two of resuming.
//!
//! Restoring is all-or-nothing: the snapshot is checked in full against the
//! live network (fingerprint, names, types) before anything is touched, so
//! a stale file can never leave the system half-applied.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CompKind;
use crate::error::{ElecError, ElecResult};
use crate::network::Network;
use crate::step::CompCtl;

/// Durable state of one component. Fields that don't apply to the
/// component's type stay `None` and serialize away.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompSnapshot {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub failed: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub shorted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cb_set: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cb_temp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tie_state: Option<Vec<bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batt_chg_rel: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batt_temp_k: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incap_u: Option<f64>,
}

/// A complete persisted session for one network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSnapshot {
    /// Fingerprint of the configuration this was captured from; restore
    /// refuses anything else.
    pub fingerprint: u64,
    /// Keyed by component name, so id assignment may differ between runs
    /// as long as the configuration is the same.
    pub comps: BTreeMap<String, CompSnapshot>,
}

/// Fingerprint of a network's configuration: names, types and wiring in
/// arena order. Descriptor *values* (ratings, curves) are deliberately not
/// hashed — retuning a breaker does not orphan existing sessions, but
/// renaming or rewiring does.
pub fn config_fingerprint(net: &Network) -> u64 {
    let mut hasher = DefaultHasher::new();
    for comp in net.comps() {
        comp.name().hash(&mut hasher);
        comp.typ.tag().hash(&mut hasher);
        comp.links.len().hash(&mut hasher);
        for link in &comp.links {
            net.comp(link.peer).name().hash(&mut hasher);
        }
    }
    hasher.finish()
}

impl SystemSnapshot {
    /// Capture the durable state of `net` and its control blocks.
    pub fn capture(net: &Network, ctls: &[CompCtl]) -> SystemSnapshot {
        let mut comps = BTreeMap::new();
        for comp in net.comps() {
            let ctl = &ctls[comp.id.value()];
            let mut snap = CompSnapshot {
                failed: ctl.failed,
                shorted: ctl.shorted,
                ..Default::default()
            };
            match &comp.cfg.kind {
                CompKind::Cb(_) => {
                    snap.cb_set = Some(ctl.cb_set);
                    snap.cb_temp = comp.ts.as_cb().map(|s| s.temp);
                }
                CompKind::Tie(_) => {
                    snap.tie_state = Some(ctl.tie_state.clone());
                }
                CompKind::Batt(_) => {
                    if let Some(bs) = comp.ts.as_batt() {
                        snap.batt_chg_rel = Some(bs.chg_rel);
                        snap.batt_temp_k = Some(bs.temp_k);
                    }
                }
                CompKind::Load(l) => {
                    if l.incap_farads > 0.0 {
                        snap.incap_u = comp.ts.as_load().map(|s| s.incap_u);
                    }
                }
                _ => {}
            }
            comps.insert(comp.name().to_string(), snap);
        }
        SystemSnapshot {
            fingerprint: config_fingerprint(net),
            comps,
        }
    }

    /// Validate this snapshot against `net` without touching anything.
    pub fn check(&self, net: &Network) -> ElecResult<()> {
        let fp = config_fingerprint(net);
        if self.fingerprint != fp {
            return Err(ElecError::SnapshotMismatch(format!(
                "snapshot was taken from a different configuration \
                 (expected {fp:#018x}, found {:#018x})",
                self.fingerprint
            )));
        }
        for name in self.comps.keys() {
            if net.comp_by_name(name).is_none() {
                return Err(ElecError::SnapshotMismatch(format!(
                    "snapshot names unknown component \"{name}\""
                )));
            }
        }
        for comp in net.comps() {
            if !self.comps.contains_key(comp.name()) {
                return Err(ElecError::SnapshotMismatch(format!(
                    "snapshot is missing component \"{}\"",
                    comp.name()
                )));
            }
        }
        Ok(())
    }

    /// Restore into `net` and its control blocks. Validates everything
    /// first; on error nothing has been modified.
    pub fn apply(&self, net: &mut Network, ctls: &mut [CompCtl]) -> ElecResult<()> {
        self.check(net)?;
        for (name, snap) in &self.comps {
            let id = net.id_by_name(name).expect("validated above");
            let ctl = &mut ctls[id.value()];
            ctl.failed = snap.failed;
            ctl.shorted = snap.shorted;
            if let Some(set) = snap.cb_set {
                ctl.cb_set = set;
            }
            if let Some(state) = &snap.tie_state {
                ctl.tie_state = state.clone();
            }
            if let Some(chg) = snap.batt_chg_rel {
                ctl.batt_chg_rel = Some(chg);
            }
            if let Some(temp) = snap.batt_temp_k {
                ctl.batt_temp_k = Some(temp);
            }
            let comp = net.comp_mut(id);
            comp.ps.failed = snap.failed;
            comp.ps.shorted = snap.shorted;
            if let (Some(temp), Some(cb)) = (snap.cb_temp, comp.ts.as_cb_mut()) {
                cb.temp = temp;
            }
            if let (Some(u), Some(ls)) = (snap.incap_u, comp.ts.as_load_mut()) {
                ls.incap_u = u;
            }
        }
        debug!(comps = self.comps.len(), "snapshot restored");
        Ok(())
    }

    /// Serialize to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> ElecResult<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ElecError::Parse(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from a JSON file written by [`SystemSnapshot::save`].
    pub fn load(path: impl AsRef<Path>) -> ElecResult<SystemSnapshot> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| ElecError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::*;
    use crate::step::default_ctls;

    fn rig() -> (Network, Vec<CompCtl>) {
        let configs = vec![
            CompConfig::batt("BATT", BattConfig::new(25.4, 1.0e6, 1000.0)),
            CompConfig::bus("DC_BUS", BusConfig::dc(["BATT", "FEED_CB"])),
            CompConfig::cb("FEED_CB", CbConfig::new(10.0)),
            CompConfig::bus("LOAD_BUS", BusConfig::dc(["FEED_CB", "LOAD"])),
            CompConfig::load("LOAD", LoadConfig::dc_amps(5.0)),
        ];
        let net = Network::build(configs).unwrap();
        let ctls = default_ctls(&net);
        (net, ctls)
    }

    #[test]
    fn test_round_trip() {
        let (mut net, mut ctls) = rig();
        let batt = net.id_by_name("BATT").unwrap();
        let cb = net.id_by_name("FEED_CB").unwrap();
        net.comp_mut(batt).ts.as_batt_mut().unwrap().chg_rel = 0.42;
        net.comp_mut(cb).ts.as_cb_mut().unwrap().temp = 0.3;
        ctls[cb.value()].cb_set = false;
        ctls[net.id_by_name("LOAD").unwrap().value()].shorted = true;

        let snap = SystemSnapshot::capture(&net, &ctls);

        let (mut net2, mut ctls2) = rig();
        snap.apply(&mut net2, &mut ctls2).unwrap();
        let cb2 = net2.id_by_name("FEED_CB").unwrap();
        assert!(!ctls2[cb2.value()].cb_set);
        assert!((net2.comp(cb2).ts.as_cb().unwrap().temp - 0.3).abs() < 1e-12);
        assert!(ctls2[net2.id_by_name("LOAD").unwrap().value()].shorted);
        // battery charge goes through the pending override
        assert_eq!(
            ctls2[net2.id_by_name("BATT").unwrap().value()].batt_chg_rel,
            Some(0.42)
        );
    }

    #[test]
    fn test_mismatched_config_is_refused() {
        let (net, ctls) = rig();
        let snap = SystemSnapshot::capture(&net, &ctls);

        let other = vec![
            CompConfig::batt("BATT", BattConfig::new(25.4, 1.0e6, 1000.0)),
            CompConfig::bus("DC_BUS", BusConfig::dc(["BATT", "OTHER_LOAD"])),
            CompConfig::load("OTHER_LOAD", LoadConfig::dc_amps(1.0)),
        ];
        let mut net2 = Network::build(other).unwrap();
        let mut ctls2 = default_ctls(&net2);
        let err = snap.apply(&mut net2, &mut ctls2).unwrap_err();
        assert!(matches!(err, ElecError::SnapshotMismatch(_)));
        // nothing was applied
        assert!(!ctls2.iter().any(|c| c.shorted || c.failed));
    }

    #[test]
    fn test_fingerprint_ignores_ratings_but_not_wiring() {
        let (net, _) = rig();
        let fp = config_fingerprint(&net);

        // same wiring, different breaker rating: same fingerprint
        let retuned = vec![
            CompConfig::batt("BATT", BattConfig::new(25.4, 1.0e6, 1000.0)),
            CompConfig::bus("DC_BUS", BusConfig::dc(["BATT", "FEED_CB"])),
            CompConfig::cb("FEED_CB", CbConfig::new(15.0)),
            CompConfig::bus("LOAD_BUS", BusConfig::dc(["FEED_CB", "LOAD"])),
            CompConfig::load("LOAD", LoadConfig::dc_amps(5.0)),
        ];
        let net2 = Network::build(retuned).unwrap();
        assert_eq!(fp, config_fingerprint(&net2));

        // renamed component: different fingerprint
        let renamed = vec![
            CompConfig::batt("BATT2", BattConfig::new(25.4, 1.0e6, 1000.0)),
            CompConfig::bus("DC_BUS", BusConfig::dc(["BATT2", "FEED_CB"])),
            CompConfig::cb("FEED_CB", CbConfig::new(10.0)),
            CompConfig::bus("LOAD_BUS", BusConfig::dc(["FEED_CB", "LOAD"])),
            CompConfig::load("LOAD", LoadConfig::dc_amps(5.0)),
        ];
        let net3 = Network::build(renamed).unwrap();
        assert_ne!(fp, config_fingerprint(&net3));
    }

    #[test]
    fn test_file_round_trip() {
        let (net, ctls) = rig();
        let snap = SystemSnapshot::capture(&net, &ctls);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        snap.save(&path).unwrap();
        let loaded = SystemSnapshot::load(&path).unwrap();
        assert_eq!(loaded.fingerprint, snap.fingerprint);
        assert_eq!(loaded.comps.len(), snap.comps.len());
    }
}
