//! Whole-network files.
//!
//! A network file is a versioned list of component descriptors, in YAML or
//! JSON. Loading goes through full network construction, so a bad file
//! reports every wiring problem at once rather than failing lazily later.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use amps_core::{CompConfig, ElecSys, Network};

const FILE_VERSION: u32 = 1;

/// On-disk form of a network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkFile {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub comps: Vec<CompConfig>,
}

fn default_version() -> u32 {
    FILE_VERSION
}

impl NetworkFile {
    pub fn new(comps: Vec<CompConfig>) -> Self {
        NetworkFile {
            version: FILE_VERSION,
            comps,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = match extension(path) {
            Some("json") => serde_json::to_string_pretty(self).context("serializing network json")?,
            _ => serde_yaml::to_string(self).context("serializing network yaml")?,
        };
        fs::write(path, text)
            .with_context(|| format!("writing network file '{}'", path.display()))?;
        Ok(())
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

/// Read and parse a network file, selecting the format by extension and
/// falling back to trying both.
pub fn load_file(path: &Path) -> Result<NetworkFile> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading network file '{}'", path.display()))?;
    let file: NetworkFile = match extension(path) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            serde_yaml::from_str(&data).context("parsing network yaml")?
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(&data).context("parsing network json")?
        }
        _ => serde_yaml::from_str(&data)
            .or_else(|_| serde_json::from_str(&data))
            .context("parsing network file")?,
    };
    if file.version > FILE_VERSION {
        anyhow::bail!(
            "network file '{}' has version {}, this build understands up to {FILE_VERSION}",
            path.display(),
            file.version
        );
    }
    Ok(file)
}

/// Load a network file and build the (validated) network.
pub fn load_network_from_path(path: &Path) -> Result<Network> {
    let file = load_file(path)?;
    Network::build(file.comps)
        .with_context(|| format!("building network from '{}'", path.display()))
}

/// Load a network file straight into a runnable system.
pub fn load_system_from_path(path: &Path) -> Result<ElecSys> {
    let file = load_file(path)?;
    ElecSys::new(file.comps)
        .with_context(|| format!("building system from '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::single_battery_feeder;

    #[test]
    fn test_yaml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.yaml");
        NetworkFile::new(single_battery_feeder(25.4, 10.0, 5.0))
            .save(&path)
            .unwrap();
        let net = load_network_from_path(&path).unwrap();
        assert_eq!(net.len(), 5);
        assert!(net.comp_by_name("FEED_CB").is_some());
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.json");
        NetworkFile::new(single_battery_feeder(25.4, 10.0, 5.0))
            .save(&path)
            .unwrap();
        let sys = load_system_from_path(&path).unwrap();
        sys.step_once(0.05).unwrap();
        assert!(sys.comp("LOAD").unwrap().is_powered());
    }

    #[test]
    fn test_bad_wiring_reports_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.yaml");
        let mut comps = single_battery_feeder(25.4, 10.0, 5.0);
        comps.pop(); // drop the load, leaving a dangling bus reference
        NetworkFile::new(comps).save(&path).unwrap();
        let err = load_network_from_path(&path).unwrap_err();
        assert!(format!("{err:#}").contains("building network"));
    }

    #[test]
    fn test_future_version_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.yaml");
        let mut file = NetworkFile::new(single_battery_feeder(25.4, 10.0, 5.0));
        file.version = 99;
        file.save(&path).unwrap();
        assert!(load_file(&path).is_err());
    }
}
