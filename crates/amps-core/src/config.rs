//! Immutable component descriptors.
//!
//! A network is built from a flat list of [`CompConfig`] values, with
//! cross-references expressed by component name. The loader/front-end that
//! produced the list is not this crate's concern; descriptors are assumed
//! fully populated and are validated for internal consistency here, then
//! cross-linked by [`crate::network::Network::build`].
//!
//! Descriptors are immutable after construction. All runtime variability
//! (breaker state, tie state, battery charge, injected demand) lives in the
//! dynamic state, never here.

use serde::{Deserialize, Serialize};

use crate::curve::Curve;
use crate::diagnostics::Diagnostics;
use crate::{CompType, PowerDomain};

/// Celsius to Kelvin. Battery temperatures are tracked in Kelvin.
pub const fn c2kelvin(c: f64) -> f64 {
    c + 273.15
}

/// One component descriptor: identity plus type-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompConfig {
    /// Unique name within the network.
    pub name: String,
    /// Free-form physical location tag ("overhead panel", "E&E bay", ...),
    /// reported through the API for UI consumers.
    #[serde(default)]
    pub location: String,
    /// Definition line in the originating file, if the descriptor list came
    /// from one. Used for diagnostics only.
    #[serde(default)]
    pub line: Option<usize>,
    /// Marks descriptors synthesized by tooling (e.g. auto-generated load
    /// feeder breakers) so front-ends can hide them.
    #[serde(default)]
    pub autogen: bool,
    pub kind: CompKind,
}

/// Type-specific configuration. Closed set; every traversal function in the
/// engine matches on the corresponding [`CompType`] exhaustively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CompKind {
    Batt(BattConfig),
    Gen(GenConfig),
    Tru(TruConfig),
    Inv(InvConfig),
    Xfrmr(XfrmrConfig),
    Load(LoadConfig),
    Bus(BusConfig),
    Cb(CbConfig),
    Shunt(ShuntConfig),
    Tie(TieConfig),
    Diode(DiodeConfig),
    LabelBox(LabelBoxConfig),
}

impl CompConfig {
    fn new(name: impl Into<String>, kind: CompKind) -> Self {
        CompConfig {
            name: name.into(),
            location: String::new(),
            line: None,
            autogen: false,
            kind,
        }
    }

    pub fn batt(name: impl Into<String>, cfg: BattConfig) -> Self {
        Self::new(name, CompKind::Batt(cfg))
    }
    pub fn gen(name: impl Into<String>, cfg: GenConfig) -> Self {
        Self::new(name, CompKind::Gen(cfg))
    }
    pub fn tru(name: impl Into<String>, cfg: TruConfig) -> Self {
        Self::new(name, CompKind::Tru(cfg))
    }
    pub fn inv(name: impl Into<String>, cfg: InvConfig) -> Self {
        Self::new(name, CompKind::Inv(cfg))
    }
    pub fn xfrmr(name: impl Into<String>, cfg: XfrmrConfig) -> Self {
        Self::new(name, CompKind::Xfrmr(cfg))
    }
    pub fn load(name: impl Into<String>, cfg: LoadConfig) -> Self {
        Self::new(name, CompKind::Load(cfg))
    }
    pub fn bus(name: impl Into<String>, cfg: BusConfig) -> Self {
        Self::new(name, CompKind::Bus(cfg))
    }
    pub fn cb(name: impl Into<String>, cfg: CbConfig) -> Self {
        Self::new(name, CompKind::Cb(cfg))
    }
    pub fn shunt(name: impl Into<String>) -> Self {
        Self::new(name, CompKind::Shunt(ShuntConfig::default()))
    }
    pub fn tie(name: impl Into<String>) -> Self {
        Self::new(name, CompKind::Tie(TieConfig::default()))
    }
    pub fn diode(name: impl Into<String>, cfg: DiodeConfig) -> Self {
        Self::new(name, CompKind::Diode(cfg))
    }
    pub fn label_box(name: impl Into<String>, cfg: LabelBoxConfig) -> Self {
        Self::new(name, CompKind::LabelBox(cfg))
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn as_autogen(mut self) -> Self {
        self.autogen = true;
        self
    }

    pub fn comp_type(&self) -> CompType {
        match &self.kind {
            CompKind::Batt(_) => CompType::Batt,
            CompKind::Gen(_) => CompType::Gen,
            CompKind::Tru(_) => CompType::Tru,
            CompKind::Inv(_) => CompType::Inv,
            CompKind::Xfrmr(_) => CompType::Xfrmr,
            CompKind::Load(_) => CompType::Load,
            CompKind::Bus(_) => CompType::Bus,
            CompKind::Cb(_) => CompType::Cb,
            CompKind::Shunt(_) => CompType::Shunt,
            CompKind::Tie(_) => CompType::Tie,
            CompKind::Diode(_) => CompType::Diode,
            CompKind::LabelBox(_) => CompType::LabelBox,
        }
    }

    /// Validate this descriptor's own fields (cross-references are checked
    /// during link resolution, not here).
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        let entity = self.name.as_str();
        let bad = |msg: &str, d: &mut Diagnostics| {
            d.add_error_for("config", msg, entity, self.line);
        };
        match &self.kind {
            CompKind::Batt(b) => {
                if b.volts <= 0.0 {
                    bad("battery nominal volts must be positive", diag);
                }
                if b.max_pwr <= 0.0 {
                    bad("battery max power must be positive", diag);
                }
                if b.capacity < 0.0 {
                    bad("battery capacity must not be negative", diag);
                }
                if b.chg_r <= 0.0 {
                    bad("battery charge resistance must be positive", diag);
                }
            }
            CompKind::Gen(g) => {
                if g.volts <= 0.0 {
                    bad("generator nominal volts must be positive", diag);
                }
                if g.min_rpm <= 0.0 || g.max_rpm <= 0.0 || g.min_rpm >= g.max_rpm {
                    bad("generator rpm band must satisfy 0 < min < max", diag);
                }
                if g.max_pwr <= 0.0 {
                    bad("generator max power must be positive", diag);
                }
                if g.domain.is_ac() && g.freq <= 0.0 {
                    bad("AC generator must declare a nominal frequency", diag);
                }
            }
            CompKind::Tru(t) => {
                if t.in_volts <= 0.0 || t.out_volts <= 0.0 {
                    bad("TRU nominal volts must be positive on both sides", diag);
                }
                if t.max_pwr <= 0.0 {
                    bad("TRU max power must be positive", diag);
                }
                if let Some(chgr) = &t.charger {
                    if chgr.curr_lim <= 0.0 {
                        bad("charger current limit must be positive", diag);
                    }
                }
            }
            CompKind::Inv(i) => {
                if i.in_volts <= 0.0 || i.out_volts <= 0.0 {
                    bad("inverter nominal volts must be positive on both sides", diag);
                }
                if i.freq <= 0.0 {
                    bad("inverter must declare an output frequency", diag);
                }
                if i.max_pwr <= 0.0 {
                    bad("inverter max power must be positive", diag);
                }
            }
            CompKind::Xfrmr(x) => {
                if x.in_volts <= 0.0 || x.out_volts <= 0.0 {
                    bad(
                        "transformer nominal volts must be positive on both sides",
                        diag,
                    );
                }
                if x.max_pwr <= 0.0 {
                    bad("transformer max power must be positive", diag);
                }
            }
            CompKind::Load(l) => {
                // Stabilized loads MUST declare a minimum operating voltage;
                // constant-current loads don't need one.
                if l.stab && l.min_volts <= 0.0 {
                    bad("stabilized load must declare min operating volts", diag);
                }
                if l.std_load < 0.0 {
                    bad("baseline load must not be negative", diag);
                }
                if l.incap_farads < 0.0 {
                    bad("input capacitance must not be negative", diag);
                }
                if l.incap_farads > 0.0 && l.incap_src_r <= 0.0 {
                    bad("input capacitor charge resistance must be positive", diag);
                }
            }
            CompKind::Bus(b) => {
                if b.comps.is_empty() {
                    bad("bus has no endpoints", diag);
                }
            }
            CompKind::Cb(c) => {
                if c.max_amps <= 0.0 {
                    bad("breaker current rating must be positive", diag);
                }
                if c.rate <= 0.0 {
                    bad("breaker thermal rate must be positive", diag);
                }
            }
            CompKind::Shunt(_) | CompKind::Tie(_) | CompKind::LabelBox(_) => {}
            CompKind::Diode(d) => {
                if d.sides[0] == d.sides[1] {
                    bad("diode sides must reference two distinct buses", diag);
                }
            }
        }
    }
}

/// Battery configuration. See the crate docs for the discharge voltage law.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattConfig {
    /// Nominal (fully-charged, unloaded) voltage.
    pub volts: f64,
    /// Energy capacity in Joules at reference temperature.
    pub capacity: f64,
    /// Maximum rated discharge power in Watts; sets the current at which
    /// the output voltage sags to zero.
    pub max_pwr: f64,
    /// Base internal charge resistance in Ohms. Effective resistance is
    /// `chg_r / (1 - chg_rel)`, rising asymptotically as the battery fills.
    pub chg_r: f64,
    /// Initial cell temperature in Kelvin.
    pub init_temp: f64,
}

impl BattConfig {
    pub fn new(volts: f64, capacity: f64, max_pwr: f64) -> Self {
        BattConfig {
            volts,
            capacity,
            max_pwr,
            chg_r: 0.1,
            init_temp: c2kelvin(15.0),
        }
    }

    pub fn with_chg_resistance(mut self, chg_r: f64) -> Self {
        self.chg_r = chg_r;
        self
    }

    pub fn with_init_temp(mut self, kelvin: f64) -> Self {
        self.init_temp = kelvin;
        self
    }
}

/// Generator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenConfig {
    pub domain: PowerDomain,
    /// Nominal voltage at center rpm.
    pub volts: f64,
    /// Nominal output frequency in Hz (0 for DC generators).
    pub freq: f64,
    /// Rpm band inside which the regulator can hold nominal output.
    pub min_rpm: f64,
    pub max_rpm: f64,
    pub max_pwr: f64,
    /// Governor adaptation time constant for voltage stabilization, seconds.
    pub stab_rate_u: f64,
    /// Governor adaptation time constant for frequency stabilization.
    pub stab_rate_f: f64,
    /// Output power (W) -> efficiency curve.
    pub eff_curve: Curve,
}

impl GenConfig {
    pub fn ac(volts: f64, freq: f64, min_rpm: f64, max_rpm: f64, max_pwr: f64) -> Self {
        GenConfig {
            domain: PowerDomain::Ac,
            volts,
            freq,
            min_rpm,
            max_rpm,
            max_pwr,
            stab_rate_u: 0.1,
            stab_rate_f: 0.25,
            eff_curve: Curve::constant(0.85),
        }
    }

    pub fn dc(volts: f64, min_rpm: f64, max_rpm: f64, max_pwr: f64) -> Self {
        GenConfig {
            domain: PowerDomain::Dc,
            volts,
            freq: 0.0,
            min_rpm,
            max_rpm,
            max_pwr,
            stab_rate_u: 0.1,
            stab_rate_f: 0.25,
            eff_curve: Curve::constant(0.85),
        }
    }

    pub fn with_stab_rates(mut self, rate_u: f64, rate_f: f64) -> Self {
        self.stab_rate_u = rate_u;
        self.stab_rate_f = rate_f;
        self
    }

    pub fn with_eff_curve(mut self, curve: Curve) -> Self {
        self.eff_curve = curve;
        self
    }
}

/// Battery-charger behavior of a TRU.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargerConfig {
    /// Name of the battery whose charge current is sensed.
    pub batt: String,
    /// Name of the breaker connecting the charger output to the battery;
    /// the charger backs off entirely when it is open (battery sense lost).
    pub batt_conn: String,
    /// Target charge current limit in Amps.
    pub curr_lim: f64,
}

/// Transformer-rectifier unit: AC input, DC output, no reverse flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TruConfig {
    pub in_volts: f64,
    pub out_volts: f64,
    pub max_pwr: f64,
    /// Output current (A) -> efficiency curve.
    pub eff_curve: Curve,
    /// Name of the AC-side bus.
    pub ac: String,
    /// Name of the DC-side bus.
    pub dc: String,
    /// Present when this TRU regulates as a battery charger.
    pub charger: Option<ChargerConfig>,
}

impl TruConfig {
    pub fn new(
        in_volts: f64,
        out_volts: f64,
        max_pwr: f64,
        ac: impl Into<String>,
        dc: impl Into<String>,
    ) -> Self {
        TruConfig {
            in_volts,
            out_volts,
            max_pwr,
            eff_curve: Curve::constant(0.85),
            ac: ac.into(),
            dc: dc.into(),
            charger: None,
        }
    }

    pub fn with_eff_curve(mut self, curve: Curve) -> Self {
        self.eff_curve = curve;
        self
    }

    pub fn as_charger(mut self, charger: ChargerConfig) -> Self {
        self.charger = Some(charger);
        self
    }
}

/// Inverter: DC input, AC output at a fixed frequency, no reverse flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvConfig {
    pub in_volts: f64,
    pub out_volts: f64,
    /// Output frequency in Hz.
    pub freq: f64,
    pub max_pwr: f64,
    pub eff_curve: Curve,
    /// Name of the DC-side (input) bus.
    pub dc: String,
    /// Name of the AC-side (output) bus.
    pub ac: String,
}

impl InvConfig {
    pub fn new(
        in_volts: f64,
        out_volts: f64,
        freq: f64,
        max_pwr: f64,
        dc: impl Into<String>,
        ac: impl Into<String>,
    ) -> Self {
        InvConfig {
            in_volts,
            out_volts,
            freq,
            max_pwr,
            eff_curve: Curve::constant(0.8),
            dc: dc.into(),
            ac: ac.into(),
        }
    }

    pub fn with_eff_curve(mut self, curve: Curve) -> Self {
        self.eff_curve = curve;
        self
    }
}

/// AC/AC transformer, forward-only with a fixed voltage ratio. Frequency
/// passes through unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XfrmrConfig {
    pub in_volts: f64,
    pub out_volts: f64,
    pub max_pwr: f64,
    pub eff_curve: Curve,
    /// Name of the input-side bus.
    pub input: String,
    /// Name of the output-side bus.
    pub output: String,
}

impl XfrmrConfig {
    pub fn new(
        in_volts: f64,
        out_volts: f64,
        max_pwr: f64,
        input: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        XfrmrConfig {
            in_volts,
            out_volts,
            max_pwr,
            eff_curve: Curve::constant(0.95),
            input: input.into(),
            output: output.into(),
        }
    }

    pub fn with_eff_curve(mut self, curve: Curve) -> Self {
        self.eff_curve = curve;
        self
    }
}

/// Electrical consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub domain: PowerDomain,
    /// Stabilized power supply: demand is in Watts (constant power).
    /// Unstabilized: demand is in Amps (constant current).
    pub stab: bool,
    /// Baseline demand (Watts if `stab`, Amps otherwise), added to whatever
    /// an injected demand closure returns.
    pub std_load: f64,
    /// Minimum input voltage at which the device operates at all.
    pub min_volts: f64,
    /// Bridging input capacitance in Farads (0 = none). Rides through brief
    /// input voltage loss.
    pub incap_farads: f64,
    /// Series resistance through which the input capacitor charges, Ohms.
    pub incap_src_r: f64,
    /// Convenience: rating of an auto-generated feeder breaker + bus for
    /// this load (the LOADCB pattern). Expanded by scenario builders.
    pub loadcb_rating: Option<f64>,
}

impl LoadConfig {
    /// Constant-current DC load drawing `amps` at its baseline.
    pub fn dc_amps(amps: f64) -> Self {
        LoadConfig {
            domain: PowerDomain::Dc,
            stab: false,
            std_load: amps,
            min_volts: 0.0,
            incap_farads: 0.0,
            incap_src_r: 1.0,
            loadcb_rating: None,
        }
    }

    /// Stabilized (constant-power) load.
    pub fn stab_watts(domain: PowerDomain, watts: f64, min_volts: f64) -> Self {
        LoadConfig {
            domain,
            stab: true,
            std_load: watts,
            min_volts,
            incap_farads: 0.0,
            incap_src_r: 1.0,
            loadcb_rating: None,
        }
    }

    pub fn with_incap(mut self, farads: f64, src_r: f64) -> Self {
        self.incap_farads = farads;
        self.incap_src_r = src_r;
        self
    }

    pub fn with_min_volts(mut self, min_volts: f64) -> Self {
        self.min_volts = min_volts;
        self
    }

    pub fn with_loadcb(mut self, rating_amps: f64) -> Self {
        self.loadcb_rating = Some(rating_amps);
        self
    }
}

/// Zero-resistance distribution node. Endpoints reference other components
/// by name; the bus is the only descriptor that declares links.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    pub domain: PowerDomain,
    pub comps: Vec<String>,
}

impl BusConfig {
    pub fn ac<I, S>(comps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        BusConfig {
            domain: PowerDomain::Ac,
            comps: comps.into_iter().map(Into::into).collect(),
        }
    }

    pub fn dc<I, S>(comps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        BusConfig {
            domain: PowerDomain::Dc,
            comps: comps.into_iter().map(Into::into).collect(),
        }
    }
}

/// Thermal circuit breaker (or fuse).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CbConfig {
    /// Rated current in Amps.
    pub max_amps: f64,
    /// Thermal filter time constant in seconds; the inverse of how fast the
    /// breaker heats at rated current.
    pub rate: f64,
    /// A fuse opens permanently: tripping also fails the component and it
    /// cannot be reset by toggling.
    pub fuse: bool,
    /// Three-phase breaker: per-phase current is a third of the total.
    pub triphase: bool,
}

impl CbConfig {
    pub fn new(max_amps: f64) -> Self {
        CbConfig {
            max_amps,
            rate: 1.0,
            fuse: false,
            triphase: false,
        }
    }

    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    pub fn as_fuse(mut self) -> Self {
        self.fuse = true;
        self
    }

    pub fn as_triphase(mut self) -> Self {
        self.triphase = true;
        self
    }
}

/// Current-sense pass-through; electrically a closed 2-link junction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShuntConfig {}

/// Dynamically connectable junction between N buses (contactor/relay bank).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TieConfig {}

/// DC one-way valve. `sides[0]` is the anode (input), `sides[1]` the
/// cathode (output).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiodeConfig {
    pub sides: [String; 2],
}

impl DiodeConfig {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        DiodeConfig {
            sides: [input.into(), output.into()],
        }
    }
}

/// Drawing-only annotation; takes no part in the simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelBoxConfig {
    pub text: String,
}

impl LabelBoxConfig {
    pub fn new(text: impl Into<String>) -> Self {
        LabelBoxConfig { text: text.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batt_config_validation() {
        let cfg = CompConfig::batt("B", BattConfig::new(-1.0, 100.0, 50.0));
        let mut diag = Diagnostics::new();
        cfg.validate_into(&mut diag);
        assert!(diag.has_errors());
        assert!(diag.errors().any(|i| i.message.contains("volts")));
    }

    #[test]
    fn test_stab_load_requires_min_volts() {
        let mut load = LoadConfig::stab_watts(PowerDomain::Dc, 100.0, 18.0);
        load.min_volts = 0.0;
        let cfg = CompConfig::load("L", load);
        let mut diag = Diagnostics::new();
        cfg.validate_into(&mut diag);
        assert!(diag.has_errors());
    }

    #[test]
    fn test_gen_rpm_band() {
        let cfg = CompConfig::gen("G", GenConfig::ac(115.0, 400.0, 5000.0, 4000.0, 10_000.0));
        let mut diag = Diagnostics::new();
        cfg.validate_into(&mut diag);
        assert!(diag.errors().any(|i| i.message.contains("rpm band")));
    }

    #[test]
    fn test_valid_config_has_no_issues() {
        let cfg = CompConfig::cb("CB1", CbConfig::new(7.5).with_rate(4.0))
            .with_location("pilot CB panel")
            .with_line(12);
        let mut diag = Diagnostics::new();
        cfg.validate_into(&mut diag);
        assert!(!diag.has_issues());
        assert_eq!(cfg.comp_type(), CompType::Cb);
        assert_eq!(cfg.line, Some(12));
    }

    #[test]
    fn test_diode_distinct_sides() {
        let cfg = CompConfig::diode("D", DiodeConfig::new("BUS_A", "BUS_A"));
        let mut diag = Diagnostics::new();
        cfg.validate_into(&mut diag);
        assert!(diag.has_errors());
    }
}
