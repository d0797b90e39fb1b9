//! End-to-end behavior of complete networks driven through the public
//! [`ElecSys`] API.

use amps_core::*;

const DT: f64 = 0.05;

fn battery_feeder() -> Vec<CompConfig> {
    vec![
        CompConfig::batt("BATT", BattConfig::new(25.4, 4.0e6, 1000.0)),
        CompConfig::bus("DC_BUS", BusConfig::dc(["BATT", "FEED_CB"])),
        CompConfig::cb("FEED_CB", CbConfig::new(10.0)),
        CompConfig::bus("LOAD_BUS", BusConfig::dc(["FEED_CB", "PITOT_HEAT"])),
        CompConfig::load("PITOT_HEAT", LoadConfig::dc_amps(5.0)),
    ]
}

#[test]
fn test_quick_start_example() {
    let sys = ElecSys::with_seed(battery_feeder(), 7).unwrap();
    for _ in 0..10 {
        sys.step_once(DT).unwrap();
    }
    let load = sys.comp("PITOT_HEAT").unwrap();
    assert!(load.is_powered());
    // battery sags a little under 5 A but stays near nominal
    assert!(load.in_volts() > 23.0 && load.in_volts() < 25.4);
    assert!((load.in_amps() - 5.0).abs() < 1.0);
    // the whole path sees the same current
    let cb = sys.comp("FEED_CB").unwrap();
    assert!((cb.out_amps() - load.in_amps()).abs() < 1e-9);
    let batt = sys.comp("BATT").unwrap();
    assert!((batt.out_amps() - load.in_amps()).abs() < 1e-9);
    assert_eq!(load.srcs(), vec!["BATT".to_string()]);
}

#[test]
fn test_current_is_conserved_at_every_bus() {
    let configs = vec![
        CompConfig::batt("BATT", BattConfig::new(25.4, 4.0e6, 2000.0)),
        CompConfig::bus("MAIN", BusConfig::dc(["BATT", "CB_A", "CB_B", "NAV"])),
        CompConfig::cb("CB_A", CbConfig::new(10.0)),
        CompConfig::cb("CB_B", CbConfig::new(10.0)),
        CompConfig::bus("BUS_A", BusConfig::dc(["CB_A", "PUMP"])),
        CompConfig::bus("BUS_B", BusConfig::dc(["CB_B", "BEACON"])),
        CompConfig::load("NAV", LoadConfig::dc_amps(2.0)),
        CompConfig::load("PUMP", LoadConfig::dc_amps(6.0)),
        CompConfig::load("BEACON", LoadConfig::dc_amps(1.5)),
    ];
    let sys = ElecSys::with_seed(configs, 7).unwrap();
    for _ in 0..10 {
        sys.step_once(DT).unwrap();
    }
    let drawn: f64 = ["NAV", "PUMP", "BEACON"]
        .iter()
        .map(|n| sys.comp(n).unwrap().in_amps())
        .sum();
    let supplied = sys.comp("BATT").unwrap().out_amps();
    assert!(
        (supplied - drawn).abs() < 1e-9,
        "battery supplies {supplied} A but loads draw {drawn} A"
    );
    assert!((sys.comp("MAIN").unwrap().out_amps() - drawn).abs() < 1e-9);
}

#[test]
fn test_ac_channel_with_tru_and_frequency() {
    let configs = vec![
        CompConfig::gen("GEN", GenConfig::ac(115.0, 400.0, 4000.0, 6000.0, 20_000.0)),
        CompConfig::bus("AC_BUS", BusConfig::ac(["GEN", "GALLEY", "TRU1"])),
        CompConfig::load(
            "GALLEY",
            LoadConfig::stab_watts(PowerDomain::Ac, 1000.0, 90.0),
        ),
        CompConfig::tru("TRU1", TruConfig::new(115.0, 28.0, 1500.0, "AC_BUS", "DC_BUS")),
        CompConfig::bus("DC_BUS", BusConfig::dc(["TRU1", "AVIONICS"])),
        CompConfig::load(
            "AVIONICS",
            LoadConfig::stab_watts(PowerDomain::Dc, 280.0, 18.0),
        ),
    ];
    let sys = ElecSys::with_seed(configs, 7).unwrap();
    for _ in 0..100 {
        sys.step_once(DT).unwrap();
    }
    let galley = sys.comp("GALLEY").unwrap();
    assert!((galley.in_volts() - 115.0).abs() < 2.0);
    assert!((galley.in_freq() - 400.0).abs() < 8.0);
    let avionics = sys.comp("AVIONICS").unwrap();
    assert!((avionics.in_volts() - 28.0).abs() < 1.0);
    // DC side carries no frequency
    assert_eq!(avionics.in_freq(), 0.0);
    // constant-power load near its rating
    assert!((avionics.in_pwr() - 280.0).abs() < 60.0);
    let tru = sys.comp("TRU1").unwrap();
    assert!(tru.eff() > 0.0 && tru.eff() <= 1.0);
}

#[test]
fn test_diode_feeds_one_way() {
    let configs = vec![
        CompConfig::batt("MAIN_BATT", BattConfig::new(25.4, 4.0e6, 1000.0)),
        CompConfig::bus("MAIN_BUS", BusConfig::dc(["MAIN_BATT", "ESS_FEED"])),
        CompConfig::diode("ESS_FEED", DiodeConfig::new("MAIN_BUS", "ESS_BUS")),
        CompConfig::bus("ESS_BUS", BusConfig::dc(["ESS_FEED", "STBY_INST"])),
        CompConfig::load("STBY_INST", LoadConfig::dc_amps(1.0)),
    ];
    let sys = ElecSys::with_seed(configs, 7).unwrap();
    for _ in 0..5 {
        sys.step_once(DT).unwrap();
    }
    assert!(sys.comp("STBY_INST").unwrap().is_powered());
    let diode = sys.comp("ESS_FEED").unwrap();
    assert!(diode.out_amps() > 0.0);
}

#[test]
fn test_independent_islands_simulate_independently() {
    let configs = vec![
        CompConfig::batt("BATT_1", BattConfig::new(25.4, 4.0e6, 1000.0)),
        CompConfig::bus("BUS_1", BusConfig::dc(["BATT_1", "LOAD_1"])),
        CompConfig::load("LOAD_1", LoadConfig::dc_amps(5.0)),
        CompConfig::batt("BATT_2", BattConfig::new(12.0, 4.0e6, 500.0)),
        CompConfig::bus("BUS_2", BusConfig::dc(["BATT_2", "LOAD_2"])),
        CompConfig::load("LOAD_2", LoadConfig::dc_amps(2.0)),
    ];
    let sys = ElecSys::with_seed(configs, 7).unwrap();
    assert_eq!(sys.stats().islands, 2);
    for _ in 0..10 {
        sys.step_once(DT).unwrap();
    }
    let l1 = sys.comp("LOAD_1").unwrap();
    let l2 = sys.comp("LOAD_2").unwrap();
    assert!(l1.in_volts() > 20.0);
    assert!(l2.in_volts() > 10.0 && l2.in_volts() < 13.0);
    assert_eq!(l1.srcs(), vec!["BATT_1".to_string()]);
    assert_eq!(l2.srcs(), vec!["BATT_2".to_string()]);
}

#[test]
fn test_breaker_trips_and_reports_through_handle() {
    let mut configs = battery_feeder();
    configs[4] = CompConfig::load("PITOT_HEAT", LoadConfig::dc_amps(25.0));
    let sys = ElecSys::with_seed(configs, 7).unwrap();
    let cb = sys.comp("FEED_CB").unwrap();
    let mut tripped = false;
    for _ in 0..100 {
        sys.step_once(DT).unwrap();
        if cb.cb_tripped() {
            tripped = true;
            break;
        }
    }
    assert!(tripped, "25 A through a 10 A breaker must trip it");
    assert!(!cb.cb_set());
    // the trip lands after paint, so the load goes dark on the next step
    sys.step_once(DT).unwrap();
    assert!(!sys.comp("PITOT_HEAT").unwrap().is_powered());
}

#[test]
fn test_loadcb_autogen_is_visible_but_marked() {
    let configs = vec![
        CompConfig::batt("BATT", BattConfig::new(25.4, 4.0e6, 1000.0)),
        CompConfig::bus("DC_BUS", BusConfig::dc(["BATT", "PITOT"])),
        CompConfig::load("PITOT", LoadConfig::dc_amps(5.0).with_loadcb(7.5)),
    ];
    let sys = ElecSys::with_seed(configs, 7).unwrap();
    let cb = sys.comp("CB_PITOT").expect("autogen breaker exists");
    assert!(cb.is_autogen());
    for _ in 0..5 {
        sys.step_once(DT).unwrap();
    }
    assert!(sys.comp("PITOT").unwrap().is_powered());
    // pulling the autogen breaker cuts the load like any other
    cb.set_cb(false);
    sys.step_once(DT).unwrap();
    assert!(!sys.comp("PITOT").unwrap().is_powered());
}
