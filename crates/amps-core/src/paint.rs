//! Voltage propagation ("painting") pass.
//!
//! Depth-first from every energized battery and generator, outward along
//! links. At each conducting component the source's voltage competes with
//! whatever has already been painted there; the pass only continues through
//! a component when it strictly raises its input voltage, which both
//! implements max-voltage-wins and terminates ring topologies.
//!
//! Converters (TRU, inverter, transformer) end one source's paint and start
//! their own: when input voltage arrives, the output side is computed and
//! the converter recurses as a fresh source with its own source index.
//!
//! No current flows here. Painting establishes *potential* and source
//! ownership; the integration pass moves charge.

use tracing::warn;

use crate::config::CompKind;
use crate::network::Network;
use crate::{CompId, CompType, MAX_DEPTH};

/// Run the paint pass over the whole network. Assumes the reset phase has
/// cleared electrical state and the source-update phase has set root output
/// voltages.
pub fn paint(net: &mut Network) {
    for root in net.roots().to_vec() {
        let (failed, out_volts) = {
            let c = net.comp(root);
            (c.ps.failed, c.ps.out_volts)
        };
        if failed || out_volts <= 0.0 {
            continue;
        }
        let (src_idx, bus) = {
            let c = net.comp(root);
            (c.src_idx.expect("root without source index"), c.links[0].peer)
        };
        {
            let c = net.comp_mut(root);
            // A battery already painted above its own potential by an
            // earlier source stays a charge sink; don't reclaim it.
            if c.ps.in_volts <= out_volts {
                c.ps.paint_src = Some(src_idx);
                c.ps.paint_upstream = Some(root);
                c.ps.src_mask |= src_idx.mask();
            }
        }
        paint_comp(net, root, root, bus, 1);
    }
}

/// Paint one component with `src`'s output voltage, arriving from
/// `upstream`, and recurse onward where it conducts.
fn paint_comp(net: &mut Network, src: CompId, upstream: CompId, comp: CompId, depth: usize) {
    debug_assert!(
        depth < MAX_DEPTH,
        "paint depth limit hit; network is malformed"
    );
    if depth >= MAX_DEPTH {
        warn!(
            comp = net.comp(comp).name(),
            "paint depth limit hit; network is malformed"
        );
        return;
    }
    if comp == src {
        return;
    }
    let (src_volts, src_freq, src_idx) = {
        let s = net.comp(src);
        (
            s.ps.out_volts,
            s.ps.out_freq,
            s.src_idx.expect("painting from a non-source"),
        )
    };

    match net.comp(comp).typ {
        // A battery reached by a foreign source at higher potential becomes
        // a charge sink: record the charging voltage on its input side. The
        // actual charge current is computed during integration.
        CompType::Batt => {
            let c = net.comp_mut(comp);
            if !c.ps.failed && src_volts > c.ps.out_volts && src_volts > c.ps.in_volts {
                c.ps.in_volts = src_volts;
                c.ps.paint_src = Some(src_idx);
                c.ps.paint_upstream = Some(upstream);
                c.ps.src_mask |= src_idx.mask();
            }
        }

        // Generators never accept power from the network.
        CompType::Gen => {}

        CompType::Tru | CompType::Inv | CompType::Xfrmr => {
            paint_converter(net, src_volts, src_freq, src_idx, upstream, comp, depth)
        }

        CompType::Load => {
            let c = net.comp_mut(comp);
            if src_volts > c.ps.in_volts {
                c.ps.in_volts = src_volts;
                c.ps.in_freq = src_freq;
                c.ps.paint_src = Some(src_idx);
                c.ps.paint_upstream = Some(upstream);
                c.ps.src_mask |= src_idx.mask();
            }
        }

        CompType::Bus => {
            let onward: Vec<CompId> = {
                let c = net.comp_mut(comp);
                if c.ps.failed || src_volts <= c.ps.in_volts {
                    return;
                }
                c.ps.in_volts = src_volts;
                c.ps.out_volts = src_volts;
                c.ps.in_freq = src_freq;
                c.ps.out_freq = src_freq;
                c.ps.paint_src = Some(src_idx);
                c.ps.paint_upstream = Some(upstream);
                c.ps.src_mask |= src_idx.mask();
                c.links
                    .iter()
                    .map(|l| l.peer)
                    .filter(|&p| p != upstream)
                    .collect()
            };
            for peer in onward {
                paint_comp(net, src, comp, peer, depth + 1);
            }
        }

        CompType::Cb | CompType::Shunt => {
            let other = {
                let c = net.comp_mut(comp);
                if c.ps.failed {
                    return;
                }
                if let Some(cb) = c.ts.as_cb() {
                    if !cb.wk_set {
                        return;
                    }
                }
                if src_volts <= c.ps.in_volts {
                    return;
                }
                c.ps.in_volts = src_volts;
                c.ps.out_volts = src_volts;
                c.ps.in_freq = src_freq;
                c.ps.out_freq = src_freq;
                c.ps.paint_src = Some(src_idx);
                c.ps.paint_upstream = Some(upstream);
                c.ps.src_mask |= src_idx.mask();
                c.links
                    .iter()
                    .map(|l| l.peer)
                    .find(|&p| p != upstream)
            };
            if let Some(other) = other {
                paint_comp(net, src, comp, other, depth + 1);
            }
        }

        CompType::Tie => {
            let onward: Vec<CompId> = {
                let c = net.comp_mut(comp);
                if c.ps.failed {
                    return;
                }
                let Some(up_slot) = c.link_slot(upstream) else {
                    return;
                };
                let closed = c
                    .ts
                    .as_tie()
                    .map(|t| t.wk_state.clone())
                    .unwrap_or_default();
                if !closed.get(up_slot).copied().unwrap_or(false) {
                    return;
                }
                if src_volts <= c.ps.in_volts {
                    return;
                }
                c.ps.in_volts = src_volts;
                c.ps.out_volts = src_volts;
                c.ps.in_freq = src_freq;
                c.ps.out_freq = src_freq;
                c.ps.paint_src = Some(src_idx);
                c.ps.paint_upstream = Some(upstream);
                c.ps.src_mask |= src_idx.mask();
                c.links
                    .iter()
                    .enumerate()
                    .filter(|&(slot, l)| slot != up_slot && closed[slot] && l.peer != upstream)
                    .map(|(_, l)| l.peer)
                    .collect()
            };
            for peer in onward {
                paint_comp(net, src, comp, peer, depth + 1);
            }
        }

        CompType::Diode => {
            let forward = {
                let c = net.comp_mut(comp);
                // Conducts anode (slot 0) to cathode (slot 1) only.
                if c.ps.failed || c.links[0].peer != upstream {
                    return;
                }
                if src_volts <= c.ps.in_volts {
                    return;
                }
                c.ps.in_volts = src_volts;
                c.ps.out_volts = src_volts;
                c.ps.paint_src = Some(src_idx);
                c.ps.paint_upstream = Some(upstream);
                c.ps.src_mask |= src_idx.mask();
                c.links[1].peer
            };
            paint_comp(net, src, comp, forward, depth + 1);
        }

        CompType::LabelBox => {}
    }
}

/// Converter reached on its input side: take the input voltage, derive the
/// output, and continue painting as a new source.
fn paint_converter(
    net: &mut Network,
    src_volts: f64,
    src_freq: f64,
    src_idx: crate::SrcIdx,
    upstream: CompId,
    comp: CompId,
    depth: usize,
) {
    let out_peer = {
        let c = net.comp_mut(comp);
        // Reverse flow (arriving on the output side) is blocked.
        if c.links[0].peer != upstream {
            return;
        }
        if src_volts <= c.ps.in_volts {
            return;
        }
        c.ps.in_volts = src_volts;
        c.ps.in_freq = src_freq;
        c.ps.paint_src = Some(src_idx);
        c.ps.paint_upstream = Some(upstream);
        c.ps.src_mask |= src_idx.mask();

        let (out_volts, out_freq) = match &c.cfg.kind {
            CompKind::Tru(t) => {
                let regul = c.ts.as_tru().map(|s| s.chgr_regul).unwrap_or(1.0);
                (t.out_volts * (src_volts / t.in_volts) * regul, 0.0)
            }
            CompKind::Inv(i) => (i.out_volts * (src_volts / i.in_volts), i.freq),
            CompKind::Xfrmr(x) => (x.out_volts * (src_volts / x.in_volts), src_freq),
            _ => unreachable!("paint_converter on a non-converter"),
        };
        if c.ps.failed {
            c.ps.out_volts = 0.0;
            c.ps.out_freq = 0.0;
            return;
        }
        c.ps.out_volts = out_volts;
        c.ps.out_freq = out_freq;
        if out_volts <= 0.0 {
            return;
        }
        c.links[1].peer
    };
    // The converter is now the source for everything downstream.
    paint_comp(net, comp, comp, out_peer, depth + 1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::*;

    fn painted_feeder() -> Network {
        let configs = vec![
            CompConfig::batt("BATT", BattConfig::new(25.4, 1.0e6, 1000.0)),
            CompConfig::bus("DC_BUS", BusConfig::dc(["BATT", "FEED_CB"])),
            CompConfig::cb("FEED_CB", CbConfig::new(10.0)),
            CompConfig::bus("LOAD_BUS", BusConfig::dc(["FEED_CB", "LOAD"])),
            CompConfig::load("LOAD", LoadConfig::dc_amps(5.0)),
        ];
        let mut net = Network::build(configs).unwrap();
        let batt = net.id_by_name("BATT").unwrap();
        net.comp_mut(batt).ps.out_volts = 25.4;
        net
    }

    #[test]
    fn test_paint_reaches_load() {
        let mut net = painted_feeder();
        paint(&mut net);
        let load = net.comp_by_name("LOAD").unwrap();
        assert!((load.ps.in_volts - 25.4).abs() < 1e-9);
        assert!(load.ps.is_powered());
        let batt = net.comp_by_name("BATT").unwrap();
        assert_eq!(load.ps.paint_src, batt.src_idx);
    }

    #[test]
    fn test_open_breaker_blocks_paint() {
        let mut net = painted_feeder();
        let cb = net.id_by_name("FEED_CB").unwrap();
        net.comp_mut(cb).ts.as_cb_mut().unwrap().wk_set = false;
        paint(&mut net);
        assert!((net.comp_by_name("DC_BUS").unwrap().ps.in_volts - 25.4).abs() < 1e-9);
        assert_eq!(net.comp_by_name("LOAD_BUS").unwrap().ps.in_volts, 0.0);
        assert!(!net.comp_by_name("LOAD").unwrap().ps.is_powered());
    }

    #[test]
    fn test_failed_source_paints_nothing() {
        let mut net = painted_feeder();
        let batt = net.id_by_name("BATT").unwrap();
        net.comp_mut(batt).ps.failed = true;
        paint(&mut net);
        assert_eq!(net.comp_by_name("LOAD").unwrap().ps.in_volts, 0.0);
    }

    #[test]
    fn test_higher_voltage_wins() {
        let configs = vec![
            CompConfig::batt("WEAK", BattConfig::new(24.0, 1.0e6, 1000.0)),
            CompConfig::gen("STRONG", GenConfig::dc(28.0, 2000.0, 6000.0, 5000.0)),
            CompConfig::bus("BUS", BusConfig::dc(["WEAK", "STRONG", "LOAD"])),
            CompConfig::load("LOAD", LoadConfig::dc_amps(2.0)),
        ];
        let mut net = Network::build(configs).unwrap();
        let weak = net.id_by_name("WEAK").unwrap();
        let strong = net.id_by_name("STRONG").unwrap();
        net.comp_mut(weak).ps.out_volts = 24.0;
        net.comp_mut(strong).ps.out_volts = 28.0;
        paint(&mut net);
        let load = net.comp_by_name("LOAD").unwrap();
        assert!((load.ps.in_volts - 28.0).abs() < 1e-9);
        assert_eq!(load.ps.paint_src, net.comp(strong).src_idx);
        // the losing battery sees the winner as a charging source
        let weak = net.comp(weak);
        assert!((weak.ps.in_volts - 28.0).abs() < 1e-9);
    }

    #[test]
    fn test_diode_blocks_reverse() {
        let configs = vec![
            CompConfig::batt("BATT", BattConfig::new(25.4, 1.0e6, 1000.0)),
            CompConfig::bus("BUS_A", BusConfig::dc(["BATT", "D1"])),
            CompConfig::diode("D1", DiodeConfig::new("BUS_B", "BUS_A")),
            CompConfig::bus("BUS_B", BusConfig::dc(["D1", "LOAD"])),
            CompConfig::load("LOAD", LoadConfig::dc_amps(1.0)),
        ];
        let mut net = Network::build(configs).unwrap();
        let batt = net.id_by_name("BATT").unwrap();
        net.comp_mut(batt).ps.out_volts = 25.4;
        paint(&mut net);
        // BATT feeds the diode's cathode side; nothing conducts backwards.
        assert_eq!(net.comp_by_name("BUS_B").unwrap().ps.in_volts, 0.0);
        assert!(!net.comp_by_name("LOAD").unwrap().ps.is_powered());
    }

    #[test]
    fn test_tru_becomes_new_source() {
        let configs = vec![
            CompConfig::gen("GEN", GenConfig::ac(115.0, 400.0, 4000.0, 6000.0, 20_000.0)),
            CompConfig::bus("AC_BUS", BusConfig::ac(["GEN", "TRU1"])),
            CompConfig::tru("TRU1", TruConfig::new(115.0, 28.0, 1500.0, "AC_BUS", "DC_BUS")),
            CompConfig::bus("DC_BUS", BusConfig::dc(["TRU1", "L"])),
            CompConfig::load("L", LoadConfig::dc_amps(2.0)),
        ];
        let mut net = Network::build(configs).unwrap();
        let gen = net.id_by_name("GEN").unwrap();
        {
            let g = net.comp_mut(gen);
            g.ps.out_volts = 115.0;
            g.ps.out_freq = 400.0;
        }
        paint(&mut net);
        let tru = net.comp_by_name("TRU1").unwrap();
        assert!((tru.ps.in_volts - 115.0).abs() < 1e-9);
        assert!((tru.ps.out_volts - 28.0).abs() < 1e-9);
        assert_eq!(tru.ps.out_freq, 0.0);
        let load = net.comp_by_name("L").unwrap();
        assert!((load.ps.in_volts - 28.0).abs() < 1e-9);
        assert_eq!(load.ps.in_freq, 0.0);
        // ownership downstream of the TRU belongs to the TRU
        assert_eq!(load.ps.paint_src, tru.src_idx);
    }

    #[test]
    fn test_tie_paints_only_closed_links() {
        let configs = vec![
            CompConfig::batt("BATT", BattConfig::new(25.4, 1.0e6, 1000.0)),
            CompConfig::bus("BUS_A", BusConfig::dc(["BATT", "TIE1"])),
            CompConfig::tie("TIE1"),
            CompConfig::bus("BUS_B", BusConfig::dc(["TIE1", "L_B"])),
            CompConfig::bus("BUS_C", BusConfig::dc(["TIE1", "L_C"])),
            CompConfig::load("L_B", LoadConfig::dc_amps(1.0)),
            CompConfig::load("L_C", LoadConfig::dc_amps(1.0)),
        ];
        let mut net = Network::build(configs).unwrap();
        let batt = net.id_by_name("BATT").unwrap();
        net.comp_mut(batt).ps.out_volts = 25.4;
        let tie = net.id_by_name("TIE1").unwrap();
        // close A-side and B-side, leave C open
        let bus_a = net.id_by_name("BUS_A").unwrap();
        let bus_b = net.id_by_name("BUS_B").unwrap();
        let slot_a = net.comp(tie).link_slot(bus_a).unwrap();
        let slot_b = net.comp(tie).link_slot(bus_b).unwrap();
        {
            let t = net.comp_mut(tie).ts.as_tie_mut().unwrap();
            t.wk_state[slot_a] = true;
            t.wk_state[slot_b] = true;
        }
        paint(&mut net);
        assert!(net.comp_by_name("L_B").unwrap().ps.is_powered());
        assert!(!net.comp_by_name("L_C").unwrap().ps.is_powered());
    }

    #[test]
    #[should_panic(expected = "depth limit")]
    fn test_depth_cap_faults_on_absurd_chain() {
        // A 60-segment bus/breaker chain runs past the traversal cap.
        let mut configs = vec![CompConfig::batt(
            "BATT",
            BattConfig::new(25.4, 1.0e6, 1000.0),
        )];
        for i in 0..60 {
            let prev = if i == 0 {
                "BATT".to_string()
            } else {
                format!("CB_{}", i - 1)
            };
            configs.push(CompConfig::bus(
                format!("BUS_{i}"),
                BusConfig::dc([prev, format!("CB_{i}")]),
            ));
            configs.push(CompConfig::cb(format!("CB_{i}"), CbConfig::new(10.0)));
        }
        configs.push(CompConfig::bus(
            "END_BUS",
            BusConfig::dc(["CB_59".to_string(), "LOAD".to_string()]),
        ));
        configs.push(CompConfig::load("LOAD", LoadConfig::dc_amps(1.0)));
        let mut net = Network::build(configs).unwrap();
        let batt = net.id_by_name("BATT").unwrap();
        net.comp_mut(batt).ps.out_volts = 25.4;
        paint(&mut net);
    }

    #[test]
    fn test_ring_terminates() {
        // BATT - BUS_A - CB1 - BUS_B - CB2 - BUS_A (ring)
        let configs = vec![
            CompConfig::batt("BATT", BattConfig::new(25.4, 1.0e6, 1000.0)),
            CompConfig::bus("BUS_A", BusConfig::dc(["BATT", "CB1", "CB2"])),
            CompConfig::cb("CB1", CbConfig::new(10.0)),
            CompConfig::cb("CB2", CbConfig::new(10.0)),
            CompConfig::bus("BUS_B", BusConfig::dc(["CB1", "CB2", "LOAD"])),
            CompConfig::load("LOAD", LoadConfig::dc_amps(1.0)),
        ];
        let mut net = Network::build(configs).unwrap();
        let batt = net.id_by_name("BATT").unwrap();
        net.comp_mut(batt).ps.out_volts = 25.4;
        paint(&mut net);
        assert!((net.comp_by_name("LOAD").unwrap().ps.in_volts - 25.4).abs() < 1e-9);
    }
}
