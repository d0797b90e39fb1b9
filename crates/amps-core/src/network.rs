//! Network construction and topology.
//!
//! A [`Network`] is an arena of [`Comp`] values addressed by [`CompId`].
//! Only buses declare connectivity; every other descriptor is referenced *by*
//! a bus (converters and diodes name their buses, but the physical link is
//! still recorded from the bus side). Construction resolves all names into
//! index links, validates the result as a whole, and reports every problem
//! found through [`Diagnostics`] rather than stopping at the first.
//!
//! Link slot conventions, relied on by the traversal passes:
//! - battery, generator, load: `links[0]` is the bus
//! - TRU, inverter, transformer: `links[0]` is the input side, `links[1]`
//!   the output side
//! - breaker, shunt: exactly two links, in bus declaration order
//! - diode: `links[0]` is the anode bus, `links[1]` the cathode bus
//! - bus: one link per declared endpoint
//! - tie: one link per bus that references it
//! - label box: no links

use std::collections::HashMap;

use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use tracing::debug;

use crate::config::{CompConfig, CompKind};
use crate::diagnostics::Diagnostics;
use crate::error::{ElecError, ElecResult};
use crate::state::{BattState, CbState, GenState, LoadState, PowerState, TieState, TruState, TypeState};
use crate::{CompId, CompType, PowerDomain, SrcIdx, MAX_SRCS};

/// A resolved connection to a neighboring component, with per-source current
/// bookkeeping for the integration pass.
#[derive(Debug)]
pub struct Link {
    pub peer: CompId,
    /// Amps flowing over this link attributed to each source index.
    pub src_amps: Box<[f64]>,
}

impl Link {
    fn new(peer: CompId) -> Self {
        Link {
            peer,
            src_amps: vec![0.0; MAX_SRCS].into_boxed_slice(),
        }
    }
}

/// One component in the arena: immutable descriptor, resolved links, and
/// work-side dynamic state.
#[derive(Debug)]
pub struct Comp {
    pub id: CompId,
    pub cfg: CompConfig,
    pub typ: CompType,
    pub links: Vec<Link>,
    /// Source-table index, for source-capable types only.
    pub src_idx: Option<SrcIdx>,
    /// Work-side electrical state; the published copy lives with the
    /// scheduler.
    pub ps: PowerState,
    pub ts: TypeState,
}

impl Comp {
    pub fn name(&self) -> &str {
        &self.cfg.name
    }

    /// Position of `peer` in this component's link list.
    pub fn link_slot(&self, peer: CompId) -> Option<usize> {
        self.links.iter().position(|l| l.peer == peer)
    }

    /// Electrical domain on the side facing `peer` (None for non-electrical
    /// components and pass-throughs, whose domain is inherited).
    pub fn domain_facing(&self, peer: CompId) -> Option<PowerDomain> {
        match &self.cfg.kind {
            CompKind::Batt(_) => Some(PowerDomain::Dc),
            CompKind::Gen(g) => Some(g.domain),
            CompKind::Load(l) => Some(l.domain),
            CompKind::Bus(b) => Some(b.domain),
            CompKind::Tru(_) => match self.link_slot(peer) {
                Some(0) => Some(PowerDomain::Ac),
                _ => Some(PowerDomain::Dc),
            },
            CompKind::Inv(_) => match self.link_slot(peer) {
                Some(0) => Some(PowerDomain::Dc),
                _ => Some(PowerDomain::Ac),
            },
            CompKind::Xfrmr(_) => Some(PowerDomain::Ac),
            CompKind::Diode(_) => Some(PowerDomain::Dc),
            CompKind::Cb(_) | CompKind::Shunt(_) | CompKind::Tie(_) | CompKind::LabelBox(_) => None,
        }
    }
}

/// Topology summary for a built network.
#[derive(Debug, Clone)]
pub struct TopologyStats {
    pub comp_count: usize,
    pub link_count: usize,
    pub bus_count: usize,
    pub load_count: usize,
    pub source_count: usize,
    /// Connected components of the undirected topology.
    pub islands: usize,
}

/// Node payload of the petgraph mirror, used for island analysis and DOT
/// export.
#[derive(Debug, Clone)]
struct GraphNode {
    label: String,
}

pub struct Network {
    comps: Vec<Comp>,
    name_idx: HashMap<String, CompId>,
    /// Source table: `srcs[i]` owns `SrcIdx(i)`.
    srcs: Vec<CompId>,
    /// Paint/integration roots: batteries and generators.
    roots: Vec<CompId>,
    ties: Vec<CompId>,
    loads: Vec<CompId>,
    /// Undirected mirror of the link structure, kept for topology queries.
    graph: UnGraph<GraphNode, ()>,
    node_of: Vec<NodeIndex>,
    /// Warnings collected at construction (errors abort the build).
    diag: Diagnostics,
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("comps", &self.comps.len())
            .field("srcs", &self.srcs.len())
            .field("ties", &self.ties.len())
            .finish()
    }
}

impl Network {
    /// Build a network from a descriptor list.
    ///
    /// Auto-generates feeder breakers for loads that request one (see
    /// [`crate::config::LoadConfig::with_loadcb`]), resolves every name
    /// reference, and validates the whole topology. On failure the returned
    /// [`ElecError::Construction`] carries every issue found.
    pub fn build(configs: Vec<CompConfig>) -> ElecResult<Network> {
        let configs = expand_autogen(configs);
        let mut diag = Diagnostics::new();

        // Arena + name index. Duplicate names are fatal but we keep going
        // to catch everything else too.
        let mut name_idx: HashMap<String, CompId> = HashMap::new();
        for (i, cfg) in configs.iter().enumerate() {
            cfg.validate_into(&mut diag);
            if name_idx.insert(cfg.name.clone(), CompId(i)).is_some() {
                diag.add_error_for(
                    "structure",
                    "duplicate component name",
                    &cfg.name,
                    cfg.line,
                );
            }
        }

        // Link resolution into a slot scratchpad; definite links are
        // materialized only once every slot is known to be filled.
        let mut slots: Vec<Vec<Option<CompId>>> = configs
            .iter()
            .map(|cfg| match cfg.comp_type() {
                CompType::Batt | CompType::Gen | CompType::Load => vec![None],
                CompType::Tru | CompType::Inv | CompType::Xfrmr => vec![None, None],
                CompType::Cb | CompType::Shunt | CompType::Diode => vec![None, None],
                // Buses and ties grow; label boxes never link.
                CompType::Bus | CompType::Tie | CompType::LabelBox => Vec::new(),
            })
            .collect();

        for (bus_i, cfg) in configs.iter().enumerate() {
            let CompKind::Bus(bus) = &cfg.kind else {
                continue;
            };
            for ep_name in &bus.comps {
                let Some(&ep_id) = name_idx.get(ep_name) else {
                    diag.add_error_for(
                        "link",
                        &format!("bus references unknown component \"{ep_name}\""),
                        &cfg.name,
                        cfg.line,
                    );
                    continue;
                };
                resolve_endpoint(
                    &configs,
                    &mut slots,
                    CompId(bus_i),
                    ep_id,
                    bus.domain,
                    &mut diag,
                );
            }
        }

        // Every fixed slot must have been filled by some bus.
        for (i, cfg) in configs.iter().enumerate() {
            for (slot, peer) in slots[i].iter().enumerate() {
                if peer.is_none() {
                    diag.add_error_for(
                        "link",
                        &format!("missing a network link (slot {slot})"),
                        &cfg.name,
                        cfg.line,
                    );
                }
            }
            if cfg.comp_type() == CompType::Tie && slots[i].len() < 2 {
                diag.add_error_for(
                    "link",
                    "tie must connect at least two buses",
                    &cfg.name,
                    cfg.line,
                );
            }
        }

        // Source table.
        let mut srcs = Vec::new();
        for (i, cfg) in configs.iter().enumerate() {
            if cfg.comp_type().is_src_capable() {
                srcs.push(CompId(i));
            }
        }
        if srcs.len() > MAX_SRCS {
            diag.add_error(
                "source",
                &format!(
                    "network has {} power sources, the limit is {MAX_SRCS}",
                    srcs.len()
                ),
            );
        }
        if srcs.is_empty() {
            diag.add_warning("source", "network has no power sources");
        }

        if diag.has_errors() {
            return Err(ElecError::Construction(diag));
        }

        // Materialize the arena.
        let mut comps: Vec<Comp> = Vec::with_capacity(configs.len());
        for (i, cfg) in configs.into_iter().enumerate() {
            let typ = cfg.comp_type();
            let links: Vec<Link> = slots[i]
                .iter()
                .map(|p| Link::new(p.expect("unfilled slot survived validation")))
                .collect();
            let ts = match &cfg.kind {
                CompKind::Batt(b) => TypeState::Batt(BattState::new(b.init_temp)),
                CompKind::Gen(g) => TypeState::Gen(GenState::new(g.min_rpm, g.max_rpm)),
                CompKind::Tru(_) | CompKind::Inv(_) | CompKind::Xfrmr(_) => {
                    TypeState::Tru(TruState::new())
                }
                CompKind::Load(_) => TypeState::Load(LoadState::new()),
                CompKind::Cb(_) => TypeState::Cb(CbState::new()),
                CompKind::Tie(_) => TypeState::Tie(TieState {
                    wk_state: vec![false; links.len()],
                }),
                CompKind::Bus(_) | CompKind::Shunt(_) | CompKind::Diode(_)
                | CompKind::LabelBox(_) => TypeState::Passive,
            };
            comps.push(Comp {
                id: CompId(i),
                cfg,
                typ,
                links,
                src_idx: None,
                ps: PowerState::new(),
                ts,
            });
        }
        for (idx, &id) in srcs.iter().enumerate() {
            comps[id.0].src_idx = Some(SrcIdx(idx as u8));
        }
        let roots: Vec<CompId> = comps
            .iter()
            .filter(|c| matches!(c.typ, CompType::Batt | CompType::Gen))
            .map(|c| c.id)
            .collect();
        let ties: Vec<CompId> = comps
            .iter()
            .filter(|c| c.typ == CompType::Tie)
            .map(|c| c.id)
            .collect();
        let loads: Vec<CompId> = comps
            .iter()
            .filter(|c| c.typ == CompType::Load)
            .map(|c| c.id)
            .collect();

        // Petgraph mirror for topology queries.
        let mut graph = UnGraph::new_undirected();
        let mut node_of = Vec::with_capacity(comps.len());
        for comp in &comps {
            node_of.push(graph.add_node(GraphNode {
                label: format!("{} ({})", comp.name(), comp.typ.tag()),
            }));
        }
        for comp in &comps {
            for link in &comp.links {
                // Each physical connection appears in both link lists; add
                // the edge from the lower id only.
                if comp.id.0 < link.peer.0 {
                    graph.add_edge(node_of[comp.id.0], node_of[link.peer.0], ());
                }
            }
        }

        let mut net = Network {
            comps,
            name_idx,
            srcs,
            roots,
            ties,
            loads,
            graph,
            node_of,
            diag,
        };
        net.warn_unreachable();
        debug!(
            comps = net.comps.len(),
            srcs = net.srcs.len(),
            ties = net.ties.len(),
            "network built"
        );
        Ok(net)
    }

    /// Flag components that cannot see any power source through the
    /// undirected topology. They are legal (an unfinished drawing, a parked
    /// subsystem) but almost always a mistake.
    fn warn_unreachable(&mut self) {
        use std::collections::VecDeque;
        let mut reachable = vec![false; self.comps.len()];
        let mut queue: VecDeque<usize> = self.srcs.iter().map(|id| id.0).collect();
        for &i in &queue {
            reachable[i] = true;
        }
        while let Some(i) = queue.pop_front() {
            // Links are symmetric (recorded on both sides), so following
            // them covers both power directions.
            for link in &self.comps[i].links {
                if !reachable[link.peer.0] {
                    reachable[link.peer.0] = true;
                    queue.push_back(link.peer.0);
                }
            }
        }
        for comp in &self.comps {
            if !reachable[comp.id.0] && comp.typ != CompType::LabelBox {
                self.diag.add_warning_with_entity(
                    "structure",
                    "component unreachable from any power source",
                    comp.name(),
                );
            }
        }
    }

    pub fn len(&self) -> usize {
        self.comps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comps.is_empty()
    }

    pub fn comp(&self, id: CompId) -> &Comp {
        &self.comps[id.0]
    }

    pub fn comp_mut(&mut self, id: CompId) -> &mut Comp {
        &mut self.comps[id.0]
    }

    pub fn comp_by_name(&self, name: &str) -> Option<&Comp> {
        self.name_idx.get(name).map(|&id| &self.comps[id.0])
    }

    pub fn id_by_name(&self, name: &str) -> Option<CompId> {
        self.name_idx.get(name).copied()
    }

    pub fn comps(&self) -> impl Iterator<Item = &Comp> {
        self.comps.iter()
    }

    pub fn comps_mut(&mut self) -> impl Iterator<Item = &mut Comp> {
        self.comps.iter_mut()
    }

    pub fn ids(&self) -> impl Iterator<Item = CompId> + '_ {
        (0..self.comps.len()).map(CompId)
    }

    /// Source table in `SrcIdx` order.
    pub fn srcs(&self) -> &[CompId] {
        &self.srcs
    }

    /// Batteries and generators, the roots both traversal passes start from.
    pub fn roots(&self) -> &[CompId] {
        &self.roots
    }

    pub fn ties(&self) -> &[CompId] {
        &self.ties
    }

    pub fn loads(&self) -> &[CompId] {
        &self.loads
    }

    /// Construction warnings (errors never make it into a built network).
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diag
    }

    pub fn stats(&self) -> TopologyStats {
        TopologyStats {
            comp_count: self.comps.len(),
            link_count: self.graph.edge_count(),
            bus_count: self
                .comps
                .iter()
                .filter(|c| c.typ == CompType::Bus)
                .count(),
            load_count: self.loads.len(),
            source_count: self.srcs.len(),
            islands: connected_components(&self.graph),
        }
    }

    /// Export the topology to a DOT string (Graphviz).
    pub fn to_dot(&self) -> String {
        let mut buffer = String::new();
        buffer.push_str("graph elec_network {\n");
        for (i, node) in self.node_of.iter().enumerate() {
            let label = self.graph[*node].label.replace('"', "\\\"");
            buffer.push_str(&format!("  n{i} [label=\"{label}\"];\n"));
        }
        for edge in self.graph.edge_references() {
            let source = edge.source().index();
            let target = edge.target().index();
            buffer.push_str(&format!("  n{source} -- n{target};\n"));
        }
        buffer.push('}');
        buffer
    }
}

/// Resolve one bus endpoint into the slot scratchpad, enforcing domain and
/// arity rules. The bus side always just appends.
fn resolve_endpoint(
    configs: &[CompConfig],
    slots: &mut Vec<Vec<Option<CompId>>>,
    bus_id: CompId,
    ep_id: CompId,
    bus_domain: PowerDomain,
    diag: &mut Diagnostics,
) {
    let bus_cfg = &configs[bus_id.0];
    let ep_cfg = &configs[ep_id.0];
    let entity = ep_cfg.name.as_str();
    let line = ep_cfg.line;

    let domain_err = |expect: PowerDomain, diag: &mut Diagnostics| {
        if bus_domain != expect {
            diag.add_error_for(
                "domain",
                &format!("{expect} device connected to {bus_domain} bus \"{}\"", bus_cfg.name),
                entity,
                line,
            );
        }
    };

    let slot = match &ep_cfg.kind {
        CompKind::Batt(_) => {
            domain_err(PowerDomain::Dc, diag);
            fixed_slot(&slots[ep_id.0], 0)
        }
        CompKind::Gen(g) => {
            domain_err(g.domain, diag);
            fixed_slot(&slots[ep_id.0], 0)
        }
        CompKind::Load(l) => {
            domain_err(l.domain, diag);
            fixed_slot(&slots[ep_id.0], 0)
        }
        CompKind::Tru(t) => {
            if bus_cfg.name == t.ac {
                domain_err(PowerDomain::Ac, diag);
                fixed_slot(&slots[ep_id.0], 0)
            } else if bus_cfg.name == t.dc {
                domain_err(PowerDomain::Dc, diag);
                fixed_slot(&slots[ep_id.0], 1)
            } else {
                diag.add_error_for(
                    "link",
                    &format!("bus \"{}\" is neither this TRU's AC nor DC side", bus_cfg.name),
                    entity,
                    line,
                );
                return;
            }
        }
        CompKind::Inv(i) => {
            if bus_cfg.name == i.dc {
                domain_err(PowerDomain::Dc, diag);
                fixed_slot(&slots[ep_id.0], 0)
            } else if bus_cfg.name == i.ac {
                domain_err(PowerDomain::Ac, diag);
                fixed_slot(&slots[ep_id.0], 1)
            } else {
                diag.add_error_for(
                    "link",
                    &format!(
                        "bus \"{}\" is neither this inverter's DC nor AC side",
                        bus_cfg.name
                    ),
                    entity,
                    line,
                );
                return;
            }
        }
        CompKind::Xfrmr(x) => {
            domain_err(PowerDomain::Ac, diag);
            if bus_cfg.name == x.input {
                fixed_slot(&slots[ep_id.0], 0)
            } else if bus_cfg.name == x.output {
                fixed_slot(&slots[ep_id.0], 1)
            } else {
                diag.add_error_for(
                    "link",
                    &format!(
                        "bus \"{}\" is neither this transformer's input nor output",
                        bus_cfg.name
                    ),
                    entity,
                    line,
                );
                return;
            }
        }
        CompKind::Diode(d) => {
            domain_err(PowerDomain::Dc, diag);
            if bus_cfg.name == d.sides[0] {
                fixed_slot(&slots[ep_id.0], 0)
            } else if bus_cfg.name == d.sides[1] {
                fixed_slot(&slots[ep_id.0], 1)
            } else {
                diag.add_error_for(
                    "link",
                    &format!("bus \"{}\" is neither side of this diode", bus_cfg.name),
                    entity,
                    line,
                );
                return;
            }
        }
        CompKind::Cb(_) | CompKind::Shunt(_) => {
            // First-come slotting; domain consistency across both sides is
            // checked below once both are known.
            match slots[ep_id.0].iter().position(|s| s.is_none()) {
                Some(free) => Some(free),
                None => {
                    diag.add_error_for(
                        "link",
                        "connected to more than two buses",
                        entity,
                        line,
                    );
                    return;
                }
            }
        }
        CompKind::Tie(_) => {
            slots[ep_id.0].push(None);
            Some(slots[ep_id.0].len() - 1)
        }
        CompKind::Bus(_) => {
            diag.add_error_for(
                "structure",
                &format!("buses cannot connect directly (\"{}\")", bus_cfg.name),
                entity,
                line,
            );
            return;
        }
        CompKind::LabelBox(_) => {
            diag.add_error_for("structure", "label boxes cannot be wired", entity, line);
            return;
        }
    };

    let Some(slot) = slot else {
        diag.add_error_for("link", "connected to more buses than it has sides", entity, line);
        return;
    };
    if slots[ep_id.0][slot].is_some() {
        diag.add_error_for(
            "link",
            &format!("side already connected (bus \"{}\")", bus_cfg.name),
            entity,
            line,
        );
        return;
    }
    slots[ep_id.0][slot] = Some(bus_id);

    // Pass-throughs must not straddle AC and DC.
    if matches!(
        ep_cfg.kind,
        CompKind::Cb(_) | CompKind::Shunt(_) | CompKind::Tie(_)
    ) {
        for other in slots[ep_id.0].iter().flatten() {
            if let CompKind::Bus(other_bus) = &configs[other.0].kind {
                if other_bus.domain != bus_domain {
                    diag.add_error_for(
                        "domain",
                        "bridges an AC bus and a DC bus",
                        entity,
                        line,
                    );
                    break;
                }
            }
        }
    }

    // Bus side: append.
    slots[bus_id.0].push(Some(ep_id));
}

fn fixed_slot(slots: &[Option<CompId>], want: usize) -> Option<usize> {
    if want < slots.len() {
        Some(want)
    } else {
        None
    }
}

/// Expand LOADCB-style conveniences: a load that requested a feeder breaker
/// gets an autogen breaker `CB_<load>` and bus `CB_BUS_<load>`, and every
/// bus that referenced the load is rewired to the breaker.
fn expand_autogen(configs: Vec<CompConfig>) -> Vec<CompConfig> {
    use crate::config::{BusConfig, CbConfig};

    let mut out: Vec<CompConfig> = Vec::with_capacity(configs.len());
    let mut rewires: Vec<(String, String)> = Vec::new();
    let mut extra: Vec<CompConfig> = Vec::new();

    for cfg in configs {
        if let CompKind::Load(load) = &cfg.kind {
            if let Some(rating) = load.loadcb_rating {
                let cb_name = format!("CB_{}", cfg.name);
                let cb_bus_name = format!("CB_BUS_{}", cfg.name);
                let bus = BusConfig {
                    domain: load.domain,
                    comps: vec![cb_name.clone(), cfg.name.clone()],
                };
                extra.push(
                    CompConfig::cb(cb_name.clone(), CbConfig::new(rating)).as_autogen(),
                );
                extra.push(CompConfig::bus(cb_bus_name, bus).as_autogen());
                rewires.push((cfg.name.clone(), cb_name));
            }
        }
        out.push(cfg);
    }

    if !rewires.is_empty() {
        for cfg in out.iter_mut() {
            if let CompKind::Bus(bus) = &mut cfg.kind {
                if cfg.autogen {
                    continue;
                }
                for name in bus.comps.iter_mut() {
                    if let Some((_, cb)) = rewires.iter().find(|(load, _)| *load == *name) {
                        *name = cb.clone();
                    }
                }
            }
        }
    }
    out.extend(extra);
    out
}
