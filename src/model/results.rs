//! Conversion of solved bus voltages into output records.

use nalgebra::DVector;
use num_complex::Complex64;

use super::{
    MainModel,
    network::{ApplianceInjection, BASE_POWER, BranchAdmittance, Network, current_base},
};
use crate::{
    components::{
        ApplianceOutput, BranchOutput, GENERIC_BRANCH, LINE, NODE, NodeOutput, SOURCE, SYM_GEN,
        SYM_LOAD, SymmetryTag,
    },
    dataset::MutableDataset,
    error::{PowerGridError, Result},
    meta_data::{ID, Record},
};

fn power_factor(p: f64, s: f64) -> f64 {
    if s > 0.0 { p / s } else { 0.0 }
}

/// Flow quantities of one branch end or one appliance in SI units.
#[derive(Debug, Clone, Copy, Default)]
struct Flow {
    p: f64,
    q: f64,
    i: f64,
    s: f64,
}

impl Flow {
    /// Flow of per-unit power `s_pu` at a terminal of per-unit voltage `u_pu`.
    fn new(s_pu: Complex64, u_pu: f64, i_base: f64) -> Self {
        let s = s_pu.norm();
        Self {
            p: s_pu.re * BASE_POWER,
            q: s_pu.im * BASE_POWER,
            i: if u_pu > 0.0 { s / u_pu * i_base } else { 0.0 },
            s: s * BASE_POWER,
        }
    }
}

fn node_output<S: SymmetryTag>(id: ID, u_rated: f64, u: Option<Complex64>, s: Complex64) -> NodeOutput<S> {
    match u {
        Some(u) => NodeOutput {
            id,
            energized: 1,
            u_pu: S::replicate(u.norm()),
            u: S::voltage(u.norm(), u_rated),
            u_angle: S::angles(u.arg()),
            p: S::power(s.re * BASE_POWER),
            q: S::power(s.im * BASE_POWER),
        },
        None => NodeOutput {
            id,
            energized: 0,
            u_pu: S::replicate(0.0),
            u: S::replicate(0.0),
            u_angle: S::replicate(0.0),
            p: S::replicate(0.0),
            q: S::replicate(0.0),
        },
    }
}

fn branch_output<S: SymmetryTag>(
    id: ID,
    energized: bool,
    loading: f64,
    from: Flow,
    to: Flow,
) -> BranchOutput<S> {
    BranchOutput {
        id,
        energized: energized.into(),
        loading,
        p_from: S::power(from.p),
        q_from: S::power(from.q),
        i_from: S::replicate(from.i),
        s_from: S::power(from.s),
        p_to: S::power(to.p),
        q_to: S::power(to.q),
        i_to: S::replicate(to.i),
        s_to: S::power(to.s),
    }
}

fn appliance_output<S: SymmetryTag>(id: ID, energized: bool, flow: Flow) -> ApplianceOutput<S> {
    ApplianceOutput {
        id,
        energized: energized.into(),
        p: S::power(flow.p),
        q: S::power(flow.q),
        i: S::replicate(flow.i),
        s: S::power(flow.s),
        pf: S::replicate(power_factor(flow.p, flow.s)),
    }
}

/// Output records of every component, in input order.
pub(super) struct ModelResults<S: SymmetryTag> {
    pub nodes: Vec<NodeOutput<S>>,
    pub lines: Vec<BranchOutput<S>>,
    pub generic_branches: Vec<BranchOutput<S>>,
    pub sources: Vec<ApplianceOutput<S>>,
    pub sym_loads: Vec<ApplianceOutput<S>>,
    pub sym_gens: Vec<ApplianceOutput<S>>,
}

impl<S: SymmetryTag> ModelResults<S> {
    pub fn compute(model: &MainModel, network: &Network, v: &DVector<Complex64>) -> Self {
        let topology = &model.topology;
        let voltage = |node: usize| network.bus(node).map(|b| v[b]);
        let i_base = |node: usize| current_base(topology.nodes[node].u_rated);
        let mut node_power = vec![Complex64::new(0.0, 0.0); topology.nodes.len()];

        let branch = |admittance: &BranchAdmittance| -> (bool, Flow, Flow) {
            let (f, t) = (admittance.from, admittance.to);
            match (admittance.closed, voltage(f), voltage(t)) {
                (true, Some(u_f), Some(u_t)) => {
                    let (i_f, i_t) = admittance.currents(u_f, u_t);
                    (
                        true,
                        Flow::new(u_f * i_f.conj(), u_f.norm(), i_base(f)),
                        Flow::new(u_t * i_t.conj(), u_t.norm(), i_base(t)),
                    )
                }
                _ => (false, Flow::default(), Flow::default()),
            }
        };

        let lines = model
            .lines
            .iter()
            .zip(&network.lines)
            .map(|(line, admittance)| {
                let (energized, from, to) = branch(admittance);
                let loading = if line.i_n > 0.0 { from.i.max(to.i) / line.i_n } else { 0.0 };
                branch_output(line.id, energized, loading, from, to)
            })
            .collect();
        let generic_branches = model
            .generic_branches
            .iter()
            .zip(&network.generic_branches)
            .map(|(branch_input, admittance)| {
                let (energized, from, to) = branch(admittance);
                let loading = if branch_input.sn > 0.0 {
                    from.s.max(to.s) / branch_input.sn
                } else {
                    0.0
                };
                branch_output(branch_input.id, energized, loading, from, to)
            })
            .collect();

        let sources = model
            .sources
            .iter()
            .zip(&network.sources)
            .map(|(source, equivalent)| match voltage(equivalent.node) {
                Some(u) if equivalent.active => {
                    let s = u * (equivalent.y * (equivalent.u_ref - u)).conj();
                    node_power[equivalent.node] += s;
                    appliance_output(source.id, true, Flow::new(s, u.norm(), i_base(equivalent.node)))
                }
                _ => appliance_output(source.id, false, Flow::default()),
            })
            .collect();

        // Loads report consumption and generators production; `sign` maps the injection onto that.
        let mut appliances = |ids: Vec<ID>, injections: &[ApplianceInjection], sign: f64| {
            ids.into_iter()
                .zip(injections)
                .map(|(id, injection)| match voltage(injection.node) {
                    Some(u) if injection.active => {
                        let s = injection.power(u.norm());
                        node_power[injection.node] += s;
                        appliance_output(id, true, Flow::new(s * sign, u.norm(), i_base(injection.node)))
                    }
                    _ => appliance_output(id, false, Flow::default()),
                })
                .collect::<Vec<_>>()
        };
        let sym_loads = appliances(model.sym_loads.iter().map(|l| l.id).collect(), &network.sym_loads, -1.0);
        let sym_gens = appliances(model.sym_gens.iter().map(|g| g.id).collect(), &network.sym_gens, 1.0);

        let nodes = topology
            .nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| node_output(node.id, node.u_rated, voltage(idx), node_power[idx]))
            .collect();

        Self {
            nodes,
            lines,
            generic_branches,
            sources,
            sym_loads,
            sym_gens,
        }
    }

    /// Writes every component the output dataset contains.
    ///
    /// Element counts are checked for all components before anything is written.
    pub fn write(&self, output: &mut MutableDataset<'_>) -> Result<()> {
        let counts = [
            (NODE, self.nodes.len()),
            (LINE, self.lines.len()),
            (GENERIC_BRANCH, self.generic_branches.len()),
            (SOURCE, self.sources.len()),
            (SYM_LOAD, self.sym_loads.len()),
            (SYM_GEN, self.sym_gens.len()),
        ];
        for (name, expected) in counts {
            let Some(idx) = output.find_component(name) else {
                continue;
            };
            let actual = output.element_range(idx, Some(0))?.len();
            if actual != expected {
                return Err(PowerGridError::dataset(format!(
                    "Output of component {name} has {actual} elements, the model has {expected}"
                )));
            }
        }
        write_component(output, NODE, &self.nodes)?;
        write_component(output, LINE, &self.lines)?;
        write_component(output, GENERIC_BRANCH, &self.generic_branches)?;
        write_component(output, SOURCE, &self.sources)?;
        write_component(output, SYM_LOAD, &self.sym_loads)?;
        write_component(output, SYM_GEN, &self.sym_gens)
    }
}

fn write_component<T: Record>(output: &mut MutableDataset<'_>, name: &str, records: &[T]) -> Result<()> {
    if output.contains_component(name) {
        output.get_buffer_span_mut::<T>(name, Some(0))?.copy_from(records);
    }
    Ok(())
}
