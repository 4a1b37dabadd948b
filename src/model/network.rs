//! Per-unit network of the energized part of a model.

use std::collections::VecDeque;
use std::f64::consts::PI;

use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CscMatrix};
use num_complex::Complex64;
use tracing::debug;

use super::MainModel;
use crate::{
    basic::{
        BusInjection, iterative_current_pf, linear_current_pf, linear_pf, newton_pf,
        solver::DefaultSolver,
    },
    error::{PowerGridError, Result},
    meta_data::IntS,
    options::{CalculationConfig, CalculationMethod, TapChangingStrategy},
};

/// Base power of the per-unit system in VA.
pub(super) const BASE_POWER: f64 = 1e6;

const DEFAULT_SK: f64 = 1e10;
const DEFAULT_RX_RATIO: f64 = 0.1;

fn or(value: f64, default: f64) -> f64 {
    if value.is_nan() { default } else { value }
}

pub(super) fn admittance_base(u_rated: f64) -> f64 {
    BASE_POWER / (u_rated * u_rated)
}

/// Base current in A at a node of rated voltage `u_rated`.
pub(super) fn current_base(u_rated: f64) -> f64 {
    BASE_POWER / (3f64.sqrt() * u_rated)
}

/// Two-port admittances of a branch in p.u.
#[derive(Debug, Clone, Copy)]
pub(super) struct BranchAdmittance {
    pub from: usize,
    pub to: usize,
    pub closed: bool,
    pub yff: Complex64,
    pub yft: Complex64,
    pub ytf: Complex64,
    pub ytt: Complex64,
}

impl BranchAdmittance {
    /// Currents injected into the branch at both ends.
    pub fn currents(&self, u_from: Complex64, u_to: Complex64) -> (Complex64, Complex64) {
        (
            self.yff * u_from + self.yft * u_to,
            self.ytf * u_from + self.ytt * u_to,
        )
    }
}

/// Thevenin equivalent of a source in p.u.
#[derive(Debug, Clone, Copy)]
pub(super) struct SourceEquivalent {
    pub node: usize,
    pub active: bool,
    pub y: Complex64,
    pub u_ref: Complex64,
}

/// Voltage dependent power of a load or generator in p.u., positive when injected.
#[derive(Debug, Clone, Copy)]
pub(super) struct ApplianceInjection {
    pub node: usize,
    pub active: bool,
    pub s: Complex64,
    pub exponent: f64,
}

impl ApplianceInjection {
    fn new(node: usize, status: IntS, load_type: IntS, p: f64, q: f64, sign: f64) -> Result<Self> {
        let exponent = match load_type {
            0 => 0.0,
            1 => 2.0,
            2 => 1.0,
            _ => return Err(PowerGridError::not_implemented("LoadGenType", load_type)),
        };
        Ok(Self {
            node,
            active: status == 1,
            s: Complex64::new(or(p, 0.0), or(q, 0.0)) * (sign / BASE_POWER),
            exponent,
        })
    }

    pub fn power(&self, u_pu: f64) -> Complex64 {
        self.s * u_pu.powf(self.exponent)
    }
}

pub(super) struct Network {
    /// Bus of every node, `None` when the node is not energized.
    pub node_bus: Vec<Option<usize>>,
    pub lines: Vec<BranchAdmittance>,
    pub generic_branches: Vec<BranchAdmittance>,
    pub sources: Vec<SourceEquivalent>,
    pub sym_loads: Vec<ApplianceInjection>,
    pub sym_gens: Vec<ApplianceInjection>,
    n_bus: usize,
}

impl Network {
    pub fn build(model: &MainModel) -> Result<Self> {
        let topology = &model.topology;
        let omega = 2.0 * PI * model.system_frequency;
        let u_rated = |node: usize| topology.nodes[node].u_rated;

        let lines = model
            .lines
            .iter()
            .zip(&topology.line_nodes)
            .map(|(line, &(from, to))| {
                let y_base = admittance_base(u_rated(from));
                let ys = 1.0 / Complex64::new(line.r1, line.x1) / y_base;
                let ysh = Complex64::new(or(line.tan1, 0.0), 1.0) * (omega * or(line.c1, 0.0)) / y_base;
                BranchAdmittance {
                    from,
                    to,
                    closed: line.from_status == 1 && line.to_status == 1,
                    yff: ys + ysh / 2.0,
                    yft: -ys,
                    ytf: -ys,
                    ytt: ys + ysh / 2.0,
                }
            })
            .collect();

        let generic_branches = model
            .generic_branches
            .iter()
            .zip(&topology.generic_branch_nodes)
            .map(|(branch, &(from, to))| {
                let y_base = admittance_base(u_rated(to));
                let ys = 1.0 / Complex64::new(branch.r1, branch.x1) / y_base;
                let ysh = Complex64::new(or(branch.g1, 0.0), or(branch.b1, 0.0)) / y_base;
                let ratio = Complex64::from_polar(or(branch.k, 1.0), or(branch.theta, 0.0));
                BranchAdmittance {
                    from,
                    to,
                    closed: branch.from_status == 1 && branch.to_status == 1,
                    yff: (ys + ysh / 2.0) / ratio.norm_sqr(),
                    yft: -ys / ratio.conj(),
                    ytf: -ys / ratio,
                    ytt: ys + ysh / 2.0,
                }
            })
            .collect();

        let sources = model
            .sources
            .iter()
            .zip(&topology.source_node)
            .map(|(source, &node)| {
                let z = BASE_POWER / or(source.sk, DEFAULT_SK);
                let rx = or(source.rx_ratio, DEFAULT_RX_RATIO);
                let x = z / (1.0 + rx * rx).sqrt();
                SourceEquivalent {
                    node,
                    active: source.status == 1,
                    y: 1.0 / Complex64::new(x * rx, x),
                    u_ref: Complex64::from_polar(or(source.u_ref, 1.0), or(source.u_ref_angle, 0.0)),
                }
            })
            .collect();

        let appliances = |records: &[crate::components::LoadGenInput], nodes: &[usize], sign: f64| {
            records
                .iter()
                .zip(nodes)
                .map(|(a, &node)| {
                    ApplianceInjection::new(node, a.status, a.load_type, a.p_specified, a.q_specified, sign)
                })
                .collect::<Result<Vec<_>>>()
        };
        let sym_loads = appliances(&model.sym_loads, &topology.sym_load_node, -1.0)?;
        let sym_gens = appliances(&model.sym_gens, &topology.sym_gen_node, 1.0)?;

        let mut network = Self {
            node_bus: vec![None; topology.nodes.len()],
            lines,
            generic_branches,
            sources,
            sym_loads,
            sym_gens,
            n_bus: 0,
        };
        network.energize();
        Ok(network)
    }

    fn branches(&self) -> impl Iterator<Item = &BranchAdmittance> {
        self.lines.iter().chain(&self.generic_branches)
    }

    /// Numbers every node reachable from an active source through closed branches.
    fn energize(&mut self) {
        let n_node = self.node_bus.len();
        let mut adjacent = vec![Vec::new(); n_node];
        for branch in self.branches().filter(|b| b.closed) {
            adjacent[branch.from].push(branch.to);
            adjacent[branch.to].push(branch.from);
        }
        let mut queue: VecDeque<usize> = self
            .sources
            .iter()
            .filter(|s| s.active)
            .map(|s| s.node)
            .collect();
        let mut n_bus = 0;
        while let Some(node) = queue.pop_front() {
            if self.node_bus[node].is_some() {
                continue;
            }
            self.node_bus[node] = Some(n_bus);
            n_bus += 1;
            queue.extend(adjacent[node].iter().filter(|&&m| self.node_bus[m].is_none()));
        }
        self.n_bus = n_bus;
    }

    pub fn bus(&self, node: usize) -> Option<usize> {
        self.node_bus[node]
    }

    fn admittance_matrix(&self) -> CscMatrix<Complex64> {
        let mut ybus = CooMatrix::new(self.n_bus, self.n_bus);
        for branch in self.branches().filter(|b| b.closed) {
            if let (Some(f), Some(t)) = (self.bus(branch.from), self.bus(branch.to)) {
                ybus.push(f, f, branch.yff);
                ybus.push(f, t, branch.yft);
                ybus.push(t, f, branch.ytf);
                ybus.push(t, t, branch.ytt);
            }
        }
        for source in self.sources.iter().filter(|s| s.active) {
            if let Some(b) = self.bus(source.node) {
                ybus.push(b, b, source.y);
            }
        }
        CscMatrix::from(&ybus)
    }

    fn source_currents(&self) -> DVector<Complex64> {
        let mut i_src = DVector::zeros(self.n_bus);
        for source in self.sources.iter().filter(|s| s.active) {
            if let Some(b) = self.bus(source.node) {
                i_src[b] += source.y * source.u_ref;
            }
        }
        i_src
    }

    fn injections(&self) -> Vec<BusInjection> {
        self.sym_loads
            .iter()
            .chain(&self.sym_gens)
            .filter(|a| a.active)
            .filter_map(|a| {
                self.bus(a.node).map(|bus| BusInjection {
                    bus,
                    s: a.s,
                    exponent: a.exponent,
                })
            })
            .collect()
    }

    /// Start voltages: the reference voltage of the first active source on every bus.
    fn initial_voltage(&self) -> DVector<Complex64> {
        let u_ref = self
            .sources
            .iter()
            .find(|s| s.active)
            .map_or(Complex64::new(1.0, 0.0), |s| s.u_ref);
        DVector::from_element(self.n_bus, u_ref)
    }

    /// Solves the bus voltages in p.u.
    pub fn solve(&self, config: &CalculationConfig) -> Result<DVector<Complex64>> {
        if config.tap_changing_strategy != TapChangingStrategy::Disabled {
            debug!("no regulating transformers, tap changing skipped");
        }
        let ybus = self.admittance_matrix();
        let i_src = self.source_currents();
        let injections = self.injections();
        let v_init = self.initial_voltage();
        let (v, iterations) = match config.method {
            CalculationMethod::NewtonRaphson => newton_pf(
                &ybus,
                &i_src,
                &injections,
                &v_init,
                config.err_tol,
                config.max_iter,
                &mut DefaultSolver::default(),
            )?,
            CalculationMethod::IterativeCurrent => iterative_current_pf(
                &ybus,
                &i_src,
                &injections,
                &v_init,
                config.err_tol,
                config.max_iter,
            )?,
            CalculationMethod::Linear => (linear_pf(&ybus, &i_src, &injections)?, 1),
            CalculationMethod::LinearCurrent => {
                (linear_current_pf(&ybus, &i_src, &injections, &v_init)?, 1)
            }
            _ => return Err(PowerGridError::InvalidCalculationMethod),
        };
        debug!(method = ?config.method, n_bus = self.n_bus, iterations, "power flow solved");
        Ok(v)
    }
}
