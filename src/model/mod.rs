//! The calculation model.
//!
//! [`MainModel`] holds a network built from an `input` dataset. Its topology
//! (ids, node references, rated voltages) is fixed at construction and shared
//! between copies; the component parameters that `update` datasets can change
//! are owned by each copy. The model implements [`ScenarioModel`] so batch
//! calculations can patch and restore it per scenario.

mod network;
mod results;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::{
    batch::{Patched, ScenarioModel, batch_calculation},
    components::*,
    dataset::{ConstDataset, MutableDataset},
    error::{PowerGridError, Result},
    meta_data::{AttributeType, ID, Idx},
    options::{CalculationConfig, Options},
};

/// Parts of the model that never change after construction.
///
/// Node references of branches and appliances are resolved to node positions.
#[derive(Debug, Default)]
struct Topology {
    nodes: Vec<NodeInput>,
    ids: HashMap<ID, (ComponentType, usize)>,
    line_nodes: Vec<(usize, usize)>,
    generic_branch_nodes: Vec<(usize, usize)>,
    source_node: Vec<usize>,
    sym_load_node: Vec<usize>,
    sym_gen_node: Vec<usize>,
}

impl Topology {
    fn register(&mut self, id: ID, component: ComponentType, idx: usize) -> Result<()> {
        if self.ids.insert(id, (component, idx)).is_some() {
            return Err(PowerGridError::ConflictId(id));
        }
        Ok(())
    }

    fn lookup(&self, id: ID) -> Result<(ComponentType, usize)> {
        self.ids
            .get(&id)
            .copied()
            .ok_or(PowerGridError::IdNotFound(id))
    }

    fn lookup_as(&self, id: ID, component: ComponentType) -> Result<usize> {
        match self.lookup(id)? {
            (found, idx) if found == component => Ok(idx),
            _ => Err(PowerGridError::IdWrongType(id)),
        }
    }
}

/// Saved state of one component touched by an update.
#[derive(Debug, Clone)]
enum SavedRecord {
    Line(usize, LineInput),
    GenericBranch(usize, GenericBranchInput),
    Source(usize, SourceInput),
    SymLoad(usize, LoadGenInput),
    SymGen(usize, LoadGenInput),
}

/// State restored by [`MainModel::restore`].
#[derive(Debug, Clone, Default)]
pub struct ModelCheckpoint {
    saved: Vec<SavedRecord>,
}

fn update_value<T: AttributeType>(target: &mut T, value: T) {
    if !value.is_missing() {
        *target = value;
    }
}

#[derive(Debug, Clone)]
pub struct MainModel {
    system_frequency: f64,
    topology: Arc<Topology>,
    lines: Vec<LineInput>,
    generic_branches: Vec<GenericBranchInput>,
    sources: Vec<SourceInput>,
    sym_loads: Vec<LoadGenInput>,
    sym_gens: Vec<LoadGenInput>,
}

impl MainModel {
    /// Builds a model from a single-scenario `input` dataset.
    pub fn new(system_frequency: f64, input: &ConstDataset<'_>) -> Result<Self> {
        if input.dataset().name != INPUT {
            return Err(PowerGridError::dataset(format!(
                "Cannot construct a model from dataset {}",
                input.dataset().name
            )));
        }
        if input.batch_size() != 1 {
            return Err(PowerGridError::dataset(
                "Input dataset should contain exactly one scenario",
            ));
        }
        let mut topology = Topology::default();
        let nodes = input.get_buffer_span::<NodeInput>(NODE, None)?.to_vec();
        for (idx, node) in nodes.iter().enumerate() {
            topology.register(node.id, ComponentType::Node, idx)?;
        }
        topology.nodes = nodes;

        let lines = input.get_buffer_span::<LineInput>(LINE, None)?.to_vec();
        for (idx, line) in lines.iter().enumerate() {
            topology.register(line.id, ComponentType::Line, idx)?;
            let ends = (
                topology.lookup_as(line.from_node, ComponentType::Node)?,
                topology.lookup_as(line.to_node, ComponentType::Node)?,
            );
            topology.line_nodes.push(ends);
        }
        let generic_branches = input
            .get_buffer_span::<GenericBranchInput>(GENERIC_BRANCH, None)?
            .to_vec();
        for (idx, branch) in generic_branches.iter().enumerate() {
            topology.register(branch.id, ComponentType::GenericBranch, idx)?;
            let ends = (
                topology.lookup_as(branch.from_node, ComponentType::Node)?,
                topology.lookup_as(branch.to_node, ComponentType::Node)?,
            );
            topology.generic_branch_nodes.push(ends);
        }
        let sources = input.get_buffer_span::<SourceInput>(SOURCE, None)?.to_vec();
        for (idx, source) in sources.iter().enumerate() {
            topology.register(source.id, ComponentType::Source, idx)?;
            let node = topology.lookup_as(source.node, ComponentType::Node)?;
            topology.source_node.push(node);
        }
        let sym_loads = input.get_buffer_span::<LoadGenInput>(SYM_LOAD, None)?.to_vec();
        for (idx, load) in sym_loads.iter().enumerate() {
            topology.register(load.id, ComponentType::SymLoad, idx)?;
            let node = topology.lookup_as(load.node, ComponentType::Node)?;
            topology.sym_load_node.push(node);
        }
        let sym_gens = input.get_buffer_span::<LoadGenInput>(SYM_GEN, None)?.to_vec();
        for (idx, generator) in sym_gens.iter().enumerate() {
            topology.register(generator.id, ComponentType::SymGen, idx)?;
            let node = topology.lookup_as(generator.node, ComponentType::Node)?;
            topology.sym_gen_node.push(node);
        }

        debug!(
            nodes = topology.nodes.len(),
            lines = lines.len(),
            generic_branches = generic_branches.len(),
            sources = sources.len(),
            sym_loads = sym_loads.len(),
            sym_gens = sym_gens.len(),
            "model constructed"
        );
        Ok(Self {
            system_frequency,
            topology: Arc::new(topology),
            lines,
            generic_branches,
            sources,
            sym_loads,
            sym_gens,
        })
    }

    pub fn system_frequency(&self) -> f64 {
        self.system_frequency
    }

    /// Number of components of `component` in the model.
    pub fn component_count(&self, component: ComponentType) -> usize {
        match component {
            ComponentType::Node => self.topology.nodes.len(),
            ComponentType::Line => self.lines.len(),
            ComponentType::GenericBranch => self.generic_branches.len(),
            ComponentType::Source => self.sources.len(),
            ComponentType::SymLoad => self.sym_loads.len(),
            ComponentType::SymGen => self.sym_gens.len(),
        }
    }

    /// Positions of `ids` within the sequence of components named `component`.
    pub fn get_indexer(&self, component: &str, ids: &[ID]) -> Result<Vec<Idx>> {
        let component = ComponentType::from_name(component)
            .ok_or_else(|| PowerGridError::name_not_found("component", component))?;
        ids.iter()
            .map(|&id| Ok(self.topology.lookup_as(id, component)? as Idx))
            .collect()
    }

    /// Applies a single-scenario update permanently.
    pub fn update(&mut self, update: &ConstDataset<'_>) -> Result<()> {
        if update.batch_size() != 1 {
            return Err(PowerGridError::dataset(
                "Permanent update should contain exactly one scenario",
            ));
        }
        self.apply_update(update).map(|_| ())
    }

    fn apply_records(
        &mut self,
        update: &ConstDataset<'_>,
        saved: &mut Vec<SavedRecord>,
    ) -> Result<()> {
        for (name, component) in [(LINE, ComponentType::Line), (GENERIC_BRANCH, ComponentType::GenericBranch)] {
            for record in update.get_buffer_span::<BranchUpdate>(name, None)? {
                let idx = self.topology.lookup_as(record.id, component)?;
                match component {
                    ComponentType::Line => {
                        let line = &mut self.lines[idx];
                        saved.push(SavedRecord::Line(idx, *line));
                        update_value(&mut line.from_status, record.from_status);
                        update_value(&mut line.to_status, record.to_status);
                    }
                    _ => {
                        let branch = &mut self.generic_branches[idx];
                        saved.push(SavedRecord::GenericBranch(idx, *branch));
                        update_value(&mut branch.from_status, record.from_status);
                        update_value(&mut branch.to_status, record.to_status);
                    }
                }
            }
        }
        for record in update.get_buffer_span::<SourceUpdate>(SOURCE, None)? {
            let idx = self.topology.lookup_as(record.id, ComponentType::Source)?;
            let source = &mut self.sources[idx];
            saved.push(SavedRecord::Source(idx, *source));
            update_value(&mut source.status, record.status);
            update_value(&mut source.u_ref, record.u_ref);
            update_value(&mut source.u_ref_angle, record.u_ref_angle);
        }
        for (name, component) in [(SYM_LOAD, ComponentType::SymLoad), (SYM_GEN, ComponentType::SymGen)] {
            for record in update.get_buffer_span::<LoadGenUpdate>(name, None)? {
                let idx = self.topology.lookup_as(record.id, component)?;
                let appliance = match component {
                    ComponentType::SymLoad => {
                        saved.push(SavedRecord::SymLoad(idx, self.sym_loads[idx]));
                        &mut self.sym_loads[idx]
                    }
                    _ => {
                        saved.push(SavedRecord::SymGen(idx, self.sym_gens[idx]));
                        &mut self.sym_gens[idx]
                    }
                };
                update_value(&mut appliance.status, record.status);
                update_value(&mut appliance.p_specified, record.p_specified);
                update_value(&mut appliance.q_specified, record.q_specified);
            }
        }
        Ok(())
    }

    /// Runs the calculation described by `options` and writes the results into `output`.
    ///
    /// Without an update, or with a single-scenario update, one calculation runs
    /// and its failure is returned as is; the model is unchanged afterwards and
    /// `output` is only written on success. A batch update runs every scenario
    /// and reports failed scenarios together as a batch error.
    pub fn calculate(
        &mut self,
        options: &Options,
        output: &mut MutableDataset<'_>,
        update: Option<&ConstDataset<'_>>,
    ) -> Result<()> {
        let config = options.resolve()?;
        debug!(?config, "calculate");
        match update {
            Some(update) if update.is_batch() => {
                batch_calculation(self, update, output, config.threading, |model, slot| {
                    model.calculate_single(&config, slot)
                })
            }
            Some(update) => {
                let patched = Patched::apply(self, update)?;
                patched.calculate_single(&config, output)
            }
            None => self.calculate_single(&config, output),
        }
    }

    fn calculate_single(&self, config: &CalculationConfig, output: &mut MutableDataset<'_>) -> Result<()> {
        if output.batch_size() != 1 {
            return Err(PowerGridError::dataset(
                "Output dataset of a single calculation should contain exactly one scenario",
            ));
        }
        if config.symmetric {
            self.calculate_with::<Symmetric>(config, output)
        } else {
            self.calculate_with::<Asymmetric>(config, output)
        }
    }

    fn calculate_with<S: SymmetryTag>(
        &self,
        config: &CalculationConfig,
        output: &mut MutableDataset<'_>,
    ) -> Result<()> {
        if !S::IS_SYMMETRIC && !self.generic_branches.is_empty() {
            return Err(PowerGridError::not_implemented(
                "Asymmetric calculation",
                GENERIC_BRANCH,
            ));
        }
        let network = network::Network::build(self)?;
        let voltages = network.solve(config)?;
        if output.dataset().name != S::OUTPUT_DATASET {
            return Err(PowerGridError::dataset(format!(
                "Output dataset {} does not match the requested calculation, expected {}",
                output.dataset().name,
                S::OUTPUT_DATASET
            )));
        }
        let results = results::ModelResults::<S>::compute(self, &network, &voltages);
        results.write(output)
    }
}

impl ScenarioModel for MainModel {
    type Checkpoint = ModelCheckpoint;

    fn apply_update(&mut self, update: &ConstDataset<'_>) -> Result<ModelCheckpoint> {
        if update.dataset().name != UPDATE {
            return Err(PowerGridError::dataset(format!(
                "Cannot update a model with dataset {}",
                update.dataset().name
            )));
        }
        let mut saved = Vec::new();
        match self.apply_records(update, &mut saved) {
            Ok(()) => Ok(ModelCheckpoint { saved }),
            Err(err) => {
                self.restore(ModelCheckpoint { saved });
                Err(err)
            }
        }
    }

    fn restore(&mut self, checkpoint: ModelCheckpoint) {
        for record in checkpoint.saved.into_iter().rev() {
            match record {
                SavedRecord::Line(idx, line) => self.lines[idx] = line,
                SavedRecord::GenericBranch(idx, branch) => self.generic_branches[idx] = branch,
                SavedRecord::Source(idx, source) => self.sources[idx] = source,
                SavedRecord::SymLoad(idx, load) => self.sym_loads[idx] = load,
                SavedRecord::SymGen(idx, generator) => self.sym_gens[idx] = generator,
            }
        }
    }
}

#[cfg(test)]
mod tests;
