//! Batch execution engine.
//!
//! Runs one solve per scenario of a batch update against a base model. Each
//! scenario patches the model, solves into its own output slot and restores the
//! patched state before the model is used again, so scenarios never observe
//! each other. With more than one worker every worker owns a clone of the model
//! and scenarios are distributed over a rayon pool.

use std::ops::{Deref, DerefMut};

use rayon::{ThreadPoolBuilder, prelude::*};
use tracing::{debug, debug_span, info_span, warn};

use crate::{
    dataset::{ConstDataset, MutableDataset},
    error::{BatchError, FailedScenario, PowerGridError, Result},
    meta_data::Idx,
    options::Threading,
};

/// A model that can be patched for one scenario and restored afterwards.
pub trait ScenarioModel: Clone + Send + Sync {
    /// Saved state of everything one update touched.
    type Checkpoint: Send;

    /// Applies a single-scenario update in place.
    ///
    /// On failure the model is left as it was before the call.
    fn apply_update(&mut self, update: &ConstDataset<'_>) -> Result<Self::Checkpoint>;

    /// Reverts an update applied by [`ScenarioModel::apply_update`].
    fn restore(&mut self, checkpoint: Self::Checkpoint);
}

/// A model with one update applied, restored when dropped.
///
/// The restore also runs while unwinding, so a panicking solve cannot leave
/// the model patched.
pub(crate) struct Patched<'m, M: ScenarioModel> {
    model: &'m mut M,
    checkpoint: Option<M::Checkpoint>,
}

impl<'m, M: ScenarioModel> Patched<'m, M> {
    pub(crate) fn apply(model: &'m mut M, update: &ConstDataset<'_>) -> Result<Self> {
        let checkpoint = model.apply_update(update)?;
        Ok(Self {
            model,
            checkpoint: Some(checkpoint),
        })
    }
}

impl<M: ScenarioModel> Deref for Patched<'_, M> {
    type Target = M;

    fn deref(&self) -> &M {
        self.model
    }
}

impl<M: ScenarioModel> DerefMut for Patched<'_, M> {
    fn deref_mut(&mut self) -> &mut M {
        self.model
    }
}

impl<M: ScenarioModel> Drop for Patched<'_, M> {
    fn drop(&mut self) {
        if let Some(checkpoint) = self.checkpoint.take() {
            self.model.restore(checkpoint);
        }
    }
}

fn run_scenario<M, F>(
    model: &mut M,
    update: &ConstDataset<'_>,
    scenario: Idx,
    output: &mut MutableDataset<'_>,
    solve: &F,
) -> Result<()>
where
    M: ScenarioModel,
    F: Fn(&mut M, &mut MutableDataset<'_>) -> Result<()>,
{
    let _span = debug_span!("scenario", index = scenario).entered();
    let patch = update.get_individual_scenario(scenario)?;
    let mut patched = Patched::apply(model, &patch)?;
    solve(&mut *patched, output)
}

fn failure(scenario: Idx, err: PowerGridError) -> FailedScenario {
    warn!(scenario, error = %err, "scenario failed");
    FailedScenario {
        scenario,
        kind: err.kind(),
        message: err.to_string(),
    }
}

/// Solves every scenario of `update` into the matching slot of `output`.
///
/// All scenarios run even when some fail; the failures are then returned
/// together as a [`BatchError`] in scenario order. Output slots of failed
/// scenarios are left unspecified.
pub fn batch_calculation<M, F>(
    model: &mut M,
    update: &ConstDataset<'_>,
    output: &mut MutableDataset<'_>,
    threading: Threading,
    solve: F,
) -> Result<()>
where
    M: ScenarioModel,
    F: Fn(&mut M, &mut MutableDataset<'_>) -> Result<()> + Sync,
{
    let n_scenarios = update.batch_size();
    if output.batch_size() != n_scenarios {
        return Err(PowerGridError::dataset(format!(
            "Batch size of output ({}) does not match batch size of update ({n_scenarios})",
            output.batch_size()
        )));
    }
    let n_workers = threading.n_workers().min(usize::try_from(n_scenarios).unwrap_or(0));
    let _span = info_span!("batch", n_scenarios, n_workers).entered();
    if n_scenarios == 0 {
        return Ok(());
    }

    let mut slots = output.split_scenarios()?;
    let mut failed = Vec::new();

    let pool = if n_workers > 1 {
        ThreadPoolBuilder::new()
            .num_threads(n_workers)
            .build()
            .map_err(|err| warn!(%err, "cannot build worker pool, running sequentially"))
            .ok()
    } else {
        None
    };

    match pool {
        Some(pool) => {
            let base: &M = model;
            failed = pool.install(|| {
                slots
                    .par_iter_mut()
                    .enumerate()
                    .map_init(
                        || base.clone(),
                        |local, (i, slot)| {
                            let scenario = i as Idx;
                            run_scenario(local, update, scenario, slot, &solve)
                                .err()
                                .map(|err| failure(scenario, err))
                        },
                    )
                    .flatten()
                    .collect()
            });
        }
        None => {
            for (i, slot) in slots.iter_mut().enumerate() {
                let scenario = i as Idx;
                if let Err(err) = run_scenario(model, update, scenario, slot, &solve) {
                    failed.push(failure(scenario, err));
                }
            }
        }
    }

    debug!(n_failed = failed.len(), "batch finished");
    if failed.is_empty() {
        Ok(())
    } else {
        Err(BatchError::new(failed).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        components::{LoadGenUpdate, NodeOutput, SYM_LOAD, Symmetric},
        error::ErrorKind,
        meta_data::{ID, Record},
    };
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A model made of load values keyed by id, with a log of the state each solve saw.
    #[derive(Debug, Clone, PartialEq)]
    struct LoadModel {
        loads: Vec<(ID, f64)>,
    }

    impl ScenarioModel for LoadModel {
        type Checkpoint = Vec<(usize, f64)>;

        fn apply_update(&mut self, update: &ConstDataset<'_>) -> Result<Self::Checkpoint> {
            let mut saved = Vec::new();
            for record in update.get_buffer_span::<LoadGenUpdate>(SYM_LOAD, None)? {
                let Some(idx) = self.loads.iter().position(|(id, _)| *id == record.id) else {
                    self.restore(saved);
                    return Err(PowerGridError::IdNotFound(record.id));
                };
                saved.push((idx, self.loads[idx].1));
                if !record.q_specified.is_nan() {
                    self.loads[idx].1 = record.q_specified;
                }
            }
            Ok(saved)
        }

        fn restore(&mut self, checkpoint: Self::Checkpoint) {
            for (idx, value) in checkpoint.into_iter().rev() {
                self.loads[idx].1 = value;
            }
        }
    }

    fn write_total(model: &mut LoadModel, output: &mut MutableDataset<'_>) -> Result<()> {
        let total: f64 = model.loads.iter().map(|(_, q)| q).sum();
        if total < 0.0 {
            return Err(PowerGridError::IterationDiverge {
                iterations: 1,
                max_deviation: total,
                tolerance: 0.0,
            });
        }
        let mut nodes = output.get_buffer_span_mut::<NodeOutput<Symmetric>>("node", None)?;
        let mut node = NodeOutput::<Symmetric>::missing();
        node.q = total;
        nodes.set(0, &node);
        Ok(())
    }

    fn update(id: ID, q: f64) -> LoadGenUpdate {
        LoadGenUpdate {
            id,
            status: 1,
            p_specified: f64::NAN,
            q_specified: q,
        }
    }

    fn run(threading: Threading, updates: &[LoadGenUpdate]) -> (Result<()>, Vec<f64>, LoadModel) {
        let mut model = LoadModel {
            loads: vec![(1, 10.0), (2, 20.0)],
        };
        let n = updates.len() as Idx;
        let mut update_ds = ConstDataset::new(true, n, "update").unwrap();
        update_ds.add_buffer(SYM_LOAD, 1, n, None, updates).unwrap();
        let mut nodes = vec![NodeOutput::<Symmetric>::missing(); updates.len()];
        let result = {
            let mut output = MutableDataset::new(true, n, "sym_output").unwrap();
            output.add_buffer("node", 1, n, None, &mut nodes).unwrap();
            batch_calculation(&mut model, &update_ds, &mut output, threading, write_total)
        };
        (result, nodes.iter().map(|n| n.q).collect(), model)
    }

    #[test]
    fn test_isolation() {
        let updates = [update(1, 100.0), update(2, 50.0), update(1, f64::NAN), update(2, 0.0)];
        let (result, q, model) = run(Threading::Sequential, &updates);
        result.unwrap();
        assert_eq!(q, vec![120.0, 60.0, 30.0, 10.0]);
        assert_eq!(model.loads, vec![(1, 10.0), (2, 20.0)]);
    }

    #[test]
    fn test_partial_failure() {
        let updates = [update(1, 100.0), update(99, 1.0), update(2, -100.0), update(2, 5.0)];
        for threading in [Threading::Sequential, Threading::Workers(3)] {
            let (result, q, model) = run(threading, &updates);
            let err = match result {
                Err(PowerGridError::Batch(err)) => err,
                other => panic!("expected batch error, got {other:?}"),
            };
            let scenarios: Vec<_> = err.iter().map(|f| f.scenario).collect();
            assert_eq!(scenarios, vec![1, 2]);
            assert_eq!(err.failed_scenarios()[0].kind, ErrorKind::NotFound);
            assert!(err.failed_scenarios()[0].message.contains("cannot be found"));
            assert_eq!(err.failed_scenarios()[1].kind, ErrorKind::Convergence);
            assert_eq!(q[0], 120.0);
            assert_eq!(q[3], 15.0);
            assert_eq!(model.loads, vec![(1, 10.0), (2, 20.0)]);
        }
    }

    #[test]
    fn test_restore_after_panicking_solve() {
        let mut model = LoadModel {
            loads: vec![(1, 10.0), (2, 20.0)],
        };
        let updates = [update(1, 999.0)];
        let mut update_ds = ConstDataset::new(true, 1, "update").unwrap();
        update_ds.add_buffer(SYM_LOAD, 1, 1, None, &updates).unwrap();
        let mut nodes = vec![NodeOutput::<Symmetric>::missing(); 1];
        let mut output = MutableDataset::new(true, 1, "sym_output").unwrap();
        output.add_buffer("node", 1, 1, None, &mut nodes).unwrap();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            batch_calculation(&mut model, &update_ds, &mut output, Threading::Sequential, |m, _| {
                assert_eq!(m.loads[0].1, 999.0);
                panic!("solver blew up")
            })
        }));
        assert!(outcome.is_err());
        assert_eq!(model.loads, vec![(1, 10.0), (2, 20.0)]);
    }

    #[test]
    fn test_patched_restores_on_unwind() {
        let mut model = LoadModel {
            loads: vec![(1, 10.0)],
        };
        let updates = [update(1, 5.0)];
        let mut update_ds = ConstDataset::new(false, 1, "update").unwrap();
        update_ds.add_buffer(SYM_LOAD, 1, 1, None, &updates).unwrap();

        {
            let patched = Patched::apply(&mut model, &update_ds).unwrap();
            assert_eq!(patched.loads, vec![(1, 5.0)]);
        }
        assert_eq!(model.loads, vec![(1, 10.0)]);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let patched = Patched::apply(&mut model, &update_ds).unwrap();
            if patched.loads[0].1 == 5.0 {
                panic!("interrupted");
            }
        }));
        assert!(outcome.is_err());
        assert_eq!(model.loads, vec![(1, 10.0)]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let updates: Vec<_> = (0..64)
            .map(|i| update(1 + (i % 2) as ID, i as f64))
            .collect();
        let (seq, q_seq, _) = run(Threading::Sequential, &updates);
        let (par, q_par, _) = run(Threading::Workers(4), &updates);
        seq.unwrap();
        par.unwrap();
        assert_eq!(q_seq, q_par);
    }

    #[test]
    fn test_batch_size_mismatch() {
        let mut model = LoadModel { loads: vec![] };
        let update_ds = ConstDataset::new(true, 2, "update").unwrap();
        let mut output = MutableDataset::new(true, 3, "sym_output").unwrap();
        let calls = AtomicUsize::new(0);
        let err = batch_calculation(&mut model, &update_ds, &mut output, Threading::Sequential, |_, _| {
            calls.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Shape);
        assert_eq!(calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_empty_batch() {
        let mut model = LoadModel { loads: vec![] };
        let update_ds = ConstDataset::new(true, 0, "update").unwrap();
        let mut output = MutableDataset::new(true, 0, "sym_output").unwrap();
        batch_calculation(&mut model, &update_ds, &mut output, Threading::Auto, |_, _| {
            panic!("no scenario to solve")
        })
        .unwrap();
    }
}
