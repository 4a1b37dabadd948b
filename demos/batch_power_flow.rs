//! Runs a small batch of load scenarios on a 10 kV feeder and prints the node voltages.
//! The last scenario refers to a load that does not exist and is reported as failed.
//!
//! `RUST_LOG=rustgrid=debug cargo run --example batch_power_flow` shows the solver trace.

use rustgrid::prelude::*;
use tabled::{Table, Tabled, settings::Style};
use tracing_subscriber::EnvFilter;

const LOAD_SCALES: [f64; 3] = [0.5, 1.0, 1.5];

#[derive(Tabled)]
struct VoltageRow {
    scenario: usize,
    node: ID,
    energized: IntS,
    u: String,
    u_pu: String,
    u_angle: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let nodes: Vec<_> = (0..4)
        .map(|id| NodeInput { id, u_rated: 10e3 })
        .collect();
    let lines: Vec<_> = (1..4)
        .map(|i| LineInput {
            id: 10 + i,
            from_node: i - 1,
            to_node: i,
            from_status: 1,
            to_status: 1,
            r1: 0.2,
            x1: 0.4,
            c1: 2e-7,
            tan1: 0.0,
            i_n: 300.0,
        })
        .collect();
    let sources = [SourceInput {
        id: 20,
        node: 0,
        status: 1,
        u_ref: 1.03,
        u_ref_angle: 0.0,
        sk: 1e9,
        rx_ratio: 0.1,
    }];
    let loads: Vec<_> = (1..4)
        .map(|i| LoadGenInput {
            id: 30 + i,
            node: i,
            status: 1,
            load_type: 0,
            p_specified: 8e5,
            q_specified: 2e5,
        })
        .collect();

    let mut input = ConstDataset::new(false, 1, INPUT)?;
    input.add_buffer(NODE, 4, 4, None, &nodes)?;
    input.add_buffer(LINE, 3, 3, None, &lines)?;
    input.add_buffer(SOURCE, 1, 1, None, &sources)?;
    input.add_buffer(SYM_LOAD, 3, 3, None, &loads)?;
    let mut model = MainModel::new(50.0, &input)?;

    let mut load_updates: Vec<_> = LOAD_SCALES
        .iter()
        .flat_map(|scale| {
            loads.iter().map(move |load| LoadGenUpdate {
                p_specified: load.p_specified * scale,
                q_specified: load.q_specified * scale,
                id: load.id,
                ..LoadGenUpdate::missing()
            })
        })
        .collect();
    let n_scenarios = LOAD_SCALES.len() + 1;
    load_updates.extend(loads.iter().map(|load| LoadGenUpdate {
        id: load.id,
        ..LoadGenUpdate::missing()
    }));
    load_updates[LOAD_SCALES.len() * loads.len()].id = 999;

    let mut update = ConstDataset::new(true, n_scenarios as Idx, UPDATE)?;
    update.add_buffer(SYM_LOAD, 3, load_updates.len() as Idx, None, &load_updates)?;

    let mut node_output = vec![NodeOutput::<Symmetric>::missing(); nodes.len() * n_scenarios];
    let mut output = MutableDataset::new(true, n_scenarios as Idx, SYM_OUTPUT)?;
    output.add_buffer(NODE, 4, node_output.len() as Idx, None, &mut node_output)?;

    let options = Options {
        threading: -1,
        ..Default::default()
    };
    let failed = match model.calculate(&options, &mut output, Some(&update)) {
        Ok(()) => Vec::new(),
        Err(PowerGridError::Batch(err)) => {
            println!("{err}\n");
            err.iter().map(|f| f.scenario as usize).collect()
        }
        Err(err) => return Err(err.into()),
    };
    drop(output);

    let rows = node_output
        .chunks(nodes.len())
        .enumerate()
        .filter(|(scenario, _)| !failed.contains(scenario))
        .flat_map(|(scenario, chunk)| {
            chunk.iter().map(move |node| VoltageRow {
                scenario,
                node: node.id,
                energized: node.energized,
                u: format!("{:.4} kV", node.u / 1e3),
                u_pu: format!("{:.5}", node.u_pu),
                u_angle: format!("{:.4} deg", node.u_angle.to_degrees()),
            })
        });
    println!("{}", Table::new(rows).with(Style::modern()));
    Ok(())
}
