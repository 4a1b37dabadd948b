use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rustgrid::prelude::*;

const N_NODES: usize = 32;
const N_SCENARIOS: usize = 256;

/// A radial 10 kV feeder with a constant power load on every node behind the first.
struct Feeder {
    nodes: Vec<NodeInput>,
    lines: Vec<LineInput>,
    sources: Vec<SourceInput>,
    loads: Vec<LoadGenInput>,
    updates: Vec<LoadGenUpdate>,
}

impl Feeder {
    fn new() -> Self {
        let nodes = (0..N_NODES)
            .map(|i| NodeInput {
                id: i as ID,
                u_rated: 10e3,
            })
            .collect();
        let lines = (1..N_NODES)
            .map(|i| LineInput {
                id: (1000 + i) as ID,
                from_node: (i - 1) as ID,
                to_node: i as ID,
                from_status: 1,
                to_status: 1,
                r1: 0.05,
                x1: 0.1,
                c1: 1e-8,
                tan1: 0.0,
                i_n: 400.0,
            })
            .collect();
        let sources = vec![SourceInput {
            id: 5000,
            node: 0,
            status: 1,
            u_ref: 1.02,
            u_ref_angle: 0.0,
            sk: 1e9,
            rx_ratio: 0.1,
        }];
        let loads: Vec<_> = (1..N_NODES)
            .map(|i| LoadGenInput {
                id: (2000 + i) as ID,
                node: i as ID,
                status: 1,
                load_type: 0,
                p_specified: 5e4,
                q_specified: 1e4,
            })
            .collect();
        let updates = (0..N_SCENARIOS)
            .flat_map(|s| {
                loads.iter().map(move |load| LoadGenUpdate {
                    id: load.id,
                    status: 1,
                    p_specified: load.p_specified * (0.5 + (s % 10) as f64 / 10.0),
                    q_specified: f64::NAN,
                })
            })
            .collect();
        Self {
            nodes,
            lines,
            sources,
            loads,
            updates,
        }
    }

    fn model(&self) -> MainModel {
        let mut input = ConstDataset::new(false, 1, INPUT).unwrap();
        let n = |v: usize| v as Idx;
        input.add_buffer(NODE, n(self.nodes.len()), n(self.nodes.len()), None, &self.nodes).unwrap();
        input.add_buffer(LINE, n(self.lines.len()), n(self.lines.len()), None, &self.lines).unwrap();
        input.add_buffer(SOURCE, 1, 1, None, &self.sources).unwrap();
        input.add_buffer(SYM_LOAD, n(self.loads.len()), n(self.loads.len()), None, &self.loads).unwrap();
        MainModel::new(50.0, &input).unwrap()
    }
}

fn bench_batch(c: &mut Criterion) {
    let feeder = Feeder::new();
    let mut model = feeder.model();
    let n_loads = feeder.loads.len() as Idx;
    let mut update = ConstDataset::new(true, N_SCENARIOS as Idx, UPDATE).unwrap();
    update
        .add_buffer(SYM_LOAD, n_loads, feeder.updates.len() as Idx, None, &feeder.updates)
        .unwrap();
    let mut nodes = vec![NodeOutput::<Symmetric>::missing(); N_NODES * N_SCENARIOS];

    let mut group = c.benchmark_group("batch power flow");
    group.throughput(Throughput::Elements(N_SCENARIOS as u64));
    group.sample_size(10);
    for threading in [0, -1] {
        let options = Options {
            threading,
            ..Default::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(threading), &options, |b, options| {
            b.iter(|| {
                let mut output = MutableDataset::new(true, N_SCENARIOS as Idx, SYM_OUTPUT).unwrap();
                output
                    .add_buffer(NODE, N_NODES as Idx, nodes.len() as Idx, None, &mut nodes)
                    .unwrap();
                model.calculate(black_box(options), &mut output, Some(&update)).unwrap();
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_batch);
criterion_main!(benches);
