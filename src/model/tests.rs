use std::f64::consts::PI;

use super::*;
use crate::{
    error::ErrorKind,
    meta_data::{IntS, Record},
    options::{CalculationMethod, CalculationType, TapChangingStrategy},
};

/// Source of 100 V behind j10 ohm feeding a constant current load of 500 var.
/// A second node hangs on two half-open lines and is never energized.
struct Fixture {
    node_id: [ID; 2],
    node_u_rated: [f64; 2],
    line_id: [ID; 2],
    line_from_node: [ID; 2],
    line_to_node: [ID; 2],
    line_from_status: [IntS; 2],
    line_to_status: [IntS; 2],
    batch_line_id: [ID; 4],
    batch_line_from_status: [IntS; 4],
    batch_line_to_status: [IntS; 4],
    source: [SourceInput; 1],
    load: [LoadGenInput; 1],
    source_update: [SourceUpdate; 1],
    source_update_indptr: [Idx; 3],
    load_updates: [LoadGenUpdate; 2],
}

impl Fixture {
    fn new() -> Self {
        let mut source = SourceInput::missing();
        source.id = 1;
        source.node = 0;
        source.status = 1;
        source.u_ref = 1.0;
        source.sk = 1000.0;
        source.rx_ratio = 0.0;

        let mut source_update = SourceUpdate::missing();
        source_update.id = 1;
        source_update.u_ref = 0.5;

        let load_update = |q_specified| LoadGenUpdate {
            id: 2,
            q_specified,
            ..LoadGenUpdate::missing()
        };

        Self {
            node_id: [0, 4],
            node_u_rated: [100.0, 100.0],
            line_id: [5, 6],
            line_from_node: [0, 4],
            line_to_node: [4, 0],
            line_from_status: [0, 1],
            line_to_status: [1, 0],
            batch_line_id: [5, 6, 5, 6],
            batch_line_from_status: [0, 1, 0, 1],
            batch_line_to_status: [1, 0, 1, 0],
            source: [source],
            load: [LoadGenInput {
                id: 2,
                node: 0,
                status: 1,
                load_type: 2,
                p_specified: 0.0,
                q_specified: 500.0,
            }],
            source_update: [source_update],
            source_update_indptr: [0, 1, 1],
            load_updates: [load_update(100.0), load_update(300.0)],
        }
    }

    fn input(&self) -> ConstDataset<'_> {
        let mut input = ConstDataset::new(false, 1, INPUT).unwrap();
        input.add_buffer(SYM_LOAD, 1, 1, None, &self.load[..]).unwrap();
        input.add_buffer(SOURCE, 1, 1, None, &self.source[..]).unwrap();
        input.add_columnar_buffer(NODE, 2, 2, None).unwrap();
        input.add_attribute_buffer(NODE, "id", &self.node_id[..]).unwrap();
        input.add_attribute_buffer(NODE, "u_rated", &self.node_u_rated[..]).unwrap();
        input.add_columnar_buffer(LINE, 2, 2, None).unwrap();
        input.add_attribute_buffer(LINE, "id", &self.line_id[..]).unwrap();
        input.add_attribute_buffer(LINE, "from_node", &self.line_from_node[..]).unwrap();
        input.add_attribute_buffer(LINE, "to_node", &self.line_to_node[..]).unwrap();
        input.add_attribute_buffer(LINE, "from_status", &self.line_from_status[..]).unwrap();
        input.add_attribute_buffer(LINE, "to_status", &self.line_to_status[..]).unwrap();
        input
    }

    fn model(&self) -> MainModel {
        MainModel::new(50.0, &self.input()).unwrap()
    }

    fn single_update(&self) -> ConstDataset<'_> {
        let mut update = ConstDataset::new(false, 1, UPDATE).unwrap();
        update.add_buffer(SOURCE, 1, 1, None, &self.source_update[..]).unwrap();
        update.add_buffer(SYM_LOAD, 1, 1, None, &self.load_updates[..1]).unwrap();
        update.add_columnar_buffer(LINE, 2, 2, None).unwrap();
        update.add_attribute_buffer(LINE, "id", &self.line_id[..]).unwrap();
        update.add_attribute_buffer(LINE, "from_status", &self.line_from_status[..]).unwrap();
        update.add_attribute_buffer(LINE, "to_status", &self.line_to_status[..]).unwrap();
        update
    }

    fn batch_update(&self) -> ConstDataset<'_> {
        let mut update = ConstDataset::new(true, 2, UPDATE).unwrap();
        update
            .add_buffer(SOURCE, -1, 1, Some(&self.source_update_indptr[..]), &self.source_update[..])
            .unwrap();
        update.add_buffer(SYM_LOAD, 1, 2, None, &self.load_updates[..]).unwrap();
        update.add_columnar_buffer(LINE, 2, 4, None).unwrap();
        update.add_attribute_buffer(LINE, "id", &self.batch_line_id[..]).unwrap();
        update
            .add_attribute_buffer(LINE, "from_status", &self.batch_line_from_status[..])
            .unwrap();
        update
            .add_attribute_buffer(LINE, "to_status", &self.batch_line_to_status[..])
            .unwrap();
        update
    }
}

fn calculate(
    model: &mut MainModel,
    options: &Options,
    update: Option<&ConstDataset<'_>>,
) -> Result<Vec<NodeOutput<Symmetric>>> {
    let mut nodes = vec![NodeOutput::<Symmetric>::missing(); 2];
    {
        let mut output = MutableDataset::new(false, 1, SYM_OUTPUT)?;
        output.add_buffer(NODE, 2, 2, None, &mut nodes[..])?;
        model.calculate(options, &mut output, update)?;
    }
    Ok(nodes)
}

fn calculate_batch(
    model: &mut MainModel,
    options: &Options,
    update: &ConstDataset<'_>,
) -> (Result<()>, Vec<NodeOutput<Symmetric>>) {
    let mut nodes = vec![NodeOutput::<Symmetric>::missing(); 4];
    let result = {
        let mut output = MutableDataset::new(true, 2, SYM_OUTPUT).unwrap();
        output.add_buffer(NODE, 2, 4, None, &mut nodes[..]).unwrap();
        model.calculate(options, &mut output, Some(update))
    };
    (result, nodes)
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() <= 1e-6 * expected.abs().max(1.0),
        "{actual} != {expected}"
    );
}

fn check_energized(node: &NodeOutput<Symmetric>, id: ID, u: f64) {
    assert_eq!(node.id, id);
    assert_eq!(node.energized, 1);
    assert_close(node.u, u);
    assert_close(node.u_pu, u / 100.0);
    assert_close(node.u_angle, 0.0);
}

fn check_isolated(node: &NodeOutput<Symmetric>, id: ID) {
    assert_eq!(node.id, id);
    assert_eq!(node.energized, 0);
    assert_eq!(node.u, 0.0);
    assert_eq!(node.u_pu, 0.0);
    assert_eq!(node.u_angle, 0.0);
}

#[test]
fn test_simple_power_flow() {
    let fixture = Fixture::new();
    let mut model = fixture.model();
    let nodes = calculate(&mut model, &Options::default(), None).unwrap();
    check_energized(&nodes[0], 0, 50.0);
    check_isolated(&nodes[1], 4);
}

#[test]
fn test_simple_update() {
    let fixture = Fixture::new();
    let mut model = fixture.model();
    model.update(&fixture.single_update()).unwrap();
    let nodes = calculate(&mut model, &Options::default(), None).unwrap();
    check_energized(&nodes[0], 0, 40.0);
    check_isolated(&nodes[1], 4);
}

#[test]
fn test_single_update_is_temporary() {
    let fixture = Fixture::new();
    let mut model = fixture.model();
    let update = fixture.single_update();
    let nodes = calculate(&mut model, &Options::default(), Some(&update)).unwrap();
    check_energized(&nodes[0], 0, 40.0);
    let nodes = calculate(&mut model, &Options::default(), None).unwrap();
    check_energized(&nodes[0], 0, 50.0);
}

#[test]
fn test_copy_model() {
    let fixture = Fixture::new();
    let mut model = fixture.model();
    let mut copy = model.clone();
    copy.update(&fixture.single_update()).unwrap();

    let nodes = calculate(&mut copy, &Options::default(), None).unwrap();
    check_energized(&nodes[0], 0, 40.0);
    let nodes = calculate(&mut model, &Options::default(), None).unwrap();
    check_energized(&nodes[0], 0, 50.0);
    check_isolated(&nodes[1], 4);
}

#[test]
fn test_get_indexer() {
    let model = Fixture::new().model();
    assert_eq!(model.get_indexer(SYM_LOAD, &[2, 2]).unwrap(), vec![0, 0]);
    assert_eq!(model.get_indexer(NODE, &[4, 0]).unwrap(), vec![1, 0]);
    assert_eq!(
        model.get_indexer(SYM_LOAD, &[2, 6]).unwrap_err(),
        PowerGridError::IdWrongType(6)
    );
    assert_eq!(
        model.get_indexer(SYM_LOAD, &[3]).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    let err = model.get_indexer("transformer", &[2]).unwrap_err();
    assert!(err.to_string().contains("Cannot find component"));
    assert_eq!(model.component_count(ComponentType::Line), 2);
    assert_eq!(model.component_count(ComponentType::SymGen), 0);
}

#[test]
fn test_batch_power_flow() {
    let fixture = Fixture::new();
    let mut model = fixture.model();
    let update = fixture.batch_update();
    for threading in [0, 2, -1] {
        let options = Options {
            threading,
            ..Default::default()
        };
        let (result, nodes) = calculate_batch(&mut model, &options, &update);
        result.unwrap();
        check_energized(&nodes[0], 0, 40.0);
        check_isolated(&nodes[1], 4);
        check_energized(&nodes[2], 0, 70.0);
        check_isolated(&nodes[3], 4);
    }
    let nodes = calculate(&mut model, &Options::default(), None).unwrap();
    check_energized(&nodes[0], 0, 50.0);
}

#[test]
fn test_construction_conflict() {
    let mut fixture = Fixture::new();
    fixture.load[0].id = 0;
    let err = MainModel::new(50.0, &fixture.input()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(err.to_string().contains("Conflicting id detected:"));
}

#[test]
fn test_construction_dangling_reference() {
    let mut fixture = Fixture::new();
    fixture.source[0].node = 7;
    let err = MainModel::new(50.0, &fixture.input()).unwrap_err();
    assert_eq!(err, PowerGridError::IdNotFound(7));

    let mut fixture = Fixture::new();
    fixture.load[0].node = 1;
    let err = MainModel::new(50.0, &fixture.input()).unwrap_err();
    assert_eq!(err, PowerGridError::IdWrongType(1));
}

#[test]
fn test_update_error_leaves_model_unchanged() {
    let mut fixture = Fixture::new();
    fixture.source_update[0].id = 99;
    let mut model = fixture.model();
    let err = model.update(&fixture.single_update()).unwrap_err();
    assert!(err.to_string().contains("The id cannot be found:"));
    let nodes = calculate(&mut model, &Options::default(), None).unwrap();
    check_energized(&nodes[0], 0, 50.0);
}

#[test]
fn test_update_requires_update_dataset() {
    let fixture = Fixture::new();
    let mut model = fixture.model();
    let err = model.update(&fixture.input()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shape);
}

#[test]
fn test_invalid_options() {
    let fixture = Fixture::new();
    let mut model = fixture.model();

    let options = Options {
        calculation_type: -128,
        ..Default::default()
    };
    let err = calculate(&mut model, &options, None).unwrap_err();
    assert!(err.to_string().contains("CalculationType is not implemented for"));

    let options = Options {
        tap_changing_strategy: -128,
        ..Default::default()
    };
    let err = calculate(&mut model, &options, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedConfiguration);

    let options = Options {
        tap_changing_strategy: TapChangingStrategy::MinVoltageTap as IntS,
        ..Default::default()
    };
    let nodes = calculate(&mut model, &options, None).unwrap();
    check_energized(&nodes[0], 0, 50.0);
}

#[test]
fn test_single_calculation_error() {
    let fixture = Fixture::new();
    let mut model = fixture.model();
    let mut options = Options {
        max_iter: 1,
        err_tol: 1e-100,
        symmetric: 0,
        threading: 1,
        ..Default::default()
    };
    let err = calculate(&mut model, &options, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Convergence);
    assert!(err.to_string().contains("Iteration failed to converge after"));

    options.calculation_type = CalculationType::StateEstimation as IntS;
    options.calculation_method = CalculationMethod::IterativeCurrent as IntS;
    let err = calculate(&mut model, &options, None).unwrap_err();
    assert!(
        err.to_string()
            .contains("The calculation method is invalid for this calculation!")
    );
}

#[test]
fn test_batch_calculation_error() {
    let mut fixture = Fixture::new();
    fixture.load_updates[1].id = 999;
    let mut model = fixture.model();
    let (result, nodes) = calculate_batch(&mut model, &Options::default(), &fixture.batch_update());
    let err = match result {
        Err(PowerGridError::Batch(err)) => err,
        other => panic!("expected batch error, got {other:?}"),
    };
    assert_eq!(err.n_failed_scenarios(), 1);
    assert_eq!(err.failed_scenarios()[0].scenario, 1);
    assert!(err.failed_scenarios()[0].message.contains("The id cannot be found:"));
    check_energized(&nodes[0], 0, 40.0);
    check_isolated(&nodes[1], 4);
}

#[test]
fn test_calculation_methods() {
    let fixture = Fixture::new();
    let mut model = fixture.model();
    let with_method = |method: CalculationMethod| Options {
        calculation_method: method as IntS,
        ..Default::default()
    };

    for method in [
        CalculationMethod::IterativeCurrent,
        CalculationMethod::LinearCurrent,
        CalculationMethod::DefaultMethod,
    ] {
        let nodes = calculate(&mut model, &with_method(method), None).unwrap();
        check_energized(&nodes[0], 0, 50.0);
    }
    // the load becomes the reactance it has at rated voltage
    let nodes = calculate(&mut model, &with_method(CalculationMethod::Linear), None).unwrap();
    check_energized(&nodes[0], 0, 200.0 / 3.0);
}

#[test]
fn test_output_shape_mismatch() {
    let fixture = Fixture::new();
    let mut model = fixture.model();
    let mut nodes = [NodeOutput::<Symmetric>::missing(); 1];
    let mut output = MutableDataset::new(false, 1, SYM_OUTPUT).unwrap();
    output.add_buffer(NODE, 1, 1, None, &mut nodes[..]).unwrap();
    let err = model.calculate(&Options::default(), &mut output, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shape);
}

#[test]
fn test_asymmetric_output() {
    let fixture = Fixture::new();
    let mut model = fixture.model();
    let mut nodes = [NodeOutput::<Asymmetric>::missing(); 2];
    let mut loads = [ApplianceOutput::<Asymmetric>::missing(); 1];
    {
        let mut output = MutableDataset::new(false, 1, ASYM_OUTPUT).unwrap();
        output.add_buffer(NODE, 2, 2, None, &mut nodes[..]).unwrap();
        output.add_buffer(SYM_LOAD, 1, 1, None, &mut loads[..]).unwrap();
        let options = Options {
            symmetric: 0,
            ..Default::default()
        };
        model.calculate(&options, &mut output, None).unwrap();
    }
    for phase in 0..3 {
        assert_close(nodes[0].u[phase], 50.0 / 3f64.sqrt());
        assert_close(nodes[0].u_pu[phase], 0.5);
        assert_close(loads[0].q[phase], 250.0 / 3.0);
        assert_eq!(nodes[1].u[phase], 0.0);
    }
    assert_close(nodes[0].u_angle[1], -2.0 * PI / 3.0);
    assert_close(nodes[0].u_angle[2], 2.0 * PI / 3.0);
    assert_eq!(loads[0].energized, 1);

    // asymmetric output requested into a symmetric dataset
    let options = Options {
        symmetric: 0,
        ..Default::default()
    };
    let err = calculate(&mut model, &options, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shape);
}

/// Two 10 kV nodes joined by a branch, source at node 1 and a constant power load at node 2.
fn feeder<T: Record>(name: &str, branches: &[T]) -> MainModel {
    let nodes = [
        NodeInput { id: 1, u_rated: 10e3 },
        NodeInput { id: 2, u_rated: 10e3 },
    ];
    let source = [SourceInput {
        id: 10,
        node: 1,
        status: 1,
        u_ref: 1.0,
        u_ref_angle: f64::NAN,
        sk: f64::NAN,
        rx_ratio: f64::NAN,
    }];
    let load = [LoadGenInput {
        id: 20,
        node: 2,
        status: 1,
        load_type: 0,
        p_specified: 1e6,
        q_specified: 2e5,
    }];
    let mut input = ConstDataset::new(false, 1, INPUT).unwrap();
    input.add_buffer(NODE, 2, 2, None, &nodes[..]).unwrap();
    input.add_buffer(SOURCE, 1, 1, None, &source[..]).unwrap();
    input.add_buffer(SYM_LOAD, 1, 1, None, &load[..]).unwrap();
    input.add_buffer(name, 1, 1, None, branches).unwrap();
    MainModel::new(50.0, &input).unwrap()
}

#[test]
fn test_branch_flows() {
    let lines = [LineInput {
        id: 3,
        from_node: 1,
        to_node: 2,
        from_status: 1,
        to_status: 1,
        r1: 1.0,
        x1: 2.0,
        c1: 0.0,
        tan1: 0.0,
        i_n: 100.0,
    }];
    let mut model = feeder(LINE, &lines);

    let mut nodes = [NodeOutput::<Symmetric>::missing(); 2];
    let mut branches = [BranchOutput::<Symmetric>::missing(); 1];
    let mut sources = [ApplianceOutput::<Symmetric>::missing(); 1];
    let mut loads = [ApplianceOutput::<Symmetric>::missing(); 1];
    {
        let mut output = MutableDataset::new(false, 1, SYM_OUTPUT).unwrap();
        output.add_buffer(NODE, 2, 2, None, &mut nodes[..]).unwrap();
        output.add_buffer(LINE, 1, 1, None, &mut branches[..]).unwrap();
        output.add_buffer(SOURCE, 1, 1, None, &mut sources[..]).unwrap();
        output.add_buffer(SYM_LOAD, 1, 1, None, &mut loads[..]).unwrap();
        model.calculate(&Options::default(), &mut output, None).unwrap();
    }
    let (line, source, load) = (branches[0], sources[0], loads[0]);

    assert_close(load.p, 1e6);
    assert_close(load.q, 2e5);
    assert_close(load.pf, 1e6 / (1e12f64 + 4e10).sqrt());
    assert_close(line.p_to, -1e6);
    assert_close(line.q_to, -2e5);
    assert_close(source.p, line.p_from);
    assert_close(source.q, line.q_from);
    // losses in the series resistance
    let losses = line.p_from + line.p_to;
    assert!(losses > 0.0);
    assert!((losses - 3.0 * line.i_to * line.i_to).abs() < 1e-4 * losses);
    assert_close(line.i_from, line.i_to);
    assert_close(line.loading, line.i_from / 100.0);
    assert!(nodes[1].u < nodes[0].u);
    assert_close(nodes[1].p, -1e6);
    assert_close(nodes[0].p, source.p);
}

#[test]
fn test_generic_branch_matches_line() {
    let lines = [LineInput {
        id: 3,
        from_node: 1,
        to_node: 2,
        from_status: 1,
        to_status: 1,
        r1: 1.0,
        x1: 2.0,
        c1: f64::NAN,
        tan1: f64::NAN,
        i_n: f64::NAN,
    }];
    let branches = [GenericBranchInput {
        id: 3,
        from_node: 1,
        to_node: 2,
        from_status: 1,
        to_status: 1,
        r1: 1.0,
        x1: 2.0,
        g1: f64::NAN,
        b1: f64::NAN,
        k: f64::NAN,
        theta: f64::NAN,
        sn: 2e6,
    }];
    let mut with_line = feeder(LINE, &lines);
    let mut with_branch = feeder(GENERIC_BRANCH, &branches);

    let solve = |model: &mut MainModel| {
        let mut nodes = [NodeOutput::<Symmetric>::missing(); 2];
        {
            let mut output = MutableDataset::new(false, 1, SYM_OUTPUT).unwrap();
            output.add_buffer(NODE, 2, 2, None, &mut nodes[..]).unwrap();
            model.calculate(&Options::default(), &mut output, None).unwrap();
        }
        nodes
    };
    let a = solve(&mut with_line);
    let b = solve(&mut with_branch);
    assert_close(a[1].u, b[1].u);
    assert_close(a[1].u_angle, b[1].u_angle);

    let options = Options {
        symmetric: 0,
        ..Default::default()
    };
    let mut nodes = [NodeOutput::<Asymmetric>::missing(); 2];
    let mut output = MutableDataset::new(false, 1, ASYM_OUTPUT).unwrap();
    output.add_buffer(NODE, 2, 2, None, &mut nodes[..]).unwrap();
    let err = with_branch.calculate(&options, &mut output, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedConfiguration);
}

#[test]
fn test_unknown_load_type() {
    let mut fixture = Fixture::new();
    fixture.load[0].load_type = 7;
    let mut model = fixture.model();
    let err = calculate(&mut model, &Options::default(), None).unwrap_err();
    assert!(matches!(
        err,
        PowerGridError::NotImplemented {
            what: "LoadGenType",
            ..
        }
    ));
}
