//! End-to-end pipeline tests
//!
//! Builds multi-node graphs through the public API and checks the outputs
//! of whole runs: ordering, error classes, partial results and the
//! background worker.

mod common;

use common::builders::{staff, DatasetBuilder, PipelineBuilder};
use common::{number, test_timeout};
use dataforge_rs::pipeline::nodes::{
    AggregateConfig, AggregateFunction, Aggregation, CalculateConfig, Calculation, CleanConfig,
    CleanOperation, Condition, FilterConfig, FilterOperator, GroupConfig, JoinConfig, PivotConfig,
    SortConfig, SortKey,
};
use dataforge_rs::pipeline::{
    CancelToken, NodeConfig, NodeType, OperatorError, Pipeline, PipelineBridge, PipelineError,
    PipelineMessage, TransformNode, LEFT_PORT, OUTPUT_PORT, RIGHT_PORT,
};
use dataforge_rs::types::Provenance;
use dataforge_rs::{EngineSettings, Value};

fn group_by_dept() -> NodeConfig {
    NodeConfig::Group(GroupConfig::new(
        vec!["dept".to_string()],
        vec![Aggregation::new(AggregateFunction::Sum, "sal")],
    ))
}

fn regions() -> dataforge_rs::Dataset {
    DatasetBuilder::new("regions")
        .name("Regions")
        .provenance(Provenance::Api)
        .row([("team", Value::from("eng")), ("region", Value::from(" north "))])
        .row([("team", Value::from("sales")), ("region", Value::from("south"))])
        .row([("team", Value::from("sales")), ("region", Value::from("south"))])
        .row([("team", Value::from("ops")), ("region", Value::Null)])
        .build()
}

#[test]
fn test_group_sum_example() {
    let (mut pipeline, ids) = PipelineBuilder::new("group")
        .then("by dept", group_by_dept())
        .seed(staff())
        .build();

    let outputs = pipeline.execute().unwrap();
    let grouped = &outputs[&ids[0]];
    assert_eq!(grouped.row_count(), 2);
    assert_eq!(grouped.rows[0]["dept"], Value::from("eng"));
    assert_eq!(grouped.rows[0]["sum_sal"], Value::from(300));
    assert_eq!(grouped.rows[1]["dept"], Value::from("sales"));
    assert_eq!(grouped.rows[1]["sum_sal"], Value::from(50));
    assert_eq!(grouped.provenance, Provenance::Operator(NodeType::Group));
}

#[test]
fn test_filter_example() {
    let (mut pipeline, ids) = PipelineBuilder::new("filter")
        .then(
            "high earners",
            NodeConfig::Filter(FilterConfig::new(vec![Condition::new(
                "sal",
                FilterOperator::GreaterThan,
                75,
            )])),
        )
        .seed(staff())
        .build();

    let outputs = pipeline.execute().unwrap();
    let rows = &outputs[&ids[0]].rows;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r["dept"] == Value::from("eng")));
}

#[test]
fn test_calculate_example() {
    let seed = DatasetBuilder::new("pay")
        .row([("sal", Value::from(100))])
        .row([("sal", Value::from("abc"))])
        .build();
    let (mut pipeline, ids) = PipelineBuilder::new("calc")
        .then(
            "double",
            NodeConfig::Calculate(CalculateConfig::new(vec![Calculation::new(
                "double",
                "[sal] * 2",
            )])),
        )
        .seed(seed)
        .build();

    let outputs = pipeline.execute().unwrap();
    let rows = &outputs[&ids[0]].rows;
    assert_eq!(number(&rows[0]["double"]), 200.0);
    assert_eq!(number(&rows[1]["double"]), 0.0);
}

#[test]
fn test_clean_join_pivot_graph() {
    let mut pipeline = Pipeline::new("report", "Regional report");

    let clean = pipeline.add_node(TransformNode::new(
        "clean regions",
        NodeConfig::Clean(CleanConfig::new(vec![
            CleanOperation::remove_nulls(["region"]),
            CleanOperation::remove_duplicates(Vec::<String>::new()),
            CleanOperation::trim_whitespace(["region"]),
        ])),
    ));
    let join = pipeline.add_node(TransformNode::new(
        "staff with region",
        NodeConfig::Join(JoinConfig::inner("dept", "team")),
    ));
    let pivot = pipeline.add_node(TransformNode::new(
        "pay by region",
        NodeConfig::Pivot(PivotConfig::new(
            vec!["dept".to_string()],
            vec!["region".to_string()],
            vec!["sal".to_string()],
            AggregateFunction::Sum,
        )),
    ));

    pipeline.attach_seed(join, LEFT_PORT, staff()).unwrap();
    pipeline.attach_input(clean, regions()).unwrap();
    pipeline.connect(clean, OUTPUT_PORT, join, RIGHT_PORT).unwrap();
    pipeline.add_edge(join, pivot).unwrap();

    let outputs = pipeline.execute().unwrap();
    assert_eq!(outputs.len(), 3);

    let cleaned = &outputs[&clean];
    assert_eq!(cleaned.row_count(), 2);
    assert_eq!(cleaned.rows[0]["region"], Value::from("north"));

    let joined = &outputs[&join];
    assert_eq!(joined.id, "joined_staff_regions");
    assert_eq!(joined.name, "Staff \u{22c8} Regions");
    assert_eq!(joined.row_count(), 3);

    let pivoted = &outputs[&pivot];
    assert_eq!(pivoted.row_count(), 2);
    assert_eq!(pivoted.rows[0]["north"], Value::from(300));
    assert_eq!(pivoted.rows[0]["south"], Value::from(0));
    assert_eq!(pivoted.rows[1]["south"], Value::from(50));
}

#[test]
fn test_aggregate_after_sort() {
    let (mut pipeline, ids) = PipelineBuilder::new("totals")
        .then(
            "sort",
            NodeConfig::Sort(SortConfig::new(vec![SortKey::desc("sal")])),
        )
        .then(
            "totals",
            NodeConfig::Aggregate(AggregateConfig::new(vec![
                Aggregation::new(AggregateFunction::Avg, "sal").with_alias("mean"),
                Aggregation::new(AggregateFunction::Count, "sal"),
                Aggregation::new(AggregateFunction::Max, "sal"),
            ])),
        )
        .seed(staff())
        .build();

    let outputs = pipeline.execute().unwrap();
    assert_eq!(outputs[&ids[0]].rows[0]["sal"], Value::from(200));
    let totals = &outputs[&ids[1]];
    assert_eq!(totals.row_count(), 1);
    common::assert_float_eq(number(&totals.rows[0]["mean"]), 350.0 / 3.0, 1e-9);
    assert_eq!(totals.rows[0]["count_sal"], Value::from(3));
    assert_eq!(totals.rows[0]["max_sal"], Value::from(200));
}

#[test]
fn test_cycle_error_lists_nodes() {
    let mut pipeline = Pipeline::new("cycle", "Cycle");
    let a = pipeline.add_transform_node(NodeType::Sort);
    let b = pipeline.add_transform_node(NodeType::Filter);
    let c = pipeline.add_transform_node(NodeType::Clean);
    pipeline.add_edge(a, b).unwrap();
    pipeline.add_edge(b, c).unwrap();
    pipeline.add_edge(c, a).unwrap();

    match pipeline.execute() {
        Err(PipelineError::Cycle { cycle }) => {
            assert_eq!(cycle.first(), cycle.last());
            for id in [a, b, c] {
                assert!(cycle.contains(&id));
            }
        }
        other => panic!("expected a cycle error, got {:?}", other),
    }
}

#[test]
fn test_missing_join_input() {
    let mut pipeline = Pipeline::new("join", "Half join");
    let join = pipeline.add_node(TransformNode::new(
        "join",
        NodeConfig::Join(JoinConfig::inner("dept", "team")),
    ));
    pipeline.attach_seed(join, LEFT_PORT, staff()).unwrap();

    match pipeline.execute() {
        Err(PipelineError::MissingInput {
            node_id,
            kind,
            port,
        }) => {
            assert_eq!(node_id, join);
            assert_eq!(kind, NodeType::Join);
            assert_eq!(port, RIGHT_PORT);
        }
        other => panic!("expected a missing input error, got {:?}", other),
    }
}

#[test]
fn test_operator_failure_partial_results() {
    let mut pipeline = Pipeline::new("fail", "Failing join");
    let sort = pipeline.add_node(TransformNode::new(
        "sort",
        NodeConfig::Sort(SortConfig::new(vec![SortKey::asc("sal")])),
    ));
    let join = pipeline.add_transform_node(NodeType::Join);
    let after = pipeline.add_transform_node(NodeType::Clean);
    pipeline.attach_input(sort, staff()).unwrap();
    pipeline.connect(sort, OUTPUT_PORT, join, LEFT_PORT).unwrap();
    pipeline.attach_seed(join, RIGHT_PORT, regions()).unwrap();
    pipeline.add_edge(join, after).unwrap();

    let err = pipeline.execute().unwrap_err();
    assert!(!err.is_structural());
    assert_eq!(err.node_id(), Some(join));
    let partial = err.partial_results().unwrap();
    assert_eq!(partial.len(), 1);
    assert!(partial.contains_key(&sort));
    assert!(!partial.contains_key(&after));
    match err {
        PipelineError::Operator { source, .. } => {
            assert_eq!(source, OperatorError::MissingConfig("leftColumn"))
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_parallel_branches_match_sequential() {
    let run = |parallel: bool| {
        let mut pipeline = Pipeline::new("fan", "Fan out")
            .with_settings(EngineSettings::new().with_parallel_branches(parallel));
        let root = pipeline.add_node(TransformNode::new(
            "calc",
            NodeConfig::Calculate(CalculateConfig::new(vec![Calculation::new(
                "half",
                "[sal] / 2",
            )])),
        ));
        let grouped = pipeline.add_node(TransformNode::new("group", group_by_dept()));
        let sorted = pipeline.add_node(TransformNode::new(
            "sort",
            NodeConfig::Sort(SortConfig::new(vec![SortKey::desc("half")])),
        ));
        let join = pipeline.add_node(TransformNode::new(
            "join",
            NodeConfig::Join(JoinConfig::left("dept", "dept")),
        ));
        pipeline.attach_input(root, staff()).unwrap();
        pipeline.add_edge(root, grouped).unwrap();
        pipeline.add_edge(root, sorted).unwrap();
        pipeline.connect(sorted, OUTPUT_PORT, join, LEFT_PORT).unwrap();
        pipeline.connect(grouped, OUTPUT_PORT, join, RIGHT_PORT).unwrap();
        pipeline.execute().unwrap()
    };

    let sequential = run(false);
    let parallel = run(true);
    assert_eq!(sequential.len(), 4);
    assert!(sequential.iter().eq(parallel.iter()));
    for (id, dataset) in &sequential {
        assert_eq!(
            serde_json::to_string(dataset.as_ref()).unwrap(),
            serde_json::to_string(parallel[id].as_ref()).unwrap()
        );
    }
}

#[test]
fn test_settings_change_key_separator() {
    let seed = DatasetBuilder::new("keys")
        .row([("a", Value::from("x|y")), ("b", Value::from("z"))])
        .row([("a", Value::from("x")), ("b", Value::from("y|z"))])
        .build();
    let group = NodeConfig::Group(GroupConfig::new(
        vec!["a".to_string(), "b".to_string()],
        vec![Aggregation::new(AggregateFunction::Count, "a")],
    ));

    let (mut default_sep, ids) = PipelineBuilder::new("collide")
        .then("group", group.clone())
        .seed(seed.clone())
        .build();
    // Both rows build the key "x|y|z".
    assert_eq!(default_sep.execute().unwrap()[&ids[0]].row_count(), 1);

    let (mut custom_sep, ids) = PipelineBuilder::new("distinct")
        .settings(EngineSettings::new().with_key_separator("\u{1f}"))
        .then("group", group)
        .seed(seed)
        .build();
    assert_eq!(custom_sep.execute().unwrap()[&ids[0]].row_count(), 2);
}

#[test]
fn test_bridge_runs_in_background() {
    let mut bridge = PipelineBridge::spawn().unwrap();
    let (pipeline, ids) = PipelineBuilder::new("bg")
        .then("by dept", group_by_dept())
        .seed(staff())
        .build();

    let handle = bridge.submit(pipeline).unwrap();
    match bridge.recv_timeout(test_timeout()) {
        Some(PipelineMessage::RunCompleted {
            run_id, outputs, ..
        }) => {
            assert_eq!(run_id, handle.run_id);
            assert_eq!(outputs[&ids[0]].row_count(), 2);
        }
        other => panic!("unexpected message {:?}", other),
    }
}

#[test]
fn test_bridge_cancel_token() {
    let mut bridge = PipelineBridge::spawn().unwrap();
    let (pipeline, _) = PipelineBuilder::new("bg")
        .then("by dept", group_by_dept())
        .seed(staff())
        .build();

    let cancel = CancelToken::new();
    cancel.cancel();
    let handle = bridge.submit_with_cancel(pipeline, cancel).unwrap();
    assert!(matches!(
        bridge.recv_timeout(test_timeout()),
        Some(PipelineMessage::RunCancelled { run_id }) if run_id == handle.run_id
    ));
}
