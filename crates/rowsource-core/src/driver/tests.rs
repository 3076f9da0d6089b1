use crate::{
    driver::{DecachePolicy, DriverOptions, DriverPhase, ReportDefinition, StreamingDriver},
    error::ErrorClass,
    materialize::RenderRegistry,
    model::EntityModel,
    obs::{CursorMode, ReportTraceEvent},
    query::{ColumnConfig, CompareOp, OrderTerm, Predicate, QuerySpec, Window},
    stream::RowStream,
    test_support::{CollectingTrace, drain, identity_model, identity_session, numbered_session},
    value::Value,
};
use std::sync::Arc;

fn item_definition() -> Arc<ReportDefinition> {
    Arc::new(
        ReportDefinition::new(
            "items",
            Arc::new(EntityModel::new("Item")),
            QuerySpec::new("Item").order_by(OrderTerm::asc("seq")),
            vec![ColumnConfig::new("seq", "seq"), ColumnConfig::new("name", "name")],
            &RenderRegistry::with_builtins(),
        )
        .expect("definition should build"),
    )
}

fn seqs(rows: &[crate::materialize::MaterializedRow]) -> Vec<i64> {
    rows.iter()
        .map(|row| match row.get("seq") {
            Ok(Value::Int(seq)) => *seq,
            other => panic!("unexpected seq {other:?}"),
        })
        .collect()
}

#[test]
fn driver_opens_lazily_on_first_row() {
    let mut session = numbered_session(5);
    let mut driver = StreamingDriver::new(item_definition(), DriverOptions::default());

    assert_eq!(driver.phase(), DriverPhase::Unopened);
    assert_eq!(session.stats().counts, 0);

    let first = driver.next_row(&mut session).expect("row");
    assert!(first.is_some());
    assert_eq!(driver.phase(), DriverPhase::Open);
    assert_eq!(session.stats().counts, 1);
    assert_eq!(session.stats().opens, 1);
}

#[test]
fn estimate_above_threshold_pages_through_every_row_in_order() {
    let mut session = numbered_session(250);
    let trace = Arc::new(CollectingTrace::default());
    let options = DriverOptions::default().with_threshold(100).with_page_size(100);
    let mut driver =
        StreamingDriver::new(item_definition(), options).with_trace_sink(trace.clone());

    let rows = drain(&mut driver, &mut session);

    assert_eq!(seqs(&rows), (0..250_i64).collect::<Vec<_>>());
    assert_eq!(session.stats().opens, 3);
    assert_eq!(driver.phase(), DriverPhase::Exhausted);

    let events = trace.events();
    assert!(matches!(
        events.first(),
        Some(ReportTraceEvent::Open {
            mode: CursorMode::Incremental { page_size: 100 },
            estimate: 250,
            ..
        })
    ));
    let pages: Vec<(u64, u64)> = events
        .iter()
        .filter_map(|event| match event {
            ReportTraceEvent::Page { offset, limit, .. } => Some((*offset, *limit)),
            _ => None,
        })
        .collect();
    assert_eq!(pages, vec![(0, 100), (100, 100), (200, 100)]);
    assert!(matches!(
        events.last(),
        Some(ReportTraceEvent::Finish { rows: 250, .. })
    ));
}

#[test]
fn estimate_at_threshold_uses_one_query() {
    let mut session = numbered_session(100);
    let options = DriverOptions::default().with_threshold(100).with_page_size(10);
    let mut driver = StreamingDriver::new(item_definition(), options);

    let rows = drain(&mut driver, &mut session);

    assert_eq!(rows.len(), 100);
    assert_eq!(session.stats().opens, 1);
}

#[test]
fn incremental_paging_stays_inside_the_window() {
    let mut session = numbered_session(250);
    let options = DriverOptions::default()
        .with_threshold(100)
        .with_page_size(50)
        .with_window(Window::new(20, Some(130)));
    let mut driver = StreamingDriver::new(item_definition(), options);

    assert_eq!(driver.estimate_row_count(&mut session).expect("estimate"), 130);
    let rows = drain(&mut driver, &mut session);

    assert_eq!(seqs(&rows), (20..150_i64).collect::<Vec<_>>());
    assert_eq!(session.stats().opens, 3);
}

#[test]
fn decache_follows_policy() {
    for (policy, expected) in [
        (DecachePolicy::EveryRow, 5),
        (DecachePolicy::Every(2), 2),
        (DecachePolicy::Never, 0),
    ] {
        let mut session = numbered_session(5);
        let options = DriverOptions::default().with_decache(policy);
        let mut driver = StreamingDriver::new(item_definition(), options);

        let rows = drain(&mut driver, &mut session);

        assert_eq!(rows.len(), 5);
        assert_eq!(session.stats().decaches, expected, "policy {policy:?}");
    }
}

#[test]
fn every_row_decache_bounds_cached_objects() {
    let mut session = numbered_session(40);
    let options = DriverOptions::default().with_threshold(10).with_page_size(10);
    let mut driver = StreamingDriver::new(item_definition(), options);

    let rows = drain(&mut driver, &mut session);

    assert_eq!(rows.len(), 40);
    assert_eq!(session.stats().peak_cached_objects, 10);
}

#[test]
fn fetch_fault_exhausts_the_driver() {
    let mut session = numbered_session(5).fail_after_rows(2);
    let trace = Arc::new(CollectingTrace::default());
    let mut driver = StreamingDriver::new(item_definition(), DriverOptions::default())
        .with_trace_sink(trace.clone());

    assert!(driver.next_row(&mut session).expect("row 1").is_some());
    assert!(driver.next_row(&mut session).expect("row 2").is_some());
    let err = driver.next_row(&mut session).expect_err("row 3 should fail");

    assert_eq!(err.class, ErrorClass::Persistence);
    assert_eq!(driver.phase(), DriverPhase::Exhausted);
    assert!(driver.next_row(&mut session).expect("terminal").is_none());
    assert!(matches!(
        trace.events().last(),
        Some(ReportTraceEvent::Error {
            class: ErrorClass::Persistence,
            ..
        })
    ));
}

#[test]
fn open_fault_exhausts_the_driver() {
    let mut session = numbered_session(5).fail_counts();
    let mut driver = StreamingDriver::new(item_definition(), DriverOptions::default());

    assert!(driver.next_row(&mut session).is_err());
    assert_eq!(driver.phase(), DriverPhase::Exhausted);
    assert!(driver.next_row(&mut session).expect("terminal").is_none());
    assert_eq!(session.stats().opens, 0);
}

#[test]
fn close_is_idempotent_and_safe_before_open() {
    let mut session = numbered_session(5);
    let mut driver = StreamingDriver::new(item_definition(), DriverOptions::default());

    driver.close();
    driver.close();

    assert_eq!(driver.phase(), DriverPhase::Exhausted);
    assert!(driver.next_row(&mut session).expect("closed").is_none());
    assert_eq!(session.stats().counts, 0);
    assert_eq!(session.stats().opens, 0);

    let mut open = StreamingDriver::new(item_definition(), DriverOptions::default());
    assert!(open.next_row(&mut session).expect("row").is_some());
    open.close();
    open.close();
    assert!(open.next_row(&mut session).expect("closed").is_none());
}

#[test]
fn row_filter_skips_non_matching_rows() {
    let mut session = numbered_session(30);
    let mut driver = StreamingDriver::new(item_definition(), DriverOptions::default())
        .with_row_filter(Predicate::compare("name", CompareOp::StartsWith, "item-001"));

    let rows = drain(&mut driver, &mut session);

    assert_eq!(seqs(&rows), (10..20_i64).collect::<Vec<_>>());
    assert_eq!(driver.rows_read(), 30);
}

#[test]
fn estimate_is_counted_once() {
    let mut session = numbered_session(12);
    let mut driver = StreamingDriver::new(item_definition(), DriverOptions::default());

    assert_eq!(driver.estimate_row_count(&mut session).expect("estimate"), 12);
    assert_eq!(driver.estimate_row_count(&mut session).expect("estimate"), 12);
    let _ = drain(&mut driver, &mut session);

    assert_eq!(session.stats().counts, 1);
}

#[test]
fn base_query_and_labels_come_from_the_definition() {
    let definition = ReportDefinition::new(
        "identities",
        Arc::new(identity_model()),
        QuerySpec::new("Identity")
            .filter(Predicate::eq("department", "eng"))
            .order_by(OrderTerm::asc("name")),
        vec![ColumnConfig::new("name", "name")],
        &RenderRegistry::with_builtins(),
    )
    .expect("definition")
    .with_progress_label(|row| {
        let name = row.get("name").map(ToString::to_string).unwrap_or_default();
        format!("Processing {name}")
    });
    let mut driver = StreamingDriver::new(Arc::new(definition), DriverOptions::default());
    let mut session = identity_session();

    let base = driver.base_query().expect("driver exposes a base query");
    assert_eq!(base.entity, "Identity");
    assert_eq!(base.predicate, Predicate::eq("department", "eng"));
    assert_eq!(driver.describe(), "Identity");

    let row = driver.next_row(&mut session).expect("row").expect("some row");
    assert_eq!(driver.progress_label(&row), Some("Processing Alice".to_string()));
}

#[test]
fn definition_rejects_invalid_column_sets() {
    let registry = RenderRegistry::with_builtins();
    let model = Arc::new(identity_model());

    let duplicate = ReportDefinition::new(
        "dup",
        model.clone(),
        QuerySpec::new("Identity"),
        vec![ColumnConfig::new("name", "name"), ColumnConfig::new("name", "id")],
        &registry,
    )
    .expect_err("duplicate fields should fail");
    assert_eq!(duplicate.class, ErrorClass::InvalidInput);

    let mismatch = ReportDefinition::new(
        "mismatch",
        model.clone(),
        QuerySpec::new("Entitlement"),
        vec![ColumnConfig::new("name", "name")],
        &registry,
    )
    .expect_err("entity mismatch should fail");
    assert_eq!(mismatch.class, ErrorClass::InvalidInput);

    let renderer = ReportDefinition::new(
        "renderer",
        model,
        QuerySpec::new("Identity"),
        vec![ColumnConfig::new("name", "name").render("nope")],
        &registry,
    )
    .expect_err("unknown renderer should fail");
    assert_eq!(renderer.class, ErrorClass::InvalidInput);
}
