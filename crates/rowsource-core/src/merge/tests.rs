use crate::{
    driver::{DecachePolicy, DriverOptions, ReportDefinition, StreamingDriver},
    materialize::{MaterializedRow, RenderRegistry},
    merge::{OrderedMerge, RowComparator, SortKey},
    model::EntityModel,
    query::{ColumnConfig, OrderTerm, QuerySpec},
    session::MemorySession,
    stream::{RowStream, VecRowStream},
    test_support::{drain, record, row},
    value::Value,
};
use proptest::prelude::*;
use serde_json::json;
use std::{cmp::Ordering, sync::Arc};

fn keyed(source: &str, key: i64) -> MaterializedRow {
    row(&[("source", Value::text(source)), ("key", Value::Int(key))])
}

fn labels(rows: &[MaterializedRow]) -> Vec<String> {
    rows.iter()
        .map(|row| {
            format!(
                "{}({})",
                row.get("source").expect("source field"),
                row.get("key").expect("key field")
            )
        })
        .collect()
}

fn boxed(label: &str, rows: Vec<MaterializedRow>) -> Box<dyn RowStream> {
    Box::new(VecRowStream::new(label, rows))
}

#[test]
fn merge_interleaves_two_ordered_streams() {
    let mut merge = OrderedMerge::new(
        "union",
        vec![
            boxed("a", vec![keyed("A", 2), keyed("A", 5)]),
            boxed("b", vec![keyed("B", 1), keyed("B", 3)]),
        ],
        vec![SortKey::asc("key")],
    );

    let rows = drain(&mut merge, &mut MemorySession::new());

    assert_eq!(labels(&rows), ["B(1)", "A(2)", "B(3)", "A(5)"]);
    assert!(merge.next_row(&mut MemorySession::new()).expect("terminal").is_none());
}

#[test]
fn ties_go_to_the_earlier_source_and_secondary_keys_apply() {
    let first = vec![
        row(&[("name", Value::text("ops")), ("owner", Value::text("zed"))]),
        row(&[("name", Value::text("sales")), ("owner", Value::text("amy"))]),
    ];
    let second = vec![
        row(&[("name", Value::text("ops")), ("owner", Value::text("bob"))]),
        row(&[("name", Value::text("sales")), ("owner", Value::text("amy"))]),
    ];
    let mut merge = OrderedMerge::new(
        "union",
        vec![boxed("first", first.clone()), boxed("second", second.clone())],
        vec![SortKey::asc("name"), SortKey::asc("owner")],
    );

    let rows = drain(&mut merge, &mut MemorySession::new());

    assert_eq!(
        rows,
        vec![
            second[0].clone(),
            first[0].clone(),
            first[1].clone(),
            second[1].clone()
        ]
    );
}

#[test]
fn descending_keys_and_nulls_follow_the_canonical_order() {
    let comparator = RowComparator::new(vec![SortKey::desc("key")]);
    assert_eq!(comparator.compare(&keyed("A", 1), &keyed("A", 2)), Ordering::Greater);

    let ascending = RowComparator::new(vec![SortKey::asc("key")]);
    let null = row(&[("source", Value::text("A")), ("key", Value::Null)]);
    let missing = row(&[("source", Value::text("A"))]);
    assert_eq!(ascending.compare(&null, &keyed("A", i64::MIN)), Ordering::Less);
    assert_eq!(ascending.compare(&missing, &null), Ordering::Equal);
}

#[test]
fn empty_sources_never_win() {
    let mut merge = OrderedMerge::new(
        "union",
        vec![
            boxed("empty", Vec::new()),
            boxed("a", vec![keyed("A", 1)]),
            boxed("also-empty", Vec::new()),
        ],
        vec![SortKey::asc("key")],
    );

    let rows = drain(&mut merge, &mut MemorySession::new());

    assert_eq!(labels(&rows), ["A(1)"]);
    assert_eq!(merge.emitted(), 1);
}

#[test]
fn merge_decaches_on_a_fixed_interval() {
    let evens = (0..250).step_by(2).map(|key| keyed("E", key)).collect();
    let odds = (1..250).step_by(2).map(|key| keyed("O", key)).collect();
    let mut session = MemorySession::new();

    let mut merge = OrderedMerge::new(
        "union",
        vec![boxed("even", evens), boxed("odd", odds)],
        vec![SortKey::asc("key")],
    );
    let rows = drain(&mut merge, &mut session);
    assert_eq!(rows.len(), 250);
    assert_eq!(session.stats().decaches, 2);

    let mut session = MemorySession::new();
    let mut merge = OrderedMerge::new("union", vec![boxed("one", vec![keyed("A", 1)])], vec![])
        .with_decache(DecachePolicy::EveryRow);
    let _ = drain(&mut merge, &mut session);
    assert_eq!(session.stats().decaches, 1);
}

fn named_definition(entity: &str) -> Arc<ReportDefinition> {
    Arc::new(
        ReportDefinition::new(
            entity.to_lowercase(),
            Arc::new(EntityModel::new(entity)),
            QuerySpec::new(entity).order_by(OrderTerm::asc("name")),
            vec![ColumnConfig::new("name", "name"), ColumnConfig::new("kind", "kind")],
            &RenderRegistry::with_builtins(),
        )
        .expect("definition"),
    )
}

fn union_session() -> MemorySession {
    MemorySession::new()
        .with_records(
            "Role",
            vec![
                record(json!({ "name": "auditor", "kind": "role" })),
                record(json!({ "name": "admin", "kind": "role" })),
            ],
        )
        .with_records(
            "Account",
            vec![
                record(json!({ "name": "bob", "kind": "account" })),
                record(json!({ "name": "alice", "kind": "account" })),
            ],
        )
}

fn driver_merge() -> OrderedMerge {
    let options = DriverOptions::default().with_decache(DecachePolicy::Never);

    let sources: Vec<Box<dyn RowStream>> = vec![
        Box::new(StreamingDriver::new(named_definition("Role"), options)),
        Box::new(StreamingDriver::new(named_definition("Account"), options)),
    ];

    OrderedMerge::new("Roles and accounts", sources, vec![SortKey::asc("name")])
}

#[test]
fn merge_of_report_drivers_yields_the_sorted_union() {
    let mut session = union_session();
    let mut merge = driver_merge();

    assert_eq!(merge.estimate_row_count(&mut session).expect("estimate"), 4);
    let rows = drain(&mut merge, &mut session);

    let names: Vec<String> = rows
        .iter()
        .map(|row| row.get("name").expect("name").to_string())
        .collect();
    assert_eq!(names, ["admin", "alice", "auditor", "bob"]);
    assert_eq!(
        merge.base_query().map(|base| base.entity),
        Some("Role".to_string())
    );
    assert_eq!(merge.describe(), "Roles and accounts");
}

#[test]
fn source_fault_ends_the_merge() {
    let mut session = union_session().fail_after_opens(1);
    let mut merge = driver_merge();

    let err = merge
        .next_row(&mut session)
        .expect_err("second source open should fail");

    assert!(err.is_persistence());
    assert!(err.message.starts_with("merge source 1"));
    assert!(merge.next_row(&mut session).expect("terminal").is_none());
}

fn arb_partition() -> impl Strategy<Value = (Vec<i64>, Vec<usize>, usize)> {
    (1usize..5).prop_flat_map(|sources| {
        (
            prop::collection::vec(-20i64..20, 0..40),
            prop::collection::vec(0..sources, 40),
            Just(sources),
        )
    })
}

proptest! {
    #[test]
    fn merge_output_is_the_sorted_union((mut universe, assignment, sources) in arb_partition()) {
        universe.sort_unstable();

        let mut partitions: Vec<Vec<MaterializedRow>> = vec![Vec::new(); sources];
        for (idx, key) in universe.iter().enumerate() {
            partitions[assignment[idx]].push(row(&[
                ("key", Value::Int(*key)),
                ("id", Value::Int(i64::try_from(idx).expect("small index"))),
            ]));
        }
        let streams = partitions
            .into_iter()
            .enumerate()
            .map(|(idx, rows)| boxed(&format!("s{idx}"), rows))
            .collect();

        let mut merge = OrderedMerge::new("law", streams, vec![SortKey::asc("key")]);
        let rows = drain(&mut merge, &mut MemorySession::new());

        let keys: Vec<i64> = rows
            .iter()
            .filter_map(|row| match row.get("key") {
                Ok(Value::Int(key)) => Some(*key),
                _ => None,
            })
            .collect();
        prop_assert_eq!(&keys, &universe);

        let mut ids: Vec<i64> = rows
            .iter()
            .filter_map(|row| match row.get("id") {
                Ok(Value::Int(id)) => Some(*id),
                _ => None,
            })
            .collect();
        ids.sort_unstable();
        let expected: Vec<i64> = (0..universe.len())
            .map(|idx| i64::try_from(idx).expect("small index"))
            .collect();
        prop_assert_eq!(ids, expected);
    }
}
