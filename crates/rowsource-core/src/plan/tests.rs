use crate::{
    model::{EntityModel, FieldKind},
    plan::ProjectionPlan,
    query::ColumnConfig,
};
use proptest::prelude::*;

fn identity_model() -> EntityModel {
    EntityModel::new("Identity")
        .with_field("id", FieldKind::Scalar)
        .with_field("name", FieldKind::Scalar)
        .with_field("manager", FieldKind::Reference)
        .with_extended_attributes("attributes")
}

#[test]
fn plan_keeps_first_seen_order_and_drops_duplicates() {
    let columns = vec![
        ColumnConfig::new("name", "name"),
        ColumnConfig::new("mgr", "manager.name").if_empty("manager.id"),
        ColumnConfig::new("again", "name"),
        ColumnConfig::derived("label", "coalesce")
            .script_argument("manager.id")
            .script_argument("id"),
    ];

    let plan = ProjectionPlan::plan(&identity_model(), &columns);

    assert_eq!(
        plan.columns(),
        ["name", "manager.name", "manager.id", "id"].map(String::from)
    );
}

#[test]
fn plan_fetches_shared_attribute_container_once() {
    let columns = vec![
        ColumnConfig::new("dept", "attributes.department"),
        ColumnConfig::new("region", "attributes.region"),
        ColumnConfig::new("cost", "costCenter"),
    ];

    let plan = ProjectionPlan::plan(&identity_model(), &columns);

    assert_eq!(plan.columns(), ["attributes".to_string()]);
    assert_eq!(plan.position("attributes"), Some(0));
}

#[test]
fn open_model_fetches_the_attributes_root_once() {
    let columns = vec![
        ColumnConfig::new("a", "attributes.a"),
        ColumnConfig::new("b", "attributes.b"),
        ColumnConfig::new("name", "name"),
    ];

    let plan = ProjectionPlan::plan(&EntityModel::new("Identity"), &columns);

    assert_eq!(plan.columns(), ["attributes", "name"].map(String::from));
}

#[test]
fn plan_fetches_sub_query_key_instead_of_property() {
    let columns = vec![
        ColumnConfig::new("name", "name"),
        ColumnConfig::new("roles", "assignedRole").sub_query("id"),
    ];

    let plan = ProjectionPlan::plan(&identity_model(), &columns);

    assert_eq!(plan.columns(), ["name", "id"].map(String::from));
    assert_eq!(plan.position("assignedRole"), None);
}

fn arb_path() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("id".to_string()),
        Just("name".to_string()),
        Just("manager.name".to_string()),
        Just("manager.id".to_string()),
        "attributes\\.[a-c]",
        "[x-z]",
    ]
}

fn arb_column(idx: usize) -> impl Strategy<Value = ColumnConfig> {
    (
        arb_path(),
        proptest::option::of(arb_path()),
        prop::collection::vec(arb_path(), 0..3),
        any::<bool>(),
    )
        .prop_map(move |(property, fallback, args, sub_query)| {
            let mut column = ColumnConfig::new(format!("f{idx}"), property);
            if sub_query {
                column = column.sub_query("id");
            } else if let Some(fallback) = fallback {
                column = column.if_empty(fallback);
            }
            column.script_arguments = args;
            column
        })
}

fn arb_columns() -> impl Strategy<Value = Vec<ColumnConfig>> {
    (1usize..6).prop_flat_map(|len| {
        (0..len)
            .map(arb_column)
            .collect::<Vec<_>>()
    })
}

proptest! {
    #[test]
    fn plan_covers_every_consumed_property_exactly_once(columns in arb_columns()) {
        let model = identity_model();
        let plan = ProjectionPlan::plan(&model, &columns);

        for (idx, column) in plan.columns().iter().enumerate() {
            prop_assert_eq!(plan.position(column), Some(idx));
        }

        for column in &columns {
            let mut consumed = Vec::new();
            match (&column.sub_query_key, &column.property) {
                (Some(key), _) => consumed.push(key.clone()),
                (None, Some(property)) => consumed.push(property.clone()),
                (None, None) => {}
            }
            consumed.extend(column.if_empty_property.clone());
            consumed.extend(column.script_arguments.clone());

            for path in consumed {
                let fetch = model.resolve(&path).fetch_path().to_string();
                prop_assert!(plan.position(&fetch).is_some(), "missing fetch path {}", fetch);
            }
        }
    }
}
