use crate::{
    materialize::MaterializedRow,
    model::{EntityModel, FieldKind},
    obs::{ReportTraceEvent, ReportTraceSink},
    session::{MemorySession, Session},
    source::ProgressSink,
    stream::RowStream,
    value::Value,
};
use serde_json::json;
use std::sync::Mutex;

pub(crate) fn identity_model() -> EntityModel {
    EntityModel::new("Identity")
        .with_field("id", FieldKind::Scalar)
        .with_field("name", FieldKind::Scalar)
        .with_field("department", FieldKind::Scalar)
        .with_field("manager", FieldKind::Reference)
        .with_extended_attributes("attributes")
}

pub(crate) fn entitlement_model() -> EntityModel {
    EntityModel::new("Entitlement")
        .with_field("identity", FieldKind::Scalar)
        .with_field("application", FieldKind::Scalar)
        .with_field("role", FieldKind::Scalar)
}

pub(crate) fn record(value: serde_json::Value) -> Value {
    serde_json::from_value(value).expect("fixture record should deserialize")
}

pub(crate) fn identity_records() -> Vec<Value> {
    vec![
        record(json!({
            "id": "i-1", "name": "Alice", "department": "eng",
            "attributes": { "region": "emea", "costCenter": "cc-1" }
        })),
        record(json!({
            "id": "i-2", "name": "Bob", "department": "eng",
            "manager": { "id": "i-1", "name": "Alice" },
            "attributes": { "region": "amer" }
        })),
        record(json!({
            "id": "i-3", "name": "Carol", "department": "finance",
            "manager": { "id": "m-1" },
            "attributes": {}
        })),
        record(json!({
            "id": "i-4", "name": "Dave", "department": "ops",
            "manager": { "id": "i-3", "name": "Carol" },
            "attributes": { "region": "  " }
        })),
        record(json!({
            "id": "i-5", "name": "Aaron", "department": "finance"
        })),
    ]
}

pub(crate) fn entitlement_records() -> Vec<Value> {
    vec![
        record(json!({ "identity": "i-1", "application": "ad", "role": "admin" })),
        record(json!({ "identity": "i-1", "application": "ad", "role": "user" })),
        record(json!({ "identity": "i-2", "application": "ad", "role": null })),
        record(json!({ "identity": "i-1", "application": "hr", "role": "admin" })),
        record(json!({ "identity": "i-2", "application": "hr", "role": "user" })),
        record(json!({ "identity": null, "application": "hr", "role": "orphan" })),
    ]
}

pub(crate) fn identity_session() -> MemorySession {
    MemorySession::new()
        .with_records("Identity", identity_records())
        .with_records("Entitlement", entitlement_records())
}

/// `count` records of entity `Item` with `seq` 0..count and `name` "item-NNNN".
pub(crate) fn numbered_session(count: i64) -> MemorySession {
    let records = (0..count)
        .map(|seq| record(json!({ "seq": seq, "name": format!("item-{seq:04}") })))
        .collect();

    MemorySession::new().with_records("Item", records)
}

pub(crate) fn row(pairs: &[(&str, Value)]) -> MaterializedRow {
    MaterializedRow::from_pairs(pairs.iter().map(|(k, v)| (*k, v.clone())))
        .expect("fixture row should build")
}

pub(crate) fn drain<S: RowStream + ?Sized>(
    stream: &mut S,
    session: &mut dyn Session,
) -> Vec<MaterializedRow> {
    let mut rows = Vec::new();
    while let Some(row) = stream.next_row(session).expect("stream should not fail") {
        rows.push(row);
    }
    rows
}

///
/// CollectingProgress
///

#[derive(Debug, Default)]
pub(crate) struct CollectingProgress {
    pub(crate) updates: Mutex<Vec<(String, Option<u8>)>>,
}

impl CollectingProgress {
    pub(crate) fn updates(&self) -> Vec<(String, Option<u8>)> {
        self.updates.lock().expect("progress lock").clone()
    }
}

impl ProgressSink for CollectingProgress {
    fn on_progress(&self, message: &str, percent: Option<u8>) {
        self.updates
            .lock()
            .expect("progress lock")
            .push((message.to_string(), percent));
    }
}

///
/// CollectingTrace
///

#[derive(Debug, Default)]
pub(crate) struct CollectingTrace {
    pub(crate) events: Mutex<Vec<ReportTraceEvent>>,
}

impl CollectingTrace {
    pub(crate) fn events(&self) -> Vec<ReportTraceEvent> {
        self.events.lock().expect("trace lock").clone()
    }
}

impl ReportTraceSink for CollectingTrace {
    fn on_event(&self, event: ReportTraceEvent) {
        self.events.lock().expect("trace lock").push(event);
    }
}
