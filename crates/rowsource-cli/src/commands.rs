use crate::{cli::OutputFormat, output::RowWriter};
use anyhow::Context;
use rowsource_config::Report;
use rowsource_core::{query::Window, session::MemorySession, source::ProgressSink, value::Value};
use std::{collections::BTreeMap, fs, io::Write, path::Path, sync::Arc};
use tracing::info;

///
/// LogProgress
///

struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_progress(&self, message: &str, percent: Option<u8>) {
        match percent {
            Some(percent) => info!(percent, "{message}"),
            None => info!("{message}"),
        }
    }
}

/// Load a JSON fixture of `{ "Entity": [record, ...] }` into a session.
pub fn load_session(path: &Path) -> anyhow::Result<MemorySession> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read data file '{}'", path.display()))?;
    let entities: BTreeMap<String, Vec<Value>> = serde_json::from_str(&text)
        .with_context(|| format!("data file '{}' is not an entity map", path.display()))?;

    Ok(MemorySession::from_entities(entities))
}

pub fn plan(report: &Report, out: &mut impl Write) -> anyhow::Result<()> {
    writeln!(out, "report {}", report.name())?;

    for source in report.sources() {
        let definition = &source.definition;
        writeln!(
            out,
            "source {} ({}) fingerprint {}",
            definition.name(),
            definition.query().entity,
            definition.fingerprint()
        )?;
        writeln!(out, "  fields: {}", definition.fields().join(", "))?;
        writeln!(out, "  fetch:  {}", definition.plan().join(", "))?;
        if let Some(filter) = &source.row_filter {
            writeln!(out, "  row filter: {filter:?}")?;
        }
    }

    if let Some(merge) = report.merge() {
        let keys: Vec<String> = merge
            .keys
            .iter()
            .map(|key| format!("{} {}", key.field, key.direction))
            .collect();
        writeln!(out, "merge by {}", keys.join(", "))?;
    }

    Ok(())
}

pub fn count(
    report: &Report,
    session: &mut MemorySession,
    window: Window,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let mut source = report.data_source(window)?;

    let estimate = source.estimate_row_count(session)?;
    source.close();
    writeln!(out, "{estimate}")?;

    Ok(())
}

pub fn run<W: Write>(
    report: &Report,
    session: &mut MemorySession,
    window: Window,
    format: OutputFormat,
    out: W,
) -> anyhow::Result<W> {
    let mut source = report.data_source(window)?;
    source.set_progress_sink(Arc::new(LogProgress));

    let mut writer = RowWriter::new(out, format);
    while source.advance(session)? {
        if let Some(row) = source.current_row() {
            writer.write_row(row)?;
        }
    }

    let stats = session.stats();
    info!(
        report = report.name(),
        rows = source.rows_read(),
        opens = stats.opens,
        decaches = stats.decaches,
        "report finished"
    );

    Ok(writer.finish()?)
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use rowsource_core::materialize::RenderRegistry;

    const REPORT: &str = r#"
name = "items"

[[sources]]
entity = "Item"
order = [{ path = "seq", direction = "desc" }]
columns = [
    { field = "seq", property = "seq" },
    { field = "label", property = "name", render = "upper" },
]
"#;

    fn report() -> Report {
        rowsource_config::from_str(REPORT, &RenderRegistry::with_builtins()).expect("report")
    }

    fn session() -> MemorySession {
        let entities: BTreeMap<String, Vec<Value>> = serde_json::from_str(
            r#"{ "Item": [
                { "seq": 1, "name": "one" },
                { "seq": 2, "name": "two" },
                { "seq": 3, "name": "three" }
            ] }"#,
        )
        .expect("fixture");

        MemorySession::from_entities(entities)
    }

    #[test]
    fn plan_lists_fields_and_fetch_paths() {
        let mut out = Vec::new();
        plan(&report(), &mut out).expect("plan");
        let text = String::from_utf8(out).expect("utf8");

        assert!(text.starts_with("report items\nsource items (Item) fingerprint "));
        assert!(text.contains("  fields: seq, label\n"));
        assert!(text.contains("  fetch:  seq, name\n"));
        assert!(!text.contains("merge by"));
    }

    #[test]
    fn count_respects_the_window() {
        let mut out = Vec::new();
        count(&report(), &mut session(), Window::new(1, None), &mut out).expect("count");

        assert_eq!(String::from_utf8(out).expect("utf8"), "2\n");
    }

    #[test]
    fn run_streams_rendered_rows_in_query_order() {
        let mut session = session();
        let out = run(
            &report(),
            &mut session,
            Window::new(0, Some(2)),
            OutputFormat::Json,
            Vec::new(),
        )
        .expect("run");

        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "{\"seq\":3,\"label\":\"THREE\"}\n{\"seq\":2,\"label\":\"TWO\"}\n"
        );
        assert_eq!(session.stats().decaches, 2);
    }

    #[test]
    fn missing_data_file_names_the_path() {
        let err = load_session(Path::new("/nonexistent/rowsource/data.json"))
            .expect_err("missing file");

        assert!(err.to_string().contains("/nonexistent/rowsource/data.json"));
    }
}
