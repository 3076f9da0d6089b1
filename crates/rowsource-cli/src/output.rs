use crate::cli::OutputFormat;
use rowsource_core::{materialize::MaterializedRow, value::Value};
use std::io::{self, Write};

///
/// RowWriter
///
/// Writes materialized rows in one output format. The text format prints a
/// header from the first row's fields.
///

pub struct RowWriter<W: Write> {
    out: W,
    format: OutputFormat,
    header_written: bool,
}

impl<W: Write> RowWriter<W> {
    pub const fn new(out: W, format: OutputFormat) -> Self {
        Self {
            out,
            format,
            header_written: false,
        }
    }

    pub fn write_row(&mut self, row: &MaterializedRow) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_writer(&mut self.out, row)?;
                writeln!(self.out)?;
            }
            OutputFormat::Text => {
                if !self.header_written {
                    writeln!(self.out, "{}", row.fields().join("\t"))?;
                    self.header_written = true;
                }
                let cells: Vec<String> = row.values().iter().map(text_cell).collect();
                writeln!(self.out, "{}", cells.join("\t"))?;
            }
        }

        Ok(())
    }

    pub fn finish(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

// tabs and newlines would break the column layout
fn text_cell(value: &Value) -> String {
    value.to_string().replace(['\t', '\n', '\r'], " ")
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<MaterializedRow> {
        vec![
            MaterializedRow::from_pairs([
                ("name", Value::text("Alice")),
                ("tags", Value::List(vec![Value::text("a"), Value::text("b")])),
            ])
            .expect("row"),
            MaterializedRow::from_pairs([
                ("name", Value::text("Bob\tJr")),
                ("tags", Value::Null),
            ])
            .expect("row"),
        ]
    }

    fn render(format: OutputFormat) -> String {
        let mut writer = RowWriter::new(Vec::new(), format);
        for row in rows() {
            writer.write_row(&row).expect("write");
        }
        String::from_utf8(writer.finish().expect("flush")).expect("utf8")
    }

    #[test]
    fn json_lines_keep_field_order() {
        assert_eq!(
            render(OutputFormat::Json),
            "{\"name\":\"Alice\",\"tags\":[\"a\",\"b\"]}\n{\"name\":\"Bob\\tJr\",\"tags\":null}\n"
        );
    }

    #[test]
    fn text_output_has_one_header_and_flattened_cells() {
        assert_eq!(
            render(OutputFormat::Text),
            "name\ttags\nAlice\ta, b\nBob Jr\t\n"
        );
    }
}
