//! Result printing for CLI commands: aligned key/value rows or JSON.

use std::io::Write;

use serde::Serialize;

pub type OutputRow = Vec<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Aligned `key  value` rows.
    #[default]
    Table,
    Json,
}

pub struct Printer<W: Write = Box<dyn Write>> {
    out: W,
    format: OutputFormat,
}

impl Printer<Box<dyn Write>> {
    pub fn stdout(format: OutputFormat) -> Self {
        Self::new(Box::new(std::io::stdout()), format)
    }
}

impl<W: Write> Printer<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self { out, format }
    }

    /// Print `value`. Table mode renders its top-level fields as rows.
    pub fn print<T: Serialize>(&mut self, value: &T) -> std::io::Result<()> {
        let json = serde_json::to_value(value).map_err(std::io::Error::other)?;
        match self.format {
            OutputFormat::Json => {
                let text = serde_json::to_string_pretty(&json).map_err(std::io::Error::other)?;
                writeln!(self.out, "{text}")
            }
            OutputFormat::Table => {
                let rows: Vec<OutputRow> = match json {
                    serde_json::Value::Object(map) => map
                        .into_iter()
                        .map(|(k, v)| vec![k, plain(&v)])
                        .collect(),
                    other => vec![vec![plain(&other)]],
                };
                self.print_rows(&rows)
            }
        }
    }

    fn print_rows(&mut self, rows: &[OutputRow]) -> std::io::Result<()> {
        const SEPARATOR: &str = "  ";
        let width = rows
            .iter()
            .filter(|r| r.len() > 1)
            .map(|r| r[0].len())
            .max()
            .unwrap_or(0);
        for row in rows {
            match row.as_slice() {
                [key, rest @ ..] if !rest.is_empty() => {
                    writeln!(self.out, "{key:<width$}{SEPARATOR}{}", rest.join(SEPARATOR))?
                }
                cells => writeln!(self.out, "{}", cells.join(SEPARATOR))?,
            }
        }
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn plain(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "-".to_owned(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Uploaded {
        group_name: &'static str,
        remote_file_id: &'static str,
        size: u64,
    }

    const UPLOADED: Uploaded = Uploaded {
        group_name: "group1",
        remote_file_id: "group1:M00/00/00/a.txt",
        size: 5,
    };

    #[test]
    fn test_table() {
        let mut p = Printer::new(Vec::new(), OutputFormat::Table);
        p.print(&UPLOADED).unwrap();
        let text = String::from_utf8(p.into_inner()).unwrap();
        assert_eq!(
            text,
            "group_name      group1\nremote_file_id  group1:M00/00/00/a.txt\nsize            5\n"
        );
    }

    #[test]
    fn test_json() {
        let mut p = Printer::new(Vec::new(), OutputFormat::Json);
        p.print(&UPLOADED).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&p.into_inner()).unwrap();
        assert_eq!(value["remote_file_id"], "group1:M00/00/00/a.txt");
        assert_eq!(value["size"], 5);
    }

    #[test]
    fn test_scalar() {
        let mut p = Printer::new(Vec::new(), OutputFormat::Table);
        p.print(&"deleted").unwrap();
        assert_eq!(p.into_inner(), b"deleted\n");
    }
}
