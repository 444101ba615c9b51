use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use thiserror::Error;

use crate::executor::ResultRecord;

pub const REQUIRED_COLUMNS: [&str; 3] = ["role", "pot", "base-prompt"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file_not_found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("missing_columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("csv_error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<BTreeMap<String, String>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Table, LoadError> {
        if !path.exists() {
            return Err(LoadError::FileNotFound(path.to_path_buf()));
        }
        let mut reader = ReaderBuilder::new().from_path(path)?;
        let columns: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|required| !columns.iter().any(|c| c == *required))
            .map(|required| required.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(LoadError::MissingColumns(missing));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row = BTreeMap::new();
            for (idx, column) in columns.iter().enumerate() {
                row.insert(
                    column.clone(),
                    record.get(idx).unwrap_or_default().to_string(),
                );
            }
            rows.push(row);
        }
        Ok(Table { columns, rows })
    }

    pub fn save(&self, path: &Path) -> Result<(), LoadError> {
        let mut writer = WriterBuilder::new().from_path(path)?;
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            let cells: Vec<&str> = self
                .columns
                .iter()
                .map(|column| row.get(column).map(String::as_str).unwrap_or(""))
                .collect();
            writer.write_record(&cells)?;
        }
        writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        self.rows.get(row).and_then(|r| r.get(column)).map(String::as_str)
    }
}

// Output columns are the union across records: the input columns in their
// original order, then every llm_* column in first-seen order. Records that
// lack a column get an empty cell, never a dropped row.
pub fn results_table(input_columns: &[String], records: &[ResultRecord]) -> Table {
    let mut columns: Vec<String> = input_columns.to_vec();
    for record in records {
        for (name, _) in &record.llm {
            if !columns.iter().any(|c| c == name) {
                columns.push(name.clone());
            }
        }
    }

    let mut table = Table::new(columns);
    for record in records {
        let mut row: BTreeMap<String, String> = record.input.clone();
        for (name, value) in &record.llm {
            row.insert(name.clone(), value.clone());
        }
        table.rows.push(row);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::fs;

    fn temp_csv(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "econlab_table_{}_{}_{}.csv",
            name,
            std::process::id(),
            Utc::now().timestamp_micros()
        ));
        fs::write(&path, contents).expect("write temp csv");
        path
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Table::load(Path::new("/nonexistent/econlab-input.csv"))
            .expect_err("load must fail");
        assert!(err.to_string().contains("file_not_found"), "got: {}", err);
    }

    #[test]
    fn load_reports_every_missing_required_column() {
        let path = temp_csv("missing", "model,offer\nphi3:latest,30\n");
        let err = Table::load(&path).expect_err("load must fail");
        let msg = err.to_string();
        assert!(msg.contains("missing_columns"), "got: {}", msg);
        assert!(msg.contains("role"), "got: {}", msg);
        assert!(msg.contains("pot"), "got: {}", msg);
        assert!(msg.contains("base-prompt"), "got: {}", msg);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn load_preserves_extra_columns_and_cells() {
        let path = temp_csv(
            "extra",
            "role,pot,base-prompt,game\nproposer,100,Pot is {pot},ultimatum\n",
        );
        let table = Table::load(&path).expect("load");
        assert_eq!(table.columns, vec!["role", "pot", "base-prompt", "game"]);
        assert_eq!(table.cell(0, "game"), Some("ultimatum"));
        assert_eq!(table.cell(0, "pot"), Some("100"));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn save_then_load_round_trips_columns_and_cells() {
        let mut table = Table::new(vec![
            "role".to_string(),
            "pot".to_string(),
            "base-prompt".to_string(),
            "llm_response".to_string(),
        ]);
        let mut row = BTreeMap::new();
        row.insert("role".to_string(), "receiver".to_string());
        row.insert("pot".to_string(), "100.5".to_string());
        row.insert("base-prompt".to_string(), "You get {offer}".to_string());
        row.insert("llm_response".to_string(), "I accept, thanks".to_string());
        table.rows.push(row);

        let path = std::env::temp_dir().join(format!(
            "econlab_table_roundtrip_{}_{}.csv",
            std::process::id(),
            Utc::now().timestamp_micros()
        ));
        table.save(&path).expect("save");
        let reloaded = Table::load(&path).expect("reload");
        assert_eq!(reloaded.columns, table.columns);
        assert_eq!(reloaded.rows, table.rows);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn results_table_unions_columns_with_empty_cells() {
        let base_columns: Vec<String> = ["role", "pot", "base-prompt"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        let mut input_a = BTreeMap::new();
        input_a.insert("role".to_string(), "proposer".to_string());
        input_a.insert("pot".to_string(), "100".to_string());
        input_a.insert("base-prompt".to_string(), "Pot is {pot}".to_string());
        let mut input_b = BTreeMap::new();
        input_b.insert("role".to_string(), "receiver".to_string());
        input_b.insert("pot".to_string(), "100".to_string());
        input_b.insert("base-prompt".to_string(), "You get {offer}".to_string());
        let records = vec![
            ResultRecord {
                input: input_a,
                llm: vec![
                    ("llm_status".to_string(), "ok".to_string()),
                    ("llm_response".to_string(), "fifty-fifty".to_string()),
                ],
            },
            ResultRecord {
                input: input_b,
                llm: vec![
                    ("llm_status".to_string(), "error".to_string()),
                    ("llm_error".to_string(), "engine_transport: refused".to_string()),
                ],
            },
        ];
        let table = results_table(&base_columns, &records);
        assert_eq!(
            table.columns,
            vec![
                "role",
                "pot",
                "base-prompt",
                "llm_status",
                "llm_response",
                "llm_error"
            ]
        );
        assert_eq!(table.cell(0, "llm_error"), None);
        assert_eq!(table.cell(1, "llm_status"), Some("error"));

        let path = std::env::temp_dir().join(format!(
            "econlab_table_union_{}_{}.csv",
            std::process::id(),
            Utc::now().timestamp_micros()
        ));
        table.save(&path).expect("save");
        let reloaded = Table::load(&path).expect("reload");
        // the gap materializes as an empty cell, not a dropped row
        assert_eq!(reloaded.cell(0, "llm_error"), Some(""));
        assert_eq!(reloaded.rows.len(), 2);
        let _ = fs::remove_file(path);
    }
}
