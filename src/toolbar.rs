use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use crate::table::DisplayTable;

pub const EXPORT_FILE_NAME: &str = "analysis_export.csv";
pub const CSV_MIME: &str = "text/csv;charset=utf-8;";

#[derive(Debug, Default, Clone)]
pub struct TableToolbar {
    query: String,
}

impl TableToolbar {
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn push_char(&mut self, ch: char) {
        self.query.push(ch);
    }

    pub fn pop_char(&mut self) {
        self.query.pop();
    }

    pub fn clear(&mut self) {
        self.query.clear();
    }

    pub fn filter<'a>(&self, tables: impl IntoIterator<Item = &'a mut DisplayTable>) {
        for table in tables {
            table.apply_filter(&self.query);
        }
    }

    pub fn export_csv(
        &self,
        analysis: Option<&DisplayTable>,
        export_dir: &Path,
    ) -> Result<PathBuf> {
        let table = analysis.ok_or_else(|| anyhow!("there is no analysis table to export"))?;
        if !export_dir.as_os_str().is_empty() {
            fs::create_dir_all(export_dir)
                .with_context(|| format!("creating {}", export_dir.display()))?;
        }
        let path = export_dir.join(EXPORT_FILE_NAME);
        fs::write(&path, table.to_csv().as_bytes())
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{ColumnAlign, TableCell, TableId};

    fn table(id: TableId, rows: &[&str]) -> DisplayTable {
        let mut table = DisplayTable::new(id, &[("value", ColumnAlign::Left)]);
        for row in rows {
            table.push_row(vec![TableCell::plain(*row)]);
        }
        table
    }

    #[test]
    fn filter_applies_to_every_table() {
        let mut analysis = table(TableId::Analysis, &["BTC 3", "eth 4"]);
        let mut positions = table(TableId::Positions, &["btc/usd", "ETH/USD", "xBTCx"]);
        let mut toolbar = TableToolbar::default();
        for ch in "BtC".chars() {
            toolbar.push_char(ch);
            toolbar.filter([&mut analysis, &mut positions]);
        }
        assert_eq!(analysis.visible_count(), 1);
        assert_eq!(positions.visible_count(), 2);

        toolbar.clear();
        toolbar.filter([&mut analysis, &mut positions]);
        assert_eq!(analysis.visible_count(), 2);
        assert_eq!(positions.visible_count(), 3);
    }

    #[test]
    fn export_writes_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut analysis = DisplayTable::new(
            TableId::Analysis,
            &[
                ("hour_utc", ColumnAlign::Right),
                ("avg_volume", ColumnAlign::Right),
                ("avg_range", ColumnAlign::Right),
            ],
        );
        analysis.push_row(vec![
            TableCell::plain("3"),
            TableCell::plain("120.5"),
            TableCell::plain("0.02"),
        ]);
        let path = TableToolbar::default()
            .export_csv(Some(&analysis), dir.path())
            .unwrap();
        assert_eq!(path.file_name().unwrap(), EXPORT_FILE_NAME);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "\"hour_utc\",\"avg_volume\",\"avg_range\"\n\"3\",\"120.5\",\"0.02\"\n"
        );
    }

    #[test]
    fn export_without_analysis_table_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let err = TableToolbar::default()
            .export_csv(None, dir.path())
            .unwrap_err();
        assert!(err.to_string().contains("no analysis table"));
        assert!(!dir.path().join(EXPORT_FILE_NAME).exists());
    }
}
