use crate::archive::dates::CatalogRecord;
use crate::archive::month::MonthKey;
use crate::archive::util::write_atomic;
use crate::error::SyncError;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

pub const HEADER: [&str; 4] = ["date", "month_key", "item_id", "filename"];

/// Date catalog keyed by (month, item id).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    records: BTreeMap<(MonthKey, String), CatalogRecord>,
}

struct Columns {
    date: usize,
    month: usize,
    item: usize,
    filename: usize,
}

impl Columns {
    fn from_header(fields: &[String]) -> Option<Self> {
        let find = |names: &[&str]| fields.iter().position(|f| names.contains(&f.trim()));
        Some(Self {
            date: find(&["date"])?,
            month: find(&["month_key", "yyyymm"])?,
            item: find(&["item_id", "image_id"])?,
            filename: find(&["filename"])?,
        })
    }
}

fn split_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

fn quote_field(field: &str) -> String {
    if field.contains([',', '"']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

impl Catalog {
    /// Absent file is an empty catalog; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw =
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Self::parse(path, &raw)?)
    }

    fn parse(path: &Path, raw: &str) -> Result<Self, SyncError> {
        let corrupt = |line: usize, reason: String| SyncError::CatalogCorrupt {
            path: path.to_path_buf(),
            line,
            reason,
        };

        let mut lines = raw
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim_end_matches('\r')))
            .filter(|(_, l)| !l.trim().is_empty());
        let Some((header_line, header)) = lines.next() else {
            return Ok(Self::default());
        };
        let columns = Columns::from_header(&split_row(header))
            .ok_or_else(|| corrupt(header_line, format!("unrecognised header `{header}`")))?;
        let width = [columns.date, columns.month, columns.item, columns.filename]
            .into_iter()
            .max()
            .unwrap_or(0);

        let mut catalog = Self::default();
        for (line_no, line) in lines {
            let fields = split_row(line);
            if fields.len() <= width {
                return Err(corrupt(line_no, format!("expected {} columns", width + 1)));
            }
            let date = NaiveDate::parse_from_str(fields[columns.date].trim(), "%Y-%m-%d")
                .map_err(|err| corrupt(line_no, format!("bad date: {err}")))?;
            let month: MonthKey = fields[columns.month]
                .parse()
                .map_err(|err: SyncError| corrupt(line_no, err.to_string()))?;
            let item_id = fields[columns.item].trim().to_string();
            if item_id.is_empty() {
                return Err(corrupt(line_no, "empty item id".to_string()));
            }
            catalog.insert(CatalogRecord {
                date,
                month,
                item_id,
                filename: fields[columns.filename].trim().to_string(),
            });
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, record: CatalogRecord) {
        self.records
            .insert((record.month, record.item_id.clone()), record);
    }

    /// Drop every record of `month`, then insert `fresh`. No stale row survives.
    pub fn replace_month(&mut self, month: MonthKey, fresh: Vec<CatalogRecord>) -> usize {
        let before = self.records.len();
        self.records.retain(|(m, _), _| *m != month);
        let purged = before - self.records.len();
        for record in fresh {
            self.insert(record);
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn month_count(&self, month: MonthKey) -> usize {
        self.records.keys().filter(|(m, _)| *m == month).count()
    }

    pub fn months(&self) -> BTreeSet<MonthKey> {
        self.records.keys().map(|(m, _)| *m).collect()
    }

    /// Records whose month is in `window`, in date order.
    pub fn in_window(&self, window: &BTreeSet<MonthKey>) -> Vec<&CatalogRecord> {
        let mut out: Vec<&CatalogRecord> = self
            .records
            .values()
            .filter(|r| window.contains(&r.month))
            .collect();
        out.sort_by(|a, b| (a.date, a.month, &a.item_id).cmp(&(b.date, b.month, &b.item_id)));
        out
    }

    pub fn find_by_date(&self, date: NaiveDate) -> Option<&CatalogRecord> {
        self.records.values().find(|r| r.date == date)
    }

    pub fn render(&self) -> String {
        let all: BTreeSet<MonthKey> = self.months();
        let mut out = HEADER.join(",");
        out.push('\n');
        for record in self.in_window(&all) {
            let row = [
                record.date.format("%Y-%m-%d").to_string(),
                record.month.to_string(),
                quote_field(&record.item_id),
                quote_field(&record.filename),
            ];
            out.push_str(&row.join(","));
            out.push('\n');
        }
        out
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, self.render().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::dates::assign_dates;
    use tempfile::tempdir;

    fn mk(raw: &str) -> MonthKey {
        raw.parse().expect("month")
    }

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> Catalog {
        let mut catalog = Catalog::default();
        catalog.replace_month(
            mk("202412"),
            assign_dates(mk("202412"), &ids(&["Dec2", "Dec1"])).expect("dec"),
        );
        catalog.replace_month(
            mk("202501"),
            assign_dates(mk("202501"), &ids(&["Jan3", "Jan2", "Jan1"])).expect("jan"),
        );
        catalog
    }

    #[test]
    fn save_then_load_round_trips() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("image_dates.csv");
        let catalog = sample();
        catalog.save(&path).expect("save");
        let loaded = Catalog::load(&path).expect("load");
        assert_eq!(loaded, catalog);
    }

    #[test]
    fn saved_rows_are_sorted_by_date() {
        let rendered = sample().render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "date,month_key,item_id,filename");
        assert_eq!(lines[1], "2024-12-01,202412,Dec1,202412_Dec1.jpg");
        assert_eq!(lines[5], "2025-01-03,202501,Jan3,202501_Jan3.jpg");
    }

    #[test]
    fn refetched_month_replaces_all_prior_rows() {
        let mut catalog = sample();
        let purged = catalog.replace_month(
            mk("202501"),
            assign_dates(mk("202501"), &ids(&["Jan4", "Jan3b", "Jan2", "Jan1"])).expect("jan"),
        );
        assert_eq!(purged, 3);
        assert_eq!(catalog.month_count(mk("202501")), 4);
        assert_eq!(catalog.month_count(mk("202412")), 2);
        let jan: BTreeSet<MonthKey> = [mk("202501")].into_iter().collect();
        let got: Vec<&str> = catalog
            .in_window(&jan)
            .iter()
            .map(|r| r.item_id.as_str())
            .collect();
        assert_eq!(got, vec!["Jan1", "Jan2", "Jan3b", "Jan4"]);
    }

    #[test]
    fn missing_file_is_empty_catalog() {
        let tmp = tempdir().expect("tempdir");
        let loaded = Catalog::load(&tmp.path().join("absent.csv")).expect("load");
        assert_eq!(loaded.len(), 0);
    }

    #[test]
    fn legacy_header_is_accepted() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("image_dates.csv");
        fs::write(
            &path,
            "date,yyyymm,image_id,filename\n2025-01-01,202501,Jan1,202501_Jan1.jpg\n",
        )
        .expect("write");
        let loaded = Catalog::load(&path).expect("load");
        assert_eq!(loaded.len(), 1);
        let day = NaiveDate::from_ymd_opt(2025, 1, 1).expect("date");
        assert_eq!(loaded.find_by_date(day).expect("row").item_id, "Jan1");
    }

    #[test]
    fn malformed_row_is_reported_with_line_number() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("image_dates.csv");
        fs::write(
            &path,
            "date,month_key,item_id,filename\n2025-01-01,202501,Jan1,202501_Jan1.jpg\nnot-a-date,202501,X,x.jpg\n",
        )
        .expect("write");
        let err = Catalog::load(&path).expect_err("malformed");
        match err.downcast_ref::<SyncError>() {
            Some(SyncError::CatalogCorrupt { line, .. }) => assert_eq!(*line, 3),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn quoted_fields_survive() {
        assert_eq!(split_row(r#"a,"b,c","d""e""#), vec!["a", "b,c", "d\"e"]);
        assert_eq!(quote_field("b,c"), "\"b,c\"");
    }
}
