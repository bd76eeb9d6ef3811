// Reads an invoice export into raw sheet rows.
//
// `.csv` goes through the `csv` crate, `.xlsx`/`.xls` through `calamine`.
// The first row is the header; blank rows are skipped.
use std::io::Read;
use std::path::Path;

use calamine::{open_workbook_auto, Reader};
use csv::ReaderBuilder;
use tracing::{info, warn};

use crate::error::{ReconError, Result};
use crate::types::{columns, RawInvoiceLine};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub blank_rows: usize,
    /// Expected columns absent from the header.
    pub missing_columns: Vec<String>,
}

pub fn load_sheet(path: &Path) -> Result<(Vec<RawInvoiceLine>, LoadReport)> {
    if !path.exists() {
        return Err(ReconError::FileNotFound(path.display().to_string()));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    let (headers, records) = match ext.as_str() {
        "csv" => read_csv_table(std::fs::File::open(path)?)?,
        "xlsx" | "xls" => read_workbook_table(path)?,
        _ => return Err(ReconError::UnsupportedFormat(ext)),
    };
    let (lines, report) = build_lines(&headers, records);
    info!(
        path = %path.display(),
        rows = report.total_rows,
        blank = report.blank_rows,
        "invoice sheet loaded"
    );
    Ok((lines, report))
}

/// Parse CSV text from any reader.
pub fn read_csv<R: Read>(reader: R) -> Result<(Vec<RawInvoiceLine>, LoadReport)> {
    let (headers, records) = read_csv_table(reader)?;
    Ok(build_lines(&headers, records))
}

fn read_csv_table<R: Read>(reader: R) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut records = Vec::new();
    for result in rdr.records() {
        let record = result?;
        records.push(record.iter().map(|v| v.trim().to_string()).collect::<Vec<_>>());
    }
    Ok((headers, records))
}

fn read_workbook_table(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ReconError::Excel("workbook has no sheets".to_string()))?;
    let range = workbook.worksheet_range(&sheet_name)?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| ReconError::Excel(format!("sheet '{sheet_name}' is empty")))?
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .collect();
    let records = rows
        .map(|row| row.iter().map(|cell| cell.to_string().trim().to_string()).collect::<Vec<_>>())
        .collect();
    Ok((headers, records))
}

fn build_lines(headers: &[String], records: Vec<Vec<String>>) -> (Vec<RawInvoiceLine>, LoadReport) {
    let missing_columns: Vec<String> = columns::EXPECTED
        .iter()
        .filter(|c| !headers.iter().any(|h| h.as_str() == **c))
        .map(|c| c.to_string())
        .collect();
    if !missing_columns.is_empty() {
        warn!(missing = ?missing_columns, "invoice sheet is missing expected columns");
    }

    let mut report = LoadReport {
        missing_columns,
        ..LoadReport::default()
    };
    let mut lines = Vec::with_capacity(records.len());
    for record in records {
        let line: RawInvoiceLine = headers
            .iter()
            .zip(record)
            .filter(|(h, _)| !h.is_empty())
            .map(|(h, v)| (h.clone(), v))
            .collect();
        if line.values().all(|v| v.is_empty()) {
            report.blank_rows += 1;
            continue;
        }
        lines.push(line);
    }
    report.total_rows = lines.len();
    (lines, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "Customer Group,Customer Name,Customer No.,Customer ABN,Service Description,\
Contract Unit Price,Waste Kg,Excess kg,Charge excl GST,Task Site Name";

    #[test]
    fn csv_rows_become_column_maps() {
        let text = format!(
            "{HEADER}\nEASTERN HEALTH,Eastern Health,EH0001,68 223 819 017,Clinical 660L,\"$128.93\",49,0,128.93,Box Hill\n,,,,,,,,,\n"
        );
        let (lines, report) = read_csv(text.as_bytes()).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(report.total_rows, 1);
        assert_eq!(report.blank_rows, 1);
        assert!(report.missing_columns.is_empty());
        assert_eq!(lines[0].get("Task Site Name").map(String::as_str), Some("Box Hill"));
        assert_eq!(lines[0].get("Contract Unit Price").map(String::as_str), Some("$128.93"));
    }

    #[test]
    fn short_rows_and_missing_columns_are_tolerated() {
        let (lines, report) = read_csv("Service Description,Waste Kg\nClinical 240L\n".as_bytes()).unwrap();
        assert_eq!(lines.len(), 1);
        assert!(!lines[0].contains_key("Waste Kg"));
        assert!(report.missing_columns.contains(&"Charge excl GST".to_string()));
    }

    #[test]
    fn load_sheet_reads_csv_file() {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        writeln!(file, "{HEADER}").unwrap();
        writeln!(file, "G,N,1,2,Clinical 660L,1,2,3,4,Box Hill").unwrap();
        let (lines, _) = load_sheet(file.path()).unwrap();
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn load_sheet_reads_xlsx_workbook() {
        use rust_xlsxwriter::Workbook;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoices.xlsx");
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, name) in columns::EXPECTED.iter().enumerate() {
            sheet.write_string(0, col as u16, *name).unwrap();
        }
        let text = [
            (0, "EASTERN HEALTH"),
            (1, "Eastern Health"),
            (2, "EH0001"),
            (3, "68 223 819 017"),
            (4, "Clinical Waste 660L"),
            (9, "Box Hill"),
        ];
        let numbers = [(5, 128.93), (6, 49.0), (7, 0.0), (8, 128.93)];
        // Row 2 stays empty; row 3 carries the data.
        for (col, value) in text {
            sheet.write_string(2, col, value).unwrap();
        }
        for (col, value) in numbers {
            sheet.write_number(2, col, value).unwrap();
        }
        workbook.save(&path).unwrap();

        let (lines, report) = load_sheet(&path).unwrap();
        assert_eq!(report.total_rows, 1);
        assert_eq!(report.blank_rows, 1);
        assert!(report.missing_columns.is_empty());
        let get = |key: &str| lines[0].get(key).map(String::as_str);
        assert_eq!(get(columns::WASTE_KG), Some("49"));
        assert_eq!(get(columns::EXCESS_KG), Some("0"));
        assert_eq!(get(columns::CHARGE), Some("128.93"));
        assert_eq!(get(columns::CUSTOMER_NUMBER), Some("EH0001"));
        assert_eq!(get(columns::SITE_NAME), Some("Box Hill"));

        let line = crate::types::InvoiceLine::from_raw(&lines[0]);
        assert_eq!(line.waste_kg, 49.0);
        assert_eq!(line.invoiced_charge, 128.93);
        assert!(line.warnings.is_empty(), "{:?}", line.warnings);
    }

    #[test]
    fn load_sheet_rejects_missing_and_unknown_files() {
        assert!(matches!(
            load_sheet(Path::new("does-not-exist.csv")),
            Err(ReconError::FileNotFound(_))
        ));
        let file = NamedTempFile::with_suffix(".txt").unwrap();
        assert!(matches!(
            load_sheet(file.path()),
            Err(ReconError::UnsupportedFormat(_))
        ));
    }
}
