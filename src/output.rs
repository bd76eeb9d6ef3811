use std::path::Path;

use chrono::{DateTime, TimeZone};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};
use tracing::info;

use crate::config::SiteDirectory;
use crate::error::Result;
use crate::types::{DisplayRow, ProcessedRow};
use crate::util::{format_currency, format_int, format_number, format_signed_currency};

/// Render a processed row the way tables, search and exports see it.
pub fn display_row(row: &ProcessedRow, sites: &SiteDirectory) -> DisplayRow {
    DisplayRow {
        row_number: row.row_number,
        site: sites.display_name(&row.site_name).to_string(),
        bin_size: row.category.map(|c| c.label().to_string()).unwrap_or_default(),
        service_description: row.service_description.clone(),
        contract_price: format_currency(row.contract_price),
        waste_kg: format_number(row.waste_kg, 2),
        excess_kg: format_number(row.excess_kg, 2),
        invoiced_charge: format_currency(row.invoiced_charge),
        expected_charge: format_currency(row.expected_charge),
        net_difference: format_signed_currency(row.net_difference),
        discrepancy: row.discrepancy_text(),
    }
}

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    info!(path = %path.display(), rows = rows.len(), "CSV exported");
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Tab-delimited block with a header line, ready to paste into a sheet.
pub fn clipboard_text(rows: &[DisplayRow]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(DisplayRow::HEADERS.join("\t"));
    for row in rows {
        let fields = row.fields().map(|f| f.replace(['\t', '\n'], " "));
        lines.push(fields.join("\t"));
    }
    lines.join("\n")
}

/// `WasteRecon_YYYYMMDDHHMMSS.<ext>`
pub fn export_file_name<Tz: TimeZone>(now: &DateTime<Tz>, ext: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("WasteRecon_{}.{}", now.format("%Y%m%d%H%M%S"), ext)
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSize {
    #[default]
    All,
    Count(usize),
}

/// Current page over a row list. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    pub size: PageSize,
    pub current: usize,
}

impl Default for Pager {
    fn default() -> Self {
        Pager { size: PageSize::All, current: 1 }
    }
}

impl Pager {
    pub fn new(size: PageSize) -> Self {
        Pager { size, current: 1 }
    }

    pub fn total_pages(&self, len: usize) -> usize {
        match self.size {
            PageSize::All => 1,
            PageSize::Count(0) => 1,
            PageSize::Count(n) => len.div_ceil(n).max(1),
        }
    }

    pub fn slice<'a, T>(&self, rows: &'a [T]) -> &'a [T] {
        match self.size {
            PageSize::All | PageSize::Count(0) => rows,
            PageSize::Count(n) => {
                let start = ((self.current.max(1) - 1) * n).min(rows.len());
                let end = (start + n).min(rows.len());
                &rows[start..end]
            }
        }
    }

    pub fn next(&mut self, len: usize) -> bool {
        if self.current < self.total_pages(len) {
            self.current += 1;
            true
        } else {
            false
        }
    }

    pub fn prev(&mut self) -> bool {
        if self.current > 1 {
            self.current -= 1;
            true
        } else {
            false
        }
    }

    pub fn page_label(&self, len: usize) -> String {
        format!("Page {} of {}", self.current, self.total_pages(len))
    }

    pub fn record_count(&self, len: usize) -> String {
        match self.size {
            PageSize::All | PageSize::Count(0) => {
                format!("Showing all {} entries", format_int(len))
            }
            PageSize::Count(n) => {
                let start = if len == 0 { 0 } else { (self.current - 1) * n + 1 };
                let end = (self.current * n).min(len);
                format!(
                    "Showing {} to {} of {} entries",
                    format_int(start),
                    format_int(end),
                    format_int(len)
                )
            }
        }
    }
}
