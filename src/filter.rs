use std::collections::BTreeSet;

use crate::config::{SiteDirectory, TariffTable};
use crate::output::display_row;
use crate::types::{BinCategory, ChargeDirection, ProcessedRow, WeightBand};

/// User-selected predicates. `None` means "all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSelection {
    pub category: Option<BinCategory>,
    pub site: Option<String>,
    pub band: Option<WeightBand>,
    pub direction: Option<ChargeDirection>,
    pub search: String,
}

impl FilterSelection {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Weight band of a row, or `None` when its bin size is unknown.
pub fn weight_band(row: &ProcessedRow, tariffs: &TariffTable) -> Option<WeightBand> {
    row.category
        .map(|category| tariffs.get(category).band_for(row.delivered_weight()))
}

pub fn direction_matches(row: &ProcessedRow, direction: ChargeDirection) -> bool {
    match direction {
        ChargeDirection::Overcharge => row.net_difference < 0.0,
        ChargeDirection::Undercharge => row.net_difference > 0.0,
    }
}

/// Case-insensitive substring search over every rendered field.
pub fn search_matches(row: &ProcessedRow, term: &str, sites: &SiteDirectory) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return true;
    }
    display_row(row, sites)
        .fields()
        .iter()
        .any(|field| field.to_lowercase().contains(&term))
}

/// All predicates of `selection` as a conjunction. Hidden sites never match.
pub fn matches(
    row: &ProcessedRow,
    selection: &FilterSelection,
    tariffs: &TariffTable,
    sites: &SiteDirectory,
) -> bool {
    if sites.is_hidden(&row.site_name) {
        return false;
    }
    if let Some(category) = selection.category {
        if row.category != Some(category) {
            return false;
        }
    }
    if let Some(site) = &selection.site {
        if &row.site_name != site {
            return false;
        }
    }
    if let Some(band) = selection.band {
        if weight_band(row, tariffs) != Some(band) {
            return false;
        }
    }
    if let Some(direction) = selection.direction {
        if !direction_matches(row, direction) {
            return false;
        }
    }
    search_matches(row, &selection.search, sites)
}

pub fn filter_rows<'a>(
    rows: &'a [ProcessedRow],
    selection: &FilterSelection,
    tariffs: &TariffTable,
    sites: &SiteDirectory,
) -> Vec<&'a ProcessedRow> {
    rows.iter()
        .filter(|row| matches(row, selection, tariffs, sites))
        .collect()
}

/// Bin sizes present in the rows, for dropdowns.
pub fn category_options(rows: &[ProcessedRow]) -> Vec<BinCategory> {
    rows.iter()
        .filter_map(|r| r.category)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Visible site names present in the rows, for dropdowns.
pub fn site_options(rows: &[ProcessedRow], sites: &SiteDirectory) -> Vec<String> {
    rows.iter()
        .map(|r| r.site_name.as_str())
        .filter(|s| !s.is_empty() && !sites.is_hidden(s))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}
