use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::{AggregateScope, BillingConfig, ValidationFlags};
use crate::error::Result;
use crate::evaluator::{evaluate, Evaluation};
use crate::filter::{self, FilterSelection};
use crate::loader::{load_sheet, LoadReport};
use crate::output::{clipboard_text, display_row, PageSize, Pager};
use crate::reports::aggregate;
use crate::types::{BinCategory, DisplayRow, ProcessedRow, RawInvoiceLine, SummaryStatistics};

/// Everything derived from the currently loaded file.
///
/// Any change to the dataset, flags or selection rebuilds the derived state
/// in full before returning, so readers never see a partial view.
#[derive(Debug, Default)]
pub struct AppState {
    config: BillingConfig,
    source: Option<PathBuf>,
    raw: Vec<RawInvoiceLine>,
    evaluation: Evaluation,
    selection: FilterSelection,
    /// Indices into `evaluation.rows`.
    filtered: Vec<usize>,
    /// Sheet row numbers ticked for copying. Always a subset of the
    /// filtered rows.
    selected: BTreeSet<usize>,
    pager: Pager,
}

impl AppState {
    pub fn new(config: BillingConfig) -> Self {
        AppState {
            config,
            ..AppState::default()
        }
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Load a file, replacing the current dataset. On failure the dataset is
    /// cleared and the error returned.
    pub fn load_file(&mut self, path: &Path) -> Result<LoadReport> {
        match load_sheet(path) {
            Ok((lines, report)) => {
                self.load_lines(lines);
                self.source = Some(path.to_path_buf());
                Ok(report)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "load failed, clearing dataset");
                self.clear();
                Err(e)
            }
        }
    }

    /// Replace the dataset with already parsed lines. Filters are reset.
    pub fn load_lines(&mut self, lines: Vec<RawInvoiceLine>) {
        self.raw = lines;
        self.source = None;
        self.selection = FilterSelection::default();
        self.selected.clear();
        self.pager.current = 1;
        self.reevaluate();
        info!(
            rows = self.evaluation.rows.len(),
            correct = self.evaluation.correct_count,
            "dataset replaced"
        );
    }

    pub fn clear(&mut self) {
        self.raw.clear();
        self.source = None;
        self.selection = FilterSelection::default();
        self.selected.clear();
        self.pager.current = 1;
        self.reevaluate();
    }

    pub fn flags(&self) -> ValidationFlags {
        self.config.flags
    }

    pub fn set_flags(&mut self, flags: ValidationFlags) {
        if self.config.flags != flags {
            self.config.flags = flags;
            self.reevaluate();
        }
    }

    /// Flip the low-weight toggle and return its new value.
    pub fn toggle_low_weight(&mut self) -> bool {
        let flags = ValidationFlags {
            flag_low_weight: !self.config.flags.flag_low_weight,
        };
        self.set_flags(flags);
        flags.flag_low_weight
    }

    pub fn selection(&self) -> &FilterSelection {
        &self.selection
    }

    /// Replace the filters. Ticked rows are cleared with them.
    pub fn set_selection(&mut self, selection: FilterSelection) {
        self.selection = selection;
        self.selected.clear();
        self.pager.current = 1;
        self.refilter();
    }

    pub fn reset_filters(&mut self) {
        self.set_selection(FilterSelection::default());
    }

    pub fn rows(&self) -> &[ProcessedRow] {
        &self.evaluation.rows
    }

    pub fn correct_count(&self) -> usize {
        self.evaluation.correct_count
    }

    pub fn error_count(&self) -> usize {
        self.evaluation.error_count()
    }

    pub fn filtered_rows(&self) -> Vec<&ProcessedRow> {
        self.filtered.iter().map(|&i| &self.evaluation.rows[i]).collect()
    }

    /// Statistics over the configured aggregate scope.
    pub fn summary(&self) -> SummaryStatistics {
        self.summary_for(self.config.pricing.aggregate_scope)
    }

    pub fn summary_for(&self, scope: AggregateScope) -> SummaryStatistics {
        let tariffs = &self.config.pricing.tariffs;
        match scope {
            AggregateScope::All => aggregate(&self.evaluation.rows, tariffs),
            AggregateScope::Filtered => aggregate(self.filtered_rows(), tariffs),
            AggregateScope::Discrepancies => aggregate(
                self.evaluation.rows.iter().filter(|r| !r.is_correct()),
                tariffs,
            ),
        }
    }

    pub fn display_rows(&self) -> Vec<DisplayRow> {
        self.filtered_rows()
            .into_iter()
            .map(|r| display_row(r, &self.config.sites))
            .collect()
    }

    pub fn category_options(&self) -> Vec<BinCategory> {
        filter::category_options(&self.evaluation.rows)
    }

    pub fn site_options(&self) -> Vec<String> {
        filter::site_options(&self.evaluation.rows, &self.config.sites)
    }

    // -----------------------------------------------------------------------
    // Row selection
    // -----------------------------------------------------------------------

    fn is_filtered(&self, row_number: usize) -> bool {
        self.filtered
            .iter()
            .any(|&i| self.evaluation.rows[i].row_number == row_number)
    }

    /// Tick a row by sheet row number. Rows outside the filtered view
    /// cannot be selected; returns whether the row is now selected.
    pub fn select(&mut self, row_number: usize) -> bool {
        if !self.is_filtered(row_number) {
            return false;
        }
        self.selected.insert(row_number);
        true
    }

    /// Untick a row; returns whether it was selected.
    pub fn deselect(&mut self, row_number: usize) -> bool {
        self.selected.remove(&row_number)
    }

    /// Tick every filtered row.
    pub fn select_all(&mut self) {
        self.selected = self
            .filtered
            .iter()
            .map(|&i| self.evaluation.rows[i].row_number)
            .collect();
    }

    pub fn clear_selected(&mut self) {
        self.selected.clear();
    }

    pub fn selected(&self) -> &BTreeSet<usize> {
        &self.selected
    }

    /// Selected rows in filtered-view order.
    pub fn selected_rows(&self) -> Vec<&ProcessedRow> {
        self.filtered_rows()
            .into_iter()
            .filter(|r| self.selected.contains(&r.row_number))
            .collect()
    }

    pub fn selected_display_rows(&self) -> Vec<DisplayRow> {
        self.selected_rows()
            .into_iter()
            .map(|r| display_row(r, &self.config.sites))
            .collect()
    }

    /// Tab-delimited block of the selected rows, or `None` when nothing is
    /// selected.
    pub fn selected_clipboard_text(&self) -> Option<String> {
        if self.selected.is_empty() {
            return None;
        }
        Some(clipboard_text(&self.selected_display_rows()))
    }

    // -----------------------------------------------------------------------
    // Pagination
    // -----------------------------------------------------------------------

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    pub fn set_page_size(&mut self, size: PageSize) {
        self.pager = Pager::new(size);
    }

    pub fn next_page(&mut self) -> bool {
        self.pager.next(self.filtered.len())
    }

    pub fn prev_page(&mut self) -> bool {
        self.pager.prev()
    }

    pub fn page_rows(&self) -> Vec<DisplayRow> {
        let rows = self.display_rows();
        self.pager.slice(&rows).to_vec()
    }

    fn reevaluate(&mut self) {
        self.evaluation = evaluate(&self.raw, &self.config.pricing, self.config.flags);
        self.refilter();
    }

    fn refilter(&mut self) {
        let tariffs = &self.config.pricing.tariffs;
        let sites = &self.config.sites;
        self.filtered = self
            .evaluation
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| filter::matches(row, &self.selection, tariffs, sites))
            .map(|(i, _)| i)
            .collect();
        let rows = &self.evaluation.rows;
        let visible: BTreeSet<usize> = self.filtered.iter().map(|&i| rows[i].row_number).collect();
        self.selected.retain(|n| visible.contains(n));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::columns;
    use crate::validator::tests::line;
    use std::io::Write;

    fn lines() -> Vec<RawInvoiceLine> {
        let mut hidden = line("Clinical Waste 660L", "49", "0", "150.00");
        hidden.insert(columns::SITE_NAME.to_string(), "VCCC".to_string());
        vec![
            line("Clinical Waste 660L", "49", "0", "128.93"),
            line("Clinical Waste 660L", "80", "20", "190.00"),
            line("Clinical Waste 660L", "30", "0", "128.93"),
            hidden,
        ]
    }

    #[test]
    fn load_resets_selection_and_filters() {
        let mut state = AppState::new(BillingConfig::default());
        state.load_lines(lines());
        state.set_selection(FilterSelection {
            search: "overcharge".into(),
            ..Default::default()
        });
        assert_eq!(state.filtered_rows().len(), 1);

        state.load_lines(lines());
        assert!(state.selection().is_default());
        // Hidden site stays out of the filtered view.
        assert_eq!(state.filtered_rows().len(), 3);
        assert_eq!(state.rows().len(), 4);
    }

    #[test]
    fn summary_follows_scope() {
        let mut state = AppState::new(BillingConfig::default());
        state.load_lines(lines());
        state.set_selection(FilterSelection {
            direction: Some(crate::types::ChargeDirection::Overcharge),
            ..Default::default()
        });
        assert_eq!(state.summary_for(AggregateScope::All).total_rows, 4);
        assert_eq!(state.summary_for(AggregateScope::Filtered).total_rows, 1);
        assert_eq!(state.summary_for(AggregateScope::Discrepancies).total_rows, 3);
        assert_eq!(state.summary(), state.summary_for(AggregateScope::Filtered));
    }

    #[test]
    fn toggling_low_weight_reevaluates() {
        let mut state = AppState::new(BillingConfig::default());
        state.load_lines(lines());
        assert_eq!(state.correct_count(), 1);
        assert!(!state.toggle_low_weight());
        assert_eq!(state.correct_count(), 2);
        assert!(state.toggle_low_weight());
        assert_eq!(state.correct_count(), 1);
    }

    #[test]
    fn failed_load_clears_dataset() {
        let mut state = AppState::new(BillingConfig::default());
        state.load_lines(lines());
        assert!(state.load_file(Path::new("missing-invoices.csv")).is_err());
        assert!(state.rows().is_empty());
        assert!(state.filtered_rows().is_empty());
        assert_eq!(state.summary().total_rows, 0);
        assert!(state.source().is_none());
    }

    #[test]
    fn load_file_records_source() {
        let mut file = tempfile::NamedTempFile::with_suffix(".csv").unwrap();
        writeln!(file, "Service Description,Waste Kg,Excess kg,Charge excl GST").unwrap();
        writeln!(file, "Clinical Waste 240L,13,0,34.21").unwrap();
        let mut state = AppState::new(BillingConfig::default());
        let report = state.load_file(file.path()).unwrap();
        assert_eq!(report.total_rows, 1);
        assert_eq!(state.source(), Some(file.path()));
        assert_eq!(state.rows()[0].expected_charge, 34.21);
    }

    #[test]
    fn selection_is_limited_to_filtered_rows() {
        let mut state = AppState::new(BillingConfig::default());
        state.load_lines(lines());
        // Row 5 is the hidden VCCC site.
        assert!(state.select(3));
        assert!(!state.select(5));
        assert!(!state.select(99));
        assert_eq!(state.selected().iter().copied().collect::<Vec<_>>(), vec![3]);

        state.select_all();
        assert_eq!(state.selected().len(), 3);
        assert!(state.deselect(2));
        assert!(!state.deselect(2));
        let numbers: Vec<usize> = state.selected_rows().iter().map(|r| r.row_number).collect();
        assert_eq!(numbers, vec![3, 4]);
    }

    #[test]
    fn clipboard_copies_selected_rows_only() {
        let mut state = AppState::new(BillingConfig::default());
        state.load_lines(lines());
        assert_eq!(state.selected_clipboard_text(), None);

        state.select(4);
        state.select(2);
        let text = state.selected_clipboard_text().unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Row\tSite"));
        assert!(lines[1].starts_with("2\t"));
        assert!(lines[2].starts_with("4\t"));
        assert!(!text.contains("\n3\t"));
    }

    #[test]
    fn selection_clears_on_filter_and_load() {
        let mut state = AppState::new(BillingConfig::default());
        state.load_lines(lines());
        state.select_all();
        state.set_selection(FilterSelection {
            search: "overcharge".into(),
            ..Default::default()
        });
        assert!(state.selected().is_empty());

        state.select_all();
        assert_eq!(state.selected().len(), 1);
        // Re-evaluating keeps ticks on rows that are still visible.
        state.toggle_low_weight();
        assert_eq!(state.selected().len(), 1);

        state.load_lines(lines());
        assert!(state.selected().is_empty());
    }

    #[test]
    fn paging_over_filtered_rows() {
        let mut state = AppState::new(BillingConfig::default());
        state.load_lines(lines());
        state.set_page_size(PageSize::Count(2));
        assert_eq!(state.page_rows().len(), 2);
        assert!(state.next_page());
        assert_eq!(state.page_rows().len(), 1);
        assert!(!state.next_page());
        state.reset_filters();
        assert_eq!(state.pager().current, 1);
    }
}
