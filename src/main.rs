// Entry point and interactive terminal flow.
//
// The binary is a thin presentation layer over the library:
// - Option [1] loads an invoice export and reprices every line.
// - Options [2]-[4] change filters and validation toggles.
// - Options [5]-[8] page through the filtered rows and show the summary.
// - Option [S] ticks rows; option [C] copies the ticked rows as a
//   tab-delimited block.
// - Option [9] exports the filtered rows and the summary.
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Local;
use tracing::error;

use waste_recon::filter::FilterSelection;
use waste_recon::output::{self, PageSize};
use waste_recon::util::{format_currency, format_int, format_number};
use waste_recon::{logging, AppState, BillingConfig, SummaryStatistics};

const CONFIG_PATH: &str = "billing.toml";
const DEFAULT_INVOICE_PATH: &str = "invoices.csv";

/// Print a prompt and read one trimmed line. `None` on end of input.
fn prompt(label: &str) -> Option<String> {
    print!("{label}");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    match io::stdin().read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

/// Parse an optional selection; blank or `all` clears it.
fn prompt_choice<T: std::str::FromStr<Err = String>>(label: &str) -> Option<T> {
    loop {
        let answer = prompt(label)?;
        if answer.is_empty() || answer.eq_ignore_ascii_case("all") {
            return None;
        }
        match answer.parse() {
            Ok(v) => return Some(v),
            Err(e) => println!("{e}. Leave blank for all."),
        }
    }
}

fn handle_load(state: &mut AppState) {
    let answer = prompt(&format!("Invoice file [{DEFAULT_INVOICE_PATH}]: ")).unwrap_or_default();
    let path = if answer.is_empty() {
        PathBuf::from(DEFAULT_INVOICE_PATH)
    } else {
        PathBuf::from(answer)
    };
    match state.load_file(&path) {
        Ok(report) => {
            println!(
                "Processing invoice... ({} rows loaded, {} correct, {} with discrepancies)",
                format_int(report.total_rows),
                format_int(state.correct_count()),
                format_int(state.error_count())
            );
            if report.blank_rows > 0 {
                println!("Note: {} blank rows skipped.", format_int(report.blank_rows));
            }
            if !report.missing_columns.is_empty() {
                println!("Warning: missing columns: {}", report.missing_columns.join(", "));
            }
            let warned = state.rows().iter().filter(|r| !r.warnings.is_empty()).count();
            if warned > 0 {
                println!("Info: {} rows have missing or unreadable numbers.", format_int(warned));
            }
            println!();
        }
        Err(e) => {
            eprintln!("Failed to load file: {}\n", e);
        }
    }
}

fn handle_filters(state: &mut AppState) {
    let categories: Vec<String> = state.category_options().iter().map(|c| c.to_string()).collect();
    let sites = state.site_options();
    println!("Bin sizes: {}", categories.join(", "));
    println!("Sites: {}", sites.join(", "));

    let category = prompt_choice("Bin size (blank = all): ");
    let site = prompt("Site (blank = all): ").filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("all"));
    let band = prompt_choice("Weight band [overweight/underweight/normal] (blank = all): ");
    let direction = prompt_choice("Charge [overcharge/undercharge] (blank = all): ");
    let search = prompt("Search: ").unwrap_or_default();

    state.set_selection(FilterSelection {
        category,
        site,
        band,
        direction,
        search,
    });
    println!("{} rows match.\n", format_int(state.filtered_rows().len()));
}

fn print_summary(stats: &SummaryStatistics) {
    println!("Summary");
    println!(
        "  Rows: {} ({} correct, {} with errors)",
        format_int(stats.total_rows),
        format_int(stats.total_correct),
        format_int(stats.total_errors)
    );
    let per_category: Vec<String> = stats
        .bins_by_category
        .iter()
        .map(|(c, n)| format!("{c}: {}", format_int(*n)))
        .collect();
    println!("  Bins: {} ({})", format_int(stats.total_bins), per_category.join(", "));
    println!(
        "  Overweight bins: {}, underweight bins: {}",
        format_int(stats.overweight_bins),
        format_int(stats.underweight_bins)
    );
    println!("  Waste: {} kg", format_number(stats.total_waste_kg, 2));
    println!(
        "  Excess: {} kg invoiced, {} kg corrected",
        format_number(stats.total_excess_kg, 2),
        format_number(stats.corrected_excess_kg, 2)
    );
    println!("  Invoiced: {}", format_currency(stats.total_invoiced));
    println!("  Overcharges: {}", format_currency(stats.total_overcharge));
    println!("  Undercharges: {}", format_currency(stats.total_undercharge));
    println!("  Net charge: {}\n", format_currency(stats.net_charge));
}

fn handle_show(state: &AppState) {
    if state.rows().is_empty() {
        println!("Error: No data loaded. Please load an invoice file first (option 1).\n");
        return;
    }
    let page = state.page_rows();
    let total = state.filtered_rows().len();
    output::preview_table_rows(&page, page.len());
    println!("{}", state.pager().record_count(total));
    println!("{}\n", state.pager().page_label(total));
    print_summary(&state.summary());
}

fn handle_select(state: &mut AppState) {
    if state.filtered_rows().is_empty() {
        println!("No rows to select.\n");
        return;
    }
    let answer = prompt("Row numbers to tick (e.g. 2,5,7; -5 unticks), 'all' or 'none': ")
        .unwrap_or_default();
    if answer.eq_ignore_ascii_case("all") {
        state.select_all();
    } else if answer.eq_ignore_ascii_case("none") {
        state.clear_selected();
    } else {
        for token in answer.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (untick, digits) = match token.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, token),
            };
            match digits.parse::<usize>() {
                Ok(n) if untick => {
                    state.deselect(n);
                }
                Ok(n) => {
                    if !state.select(n) {
                        println!("Row {n} is not in the current view.");
                    }
                }
                Err(_) => println!("Ignoring '{token}'."),
            }
        }
    }
    println!("{} rows selected.\n", format_int(state.selected().len()));
}

fn copy_selected(state: &AppState, dir: &Path) -> anyhow::Result<Option<PathBuf>> {
    let Some(text) = state.selected_clipboard_text() else {
        return Ok(None);
    };
    let path = dir.join(output::export_file_name(&Local::now(), "tsv"));
    std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
    Ok(Some(path))
}

fn handle_copy(state: &AppState) {
    match copy_selected(state, Path::new(".")) {
        Ok(Some(path)) => println!(
            "{} selected rows copied to {}\n",
            format_int(state.selected().len()),
            path.display()
        ),
        Ok(None) => println!("No rows selected. Tick rows first (option S).\n"),
        Err(e) => {
            error!(error = ?e, "copy failed");
            eprintln!("Write error: {:#}\n", e);
        }
    }
}

fn handle_page_size(state: &mut AppState) {
    let answer = prompt("Entries per page (number or All): ").unwrap_or_default();
    let size = match answer.parse::<usize>() {
        Ok(n) if n > 0 => PageSize::Count(n),
        _ => PageSize::All,
    };
    state.set_page_size(size);
}

fn export(state: &AppState, dir: &Path) -> anyhow::Result<()> {
    let now = Local::now();
    let rows = state.display_rows();
    let csv_path = dir.join(output::export_file_name(&now, "csv"));
    output::write_csv(&csv_path, &rows)
        .with_context(|| format!("writing {}", csv_path.display()))?;

    let summary_path = dir.join(output::export_file_name(&now, "json"));
    output::write_json(&summary_path, &state.summary())
        .with_context(|| format!("writing {}", summary_path.display()))?;

    println!("Rows exported to {}", csv_path.display());
    println!("Summary exported to {}\n", summary_path.display());
    Ok(())
}

fn handle_export(state: &AppState) {
    if state.filtered_rows().is_empty() {
        println!("No rows to export.\n");
        return;
    }
    if let Err(e) = export(state, Path::new(".")) {
        error!(error = ?e, "export failed");
        eprintln!("Write error: {:#}\n", e);
    }
}

fn main() -> anyhow::Result<()> {
    logging::init();
    let config = BillingConfig::load_or_default(Path::new(CONFIG_PATH))
        .with_context(|| format!("reading {CONFIG_PATH}"))?;
    let mut state = AppState::new(config);

    loop {
        println!("Waste Invoice Reconciliation");
        println!("[1] Load invoice file");
        println!("[2] Filter rows");
        println!("[3] Reset filters");
        println!(
            "[4] Toggle low-weight errors (currently {})",
            if state.flags().flag_low_weight { "ON" } else { "OFF" }
        );
        println!("[5] Show rows and summary");
        println!("[6] Next page");
        println!("[7] Previous page");
        println!("[8] Entries per page");
        println!(
            "[S] Select rows to copy ({} selected)",
            format_int(state.selected().len())
        );
        println!("[C] Copy selected rows");
        println!("[9] Export");
        println!("[0] Exit\n");
        let Some(choice) = prompt("Enter choice: ") else {
            break;
        };
        match choice.as_str() {
            "1" => handle_load(&mut state),
            "2" => handle_filters(&mut state),
            "3" => {
                state.reset_filters();
                println!("Filters cleared.\n");
            }
            "4" => {
                state.toggle_low_weight();
                println!("Sheet re-evaluated ({} correct).\n", format_int(state.correct_count()));
            }
            "5" => handle_show(&state),
            "6" => {
                state.next_page();
                handle_show(&state);
            }
            "7" => {
                state.prev_page();
                handle_show(&state);
            }
            "8" => handle_page_size(&mut state),
            "s" | "S" => handle_select(&mut state),
            "c" | "C" => handle_copy(&state),
            "9" => handle_export(&state),
            "0" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 0-9, S or C.\n"),
        }
    }
    Ok(())
}
