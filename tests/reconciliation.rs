use std::collections::HashMap;
use std::io::Write;

use waste_recon::config::{AggregateScope, BillingConfig, ExcessSource};
use waste_recon::filter::FilterSelection;
use waste_recon::loader::read_csv;
use waste_recon::types::{ChargeDirection, WeightBand};
use waste_recon::{logging, AppState, BinCategory, Discrepancy};

const INVOICE: &str = "\
Customer Group,Customer Name,Customer No.,Customer ABN,Service Description,Contract Unit Price,Waste Kg,Excess kg,Charge excl GST,Task Site Name,Bin Qty
EASTERN HEALTH,Eastern Health,EH0001,68 223 819 017,Clinical Waste 660L,$128.93,49,0,$128.93,Box Hill,1
EASTERN HEALTH,Eastern Health,EH0002,68 223 819 017,Clinical Waste 660L,$128.93,30,5,$142.08,Wantirna,1
EASTERN HEALTH,Eastern Health,EH0003,68 223 819 017,Clinical Waste 660L,$128.93,25,25,$194.68,Maroonda,1
EASTERN HEALTH,Eastern Health,EH0004,68 223 819 017,Clinical Waste 240L,$34.21,20,0,$34.21,Ferntree Gully,2
EASTERN HEALTH,Eastern Health,EH0005,68 223 819 017,General Waste 1100L,$50.00,120,0,$50.00,Box Hill,1
EASTERN HEALTH,Eastern Health,EH0006,68 223 819 017,120L Clinical Collection,$19.32,12,4,$29.84,Box Hill,1
EASTERN HEALTH,Eastern Health,EH0007,68 223 819 017,Clinical Waste 660L,$128.93,95,46,$260.00,VCCC,1
";

fn loaded(config: BillingConfig) -> AppState {
    logging::init_test();
    let (lines, report) = read_csv(INVOICE.as_bytes()).unwrap();
    assert_eq!(report.total_rows, 7);
    let mut state = AppState::new(config);
    state.load_lines(lines);
    state
}

fn row_errors(state: &AppState, row_number: usize) -> Vec<Discrepancy> {
    state
        .rows()
        .iter()
        .find(|r| r.row_number == row_number)
        .map(|r| r.discrepancy.clone())
        .unwrap()
}

#[test]
fn scenarios_on_a_loaded_sheet() {
    let state = loaded(BillingConfig::default());
    let rows = state.rows();

    // Exactly at the included weight: base price, nothing flagged.
    assert_eq!(rows[0].expected_charge, 128.93);
    assert!(rows[0].discrepancy.is_empty());

    // Below minimum with excess charged.
    assert_eq!(
        row_errors(&state, 3),
        vec![Discrepancy::BelowMinimumWeight, Discrepancy::ExcessBelowMinimum]
    );

    // Identical waste and excess weight.
    let anomaly = &rows[2];
    assert!(anomaly.discrepancy.contains(&Discrepancy::IdenticalWeights));
    assert!((anomaly.net_difference - -(194.68 - 128.93)).abs() < 1e-9);

    // Unknown bin size.
    assert_eq!(rows[4].discrepancy, vec![Discrepancy::UnknownBinSize]);
    assert_eq!(rows[4].category, None);

    // 120L with 4 kg excess: 19.32 + 2.63 * 4.
    assert_eq!(rows[5].category, Some(BinCategory::L120));
    assert!(rows[5].discrepancy.is_empty(), "{:?}", rows[5].discrepancy);

    let correct = rows.iter().filter(|r| r.discrepancy.is_empty()).count();
    assert_eq!(state.correct_count(), correct);
}

#[test]
fn filtered_summary_tracks_selection() {
    let mut state = loaded(BillingConfig::default());
    // VCCC is hidden.
    assert_eq!(state.summary().total_rows, 6);
    assert_eq!(state.summary_for(AggregateScope::All).total_rows, 7);

    state.set_selection(FilterSelection {
        band: Some(WeightBand::Underweight),
        ..Default::default()
    });
    // Row 4 delivers 25 + 25 = 50 kg, which is inside the normal band.
    let stats = state.summary();
    assert_eq!(stats.total_rows, 1);
    assert_eq!(stats.underweight_bins, 1);
    assert_eq!(stats.overweight_bins, 0);

    state.set_selection(FilterSelection {
        search: "angliss".into(),
        ..Default::default()
    });
    let stats = state.summary();
    assert_eq!(stats.total_rows, 1);
    assert_eq!(stats.bins_by_category.get(&BinCategory::L240), Some(&2));
}

#[test]
fn derived_excess_policy_changes_classification() {
    let mut config = BillingConfig::default();
    config.pricing.excess_source = ExcessSource::DerivedFromWaste;
    config.sites.hidden.clear();
    let mut state = loaded(config);

    // Row 8: invoiced 46 kg excess, derived 95 - 49 = 46 kg; 128.93 + 120.98.
    assert_eq!(row_errors(&state, 8), vec![Discrepancy::Overcharge]);
    // Row 7: 120L, 12 kg waste derives 4 kg excess, same as invoiced.
    assert!(row_errors(&state, 7).is_empty());
    // Row 3: waste below minimum derives zero excess, so the invoice overcharges.
    assert!(row_errors(&state, 3).contains(&Discrepancy::Overcharge));

    state.set_selection(FilterSelection {
        direction: Some(ChargeDirection::Overcharge),
        ..Default::default()
    });
    let over: Vec<usize> = state.filtered_rows().iter().map(|r| r.row_number).collect();
    assert_eq!(over, vec![3, 4, 8]);
}

#[test]
fn export_roundtrip_through_files() {
    let state = loaded(BillingConfig::default());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rows.csv");
    waste_recon::output::write_csv(&path, &state.display_rows()).unwrap();

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let exported: Vec<HashMap<String, String>> = reader.deserialize().map(|r| r.unwrap()).collect();
    assert_eq!(exported.len(), 6);
    assert_eq!(exported[2]["Site"], "Maroondah");
    assert_eq!(exported[0]["Net Difference"], "$0.00");

    let json_path = dir.path().join("summary.json");
    waste_recon::output::write_json(&json_path, &state.summary()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(value["total_rows"], 6);
    assert_eq!(value["bins_by_category"]["660L"], 3);
}

#[test]
fn config_file_drives_policy() {
    let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
    writeln!(file, "[pricing]\naggregate_scope = \"all\"\n[flags]\nflag_low_weight = false").unwrap();
    let config = BillingConfig::load_or_default(file.path()).unwrap();
    let state = loaded(config);
    assert_eq!(state.summary().total_rows, 7);
    assert!(!row_errors(&state, 3).contains(&Discrepancy::BelowMinimumWeight));
}

#[test]
fn shipped_config_matches_built_in_defaults() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("billing.toml");
    let config = BillingConfig::load(&path).unwrap();
    assert_eq!(config, BillingConfig::default());
}
