use crate::config::TariffTable;
use crate::types::{ProcessedRow, SummaryStatistics, WeightBand};

/// Summary statistics over any set of processed rows, in one pass.
///
/// Rows without a bin size count towards row, weight and charge totals but
/// not towards bin counts or weight bands.
pub fn aggregate<'a, I>(rows: I, tariffs: &TariffTable) -> SummaryStatistics
where
    I: IntoIterator<Item = &'a ProcessedRow>,
{
    let mut stats = SummaryStatistics::default();
    for row in rows {
        stats.total_rows += 1;
        if row.is_correct() {
            stats.total_correct += 1;
        } else {
            stats.total_errors += 1;
        }

        if let Some(category) = row.category {
            let tariff = tariffs.get(category);
            let bins = u64::from(row.bin_qty);
            *stats.bins_by_category.entry(category).or_insert(0) += bins;
            stats.total_bins += bins;
            match tariff.band_for(row.delivered_weight()) {
                WeightBand::Overweight => stats.overweight_bins += bins,
                WeightBand::Underweight => stats.underweight_bins += bins,
                WeightBand::Normal => {}
            }
            stats.corrected_excess_kg += (row.waste_kg - tariff.included_weight).max(0.0);
        }

        stats.total_waste_kg += row.waste_kg;
        stats.total_excess_kg += row.excess_kg;
        stats.total_invoiced += row.invoiced_charge;
        if row.net_difference < 0.0 {
            stats.total_overcharge += row.net_difference.abs();
        } else if row.net_difference > 0.0 {
            stats.total_undercharge += row.net_difference;
        }
    }
    stats.net_charge = stats.total_invoiced - stats.total_overcharge + stats.total_undercharge;
    stats
}
