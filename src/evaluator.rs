use tracing::debug;

use crate::config::{PricingPolicy, ValidationFlags};
use crate::types::{InvoiceLine, ProcessedRow, RawInvoiceLine};
use crate::validator::validate_line;

/// Sheet rows are numbered from 2: row 1 is the header.
pub const ROW_NUMBER_OFFSET: usize = 2;

#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub rows: Vec<ProcessedRow>,
    pub correct_count: usize,
}

impl Evaluation {
    pub fn error_count(&self) -> usize {
        self.rows.len() - self.correct_count
    }
}

/// Validate and price every line, in sheet order.
///
/// Always a full pass; callers re-run it whenever the policy or flags change.
pub fn evaluate(lines: &[RawInvoiceLine], policy: &PricingPolicy, flags: ValidationFlags) -> Evaluation {
    let rows: Vec<ProcessedRow> = lines
        .iter()
        .enumerate()
        .map(|(idx, raw)| {
            process_line(idx + ROW_NUMBER_OFFSET, InvoiceLine::from_raw(raw), policy, flags)
        })
        .collect();
    let correct_count = rows.iter().filter(|r| r.is_correct()).count();
    debug!(
        rows = rows.len(),
        correct = correct_count,
        excess_source = ?policy.excess_source,
        "sheet evaluated"
    );
    Evaluation { rows, correct_count }
}

fn process_line(
    row_number: usize,
    line: InvoiceLine,
    policy: &PricingPolicy,
    flags: ValidationFlags,
) -> ProcessedRow {
    let validation = validate_line(&line, policy, flags);
    let mut warnings = line.warnings;
    warnings.extend(validation.warnings);
    ProcessedRow {
        row_number,
        site_name: line.site_name,
        category: validation.category,
        service_description: line.service_description,
        contract_price: line.contract_price,
        waste_kg: line.waste_kg,
        excess_kg: line.excess_kg,
        invoiced_charge: line.invoiced_charge,
        expected_charge: validation.expected_charge,
        net_difference: validation.net_difference,
        bin_qty: line.bin_qty,
        included_kg: line.included_kg,
        discrepancy: validation.discrepancy,
        warnings,
    }
}
