// Per-line validation and pricing.
//
// Every rule appends to the discrepancy list; the only early exit is an
// unresolved bin size, after which no pricing is possible.
use crate::config::{CustomerIdentity, PricingPolicy, ValidationFlags};
use crate::types::{BinCategory, Discrepancy, InvoiceLine, RawInvoiceLine};
use crate::util::within_tolerance;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validation {
    pub discrepancy: Vec<Discrepancy>,
    pub warnings: Vec<String>,
    pub category: Option<BinCategory>,
    pub expected_charge: f64,
    pub net_difference: f64,
}

/// Validate one raw sheet row.
pub fn validate(raw: &RawInvoiceLine, policy: &PricingPolicy, flags: ValidationFlags) -> Validation {
    let line = InvoiceLine::from_raw(raw);
    let mut validation = validate_line(&line, policy, flags);
    let mut warnings = line.warnings;
    warnings.append(&mut validation.warnings);
    validation.warnings = warnings;
    validation
}

/// Validate an already parsed line. Parse warnings stay on `line`.
pub fn validate_line(line: &InvoiceLine, policy: &PricingPolicy, flags: ValidationFlags) -> Validation {
    let mut v = Validation::default();

    check_identity(line, &policy.customer, &mut v.discrepancy);

    let Some((category, tariff)) = policy.tariffs.resolve(&line.service_description) else {
        v.discrepancy.push(Discrepancy::UnknownBinSize);
        return v;
    };
    v.category = Some(category);

    if !within_tolerance(line.contract_price, tariff.base_price) {
        v.discrepancy.push(Discrepancy::IncorrectContractRate);
    }

    if let Some(included) = line.included_kg {
        if !within_tolerance(included, tariff.included_weight) {
            v.warnings.push(format!(
                "Included Kg {included} differs from the {category} tariff ({})",
                tariff.included_weight
            ));
        }
    }

    if line.waste_kg < tariff.included_weight {
        if flags.flag_low_weight {
            v.discrepancy.push(Discrepancy::BelowMinimumWeight);
        }
        if line.excess_kg > 0.0 {
            v.discrepancy.push(Discrepancy::ExcessBelowMinimum);
        }
    }

    if line.waste_kg == line.excess_kg && line.waste_kg != 0.0 {
        // Data-entry anomaly: the gross weight was copied into the excess
        // column. Only the base price is owed.
        v.discrepancy.push(Discrepancy::IdenticalWeights);
        v.expected_charge = tariff.base_price;
        v.net_difference = -(line.invoiced_charge - tariff.base_price);
        return v;
    }

    let excess_used = policy
        .excess_source
        .excess_used(tariff, line.waste_kg, line.excess_kg);
    v.expected_charge = tariff.expected_charge(excess_used);

    if !within_tolerance(v.expected_charge, line.invoiced_charge) {
        let net = v.expected_charge - line.invoiced_charge;
        v.discrepancy.push(if net > 0.0 {
            Discrepancy::Undercharge
        } else {
            Discrepancy::Overcharge
        });
        v.net_difference = net;
    }

    v
}

fn check_identity(line: &InvoiceLine, customer: &CustomerIdentity, out: &mut Vec<Discrepancy>) {
    if line.customer_group != customer.group {
        out.push(Discrepancy::IncorrectCustomerGroup);
    }
    if line.customer_name != customer.name {
        out.push(Discrepancy::IncorrectCustomerName);
    }
    if !customer.number_is_valid(&line.customer_number) {
        out.push(Discrepancy::InvalidCustomerNumber);
    }
    if !customer.abn_matches(&line.customer_abn) {
        out.push(Discrepancy::IncorrectCustomerAbn);
    }
}
