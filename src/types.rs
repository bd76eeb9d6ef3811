use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::util::{parse_cell, CellValue};

/// One sheet row as read from the source file: column label -> cell text.
pub type RawInvoiceLine = HashMap<String, String>;

/// Column labels of the invoice export.
pub mod columns {
    pub const CUSTOMER_GROUP: &str = "Customer Group";
    pub const CUSTOMER_NAME: &str = "Customer Name";
    pub const CUSTOMER_NUMBER: &str = "Customer No.";
    pub const CUSTOMER_ABN: &str = "Customer ABN";
    pub const SERVICE_DESCRIPTION: &str = "Service Description";
    pub const CONTRACT_UNIT_PRICE: &str = "Contract Unit Price";
    pub const WASTE_KG: &str = "Waste Kg";
    pub const EXCESS_KG: &str = "Excess kg";
    pub const CHARGE: &str = "Charge excl GST";
    pub const SITE_NAME: &str = "Task Site Name";
    pub const BIN_QTY: &str = "Bin Qty";
    // Misspelt header used by some exports.
    pub const BIN_QTY_ALT: &str = "Bin Quanity";
    pub const INCLUDED_KG: &str = "Included Kg";

    /// Columns every invoice export is expected to carry.
    pub const EXPECTED: [&str; 10] = [
        CUSTOMER_GROUP,
        CUSTOMER_NAME,
        CUSTOMER_NUMBER,
        CUSTOMER_ABN,
        SERVICE_DESCRIPTION,
        CONTRACT_UNIT_PRICE,
        WASTE_KG,
        EXCESS_KG,
        CHARGE,
        SITE_NAME,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BinCategory {
    #[serde(rename = "660L")]
    L660,
    #[serde(rename = "240L")]
    L240,
    #[serde(rename = "120L")]
    L120,
}

impl BinCategory {
    /// Resolution order used when matching service descriptions.
    pub const ALL: [BinCategory; 3] = [BinCategory::L660, BinCategory::L240, BinCategory::L120];

    pub fn label(self) -> &'static str {
        match self {
            Self::L660 => "660L",
            Self::L240 => "240L",
            Self::L120 => "120L",
        }
    }
}

impl fmt::Display for BinCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BinCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "660L" | "660" => Ok(Self::L660),
            "240L" | "240" => Ok(Self::L240),
            "120L" | "120" => Ok(Self::L120),
            other => Err(format!("unknown bin category '{other}'")),
        }
    }
}

/// A billing rule violated by an invoice line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Discrepancy {
    IncorrectCustomerGroup,
    IncorrectCustomerName,
    InvalidCustomerNumber,
    IncorrectCustomerAbn,
    UnknownBinSize,
    IncorrectContractRate,
    BelowMinimumWeight,
    ExcessBelowMinimum,
    IdenticalWeights,
    Overcharge,
    Undercharge,
}

impl Discrepancy {
    pub fn message(self) -> &'static str {
        match self {
            Self::IncorrectCustomerGroup => "Incorrect customer group",
            Self::IncorrectCustomerName => "Incorrect customer name",
            Self::InvalidCustomerNumber => "Invalid customer number",
            Self::IncorrectCustomerAbn => "Incorrect customer ABN",
            Self::UnknownBinSize => "Unknown or missing bin size",
            Self::IncorrectContractRate => "Incorrect contract rate applied",
            Self::BelowMinimumWeight => "Waste weight below minimum",
            Self::ExcessBelowMinimum => "Excess charged below minimum weight",
            Self::IdenticalWeights => "Identical waste and excess weight",
            Self::Overcharge => "Overcharge - Incorrect total",
            Self::Undercharge => "Undercharge - Incorrect total",
        }
    }
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Weight band of a collection relative to its bin's tariff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightBand {
    Underweight,
    Normal,
    Overweight,
}

impl FromStr for WeightBand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "underweight" | "under" => Ok(Self::Underweight),
            "normal" => Ok(Self::Normal),
            "overweight" | "over" => Ok(Self::Overweight),
            other => Err(format!("unknown weight band '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeDirection {
    Overcharge,
    Undercharge,
}

impl FromStr for ChargeDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "overcharge" | "over" => Ok(Self::Overcharge),
            "undercharge" | "under" => Ok(Self::Undercharge),
            other => Err(format!("unknown charge direction '{other}'")),
        }
    }
}

/// Typed view over a raw sheet row.
///
/// Numeric cells that are missing or unparseable count as zero and leave a
/// warning behind instead of being coerced silently.
#[derive(Debug, Clone, Default)]
pub struct InvoiceLine {
    pub customer_group: String,
    pub customer_name: String,
    pub customer_number: String,
    pub customer_abn: String,
    pub service_description: String,
    pub site_name: String,
    pub contract_price: f64,
    pub waste_kg: f64,
    pub excess_kg: f64,
    pub invoiced_charge: f64,
    pub bin_qty: u32,
    pub included_kg: Option<f64>,
    pub warnings: Vec<String>,
}

impl InvoiceLine {
    pub fn from_raw(raw: &RawInvoiceLine) -> Self {
        let text = |key: &str| raw.get(key).map(|s| s.trim().to_string()).unwrap_or_default();
        let mut warnings = Vec::new();
        let mut required = |key: &str| match parse_cell(raw.get(key).map(String::as_str)) {
            CellValue::Value(v) => v,
            CellValue::Missing => {
                warnings.push(format!("Missing {key}"));
                0.0
            }
            CellValue::Invalid(s) => {
                warnings.push(format!("Unparseable {key}: '{s}'"));
                0.0
            }
        };

        let contract_price = required(columns::CONTRACT_UNIT_PRICE);
        let waste_kg = required(columns::WASTE_KG);
        let excess_kg = required(columns::EXCESS_KG);
        let invoiced_charge = required(columns::CHARGE);

        let qty_cell = raw
            .get(columns::BIN_QTY)
            .or_else(|| raw.get(columns::BIN_QTY_ALT))
            .map(String::as_str);
        let bin_qty = match parse_cell(qty_cell) {
            CellValue::Missing => 1,
            CellValue::Value(v) if v >= 0.0 && v.fract() == 0.0 => v as u32,
            CellValue::Value(v) => {
                warnings.push(format!("Unparseable {}: '{v}'", columns::BIN_QTY));
                1
            }
            CellValue::Invalid(s) => {
                warnings.push(format!("Unparseable {}: '{s}'", columns::BIN_QTY));
                1
            }
        };

        let included_kg = match parse_cell(raw.get(columns::INCLUDED_KG).map(String::as_str)) {
            CellValue::Value(v) => Some(v),
            CellValue::Missing => None,
            CellValue::Invalid(s) => {
                warnings.push(format!("Unparseable {}: '{s}'", columns::INCLUDED_KG));
                None
            }
        };

        InvoiceLine {
            customer_group: text(columns::CUSTOMER_GROUP),
            customer_name: text(columns::CUSTOMER_NAME),
            customer_number: text(columns::CUSTOMER_NUMBER),
            customer_abn: text(columns::CUSTOMER_ABN),
            service_description: text(columns::SERVICE_DESCRIPTION),
            site_name: text(columns::SITE_NAME),
            contract_price,
            waste_kg,
            excess_kg,
            invoiced_charge,
            bin_qty,
            included_kg,
            warnings,
        }
    }
}

/// An invoice line after validation and pricing. Built once per evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedRow {
    pub row_number: usize,
    pub site_name: String,
    pub category: Option<BinCategory>,
    pub service_description: String,
    pub contract_price: f64,
    pub waste_kg: f64,
    pub excess_kg: f64,
    pub invoiced_charge: f64,
    pub expected_charge: f64,
    /// Positive when the invoice charged too little, negative when too much.
    pub net_difference: f64,
    pub bin_qty: u32,
    pub included_kg: Option<f64>,
    pub discrepancy: Vec<Discrepancy>,
    pub warnings: Vec<String>,
}

impl ProcessedRow {
    pub fn is_correct(&self) -> bool {
        self.discrepancy.is_empty()
    }

    /// Waste plus invoiced excess, as used for weight bands.
    pub fn delivered_weight(&self) -> f64 {
        self.waste_kg + self.excess_kg
    }

    pub fn discrepancy_text(&self) -> String {
        self.discrepancy
            .iter()
            .map(|d| d.message())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// A processed row rendered for tables, search and export.
#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct DisplayRow {
    #[serde(rename = "Row")]
    #[tabled(rename = "Row")]
    pub row_number: usize,
    #[serde(rename = "Site")]
    #[tabled(rename = "Site")]
    pub site: String,
    #[serde(rename = "Bin Size")]
    #[tabled(rename = "Bin Size")]
    pub bin_size: String,
    #[serde(rename = "Service Description")]
    #[tabled(rename = "Service Description")]
    pub service_description: String,
    #[serde(rename = "Contract Price")]
    #[tabled(rename = "Contract Price")]
    pub contract_price: String,
    #[serde(rename = "Waste Kg")]
    #[tabled(rename = "Waste Kg")]
    pub waste_kg: String,
    #[serde(rename = "Excess Kg")]
    #[tabled(rename = "Excess Kg")]
    pub excess_kg: String,
    #[serde(rename = "Invoiced")]
    #[tabled(rename = "Invoiced")]
    pub invoiced_charge: String,
    #[serde(rename = "Expected")]
    #[tabled(rename = "Expected")]
    pub expected_charge: String,
    #[serde(rename = "Net Difference")]
    #[tabled(rename = "Net Difference")]
    pub net_difference: String,
    #[serde(rename = "Discrepancy")]
    #[tabled(rename = "Discrepancy")]
    pub discrepancy: String,
}

impl DisplayRow {
    pub const HEADERS: [&'static str; 11] = [
        "Row",
        "Site",
        "Bin Size",
        "Service Description",
        "Contract Price",
        "Waste Kg",
        "Excess Kg",
        "Invoiced",
        "Expected",
        "Net Difference",
        "Discrepancy",
    ];

    /// Field values in header order.
    pub fn fields(&self) -> [String; 11] {
        [
            self.row_number.to_string(),
            self.site.clone(),
            self.bin_size.clone(),
            self.service_description.clone(),
            self.contract_price.clone(),
            self.waste_kg.clone(),
            self.excess_kg.clone(),
            self.invoiced_charge.clone(),
            self.expected_charge.clone(),
            self.net_difference.clone(),
            self.discrepancy.clone(),
        ]
    }
}

#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct SummaryStatistics {
    pub total_rows: usize,
    pub total_correct: usize,
    pub total_errors: usize,
    pub bins_by_category: BTreeMap<BinCategory, u64>,
    pub total_bins: u64,
    pub overweight_bins: u64,
    pub underweight_bins: u64,
    pub total_waste_kg: f64,
    pub total_excess_kg: f64,
    pub corrected_excess_kg: f64,
    pub total_invoiced: f64,
    pub total_overcharge: f64,
    pub total_undercharge: f64,
    pub net_charge: f64,
}
