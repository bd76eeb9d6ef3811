use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ReconError, Result};
use crate::types::{BinCategory, WeightBand};

// ---------------------------------------------------------------------------
// Tariffs
// ---------------------------------------------------------------------------

/// Pricing for one bin size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinTariff {
    pub base_price: f64,
    /// Weight covered by the base price, in kg. Also the underweight bound.
    pub included_weight: f64,
    /// Price per kg above `included_weight`.
    pub excess_rate: f64,
    /// Delivered weight above this is overweight.
    pub band_upper: f64,
    /// Service-description substring that identifies this bin size.
    pub description_match: String,
}

impl BinTariff {
    pub fn expected_charge(&self, excess_kg: f64) -> f64 {
        self.base_price + self.excess_rate * excess_kg
    }

    /// Bounds are inclusive on the normal side.
    pub fn band_for(&self, delivered_kg: f64) -> WeightBand {
        if delivered_kg < self.included_weight {
            WeightBand::Underweight
        } else if delivered_kg > self.band_upper {
            WeightBand::Overweight
        } else {
            WeightBand::Normal
        }
    }
}

/// Each tariff, and each field within it, may be omitted in TOML; gaps are
/// filled from the standard tariff for that bin size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TariffTableFile")]
pub struct TariffTable {
    #[serde(rename = "660L")]
    pub l660: BinTariff,
    #[serde(rename = "240L")]
    pub l240: BinTariff,
    #[serde(rename = "120L")]
    pub l120: BinTariff,
}

static STANDARD_TARIFFS: Lazy<TariffTable> = Lazy::new(|| TariffTable {
    l660: BinTariff {
        base_price: 128.93,
        included_weight: 49.0,
        excess_rate: 2.63,
        band_upper: 89.0,
        description_match: "660L".to_string(),
    },
    l240: BinTariff {
        base_price: 34.21,
        included_weight: 13.0,
        excess_rate: 2.63,
        band_upper: 33.0,
        description_match: "240L".to_string(),
    },
    l120: BinTariff {
        base_price: 19.32,
        included_weight: 8.0,
        excess_rate: 2.63,
        band_upper: 18.0,
        description_match: "120L Clinical Collection".to_string(),
    },
});

impl Default for TariffTable {
    fn default() -> Self {
        STANDARD_TARIFFS.clone()
    }
}

/// On-disk form of one tariff: every field optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct BinTariffFile {
    base_price: Option<f64>,
    included_weight: Option<f64>,
    excess_rate: Option<f64>,
    band_upper: Option<f64>,
    description_match: Option<String>,
}

impl BinTariffFile {
    fn over(self, standard: &BinTariff) -> BinTariff {
        BinTariff {
            base_price: self.base_price.unwrap_or(standard.base_price),
            included_weight: self.included_weight.unwrap_or(standard.included_weight),
            excess_rate: self.excess_rate.unwrap_or(standard.excess_rate),
            band_upper: self.band_upper.unwrap_or(standard.band_upper),
            description_match: self
                .description_match
                .unwrap_or_else(|| standard.description_match.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct TariffTableFile {
    #[serde(rename = "660L")]
    l660: BinTariffFile,
    #[serde(rename = "240L")]
    l240: BinTariffFile,
    #[serde(rename = "120L")]
    l120: BinTariffFile,
}

impl From<TariffTableFile> for TariffTable {
    fn from(file: TariffTableFile) -> Self {
        TariffTable {
            l660: file.l660.over(&STANDARD_TARIFFS.l660),
            l240: file.l240.over(&STANDARD_TARIFFS.l240),
            l120: file.l120.over(&STANDARD_TARIFFS.l120),
        }
    }
}

impl TariffTable {
    pub fn get(&self, category: BinCategory) -> &BinTariff {
        match category {
            BinCategory::L660 => &self.l660,
            BinCategory::L240 => &self.l240,
            BinCategory::L120 => &self.l120,
        }
    }

    /// First category, in `BinCategory::ALL` order, whose match text occurs
    /// in the description.
    pub fn resolve(&self, description: &str) -> Option<(BinCategory, &BinTariff)> {
        BinCategory::ALL
            .into_iter()
            .map(|category| (category, self.get(category)))
            .find(|(_, tariff)| description.contains(tariff.description_match.as_str()))
    }

    fn validate(&self) -> Result<()> {
        for category in BinCategory::ALL {
            let t = self.get(category);
            let numbers = [t.base_price, t.included_weight, t.excess_rate, t.band_upper];
            if numbers.iter().any(|n| !n.is_finite()) {
                return Err(ReconError::ConfigValidation(format!(
                    "tariff {category}: prices and weights must be finite numbers"
                )));
            }
            if t.base_price < 0.0 || t.excess_rate < 0.0 || t.included_weight < 0.0 {
                return Err(ReconError::ConfigValidation(format!(
                    "tariff {category}: prices and weights must not be negative"
                )));
            }
            if t.band_upper < t.included_weight {
                return Err(ReconError::ConfigValidation(format!(
                    "tariff {category}: band_upper {} is below included_weight {}",
                    t.band_upper, t.included_weight
                )));
            }
            if t.description_match.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "tariff {category}: description_match is empty"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Policy switches
// ---------------------------------------------------------------------------

/// Where the excess weight used for pricing comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExcessSource {
    /// The `Excess kg` cell as invoiced.
    #[default]
    Invoiced,
    /// `max(0, waste - included_weight)`.
    DerivedFromWaste,
}

impl ExcessSource {
    pub fn excess_used(self, tariff: &BinTariff, waste_kg: f64, invoiced_excess_kg: f64) -> f64 {
        match self {
            Self::Invoiced => invoiced_excess_kg,
            Self::DerivedFromWaste => (waste_kg - tariff.included_weight).max(0.0),
        }
    }
}

/// Which rows the summary statistics are computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateScope {
    All,
    #[default]
    Filtered,
    /// Every processed row with at least one discrepancy.
    Discrepancies,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerIdentity {
    pub group: String,
    pub name: String,
    pub abn: String,
    pub numbers: Vec<String>,
}

impl Default for CustomerIdentity {
    fn default() -> Self {
        CustomerIdentity {
            group: "EASTERN HEALTH".to_string(),
            name: "Eastern Health".to_string(),
            abn: "68 223 819 017".to_string(),
            numbers: (1..=10).map(|n| format!("EH{n:04}")).collect(),
        }
    }
}

impl CustomerIdentity {
    pub fn abn_matches(&self, abn: &str) -> bool {
        let digits = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
        digits(abn) == digits(&self.abn)
    }

    pub fn number_is_valid(&self, number: &str) -> bool {
        self.numbers.iter().any(|n| n == number.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingPolicy {
    pub tariffs: TariffTable,
    pub excess_source: ExcessSource,
    pub aggregate_scope: AggregateScope,
    pub customer: CustomerIdentity,
}

/// Toggles that change validation output and force a full re-evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationFlags {
    /// Record a discrepancy when waste is below the included weight.
    pub flag_low_weight: bool,
}

impl Default for ValidationFlags {
    fn default() -> Self {
        ValidationFlags { flag_low_weight: true }
    }
}

// ---------------------------------------------------------------------------
// Sites
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteDirectory {
    /// Sheet site name -> name shown to users.
    pub display_names: BTreeMap<String, String>,
    /// Sites never shown in the filtered view.
    pub hidden: BTreeSet<String>,
}

impl Default for SiteDirectory {
    fn default() -> Self {
        SiteDirectory {
            display_names: [("Ferntree Gully", "Angliss"), ("Maroonda", "Maroondah")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            hidden: ["VCCC".to_string()].into_iter().collect(),
        }
    }
}

impl SiteDirectory {
    pub fn display_name<'a>(&'a self, site: &'a str) -> &'a str {
        self.display_names.get(site).map(String::as_str).unwrap_or(site)
    }

    pub fn is_hidden(&self, site: &str) -> bool {
        self.hidden.contains(site)
    }
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    pub pricing: PricingPolicy,
    pub flags: ValidationFlags,
    pub sites: SiteDirectory,
}

impl BillingConfig {
    pub fn from_toml(s: &str) -> Result<Self> {
        let config: BillingConfig = toml::from_str(s)?;
        config.pricing.tariffs.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Load `path` if it exists, otherwise fall back to the built-in policy.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            info!(path = %path.display(), "loading billing config");
            Self::load(path)
        } else {
            info!(path = %path.display(), "no billing config found, using built-in tariffs");
            Ok(Self::default())
        }
    }
}
