//! Runtime settings for the stock ledger
//!
//! Settings are layered: built-in defaults, then an optional
//! `config/salon_stock.{toml,yaml,json}` file, then `SALON_STOCK__*`
//! environment variables.

use bigdecimal::BigDecimal;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::reconciliation::costing::CostingMethod;
use crate::reconciliation::BalancePolicy;
use crate::tax::gst::{JurisdictionKind, RoundingPolicy, TaxCalculator};
use crate::types::{StockError, StockResult};

const CONFIG_FILE: &str = "config/salon_stock";
const ENV_PREFIX: &str = "SALON_STOCK";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// GST percentage applied to a purchase submitted without one
    pub default_gst_percentage: BigDecimal,
    /// Share of the MRP excl. GST assumed as cost when a product has no purchases
    pub fallback_cost_ratio: BigDecimal,
    pub rounding: RoundingPolicy,
    pub balance_policy: BalancePolicy,
    pub jurisdiction: JurisdictionKind,
    pub costing: CostingMethod,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_gst_percentage: BigDecimal::from(18),
            fallback_cost_ratio: BigDecimal::from(1) / BigDecimal::from(2),
            rounding: RoundingPolicy::default(),
            balance_policy: BalancePolicy::default(),
            jurisdiction: JurisdictionKind::default(),
            costing: CostingMethod::default(),
        }
    }
}

impl Settings {
    /// Load settings from the config file and environment
    pub fn load() -> StockResult<Self> {
        let config = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        Self::from_config(config)
    }

    /// Deserialize and validate an already built configuration
    pub fn from_config(config: Config) -> StockResult<Self> {
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        debug!(
            rounding = ?settings.rounding,
            balance_policy = ?settings.balance_policy,
            jurisdiction = ?settings.jurisdiction,
            costing = ?settings.costing,
            "Loaded stock ledger settings"
        );
        Ok(settings)
    }

    pub fn validate(&self) -> StockResult<()> {
        let zero = BigDecimal::from(0);

        if self.default_gst_percentage < zero {
            return Err(StockError::Config(format!(
                "default_gst_percentage cannot be negative: {}",
                self.default_gst_percentage
            )));
        }

        if self.fallback_cost_ratio < zero || self.fallback_cost_ratio > BigDecimal::from(1) {
            return Err(StockError::Config(format!(
                "fallback_cost_ratio must be between 0 and 1: {}",
                self.fallback_cost_ratio
            )));
        }

        if self.jurisdiction == JurisdictionKind::LegacyFractionalRate {
            warn!("Legacy fractional-rate jurisdiction enabled; rates below 0.1 are charged as IGST");
        }

        Ok(())
    }

    /// Tax calculator configured with these settings
    pub fn tax_calculator(&self) -> TaxCalculator {
        TaxCalculator::new(self.rounding, self.jurisdiction.strategy())
    }
}
