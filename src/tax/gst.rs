//! GST (Goods and Services Tax) calculation engine for stock line items

use bigdecimal::{BigDecimal, RoundingMode};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::GstAmounts;

/// Round a monetary value to two decimal places, half-up
pub fn round_money(value: &BigDecimal) -> BigDecimal {
    value.with_scale_round(2, RoundingMode::HalfUp)
}

fn percent(rate: &BigDecimal) -> BigDecimal {
    rate / BigDecimal::from(100)
}

/// When intermediate values are rounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingPolicy {
    /// Round every step to 2 dp before it feeds the next one.
    /// Matches the values already stored by earlier versions of the system.
    #[default]
    Chained,
    /// Keep intermediates exact and round only the outputs
    SinglePoint,
}

impl RoundingPolicy {
    /// Apply the policy to an intermediate value
    pub fn step(&self, value: BigDecimal) -> BigDecimal {
        match self {
            RoundingPolicy::Chained => round_money(&value),
            RoundingPolicy::SinglePoint => value,
        }
    }
}

/// A GST percentage and how it is split between the tax heads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GstRate {
    /// Total percentage, 18 for 18%
    pub total_rate: BigDecimal,
    /// Central share
    pub cgst_rate: BigDecimal,
    /// State share
    pub sgst_rate: BigDecimal,
    /// Integrated tax, inter-state only
    pub igst_rate: BigDecimal,
}

impl GstRate {
    /// Half CGST, half SGST
    pub fn intra_state(total_rate: BigDecimal) -> Self {
        let half_rate = &total_rate / BigDecimal::from(2);
        Self {
            total_rate,
            cgst_rate: half_rate.clone(),
            sgst_rate: half_rate,
            igst_rate: BigDecimal::from(0),
        }
    }

    /// All IGST
    pub fn inter_state(total_rate: BigDecimal) -> Self {
        Self {
            total_rate: total_rate.clone(),
            cgst_rate: BigDecimal::from(0),
            sgst_rate: BigDecimal::from(0),
            igst_rate: total_rate,
        }
    }

    pub fn is_inter_state(&self) -> bool {
        self.igst_rate > BigDecimal::from(0)
    }

    /// Reject negative rates and component splits that do not sum to the total
    pub fn validate(&self) -> Result<(), GstError> {
        let zero = BigDecimal::from(0);

        if self.total_rate < zero {
            return Err(GstError::InvalidRate(format!(
                "GST rate cannot be negative: {}",
                self.total_rate
            )));
        }

        let components = &self.cgst_rate + &self.sgst_rate + &self.igst_rate;
        if components != self.total_rate {
            return Err(GstError::InvalidRate(format!(
                "CGST + SGST + IGST is {components}, expected {}",
                self.total_rate
            )));
        }

        let split = self.cgst_rate > zero || self.sgst_rate > zero;
        if self.igst_rate > zero && split {
            return Err(GstError::InvalidRate(
                "IGST cannot be combined with CGST or SGST".to_string(),
            ));
        }
        if self.cgst_rate != self.sgst_rate && self.igst_rate == zero {
            return Err(GstError::InvalidRate(
                "CGST and SGST must be charged at the same rate".to_string(),
            ));
        }

        Ok(())
    }
}

/// Decides how a GST percentage is split between CGST, SGST and IGST
pub trait TaxJurisdiction: Send + Sync + fmt::Debug {
    /// Rate structure to charge for a GST percentage
    fn rate_for(&self, gst_percentage: &BigDecimal) -> GstRate;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Every sale is within the state: CGST + SGST, no IGST
#[derive(Debug, Clone, Copy, Default)]
pub struct IntraState;

impl TaxJurisdiction for IntraState {
    fn rate_for(&self, gst_percentage: &BigDecimal) -> GstRate {
        GstRate::intra_state(gst_percentage.clone())
    }

    fn name(&self) -> &'static str {
        "intra_state"
    }
}

/// Every sale crosses a state border: IGST only
#[derive(Debug, Clone, Copy, Default)]
pub struct InterState;

impl TaxJurisdiction for InterState {
    fn rate_for(&self, gst_percentage: &BigDecimal) -> GstRate {
        GstRate::inter_state(gst_percentage.clone())
    }

    fn name(&self) -> &'static str {
        "inter_state"
    }
}

/// Rule found in older balance and import code: a positive rate below 0.1 is
/// read as a fraction (0.05 meaning 5%) and charged entirely as IGST.
///
/// Whether this was meant as inter-state detection or works around rates
/// stored as fractions is unresolved, so it is opt-in only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyFractionalRate;

impl LegacyFractionalRate {
    fn threshold() -> BigDecimal {
        BigDecimal::from(1) / BigDecimal::from(10)
    }
}

impl TaxJurisdiction for LegacyFractionalRate {
    fn rate_for(&self, gst_percentage: &BigDecimal) -> GstRate {
        if *gst_percentage > BigDecimal::from(0) && *gst_percentage < Self::threshold() {
            GstRate::inter_state(gst_percentage * BigDecimal::from(100))
        } else {
            GstRate::intra_state(gst_percentage.clone())
        }
    }

    fn name(&self) -> &'static str {
        "legacy_fractional_rate"
    }
}

/// Configurable choice of jurisdiction strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JurisdictionKind {
    #[default]
    IntraState,
    InterState,
    LegacyFractionalRate,
}

impl JurisdictionKind {
    pub fn strategy(&self) -> Box<dyn TaxJurisdiction> {
        match self {
            JurisdictionKind::IntraState => Box::new(IntraState),
            JurisdictionKind::InterState => Box::new(InterState),
            JurisdictionKind::LegacyFractionalRate => Box::new(LegacyFractionalRate),
        }
    }
}

/// Pricing inputs for one line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineInput {
    pub mrp_incl_gst: BigDecimal,
    pub gst_percentage: BigDecimal,
    pub discount_percentage: BigDecimal,
    pub quantity: BigDecimal,
}

/// Detailed GST calculation breakdown for one line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineCalculation {
    /// MRP with the GST component taken out
    pub mrp_excl_gst: BigDecimal,
    /// MRP excl. GST after discount
    pub discounted_rate: BigDecimal,
    /// Rate structure the tax was split with
    pub gst_rate: GstRate,
    pub amounts: GstAmounts,
}

/// GST calculation engine
#[derive(Debug)]
pub struct TaxCalculator {
    rounding: RoundingPolicy,
    jurisdiction: Box<dyn TaxJurisdiction>,
}

impl Default for TaxCalculator {
    fn default() -> Self {
        Self::new(RoundingPolicy::Chained, Box::new(IntraState))
    }
}

impl TaxCalculator {
    /// Create a new calculator with explicit rounding and jurisdiction
    pub fn new(rounding: RoundingPolicy, jurisdiction: Box<dyn TaxJurisdiction>) -> Self {
        Self {
            rounding,
            jurisdiction,
        }
    }

    pub fn rounding(&self) -> RoundingPolicy {
        self.rounding
    }

    pub fn jurisdiction(&self) -> &dyn TaxJurisdiction {
        self.jurisdiction.as_ref()
    }

    /// Take the GST component out of a GST-inclusive price
    pub fn mrp_excl_gst(
        &self,
        mrp_incl_gst: &BigDecimal,
        gst_percentage: &BigDecimal,
    ) -> Result<BigDecimal, GstError> {
        let divisor = BigDecimal::from(1) + percent(gst_percentage);
        if divisor <= BigDecimal::from(0) {
            return Err(GstError::Calculation(format!(
                "cannot take {gst_percentage}% GST out of a price"
            )));
        }
        Ok(self.rounding.step(mrp_incl_gst / divisor))
    }

    /// Price a line item from its GST-inclusive MRP
    pub fn calculate_line(&self, input: &LineInput) -> Result<LineCalculation, GstError> {
        let gst_rate = self.jurisdiction.rate_for(&input.gst_percentage);
        gst_rate.validate()?;

        let mrp_excl_gst = self.mrp_excl_gst(&input.mrp_incl_gst, &input.gst_percentage)?;
        let discounted_rate = self
            .rounding
            .step(&mrp_excl_gst * (BigDecimal::from(1) - percent(&input.discount_percentage)));
        let taxable_value = self.rounding.step(&discounted_rate * &input.quantity);

        let amounts = self.split(&taxable_value, &gst_rate);

        Ok(LineCalculation {
            mrp_excl_gst: round_money(&mrp_excl_gst),
            discounted_rate: round_money(&discounted_rate),
            gst_rate,
            amounts,
        })
    }

    /// Tax split over an already known taxable value
    pub fn amounts_for_taxable(
        &self,
        taxable_value: &BigDecimal,
        gst_percentage: &BigDecimal,
    ) -> Result<GstAmounts, GstError> {
        let gst_rate = self.jurisdiction.rate_for(gst_percentage);
        gst_rate.validate()?;
        Ok(self.split(taxable_value, &gst_rate))
    }

    fn split(&self, taxable_value: &BigDecimal, gst_rate: &GstRate) -> GstAmounts {
        let zero = round_money(&BigDecimal::from(0));
        let total_gst = self
            .rounding
            .step(taxable_value * percent(&gst_rate.total_rate));

        let (cgst, sgst, igst) = if gst_rate.is_inter_state() {
            (zero.clone(), zero, round_money(&total_gst))
        } else {
            let half = round_money(&(&total_gst / BigDecimal::from(2)));
            (half.clone(), half, zero)
        };

        let taxable_value = round_money(taxable_value);
        let invoice_value = round_money(&(&taxable_value + &cgst + &sgst + &igst));

        GstAmounts {
            taxable_value,
            cgst,
            sgst,
            igst,
            invoice_value,
        }
    }
}

/// GST-related errors
#[derive(Debug, thiserror::Error)]
pub enum GstError {
    #[error("Invalid GST rate: {0}")]
    InvalidRate(String),
    #[error("Calculation error: {0}")]
    Calculation(String),
}
