//! Cost-per-unit strategies for valuing balance stock

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ProductLedger;

/// Attributes a purchase cost (excl. GST) to each unit still on the shelf
pub trait CostingStrategy: Send + Sync + fmt::Debug {
    /// `None` when there is nothing to average over
    fn cost_per_unit(&self, ledger: &ProductLedger) -> Option<BigDecimal>;

    fn name(&self) -> &'static str;
}

/// Σ purchase taxable value / Σ purchase quantity over the whole history
#[derive(Debug, Clone, Copy, Default)]
pub struct LifetimeAverage;

impl CostingStrategy for LifetimeAverage {
    fn cost_per_unit(&self, ledger: &ProductLedger) -> Option<BigDecimal> {
        let quantity = ledger.total_purchased();
        if quantity <= BigDecimal::from(0) {
            return None;
        }

        let value: BigDecimal = ledger
            .purchases
            .iter()
            .map(|p| &p.amounts.taxable_value)
            .sum();
        Some(value / quantity)
    }

    fn name(&self) -> &'static str {
        "lifetime_average"
    }
}

/// Outflows consume the oldest purchases first
#[derive(Debug, Clone, Copy, Default)]
pub struct Fifo;

impl CostingStrategy for Fifo {
    fn cost_per_unit(&self, ledger: &ProductLedger) -> Option<BigDecimal> {
        remaining_layer_cost(ledger, LayerOrder::OldestFirst)
    }

    fn name(&self) -> &'static str {
        "fifo"
    }
}

/// Outflows consume the newest purchases first
#[derive(Debug, Clone, Copy, Default)]
pub struct Lifo;

impl CostingStrategy for Lifo {
    fn cost_per_unit(&self, ledger: &ProductLedger) -> Option<BigDecimal> {
        remaining_layer_cost(ledger, LayerOrder::NewestFirst)
    }

    fn name(&self) -> &'static str {
        "lifo"
    }
}

enum LayerOrder {
    OldestFirst,
    NewestFirst,
}

/// Deplete purchase layers by the total outflow, then average what is left
fn remaining_layer_cost(ledger: &ProductLedger, order: LayerOrder) -> Option<BigDecimal> {
    let zero = BigDecimal::from(0);
    let mut layers: Vec<(&BigDecimal, &BigDecimal)> = ledger
        .purchases
        .iter()
        .filter(|p| p.quantity > zero)
        .map(|p| (&p.quantity, &p.amounts.taxable_value))
        .collect();
    if let LayerOrder::NewestFirst = order {
        layers.reverse();
    }

    let mut outflow = ledger.total_sold() + ledger.total_consumed();
    let mut remaining_qty = BigDecimal::from(0);
    let mut remaining_value = BigDecimal::from(0);

    for (quantity, value) in layers {
        if outflow >= *quantity {
            outflow -= quantity;
            continue;
        }

        if outflow > zero {
            let left = quantity - &outflow;
            remaining_value += value * &left / quantity;
            remaining_qty += left;
            outflow = BigDecimal::from(0);
        } else {
            remaining_value += value;
            remaining_qty += quantity;
        }
    }

    if remaining_qty > zero {
        Some(remaining_value / remaining_qty)
    } else {
        None
    }
}

/// Configurable choice of costing strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostingMethod {
    #[default]
    LifetimeAverage,
    Fifo,
    Lifo,
}

impl CostingMethod {
    pub fn strategy(&self) -> Box<dyn CostingStrategy> {
        match self {
            CostingMethod::LifetimeAverage => Box::new(LifetimeAverage),
            CostingMethod::Fifo => Box::new(Fifo),
            CostingMethod::Lifo => Box::new(Lifo),
        }
    }
}
