//! Balance stock reconciliation
//!
//! A product's balance stock row is derived data: it is recomputed from
//! scratch from the purchase, sale and consumption ledgers every time one
//! of them changes. Recomputing twice over the same ledgers writes the
//! same row, so reconciliation is always safe to re-run.

pub mod costing;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::tax::gst::{round_money, TaxCalculator};
use crate::traits::StockStorage;
use crate::types::*;
use costing::{CostingStrategy, LifetimeAverage};

/// What to do with the balance row once a product runs out of stock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalancePolicy {
    /// Always write the row, with the raw quantity and zero value
    #[default]
    AlwaysUpsert,
    /// Update an existing row, never insert one for a non-positive quantity
    LegacyUpdateOrSkip,
}

/// Everything recorded against one product
#[derive(Debug, Clone, PartialEq)]
pub struct ProductLedger {
    pub product: Product,
    /// Oldest first
    pub purchases: Vec<Purchase>,
    pub sales: Vec<Sale>,
    pub consumption: Vec<Consumption>,
}

impl ProductLedger {
    pub fn new(
        product: Product,
        mut purchases: Vec<Purchase>,
        sales: Vec<Sale>,
        consumption: Vec<Consumption>,
    ) -> Self {
        purchases.sort_by(|a, b| a.date.cmp(&b.date).then(a.created_at.cmp(&b.created_at)));
        Self {
            product,
            purchases,
            sales,
            consumption,
        }
    }

    pub fn total_purchased(&self) -> BigDecimal {
        self.purchases.iter().map(|p| &p.quantity).sum()
    }

    /// True when a consumption entry was converted from this sale
    pub fn is_converted(&self, sale_id: Uuid) -> bool {
        self.consumption
            .iter()
            .any(|c| c.original_sale_id == Some(sale_id))
    }

    /// Sold quantity, leaving out sales reclassified as consumption
    pub fn total_sold(&self) -> BigDecimal {
        self.sales
            .iter()
            .filter(|s| !self.is_converted(s.id))
            .map(|s| &s.quantity)
            .sum()
    }

    pub fn total_consumed(&self) -> BigDecimal {
        self.consumption.iter().map(|c| &c.quantity).sum()
    }

    /// Purchased minus sold minus consumed; converted sales count once, as consumption
    pub fn balance_quantity(&self) -> BigDecimal {
        self.total_purchased() - self.total_sold() - self.total_consumed()
    }

    /// Most recent purchase by date, then by creation time
    pub fn latest_purchase(&self) -> Option<&Purchase> {
        self.purchases.last()
    }
}

/// Result of reconciling one product
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// A new or changed row was written
    Written(BalanceStock),
    /// The stored row already matched the ledgers
    Unchanged(BalanceStock),
    /// Nothing was written (legacy policy, no stock and no existing row)
    Skipped { quantity: BigDecimal },
}

impl ReconcileOutcome {
    /// The balance row now in storage, if any
    pub fn balance(&self) -> Option<&BalanceStock> {
        match self {
            ReconcileOutcome::Written(balance) | ReconcileOutcome::Unchanged(balance) => {
                Some(balance)
            }
            ReconcileOutcome::Skipped { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileFailure {
    pub product_id: Uuid,
    pub reason: String,
}

/// Tally of a reconcile-all run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    pub written: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failures: Vec<ReconcileFailure>,
}

impl ReconcileSummary {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Recomputes balance stock rows from the ledgers
#[derive(Debug)]
pub struct BalanceReconciler {
    policy: BalancePolicy,
    costing: Box<dyn CostingStrategy>,
    calculator: TaxCalculator,
}

impl Default for BalanceReconciler {
    fn default() -> Self {
        Self::new(
            BalancePolicy::default(),
            Box::new(LifetimeAverage),
            TaxCalculator::default(),
        )
    }
}

impl BalanceReconciler {
    /// Create a new reconciler
    pub fn new(
        policy: BalancePolicy,
        costing: Box<dyn CostingStrategy>,
        calculator: TaxCalculator,
    ) -> Self {
        Self {
            policy,
            costing,
            calculator,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.balance_policy,
            settings.costing.strategy(),
            settings.tax_calculator(),
        )
    }

    pub fn policy(&self) -> BalancePolicy {
        self.policy
    }

    /// Compute the balance row for a product without touching storage
    pub fn compute(&self, ledger: &ProductLedger) -> StockResult<BalanceStock> {
        let zero = BigDecimal::from(0);
        let quantity = ledger.balance_quantity();

        let mut balance = BalanceStock {
            product_id: ledger.product.id,
            quantity: quantity.clone(),
            total_purchased: ledger.total_purchased(),
            total_sold: ledger.total_sold(),
            total_consumed: ledger.total_consumed(),
            avg_cost_per_unit: round_money(&zero),
            gst_percentage: zero.clone(),
            amounts: GstAmounts::zero(),
        };

        if quantity <= zero {
            return Ok(balance);
        }

        let rounding = self.calculator.rounding();
        let avg_cost = rounding.step(self.costing.cost_per_unit(ledger).unwrap_or(zero.clone()));
        let value = rounding.step(&quantity * &avg_cost);
        let gst_percentage = ledger
            .latest_purchase()
            .map(|p| p.gst_percentage.clone())
            .unwrap_or(zero);

        balance.amounts = self.calculator.amounts_for_taxable(&value, &gst_percentage)?;
        balance.avg_cost_per_unit = round_money(&avg_cost);
        balance.gst_percentage = gst_percentage;
        Ok(balance)
    }

    /// Fetch a product and its three ledgers
    pub async fn load_ledger<S: StockStorage>(
        &self,
        storage: &S,
        product_id: Uuid,
    ) -> StockResult<ProductLedger> {
        let product = storage
            .get_product(product_id)
            .await?
            .ok_or(StockError::ProductNotFound(product_id))?;
        let purchases = storage.list_purchases(Some(product_id)).await?;
        let sales = storage.list_sales(Some(product_id)).await?;
        let consumption = storage.list_consumption(Some(product_id)).await?;

        Ok(ProductLedger::new(product, purchases, sales, consumption))
    }

    /// Recompute and store the balance row of one product
    ///
    /// Any failure aborts before the write and is reported as
    /// [`StockError::Reconciliation`].
    #[instrument(skip(self, storage), fields(costing = self.costing.name()))]
    pub async fn reconcile<S: StockStorage>(
        &self,
        storage: &mut S,
        product_id: Uuid,
    ) -> StockResult<ReconcileOutcome> {
        self.try_reconcile(storage, product_id)
            .await
            .map_err(|err| {
                warn!(%product_id, error = %err, "Balance stock reconciliation failed");
                match err {
                    StockError::Reconciliation { .. } => err,
                    other => StockError::Reconciliation {
                        product_id,
                        reason: other.to_string(),
                    },
                }
            })
    }

    async fn try_reconcile<S: StockStorage>(
        &self,
        storage: &mut S,
        product_id: Uuid,
    ) -> StockResult<ReconcileOutcome> {
        let ledger = self.load_ledger(storage, product_id).await?;
        let balance = self.compute(&ledger)?;
        let existing = storage.get_balance(product_id).await?;

        if existing.as_ref() == Some(&balance) {
            debug!(%product_id, "Balance stock already up to date");
            return Ok(ReconcileOutcome::Unchanged(balance));
        }

        if self.policy == BalancePolicy::LegacyUpdateOrSkip
            && existing.is_none()
            && balance.quantity <= BigDecimal::from(0)
        {
            debug!(%product_id, quantity = %balance.quantity, "No stock and no balance row; skipping");
            return Ok(ReconcileOutcome::Skipped {
                quantity: balance.quantity,
            });
        }

        storage.upsert_balance(&balance).await?;
        debug!(
            %product_id,
            quantity = %balance.quantity,
            value = %balance.amounts.taxable_value,
            "Balance stock written"
        );
        Ok(ReconcileOutcome::Written(balance))
    }

    /// Reconcile every product, collecting failures instead of stopping
    #[instrument(skip(self, storage))]
    pub async fn reconcile_all<S: StockStorage>(&self, storage: &mut S) -> StockResult<ReconcileSummary> {
        let products = storage.list_products().await?;
        let mut summary = ReconcileSummary::default();

        for product in products {
            match self.reconcile(storage, product.id).await {
                Ok(ReconcileOutcome::Written(_)) => summary.written += 1,
                Ok(ReconcileOutcome::Unchanged(_)) => summary.unchanged += 1,
                Ok(ReconcileOutcome::Skipped { .. }) => summary.skipped += 1,
                Err(err) => summary.failures.push(ReconcileFailure {
                    product_id: product.id,
                    reason: err.to_string(),
                }),
            }
        }

        info!(
            written = summary.written,
            unchanged = summary.unchanged,
            skipped = summary.skipped,
            failed = summary.failures.len(),
            "Reconciled all balance stock"
        );
        Ok(summary)
    }
}
