//! Main stock ledger orchestrator that coordinates products, transactions
//! and balance stock

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::ledger::{
    ConsumptionForm, ProductManager, ProductUpdate, PurchaseForm, SaleForm, TransactionBuilder,
    TransactionManager,
};
use crate::reconciliation::{BalanceReconciler, ReconcileOutcome, ReconcileSummary};
use crate::sheet::{
    self, ExportData, ImportReport, ProcessingStats, SheetColumn, SheetRow, SheetSection,
};
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::standardize_unit;

/// A committed transaction and what happened to the balance stock after it
///
/// The transaction is stored even when reconciliation fails; in that case
/// `balance` is `None` and the product's balance row is stale until the next
/// successful reconcile.
#[derive(Debug)]
pub struct Recorded<T> {
    pub record: T,
    pub balance: Option<BalanceStock>,
    pub reconciliation_error: Option<StockError>,
    /// Views a caller should refresh
    pub stale_views: Vec<LedgerView>,
}

impl<T> Recorded<T> {
    pub fn is_reconciled(&self) -> bool {
        self.reconciliation_error.is_none()
    }
}

enum ImportForm {
    Purchase(PurchaseForm),
    Sale(SaleForm),
    Consumption(ConsumptionForm),
}

enum ImportRecord {
    Purchase(Purchase),
    Sale(Sale),
    Consumption(Consumption),
}

fn section_view(section: SheetSection) -> LedgerView {
    match section {
        SheetSection::Purchase => LedgerView::Purchases,
        SheetSection::Sale => LedgerView::Sales,
        SheetSection::Consumption => LedgerView::Consumption,
        SheetSection::BalanceStock => LedgerView::BalanceStock,
    }
}

/// Main stock ledger that orchestrates all inventory operations
pub struct StockLedger<S: StockStorage> {
    product_manager: ProductManager<S>,
    transaction_manager: TransactionManager<S>,
    storage: S,
    reconciler: BalanceReconciler,
    settings: Settings,
}

impl<S: StockStorage + Clone> StockLedger<S> {
    /// Create a new ledger with the given storage backend and default settings
    pub fn new(storage: S) -> Self {
        Self::with_settings(storage, Settings::default())
    }

    /// Create a new ledger with explicit settings
    pub fn with_settings(storage: S, settings: Settings) -> Self {
        Self {
            product_manager: ProductManager::new(storage.clone()),
            transaction_manager: TransactionManager::with_builder(
                storage.clone(),
                TransactionBuilder::from_settings(&settings),
            ),
            reconciler: BalanceReconciler::from_settings(&settings),
            storage,
            settings,
        }
    }

    /// Create a new ledger with custom validators
    pub fn with_validators(
        storage: S,
        settings: Settings,
        product_validator: Box<dyn ProductValidator>,
        form_validator: Box<dyn FormValidator>,
    ) -> Self {
        Self {
            product_manager: ProductManager::with_validator(storage.clone(), product_validator),
            transaction_manager: TransactionManager::with_builder(
                storage.clone(),
                TransactionBuilder::from_settings(&settings).with_validator(form_validator),
            ),
            reconciler: BalanceReconciler::from_settings(&settings),
            storage,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // Product operations
    /// Create a new product
    pub async fn create_product(
        &mut self,
        name: String,
        hsn_code: String,
        units: String,
    ) -> StockResult<Product> {
        self.product_manager
            .create_product(name, hsn_code, standardize_unit(&units))
            .await
    }

    /// Get a product by ID
    pub async fn get_product(&self, product_id: Uuid) -> StockResult<Option<Product>> {
        self.product_manager.get_product(product_id).await
    }

    /// List all products
    pub async fn list_products(&self) -> StockResult<Vec<Product>> {
        self.product_manager.list_products().await
    }

    /// Correct product metadata
    pub async fn update_product(
        &mut self,
        product_id: Uuid,
        update: ProductUpdate,
    ) -> StockResult<Product> {
        self.product_manager.update_product(product_id, update).await
    }

    /// Delete a product no transaction refers to
    pub async fn delete_product(&mut self, product_id: Uuid) -> StockResult<()> {
        self.product_manager.delete_product(product_id).await
    }

    // Transaction operations
    /// Record a purchase and reconcile the product
    pub async fn record_purchase(&mut self, form: &PurchaseForm) -> StockResult<Recorded<Purchase>> {
        let purchase = self.transaction_manager.record_purchase(form).await?;
        Ok(self
            .after_write(purchase.product_id, purchase, LedgerView::Purchases)
            .await)
    }

    /// Record a sale and reconcile the product
    pub async fn record_sale(&mut self, form: &SaleForm) -> StockResult<Recorded<Sale>> {
        let sale = self.transaction_manager.record_sale(form).await?;
        Ok(self.after_write(sale.product_id, sale, LedgerView::Sales).await)
    }

    /// Record salon consumption and reconcile the product
    pub async fn record_consumption(
        &mut self,
        form: &ConsumptionForm,
    ) -> StockResult<Recorded<Consumption>> {
        let consumption = self.transaction_manager.record_consumption(form).await?;
        Ok(self
            .after_write(consumption.product_id, consumption, LedgerView::Consumption)
            .await)
    }

    /// Reclassify a cash sale as salon consumption
    pub async fn convert_cash_sale(&mut self, sale_id: Uuid) -> StockResult<Recorded<Consumption>> {
        let consumption = self.transaction_manager.convert_cash_sale(sale_id).await?;
        let mut recorded = self
            .after_write(consumption.product_id, consumption, LedgerView::Consumption)
            .await;
        recorded.stale_views.insert(0, LedgerView::Sales);
        Ok(recorded)
    }

    async fn after_write<T>(&mut self, product_id: Uuid, record: T, view: LedgerView) -> Recorded<T> {
        let stale_views = vec![view, LedgerView::BalanceStock];
        match self.reconciler.reconcile(&mut self.storage, product_id).await {
            Ok(outcome) => Recorded {
                record,
                balance: outcome.balance().cloned(),
                reconciliation_error: None,
                stale_views,
            },
            Err(err) => Recorded {
                record,
                balance: None,
                reconciliation_error: Some(err),
                stale_views,
            },
        }
    }

    pub async fn list_purchases(&self, product_id: Option<Uuid>) -> StockResult<Vec<Purchase>> {
        self.transaction_manager.list_purchases(product_id).await
    }

    pub async fn list_sales(&self, product_id: Option<Uuid>) -> StockResult<Vec<Sale>> {
        self.transaction_manager.list_sales(product_id).await
    }

    pub async fn list_consumption(&self, product_id: Option<Uuid>) -> StockResult<Vec<Consumption>> {
        self.transaction_manager.list_consumption(product_id).await
    }

    // Balance stock
    /// Recompute one product's balance stock
    pub async fn reconcile_product(&mut self, product_id: Uuid) -> StockResult<ReconcileOutcome> {
        self.reconciler.reconcile(&mut self.storage, product_id).await
    }

    /// Recompute every product's balance stock
    pub async fn reconcile_all(&mut self) -> StockResult<ReconcileSummary> {
        self.reconciler.reconcile_all(&mut self.storage).await
    }

    /// Get a product's balance stock row
    pub async fn balance_stock(&self, product_id: Uuid) -> StockResult<Option<BalanceStock>> {
        self.storage.get_balance(product_id).await
    }

    pub async fn list_balance_stock(&self) -> StockResult<Vec<BalanceStock>> {
        self.storage.list_balances().await
    }

    // Bulk import and export
    /// Import the CSV rendering of a stock sheet
    pub async fn import_csv(
        &mut self,
        text: &str,
        fallback_date: NaiveDate,
    ) -> StockResult<ImportReport> {
        let parsed = sheet::parse_stock_sheet(text)?;
        Ok(self
            .import_rows(parsed.rows, parsed.skipped, fallback_date)
            .await)
    }

    /// Import already tabulated sheet rows
    ///
    /// Rows are processed in order and a failing row never stops the batch.
    /// Balance stock is reconciled once per touched product at the end.
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub async fn import_rows(
        &mut self,
        rows: Vec<SheetRow>,
        skipped: usize,
        fallback_date: NaiveDate,
    ) -> ImportReport {
        let mut stats = ProcessingStats::start(rows.len(), skipped);
        let mut touched: BTreeSet<Uuid> = BTreeSet::new();
        let mut written_views: HashSet<LedgerView> = HashSet::new();
        let mut products_created = 0;

        for row in &rows {
            match self.import_row(row, fallback_date).await {
                Ok((product_id, created)) => {
                    touched.insert(product_id);
                    written_views.insert(section_view(row.section));
                    if created {
                        products_created += 1;
                        written_views.insert(LedgerView::Products);
                    }
                    stats.record_success();
                }
                Err(err) => {
                    warn!(line = row.line, error = %err, "Import row failed");
                    stats.record_failure(row.line, &err);
                }
            }
        }

        let mut reconciled = 0;
        let mut reconciliation_failures = HashMap::new();
        for product_id in touched {
            match self.reconciler.reconcile(&mut self.storage, product_id).await {
                Ok(_) => reconciled += 1,
                Err(err) => {
                    reconciliation_failures.insert(product_id, err.to_string());
                }
            }
        }

        if reconciled > 0 {
            written_views.insert(LedgerView::BalanceStock);
        }
        let stale_views = [
            LedgerView::Products,
            LedgerView::Purchases,
            LedgerView::Sales,
            LedgerView::Consumption,
            LedgerView::BalanceStock,
        ]
        .into_iter()
        .filter(|view| written_views.contains(view))
        .collect();

        stats.finish();
        info!(summary = %stats.summary(), products_created, reconciled, "Stock sheet imported");

        ImportReport {
            stats,
            products_created,
            reconciled,
            reconciliation_failures,
            stale_views,
        }
    }

    async fn import_row(&mut self, row: &SheetRow, fallback_date: NaiveDate) -> StockResult<(Uuid, bool)> {
        // Nothing is stored until the row's record has been built, so a
        // malformed or invalid row leaves no product behind
        let form = match row.section {
            SheetSection::Purchase => {
                ImportForm::Purchase(sheet::purchase_form(row, Uuid::nil(), fallback_date)?)
            }
            SheetSection::Sale => ImportForm::Sale(sheet::sale_form(row, Uuid::nil(), fallback_date)?),
            SheetSection::Consumption => {
                ImportForm::Consumption(sheet::consumption_form(row, Uuid::nil(), fallback_date)?)
            }
            SheetSection::BalanceStock => {
                return Err(StockError::ImportRow {
                    line: row.line,
                    message: "Balance stock rows are derived and cannot be imported".to_string(),
                });
            }
        };

        let (product, is_new) = self
            .product_manager
            .find_or_prepare(
                row.get(SheetColumn::ProductName),
                row.get(SheetColumn::HsnCode),
                &standardize_unit(row.get(SheetColumn::Units)),
            )
            .await?;

        let transactions = &self.transaction_manager;
        let record = match form {
            ImportForm::Purchase(mut form) => {
                form.product_id = product.id;
                ImportRecord::Purchase(transactions.build_purchase(&product, &form)?)
            }
            ImportForm::Sale(mut form) => {
                form.product_id = product.id;
                ImportRecord::Sale(transactions.build_sale(&product, &form).await?)
            }
            ImportForm::Consumption(mut form) => {
                form.product_id = product.id;
                ImportRecord::Consumption(transactions.build_consumption(&product, &form).await?)
            }
        };

        if is_new {
            self.product_manager.save_new(&product).await?;
        }

        let committed = match record {
            ImportRecord::Purchase(purchase) => self
                .transaction_manager
                .commit_purchase(purchase)
                .await
                .map(|_| ()),
            ImportRecord::Sale(sale) => self.transaction_manager.commit_sale(sale).await.map(|_| ()),
            ImportRecord::Consumption(consumption) => self
                .transaction_manager
                .commit_consumption(consumption)
                .await
                .map(|_| ()),
        };

        if let Err(err) = committed {
            if is_new {
                if let Err(cleanup) = self.product_manager.delete_product(product.id).await {
                    warn!(product_id = %product.id, error = %cleanup, "Could not remove product of a failed import row");
                }
            }
            return Err(err);
        }

        Ok((product.id, is_new))
    }

    /// Export every ledger as CSV, with balance rows dated `as_of`
    pub async fn export_csv(&self, as_of: NaiveDate) -> StockResult<String> {
        let products = self.storage.list_products().await?;
        let purchases = self.storage.list_purchases(None).await?;
        let sales = self.storage.list_sales(None).await?;
        let consumption = self.storage.list_consumption(None).await?;
        let balances = self.storage.list_balances().await?;

        sheet::export_stock_csv(
            ExportData {
                products: &products,
                purchases: &purchases,
                sales: &sales,
                consumption: &consumption,
                balances: &balances,
            },
            as_of,
        )
    }

    /// Validate the integrity of the stock ledger
    ///
    /// Compares each stored balance row against a fresh recompute and checks
    /// the money invariant of every stored record.
    pub async fn validate_integrity(&self) -> StockResult<StockIntegrityReport> {
        let mut issues = Vec::new();
        let products = self.storage.list_products().await?;

        for product in &products {
            let ledger = self.reconciler.load_ledger(&self.storage, product.id).await?;
            let expected = self.reconciler.compute(&ledger)?;

            match self.storage.get_balance(product.id).await? {
                Some(stored) if stored != expected => issues.push(format!(
                    "Balance stock for '{}' is stale: stored qty {}, expected {}",
                    product.name, stored.quantity, expected.quantity
                )),
                None if expected.quantity > BigDecimal::from(0) => issues.push(format!(
                    "Balance stock for '{}' is missing",
                    product.name
                )),
                _ => {}
            }

            for purchase in &ledger.purchases {
                if !purchase.amounts.is_consistent() {
                    issues.push(format!("Purchase {} amounts do not add up", purchase.invoice_number));
                }
            }
            for sale in &ledger.sales {
                if !sale.amounts.is_consistent() || !sale.cost.amounts.is_consistent() {
                    issues.push(format!("Sale {} amounts do not add up", sale.invoice_number));
                }
            }
            for entry in &ledger.consumption {
                if !entry.cost.amounts.is_consistent() {
                    issues.push(format!(
                        "Consumption {} amounts do not add up",
                        entry.requisition_voucher_number
                    ));
                }
            }
        }

        for balance in self.storage.list_balances().await? {
            if !products.iter().any(|p| p.id == balance.product_id) {
                issues.push(format!(
                    "Balance stock row for unknown product {}",
                    balance.product_id
                ));
            }
        }

        Ok(StockIntegrityReport {
            is_valid: issues.is_empty(),
            products_checked: products.len(),
            issues,
        })
    }
}

/// Report on stock ledger integrity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockIntegrityReport {
    pub is_valid: bool,
    pub products_checked: usize,
    pub issues: Vec<String>,
}
