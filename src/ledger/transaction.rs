//! Transaction processing and management

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::Settings;
use crate::tax::gst::{round_money, LineInput, TaxCalculator};
use crate::traits::*;
use crate::types::*;

/// Purpose recorded on consumption converted from a cash sale
pub const CONVERTED_SALE_PURPOSE: &str = "Converted from cash sale";

/// Purchase as entered on the stock-in form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseForm {
    pub product_id: Uuid,
    pub date: NaiveDate,
    pub invoice_number: String,
    pub supplier: Option<String>,
    pub quantity: BigDecimal,
    pub mrp_incl_gst: BigDecimal,
    pub discount_percentage: BigDecimal,
    /// Missing or zero means the configured default rate
    pub gst_percentage: Option<BigDecimal>,
}

/// Sale as entered on the stock-out form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleForm {
    pub product_id: Uuid,
    pub date: NaiveDate,
    pub invoice_number: String,
    pub customer: Option<String>,
    pub payment_method: PaymentMethod,
    pub quantity: BigDecimal,
    pub mrp_incl_gst: BigDecimal,
    pub discount_percentage: BigDecimal,
    pub gst_percentage: BigDecimal,
}

/// Salon consumption as entered on the requisition form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionForm {
    pub product_id: Uuid,
    pub date: NaiveDate,
    pub requisition_voucher_number: String,
    pub purpose: String,
    pub quantity: BigDecimal,
    /// Price to derive a cost from when the product was never purchased
    pub reference_mrp_incl_gst: Option<BigDecimal>,
    pub reference_gst_percentage: Option<BigDecimal>,
}

/// Builds validated, fully priced ledger records from form input
pub struct TransactionBuilder {
    calculator: TaxCalculator,
    validator: Box<dyn FormValidator>,
    default_gst_percentage: BigDecimal,
    fallback_cost_ratio: BigDecimal,
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl TransactionBuilder {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            calculator: settings.tax_calculator(),
            validator: Box::new(DefaultFormValidator),
            default_gst_percentage: settings.default_gst_percentage.clone(),
            fallback_cost_ratio: settings.fallback_cost_ratio.clone(),
        }
    }

    /// Replace the field rules
    pub fn with_validator(mut self, validator: Box<dyn FormValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn calculator(&self) -> &TaxCalculator {
        &self.calculator
    }

    fn check_product(&self, errors: &mut ValidationErrors, product: &Product) {
        if product.name.trim().is_empty()
            || product.hsn_code.trim().is_empty()
            || product.units.trim().is_empty()
        {
            errors.add("product_id", "Product needs a name, HSN code and units");
        }
    }

    /// GST rate for a purchase form
    pub fn purchase_gst(&self, gst_percentage: Option<&BigDecimal>) -> BigDecimal {
        gst_percentage
            .filter(|g| **g != BigDecimal::from(0))
            .cloned()
            .unwrap_or_else(|| self.default_gst_percentage.clone())
    }

    /// Build a purchase record
    pub fn purchase(&self, product: &Product, form: &PurchaseForm) -> StockResult<Purchase> {
        let gst_percentage = self.purchase_gst(form.gst_percentage.as_ref());

        let mut errors = ValidationErrors::new();
        self.check_product(&mut errors, product);
        self.validator
            .check_document_number(&mut errors, "invoice_number", &form.invoice_number);
        self.validator
            .check_quantity(&mut errors, "quantity", &form.quantity);
        self.validator
            .check_price(&mut errors, "mrp_incl_gst", &form.mrp_incl_gst);
        self.validator
            .check_percentage(&mut errors, "discount_percentage", &form.discount_percentage);
        self.validator
            .check_gst(&mut errors, "gst_percentage", &gst_percentage);
        errors.into_result()?;

        let line = self.calculator.calculate_line(&LineInput {
            mrp_incl_gst: form.mrp_incl_gst.clone(),
            gst_percentage: gst_percentage.clone(),
            discount_percentage: form.discount_percentage.clone(),
            quantity: form.quantity.clone(),
        })?;

        Ok(Purchase {
            id: Uuid::new_v4(),
            product_id: product.id,
            date: form.date,
            invoice_number: form.invoice_number.trim().to_string(),
            supplier: non_blank(form.supplier.as_deref()),
            quantity: form.quantity.clone(),
            mrp_incl_gst: form.mrp_incl_gst.clone(),
            mrp_excl_gst: line.mrp_excl_gst,
            discount_percentage: form.discount_percentage.clone(),
            gst_percentage,
            discounted_rate: line.discounted_rate,
            amounts: line.amounts,
            created_at: chrono::Utc::now().naive_utc(),
        })
    }

    /// Resolve the per-unit cost of stock leaving the shelf
    ///
    /// The latest purchase wins. Without one, `fallback` (MRP excl. GST and
    /// GST percentage of a reference price) is scaled by the fallback ratio.
    pub fn cost_basis(
        &self,
        latest_purchase: Option<&Purchase>,
        fallback: Option<(BigDecimal, BigDecimal)>,
    ) -> Option<CostBasis> {
        if let Some(purchase) = latest_purchase {
            return Some(CostBasis {
                source: CostSource::Purchase(purchase.id),
                cost_per_unit_excl_gst: purchase.discounted_rate.clone(),
                gst_percentage: purchase.gst_percentage.clone(),
            });
        }

        fallback.map(|(mrp_excl_gst, gst_percentage)| CostBasis {
            source: CostSource::MrpFallback,
            cost_per_unit_excl_gst: round_money(&(&self.fallback_cost_ratio * mrp_excl_gst)),
            gst_percentage,
        })
    }

    /// Cost-side amounts for a quantity at a cost basis
    pub fn cost_breakdown(&self, basis: CostBasis, quantity: &BigDecimal) -> StockResult<CostBreakdown> {
        let taxable_value = self
            .calculator
            .rounding()
            .step(&basis.cost_per_unit_excl_gst * quantity);
        let amounts = self
            .calculator
            .amounts_for_taxable(&taxable_value, &basis.gst_percentage)?;
        Ok(CostBreakdown { basis, amounts })
    }

    /// Build a sale record, pricing both the sale and its cost of goods
    pub fn sale(
        &self,
        product: &Product,
        latest_purchase: Option<&Purchase>,
        form: &SaleForm,
    ) -> StockResult<Sale> {
        let mut errors = ValidationErrors::new();
        self.check_product(&mut errors, product);
        self.validator
            .check_document_number(&mut errors, "invoice_number", &form.invoice_number);
        self.validator
            .check_quantity(&mut errors, "quantity", &form.quantity);
        self.validator
            .check_price(&mut errors, "mrp_incl_gst", &form.mrp_incl_gst);
        self.validator
            .check_percentage(&mut errors, "discount_percentage", &form.discount_percentage);
        self.validator
            .check_gst(&mut errors, "gst_percentage", &form.gst_percentage);
        errors.into_result()?;

        let line = self.calculator.calculate_line(&LineInput {
            mrp_incl_gst: form.mrp_incl_gst.clone(),
            gst_percentage: form.gst_percentage.clone(),
            discount_percentage: form.discount_percentage.clone(),
            quantity: form.quantity.clone(),
        })?;

        let fallback = (line.mrp_excl_gst.clone(), form.gst_percentage.clone());
        let basis = self
            .cost_basis(latest_purchase, Some(fallback))
            .ok_or_else(|| StockError::validation("mrp_incl_gst", "No cost basis available"))?;
        if basis.is_fallback() {
            debug!(product_id = %product.id, "No purchase on record; sale cost uses MRP fallback");
        }
        let cost = self.cost_breakdown(basis, &form.quantity)?;

        Ok(Sale {
            id: Uuid::new_v4(),
            product_id: product.id,
            date: form.date,
            invoice_number: form.invoice_number.trim().to_string(),
            customer: non_blank(form.customer.as_deref()),
            payment_method: form.payment_method,
            quantity: form.quantity.clone(),
            cost,
            mrp_incl_gst: form.mrp_incl_gst.clone(),
            mrp_excl_gst: line.mrp_excl_gst,
            discount_percentage: form.discount_percentage.clone(),
            gst_percentage: form.gst_percentage.clone(),
            discounted_rate: line.discounted_rate,
            amounts: line.amounts,
            created_at: chrono::Utc::now().naive_utc(),
        })
    }

    /// Build a consumption record valued at cost
    pub fn consumption(
        &self,
        product: &Product,
        latest_purchase: Option<&Purchase>,
        form: &ConsumptionForm,
    ) -> StockResult<Consumption> {
        let mut errors = ValidationErrors::new();
        self.check_product(&mut errors, product);
        self.validator.check_document_number(
            &mut errors,
            "requisition_voucher_number",
            &form.requisition_voucher_number,
        );
        self.validator
            .check_quantity(&mut errors, "quantity", &form.quantity);
        if let Some(mrp) = &form.reference_mrp_incl_gst {
            self.validator.check_price(&mut errors, "mrp_incl_gst", mrp);
        }
        if let Some(gst) = &form.reference_gst_percentage {
            self.validator.check_gst(&mut errors, "gst_percentage", gst);
        }
        errors.into_result()?;

        let fallback = form
            .reference_mrp_incl_gst
            .as_ref()
            .map(|mrp| {
                let gst_percentage = form
                    .reference_gst_percentage
                    .clone()
                    .unwrap_or_else(|| self.default_gst_percentage.clone());
                let mrp_excl_gst = self.calculator.mrp_excl_gst(mrp, &gst_percentage)?;
                Ok::<_, StockError>((mrp_excl_gst, gst_percentage))
            })
            .transpose()?;
        let basis = self.cost_basis(latest_purchase, fallback).ok_or_else(|| {
            StockError::validation(
                "mrp_incl_gst",
                "A reference MRP incl. GST is required for a product with no purchases",
            )
        })?;
        let cost = self.cost_breakdown(basis, &form.quantity)?;

        Ok(Consumption {
            id: Uuid::new_v4(),
            product_id: product.id,
            date: form.date,
            requisition_voucher_number: form.requisition_voucher_number.trim().to_string(),
            purpose: form.purpose.trim().to_string(),
            quantity: form.quantity.clone(),
            cost,
            original_sale_id: None,
            created_at: chrono::Utc::now().naive_utc(),
        })
    }

    /// Reclassify a cash sale as salon consumption, keeping its cost
    pub fn consumption_from_sale(&self, sale: &Sale) -> StockResult<Consumption> {
        if sale.payment_method != PaymentMethod::Cash {
            return Err(StockError::validation(
                "payment_method",
                "Only cash sales can be converted to consumption",
            ));
        }

        let basis = CostBasis {
            source: CostSource::Sale(sale.id),
            cost_per_unit_excl_gst: sale.cost.basis.cost_per_unit_excl_gst.clone(),
            gst_percentage: sale.cost.basis.gst_percentage.clone(),
        };

        Ok(Consumption {
            id: Uuid::new_v4(),
            product_id: sale.product_id,
            date: sale.date,
            requisition_voucher_number: sale.invoice_number.clone(),
            purpose: CONVERTED_SALE_PURPOSE.to_string(),
            quantity: sale.quantity.clone(),
            cost: CostBreakdown {
                basis,
                amounts: sale.cost.amounts.clone(),
            },
            original_sale_id: Some(sale.id),
            created_at: chrono::Utc::now().naive_utc(),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Transaction manager for handling transaction operations
pub struct TransactionManager<S: StockStorage> {
    storage: S,
    builder: TransactionBuilder,
}

impl<S: StockStorage> TransactionManager<S> {
    /// Create a new transaction manager
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            builder: TransactionBuilder::default(),
        }
    }

    /// Create a new transaction manager with a custom builder
    pub fn with_builder(storage: S, builder: TransactionBuilder) -> Self {
        Self { storage, builder }
    }

    pub fn builder(&self) -> &TransactionBuilder {
        &self.builder
    }

    async fn product_required(&self, product_id: Uuid) -> StockResult<Product> {
        self.storage
            .get_product(product_id)
            .await?
            .ok_or(StockError::ProductNotFound(product_id))
    }

    /// Most recent purchase of a product by date, then by creation time
    pub async fn latest_purchase(&self, product_id: Uuid) -> StockResult<Option<Purchase>> {
        let purchases = self.storage.list_purchases(Some(product_id)).await?;
        Ok(purchases
            .into_iter()
            .max_by(|a, b| a.date.cmp(&b.date).then(a.created_at.cmp(&b.created_at))))
    }

    /// Validate, price and store a purchase
    #[instrument(skip(self, form), fields(product_id = %form.product_id))]
    pub async fn record_purchase(&mut self, form: &PurchaseForm) -> StockResult<Purchase> {
        let product = self.product_required(form.product_id).await?;
        let purchase = self.build_purchase(&product, form)?;
        self.commit_purchase(purchase).await
    }

    /// Validate, price and store a sale
    #[instrument(skip(self, form), fields(product_id = %form.product_id))]
    pub async fn record_sale(&mut self, form: &SaleForm) -> StockResult<Sale> {
        let product = self.product_required(form.product_id).await?;
        let sale = self.build_sale(&product, form).await?;
        self.commit_sale(sale).await
    }

    /// Validate, cost and store a consumption entry
    #[instrument(skip(self, form), fields(product_id = %form.product_id))]
    pub async fn record_consumption(&mut self, form: &ConsumptionForm) -> StockResult<Consumption> {
        let product = self.product_required(form.product_id).await?;
        let consumption = self.build_consumption(&product, form).await?;
        self.commit_consumption(consumption).await
    }

    /// Build a purchase without storing it
    pub fn build_purchase(&self, product: &Product, form: &PurchaseForm) -> StockResult<Purchase> {
        self.builder.purchase(product, form)
    }

    /// Build a sale without storing it, costed from the product's latest purchase
    pub async fn build_sale(&self, product: &Product, form: &SaleForm) -> StockResult<Sale> {
        let latest = self.latest_purchase(product.id).await?;
        self.builder.sale(product, latest.as_ref(), form)
    }

    /// Build a consumption entry without storing it
    pub async fn build_consumption(
        &self,
        product: &Product,
        form: &ConsumptionForm,
    ) -> StockResult<Consumption> {
        let latest = self.latest_purchase(product.id).await?;
        self.builder.consumption(product, latest.as_ref(), form)
    }

    pub async fn commit_purchase(&mut self, purchase: Purchase) -> StockResult<Purchase> {
        self.storage.insert_purchase(&purchase).await?;
        info!(
            purchase_id = %purchase.id,
            quantity = %purchase.quantity,
            taxable_value = %purchase.amounts.taxable_value,
            "Purchase recorded"
        );
        Ok(purchase)
    }

    pub async fn commit_sale(&mut self, sale: Sale) -> StockResult<Sale> {
        self.storage.insert_sale(&sale).await?;
        info!(
            sale_id = %sale.id,
            quantity = %sale.quantity,
            invoice_value = %sale.amounts.invoice_value,
            "Sale recorded"
        );
        Ok(sale)
    }

    pub async fn commit_consumption(&mut self, consumption: Consumption) -> StockResult<Consumption> {
        self.storage.insert_consumption(&consumption).await?;
        info!(
            consumption_id = %consumption.id,
            quantity = %consumption.quantity,
            "Consumption recorded"
        );
        Ok(consumption)
    }

    /// Convert a cash sale into a consumption entry
    ///
    /// The sale row stays as it was; the new entry points back at it and
    /// each sale can be converted once.
    #[instrument(skip(self))]
    pub async fn convert_cash_sale(&mut self, sale_id: Uuid) -> StockResult<Consumption> {
        let sale = self
            .storage
            .get_sale(sale_id)
            .await?
            .ok_or(StockError::SaleNotFound(sale_id))?;

        let already_converted = self
            .storage
            .list_consumption(Some(sale.product_id))
            .await?
            .iter()
            .any(|c| c.original_sale_id == Some(sale_id));
        if already_converted {
            return Err(StockError::validation(
                "sale_id",
                "Sale has already been converted to consumption",
            ));
        }

        let consumption = self.builder.consumption_from_sale(&sale)?;
        self.storage.insert_consumption(&consumption).await?;
        info!(%sale_id, consumption_id = %consumption.id, "Cash sale converted to consumption");
        Ok(consumption)
    }

    pub async fn list_purchases(&self, product_id: Option<Uuid>) -> StockResult<Vec<Purchase>> {
        self.storage.list_purchases(product_id).await
    }

    pub async fn list_sales(&self, product_id: Option<Uuid>) -> StockResult<Vec<Sale>> {
        self.storage.list_sales(product_id).await
    }

    pub async fn list_consumption(&self, product_id: Option<Uuid>) -> StockResult<Vec<Consumption>> {
        self.storage.list_consumption(product_id).await
    }
}
