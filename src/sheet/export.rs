//! Flat CSV export of the stock ledgers

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::HashMap;
use uuid::Uuid;

use crate::types::*;

/// Header row of the export
pub const EXPORT_HEADERS: [&str; 29] = [
    "Date",
    "Product Name",
    "HSN Code",
    "Units",
    "Transaction Type",
    "Qty.",
    "Document No.",
    "Supplier/Customer",
    "Payment Method",
    "Purpose",
    "MRP Incl. GST",
    "MRP Excl. GST",
    "Discount %",
    "Discounted Rate Excl. GST",
    "GST %",
    "Taxable Value",
    "IGST",
    "CGST",
    "SGST",
    "Invoice Value",
    "Purchase Cost Per Unit Excl. GST",
    "Purchase GST %",
    "Purchase Taxable Value",
    "Purchase IGST",
    "Purchase CGST",
    "Purchase SGST",
    "Total Purchase Cost",
    "Balance Qty",
    "Average Cost Per Unit",
];

/// Transaction type written for the per-product summary rows
pub const BALANCE_STOCK_TYPE: &str = "BALANCE STOCK";

/// Everything the export reads
#[derive(Debug, Clone, Copy)]
pub struct ExportData<'a> {
    pub products: &'a [Product],
    pub purchases: &'a [Purchase],
    pub sales: &'a [Sale],
    pub consumption: &'a [Consumption],
    pub balances: &'a [BalanceStock],
}

#[derive(Default)]
struct ExportRow {
    cells: Vec<String>,
}

impl ExportRow {
    fn new(date: NaiveDate, product: Option<&Product>, kind: &str) -> Self {
        let mut row = Self {
            cells: vec![String::new(); EXPORT_HEADERS.len()],
        };
        row.set(0, date.format("%Y-%m-%d").to_string());
        if let Some(product) = product {
            row.set(1, product.name.clone());
            row.set(2, product.hsn_code.clone());
            row.set(3, product.units.clone());
        }
        row.set(4, kind.to_string());
        row
    }

    fn set(&mut self, index: usize, value: String) {
        if let Some(cell) = self.cells.get_mut(index) {
            *cell = value;
        }
    }

    fn decimal(&mut self, index: usize, value: &BigDecimal) {
        self.set(index, value.to_string());
    }

    /// Sale-side or purchase-side price columns
    fn pricing(
        &mut self,
        mrp_incl_gst: &BigDecimal,
        mrp_excl_gst: &BigDecimal,
        discount_percentage: &BigDecimal,
        discounted_rate: &BigDecimal,
        gst_percentage: &BigDecimal,
    ) {
        self.decimal(10, mrp_incl_gst);
        self.decimal(11, mrp_excl_gst);
        self.decimal(12, discount_percentage);
        self.decimal(13, discounted_rate);
        self.decimal(14, gst_percentage);
    }

    fn amounts(&mut self, amounts: &GstAmounts) {
        self.decimal(15, &amounts.taxable_value);
        self.decimal(16, &amounts.igst);
        self.decimal(17, &amounts.cgst);
        self.decimal(18, &amounts.sgst);
        self.decimal(19, &amounts.invoice_value);
    }

    fn cost(&mut self, cost_per_unit: &BigDecimal, gst_percentage: &BigDecimal, amounts: &GstAmounts) {
        self.decimal(20, cost_per_unit);
        self.decimal(21, gst_percentage);
        self.decimal(22, &amounts.taxable_value);
        self.decimal(23, &amounts.igst);
        self.decimal(24, &amounts.cgst);
        self.decimal(25, &amounts.sgst);
        self.decimal(26, &amounts.invoice_value);
    }
}

/// Write purchases, sales and consumption in date order, then one
/// BALANCE STOCK row per product dated `as_of`
pub fn export_stock_csv(data: ExportData<'_>, as_of: NaiveDate) -> StockResult<String> {
    let products: HashMap<Uuid, &Product> = data.products.iter().map(|p| (p.id, p)).collect();
    let product = |id: &Uuid| products.get(id).copied();

    let mut rows: Vec<ExportRow> = Vec::new();

    let mut purchases: Vec<&Purchase> = data.purchases.iter().collect();
    purchases.sort_by(|a, b| a.date.cmp(&b.date).then(a.created_at.cmp(&b.created_at)));
    for purchase in purchases {
        let mut row = ExportRow::new(purchase.date, product(&purchase.product_id), "Purchase");
        row.decimal(5, &purchase.quantity);
        row.set(6, purchase.invoice_number.clone());
        row.set(7, purchase.supplier.clone().unwrap_or_default());
        row.pricing(
            &purchase.mrp_incl_gst,
            &purchase.mrp_excl_gst,
            &purchase.discount_percentage,
            &purchase.discounted_rate,
            &purchase.gst_percentage,
        );
        row.amounts(&purchase.amounts);
        row.cost(
            &purchase.discounted_rate,
            &purchase.gst_percentage,
            &purchase.amounts,
        );
        rows.push(row);
    }

    let mut sales: Vec<&Sale> = data.sales.iter().collect();
    sales.sort_by(|a, b| a.date.cmp(&b.date).then(a.created_at.cmp(&b.created_at)));
    for sale in sales {
        let mut row = ExportRow::new(sale.date, product(&sale.product_id), "Sale");
        row.decimal(5, &sale.quantity);
        row.set(6, sale.invoice_number.clone());
        row.set(7, sale.customer.clone().unwrap_or_default());
        row.set(8, sale.payment_method.as_str().to_string());
        row.pricing(
            &sale.mrp_incl_gst,
            &sale.mrp_excl_gst,
            &sale.discount_percentage,
            &sale.discounted_rate,
            &sale.gst_percentage,
        );
        row.amounts(&sale.amounts);
        row.cost(
            &sale.cost.basis.cost_per_unit_excl_gst,
            &sale.cost.basis.gst_percentage,
            &sale.cost.amounts,
        );
        rows.push(row);
    }

    let mut consumption: Vec<&Consumption> = data.consumption.iter().collect();
    consumption.sort_by(|a, b| a.date.cmp(&b.date).then(a.created_at.cmp(&b.created_at)));
    for entry in consumption {
        let mut row = ExportRow::new(entry.date, product(&entry.product_id), "Consumption");
        row.decimal(5, &entry.quantity);
        row.set(6, entry.requisition_voucher_number.clone());
        row.set(9, entry.purpose.clone());
        row.decimal(14, &entry.cost.basis.gst_percentage);
        row.amounts(&entry.cost.amounts);
        row.cost(
            &entry.cost.basis.cost_per_unit_excl_gst,
            &entry.cost.basis.gst_percentage,
            &entry.cost.amounts,
        );
        rows.push(row);
    }

    let balances: HashMap<Uuid, &BalanceStock> =
        data.balances.iter().map(|b| (b.product_id, b)).collect();
    let mut summary_products: Vec<&Product> = data.products.iter().collect();
    summary_products.sort_by(|a, b| a.name.cmp(&b.name).then(a.hsn_code.cmp(&b.hsn_code)));
    for item in summary_products {
        let mut row = ExportRow::new(as_of, Some(item), BALANCE_STOCK_TYPE);
        match balances.get(&item.id) {
            Some(balance) => {
                row.decimal(5, &balance.display_quantity());
                row.decimal(14, &balance.gst_percentage);
                row.amounts(&balance.amounts);
                row.decimal(27, &balance.quantity);
                row.decimal(28, &balance.avg_cost_per_unit);
            }
            None => {
                row.decimal(5, &BigDecimal::from(0));
                row.amounts(&GstAmounts::zero());
                row.decimal(27, &BigDecimal::from(0));
            }
        }
        rows.push(row);
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(EXPORT_HEADERS)?;
    for row in rows {
        writer.write_record(&row.cells)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| StockError::Sheet(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| StockError::Sheet(e.to_string()))
}
