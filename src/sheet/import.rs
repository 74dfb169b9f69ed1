//! Stock sheet parsing and row-to-form mapping

use bigdecimal::BigDecimal;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{SheetColumn, SheetRow, SheetSection};
use crate::ledger::transaction::{ConsumptionForm, PurchaseForm, SaleForm};
use crate::tax::gst::round_money;
use crate::types::*;

/// Data rows of a stock sheet, grouped by section in file order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedSheet {
    pub rows: Vec<SheetRow>,
    /// Rows outside any importable section, or without a product name
    pub skipped: usize,
}

/// Parse the CSV rendering of a stock sheet
///
/// Only an unreadable CSV is an error; a bad value in a data row is left
/// for the row's own mapping to report.
pub fn parse_stock_sheet(text: &str) -> StockResult<ParsedSheet> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut parsed = ParsedSheet::default();
    let mut section: Option<SheetSection> = None;
    let mut columns: Vec<Option<SheetColumn>> = Vec::new();
    let mut expecting_header = false;

    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(index + 1);

        if record.iter().all(str::is_empty) {
            continue;
        }

        let row_text = record.iter().collect::<Vec<_>>().join(" ");
        if let Some(found) = SheetSection::detect(&row_text) {
            section = Some(found);
            expecting_header = true;
            continue;
        }

        if expecting_header {
            columns = record.iter().map(SheetColumn::from_header).collect();
            expecting_header = false;
            continue;
        }

        let current = match section {
            Some(SheetSection::BalanceStock) | None => {
                parsed.skipped += 1;
                continue;
            }
            Some(current) => current,
        };

        let mut row = SheetRow::new(line, current);
        for (column, value) in columns.iter().zip(record.iter()) {
            if let Some(column) = column {
                row.set(*column, value);
            }
        }

        if row.is_blank(SheetColumn::ProductName) {
            parsed.skipped += 1;
            continue;
        }

        parsed.rows.push(row);
    }

    Ok(parsed)
}

/// Parse a sheet date: ISO, dd-mm-yyyy, dd/mm/yyyy or an Excel serial number.
/// A blank cell takes the fallback date.
pub fn parse_sheet_date(raw: &str, fallback: NaiveDate) -> Result<NaiveDate, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(fallback);
    }

    for format in ["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Ok(date);
        }
    }

    if let Some(prefix) = raw.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Ok(date);
        }
    }

    let whole_days = raw.split('.').next().unwrap_or(raw);
    if let Ok(serial) = whole_days.parse::<i64>() {
        // Excel counts days from 1899-12-30
        if (1..=2_958_465).contains(&serial) {
            if let Some(date) = NaiveDate::from_ymd_opt(1899, 12, 30)
                .and_then(|epoch| epoch.checked_add_signed(Duration::days(serial)))
            {
                return Ok(date);
            }
        }
    }

    Err(format!("Unrecognised date '{raw}'"))
}

/// Parse a numeric cell. Blank is zero; thousands separators, currency
/// signs and a trailing % are ignored.
pub fn parse_sheet_number(column: &str, raw: &str) -> Result<BigDecimal, String> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('₹')
        .trim_end_matches('%')
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return Ok(BigDecimal::from(0));
    }

    BigDecimal::from_str(&cleaned).map_err(|_| format!("Invalid number in {column}: '{raw}'"))
}

fn row_error(row: &SheetRow, message: impl Into<String>) -> StockError {
    StockError::ImportRow {
        line: row.line,
        message: message.into(),
    }
}

fn number(row: &SheetRow, column: SheetColumn) -> StockResult<BigDecimal> {
    parse_sheet_number(&format!("{column:?}"), row.get(column)).map_err(|m| row_error(row, m))
}

fn date(row: &SheetRow, fallback: NaiveDate) -> StockResult<NaiveDate> {
    parse_sheet_date(row.get(SheetColumn::Date), fallback).map_err(|m| row_error(row, m))
}

/// Pricing recovered from a sheet row's value columns
#[derive(Debug, Clone, PartialEq)]
pub struct InferredPricing {
    pub quantity: BigDecimal,
    pub mrp_incl_gst: BigDecimal,
    pub gst_percentage: BigDecimal,
    pub discount_percentage: BigDecimal,
}

/// Work out GST %, MRP incl. GST and discount % from a row
///
/// An explicit GST % or discount % column wins. Otherwise GST % is the tax
/// columns over the taxable value, or else Incl. GST over Ex. GST; discount %
/// is the taxable value against Ex. GST × qty.
pub fn infer_pricing(row: &SheetRow) -> StockResult<InferredPricing> {
    let zero = BigDecimal::from(0);
    let hundred = BigDecimal::from(100);

    let quantity = number(row, SheetColumn::Quantity)?;
    let incl = number(row, SheetColumn::MrpInclGst)?;
    let ex = number(row, SheetColumn::MrpExclGst)?;
    let taxable = number(row, SheetColumn::TaxableValue)?;
    let taxes = number(row, SheetColumn::Igst)?
        + number(row, SheetColumn::Cgst)?
        + number(row, SheetColumn::Sgst)?;

    let gst_percentage = if !row.is_blank(SheetColumn::GstPercentage) {
        number(row, SheetColumn::GstPercentage)?
    } else if taxable > zero && taxes > zero {
        round_money(&(&taxes / &taxable * &hundred))
    } else if incl > zero && ex > zero {
        round_money(&((&incl / &ex - BigDecimal::from(1)) * &hundred))
    } else {
        zero.clone()
    };

    let mrp_incl_gst = if incl > zero {
        incl
    } else {
        round_money(&(&ex * (BigDecimal::from(1) + &gst_percentage / &hundred)))
    };

    let discount_percentage = if !row.is_blank(SheetColumn::DiscountPercentage) {
        number(row, SheetColumn::DiscountPercentage)?
    } else if ex > zero && quantity > zero && taxable > zero {
        let raw = round_money(&((BigDecimal::from(1) - &taxable / (&ex * &quantity)) * &hundred));
        raw.max(zero.clone()).min(hundred.clone())
    } else {
        zero
    };

    Ok(InferredPricing {
        quantity,
        mrp_incl_gst,
        gst_percentage,
        discount_percentage,
    })
}

fn party(row: &SheetRow) -> Option<String> {
    Some(row.get(SheetColumn::Party).to_string()).filter(|p| !p.is_empty())
}

/// Map a purchase row to a purchase form
pub fn purchase_form(
    row: &SheetRow,
    product_id: Uuid,
    fallback_date: NaiveDate,
) -> StockResult<PurchaseForm> {
    let pricing = infer_pricing(row)?;
    Ok(PurchaseForm {
        product_id,
        date: date(row, fallback_date)?,
        invoice_number: row.get(SheetColumn::DocumentNumber).to_string(),
        supplier: party(row),
        quantity: pricing.quantity,
        mrp_incl_gst: pricing.mrp_incl_gst,
        discount_percentage: pricing.discount_percentage,
        gst_percentage: Some(pricing.gst_percentage),
    })
}

/// Map a sale row to a sale form
pub fn sale_form(row: &SheetRow, product_id: Uuid, fallback_date: NaiveDate) -> StockResult<SaleForm> {
    let pricing = infer_pricing(row)?;
    Ok(SaleForm {
        product_id,
        date: date(row, fallback_date)?,
        invoice_number: row.get(SheetColumn::DocumentNumber).to_string(),
        customer: party(row),
        payment_method: PaymentMethod::parse_lenient(row.get(SheetColumn::PaymentMethod)),
        quantity: pricing.quantity,
        mrp_incl_gst: pricing.mrp_incl_gst,
        discount_percentage: pricing.discount_percentage,
        gst_percentage: pricing.gst_percentage,
    })
}

/// Map a consumption row to a consumption form
///
/// A reference price is only carried when the row has MRP columns.
pub fn consumption_form(
    row: &SheetRow,
    product_id: Uuid,
    fallback_date: NaiveDate,
) -> StockResult<ConsumptionForm> {
    let quantity = number(row, SheetColumn::Quantity)?;
    let has_price = !row.is_blank(SheetColumn::MrpInclGst) || !row.is_blank(SheetColumn::MrpExclGst);
    let (reference_mrp_incl_gst, reference_gst_percentage) = if has_price {
        let pricing = infer_pricing(row)?;
        (Some(pricing.mrp_incl_gst), Some(pricing.gst_percentage))
    } else {
        (None, None)
    };

    Ok(ConsumptionForm {
        product_id,
        date: date(row, fallback_date)?,
        requisition_voucher_number: row.get(SheetColumn::DocumentNumber).to_string(),
        purpose: row.get(SheetColumn::Purpose).to_string(),
        quantity,
        reference_mrp_incl_gst,
        reference_gst_percentage,
    })
}

/// One row that could not be imported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRowFailure {
    pub line: usize,
    pub message: String,
}

/// Progress tally of a bulk import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub started_at: NaiveDateTime,
    pub finished_at: Option<NaiveDateTime>,
    /// Every data row seen, skipped ones included
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: Vec<ImportRowFailure>,
}

impl ProcessingStats {
    /// Start a tally for `rows` importable rows plus `skipped` ignored ones
    pub fn start(rows: usize, skipped: usize) -> Self {
        Self {
            started_at: chrono::Utc::now().naive_utc(),
            finished_at: None,
            total: rows + skipped,
            processed: 0,
            succeeded: 0,
            failed: 0,
            skipped,
            errors: Vec::new(),
        }
    }

    pub fn record_success(&mut self) {
        self.processed += 1;
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, line: usize, err: &StockError) {
        self.processed += 1;
        self.failed += 1;
        let message = match err {
            StockError::ImportRow { message, .. } => message.clone(),
            other => other.to_string(),
        };
        self.errors.push(ImportRowFailure { line, message });
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(chrono::Utc::now().naive_utc());
    }

    /// "X processed, Y succeeded, Z failed"
    pub fn summary(&self) -> String {
        format!(
            "{} processed, {} succeeded, {} failed",
            self.processed, self.succeeded, self.failed
        )
    }
}

impl fmt::Display for ProcessingStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

/// Outcome of a bulk import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub stats: ProcessingStats,
    pub products_created: usize,
    /// Products whose balance stock was recomputed
    pub reconciled: usize,
    pub reconciliation_failures: HashMap<Uuid, String>,
    /// Views the import wrote to
    pub stale_views: Vec<LedgerView>,
}
