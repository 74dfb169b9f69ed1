//! Stock sheet import and export
//!
//! The stock sheet is one table split into sections. A section starts at a
//! marker row ("PURCHASE - STOCK IN", ...) followed by that section's own
//! header row; data rows follow until the next marker.

pub mod export;
pub mod import;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use export::*;
pub use import::*;

/// Sections of the stock sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SheetSection {
    Purchase,
    Sale,
    Consumption,
    BalanceStock,
}

impl SheetSection {
    pub const ALL: [SheetSection; 4] = [
        SheetSection::Purchase,
        SheetSection::Sale,
        SheetSection::Consumption,
        SheetSection::BalanceStock,
    ];

    /// Marker text that opens the section
    pub fn marker(&self) -> &'static str {
        match self {
            SheetSection::Purchase => "PURCHASE - STOCK IN",
            SheetSection::Sale => "SALES TO CUSTOMER - STOCK OUT",
            SheetSection::Consumption => "SALON CONSUMPTION - STOCK OUT",
            SheetSection::BalanceStock => "BALANCE STOCK",
        }
    }

    /// Section whose marker appears in a row's text
    pub fn detect(row_text: &str) -> Option<SheetSection> {
        let upper = row_text.to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|section| upper.contains(section.marker()))
    }
}

/// Columns the importer understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SheetColumn {
    Date,
    ProductName,
    HsnCode,
    Units,
    DocumentNumber,
    Quantity,
    MrpInclGst,
    MrpExclGst,
    DiscountPercentage,
    GstPercentage,
    TaxableValue,
    Igst,
    Cgst,
    Sgst,
    InvoiceValue,
    Party,
    PaymentMethod,
    Purpose,
}

const ALIASES: &[(SheetColumn, &[&str])] = &[
    (SheetColumn::Date, &["date"]),
    (SheetColumn::ProductName, &["product name", "product", "item name"]),
    (SheetColumn::HsnCode, &["hsn code", "hsn"]),
    (SheetColumn::Units, &["units", "unit", "uom"]),
    (
        SheetColumn::DocumentNumber,
        &[
            "invoice no",
            "invoice number",
            "document no",
            "requisition voucher no",
            "requisition voucher number",
            "voucher no",
        ],
    ),
    (SheetColumn::Quantity, &["qty", "quantity"]),
    (
        SheetColumn::MrpInclGst,
        &["incl gst", "price incl gst", "mrp incl gst"],
    ),
    (
        SheetColumn::MrpExclGst,
        &["ex gst", "excl gst", "price ex gst", "mrp ex gst", "mrp excl gst"],
    ),
    (
        SheetColumn::DiscountPercentage,
        &["discount %", "discount", "discount percentage"],
    ),
    (
        SheetColumn::GstPercentage,
        &["gst %", "gst percentage", "sales gst %"],
    ),
    (
        SheetColumn::TaxableValue,
        &["taxable value", "sales taxable value"],
    ),
    (SheetColumn::Igst, &["igst", "sales igst"]),
    (SheetColumn::Cgst, &["cgst", "sales cgst"]),
    (SheetColumn::Sgst, &["sgst", "sales sgst"]),
    (SheetColumn::InvoiceValue, &["invoice value"]),
    (
        SheetColumn::Party,
        &["supplier", "customer", "supplier/customer", "supplier name", "customer name"],
    ),
    (SheetColumn::PaymentMethod, &["payment method", "payment mode"]),
    (SheetColumn::Purpose, &["purpose"]),
];

fn normalize_header(header: &str) -> String {
    header
        .to_ascii_lowercase()
        .replace('.', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl SheetColumn {
    /// Column for a header cell, matched case-insensitively against known aliases
    pub fn from_header(header: &str) -> Option<SheetColumn> {
        let normalized = normalize_header(header);
        ALIASES
            .iter()
            .find(|(_, aliases)| aliases.contains(&normalized.as_str()))
            .map(|(column, _)| *column)
    }
}

/// One data row of the stock sheet, values kept as written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetRow {
    /// 1-based line in the source, for error reports
    pub line: usize,
    pub section: SheetSection,
    values: HashMap<SheetColumn, String>,
}

impl SheetRow {
    pub fn new(line: usize, section: SheetSection) -> Self {
        Self {
            line,
            section,
            values: HashMap::new(),
        }
    }

    /// Set a cell
    pub fn with(mut self, column: SheetColumn, value: impl Into<String>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: SheetColumn, value: impl Into<String>) {
        self.values.insert(column, value.into().trim().to_string());
    }

    /// Cell text; blank when the column is absent
    pub fn get(&self, column: SheetColumn) -> &str {
        self.values.get(&column).map(String::as_str).unwrap_or("")
    }

    pub fn is_blank(&self, column: SheetColumn) -> bool {
        self.get(column).is_empty()
    }
}
