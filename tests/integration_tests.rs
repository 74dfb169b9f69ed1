//! Integration tests for salon-stock-core

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use salon_stock_core::{
    sheet::BALANCE_STOCK_TYPE, utils::MemoryStorage, BalancePolicy, BalanceStock, Consumption,
    ConsumptionForm, CostSource, CostingMethod, JurisdictionKind, LedgerView, LineInput,
    PaymentMethod, Product, Purchase, PurchaseForm, ReconcileOutcome, Sale, SaleForm, Settings,
    StockError, StockLedger, StockResult, StockStorage, TaxCalculator,
};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

fn dec(value: &str) -> BigDecimal {
    BigDecimal::from_str(value).unwrap()
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
}

fn purchase_form(product_id: Uuid, on: u32, qty: &str, mrp: &str) -> PurchaseForm {
    PurchaseForm {
        product_id,
        date: day(on),
        invoice_number: format!("P-{on}"),
        supplier: Some("Glow Traders".into()),
        quantity: dec(qty),
        mrp_incl_gst: dec(mrp),
        discount_percentage: dec("0"),
        gst_percentage: Some(dec("18")),
    }
}

fn sale_form(product_id: Uuid, on: u32, qty: &str, payment_method: PaymentMethod) -> SaleForm {
    SaleForm {
        product_id,
        date: day(on),
        invoice_number: format!("S-{on}"),
        customer: Some("Walk-in".into()),
        payment_method,
        quantity: dec(qty),
        mrp_incl_gst: dec("177"),
        discount_percentage: dec("0"),
        gst_percentage: dec("18"),
    }
}

fn consumption_form(product_id: Uuid, on: u32, qty: &str) -> ConsumptionForm {
    ConsumptionForm {
        product_id,
        date: day(on),
        requisition_voucher_number: format!("RV-{on}"),
        purpose: "Hair spa".into(),
        quantity: dec(qty),
        reference_mrp_incl_gst: None,
        reference_gst_percentage: None,
    }
}

async fn new_product(ledger: &mut StockLedger<impl StockStorage + Clone>, name: &str) -> Product {
    ledger
        .create_product(name.into(), "3305".into(), "BTL-BOTTLES".into())
        .await
        .unwrap()
}

#[test]
fn test_line_pricing_scenarios() {
    let calculator = TaxCalculator::default();

    let plain = calculator
        .calculate_line(&LineInput {
            mrp_incl_gst: dec("118"),
            gst_percentage: dec("18"),
            discount_percentage: dec("0"),
            quantity: dec("1"),
        })
        .unwrap();
    assert_eq!(plain.mrp_excl_gst, dec("100.00"));
    assert_eq!(plain.amounts.taxable_value, dec("100.00"));
    assert_eq!(plain.amounts.cgst, dec("9.00"));
    assert_eq!(plain.amounts.sgst, dec("9.00"));
    assert_eq!(plain.amounts.invoice_value, dec("118.00"));

    let discounted = calculator
        .calculate_line(&LineInput {
            mrp_incl_gst: dec("118"),
            gst_percentage: dec("18"),
            discount_percentage: dec("10"),
            quantity: dec("1"),
        })
        .unwrap();
    assert_eq!(discounted.discounted_rate, dec("90.00"));
    assert_eq!(discounted.amounts.taxable_value, dec("90.00"));
    assert_eq!(discounted.amounts.cgst, dec("8.10"));
    assert_eq!(discounted.amounts.sgst, dec("8.10"));
    assert_eq!(discounted.amounts.invoice_value, dec("106.20"));
}

#[tokio::test]
async fn test_purchase_sale_consumption_balance() {
    let mut ledger = StockLedger::new(MemoryStorage::new());
    let product = new_product(&mut ledger, "Keratin Shampoo").await;
    assert_eq!(product.units, "BTL");

    // 106.20 incl. 18% GST is 90.00 per unit, 900 for ten
    let purchase = ledger
        .record_purchase(&purchase_form(product.id, 1, "10", "106.20"))
        .await
        .unwrap();
    assert_eq!(purchase.record.amounts.taxable_value, dec("900.00"));

    let sale = ledger
        .record_sale(&sale_form(product.id, 2, "3", PaymentMethod::Card))
        .await
        .unwrap();
    assert_eq!(sale.record.cost.basis.source, CostSource::Purchase(purchase.record.id));
    assert_eq!(sale.record.cost.amounts.taxable_value, dec("270.00"));
    assert_eq!(sale.stale_views, vec![LedgerView::Sales, LedgerView::BalanceStock]);

    let consumption = ledger
        .record_consumption(&consumption_form(product.id, 3, "2"))
        .await
        .unwrap();
    assert_eq!(consumption.record.cost.amounts.taxable_value, dec("180.00"));

    let balance = consumption.balance.unwrap();
    assert_eq!(balance.quantity, dec("5"));
    assert_eq!(balance.total_purchased, dec("10"));
    assert_eq!(balance.total_sold, dec("3"));
    assert_eq!(balance.total_consumed, dec("2"));
    assert_eq!(balance.avg_cost_per_unit, dec("90.00"));
    assert_eq!(balance.amounts.taxable_value, dec("450.00"));
    assert_eq!(balance.amounts.cgst, dec("40.50"));
    assert_eq!(balance.amounts.sgst, dec("40.50"));
    assert_eq!(balance.amounts.invoice_value, dec("531.00"));

    assert_eq!(ledger.balance_stock(product.id).await.unwrap(), Some(balance));
}

#[tokio::test]
async fn test_sale_without_purchase_uses_half_of_mrp() {
    let mut ledger = StockLedger::new(MemoryStorage::new());
    let product = new_product(&mut ledger, "Beard Oil").await;

    let recorded = ledger
        .record_sale(&sale_form(product.id, 4, "2", PaymentMethod::Cash))
        .await
        .unwrap();

    let cost = &recorded.record.cost;
    assert_eq!(cost.basis.source, CostSource::MrpFallback);
    // 177 incl. GST is 150.00 excl.; half of it is assumed as cost
    assert_eq!(cost.basis.cost_per_unit_excl_gst, dec("75.00"));
    assert_eq!(cost.basis.gst_percentage, dec("18"));
    assert_eq!(cost.amounts.taxable_value, dec("150.00"));
    assert_eq!(cost.amounts.invoice_value, dec("177.00"));

    // Selling stock never bought leaves a zero-valued row with negative quantity
    let balance = recorded.balance.unwrap();
    assert_eq!(balance.quantity, dec("-2"));
    assert_eq!(balance.display_quantity(), dec("0"));
    assert_eq!(balance.amounts.invoice_value, dec("0"));
}

const FIVE_GOOD_ONE_BAD: &str = "\
,PURCHASE - STOCK IN,,,,,,,,,,,
Date,Product Name,HSN Code,UNITS,Invoice No.,Qty.,Incl. GST,Ex. GST,Taxable Value,IGST,CGST,SGST,Supplier
2024-04-01,Argan Oil,3305,BTL-BOTTLES,P-1,5,236,200,1000,0,90,90,Glow Traders
2024-04-02,Hair Mask,3305,JAR-JARS,P-2,4,118,100,400,0,36,36,Glow Traders
2024-04-03,Face Wash,3401,BTL-BOTTLES,P-3,6,59,50,300,0,27,27,
2024-04-04,Bleach Cream,3304,BOX-BOXES,P-4,ten,118,100,1000,0,90,90,
2024-04-05,Nail Remover,3304,BTL-BOTTLES,P-5,3,118,100,300,0,27,27,
2024-04-06,Argan Oil,3305,BTL-BOTTLES,P-6,2,236,200,400,0,36,36,
";

#[tokio::test]
async fn test_bulk_import_tolerates_bad_rows() {
    let mut ledger = StockLedger::new(MemoryStorage::new());

    let report = ledger
        .import_csv(FIVE_GOOD_ONE_BAD, day(30))
        .await
        .unwrap();

    assert_eq!(report.stats.processed, 6);
    assert_eq!(report.stats.succeeded, 5);
    assert_eq!(report.stats.failed, 1);
    assert_eq!(report.stats.summary(), "6 processed, 5 succeeded, 1 failed");
    assert_eq!(report.stats.errors.len(), 1);
    assert_eq!(report.stats.errors[0].line, 6);
    assert!(report.stats.errors[0].message.contains("'ten'"));

    assert_eq!(ledger.list_purchases(None).await.unwrap().len(), 5);
    assert_eq!(report.products_created, 4);
    assert_eq!(report.reconciled, 4);
    assert!(report.reconciliation_failures.is_empty());

    let products = ledger.list_products().await.unwrap();
    assert!(products.iter().all(|p| p.name != "Bleach Cream"));

    let argan = products.iter().find(|p| p.name == "Argan Oil").unwrap();
    assert_eq!(argan.units, "BTL");
    let balance = ledger.balance_stock(argan.id).await.unwrap().unwrap();
    assert_eq!(balance.quantity, dec("7"));
    assert_eq!(balance.avg_cost_per_unit, dec("200.00"));
    assert_eq!(balance.amounts.taxable_value, dec("1400.00"));
}

const INVALID_ROWS_ONLY: &str = "\
,PURCHASE - STOCK IN,,,,,,,,,,
Date,Product Name,HSN Code,UNITS,Invoice No.,Qty.,Incl. GST,Ex. GST,Taxable Value,IGST,CGST,SGST
2024-04-01,Ghost Serum,3305,BTL,P-1,0,118,100,0,0,0,0
2024-04-02,No Invoice Gel,3305,JAR,,2,118,100,200,0,18,18
,SALES TO CUSTOMER - STOCK OUT,,,,,,,,,,,,
Date,Product Name,HSN Code,UNITS,Invoice No.,Qty.,Incl. GST,Ex. GST,Taxable Value,IGST,CGST,SGST,Customer,Payment Method
2024-04-03,Priceless Toner,3304,BTL,S-1,1,,,,,,,,Cash
";

#[tokio::test]
async fn test_rejected_import_rows_leave_no_products() {
    let mut ledger = StockLedger::new(MemoryStorage::new());

    let report = ledger.import_csv(INVALID_ROWS_ONLY, day(30)).await.unwrap();

    assert_eq!(report.stats.summary(), "3 processed, 0 succeeded, 3 failed");
    let lines: Vec<usize> = report.stats.errors.iter().map(|e| e.line).collect();
    assert_eq!(lines, vec![3, 4, 7]);
    assert_eq!(report.products_created, 0);
    assert!(report.stale_views.is_empty());

    assert!(ledger.list_products().await.unwrap().is_empty());
    assert!(ledger.list_purchases(None).await.unwrap().is_empty());
    assert!(ledger.list_sales(None).await.unwrap().is_empty());
}

const MIXED_SECTIONS: &str = "\
,PURCHASE - STOCK IN,,,,,,,,,,
Date,Product Name,HSN Code,UNITS,Invoice No.,Qty.,Incl. GST,Ex. GST,Taxable Value,IGST,CGST,SGST
2024-04-01,Keratin Shampoo,3305,BTL-BOTTLES,P-1,10,106.20,90,900,0,81,81
,SALES TO CUSTOMER - STOCK OUT,,,,,,,,,,,,
Date,Product Name,HSN Code,UNITS,Invoice No.,Qty.,Incl. GST,Ex. GST,Taxable Value,IGST,CGST,SGST,Customer,Payment Method
2024-04-02,Keratin Shampoo,3305,BTL-BOTTLES,S-1,3,177,150,450,0,40.50,40.50,Walk-in,Card
,SALON CONSUMPTION - STOCK OUT,,,,,
Date,Product Name,HSN Code,UNITS,Requisition Voucher No.,Qty.,Purpose
2024-04-03,Keratin Shampoo,3305,BTL-BOTTLES,RV-1,2,Hair spa
2024-04-03,Rose Toner,3304,BTL-BOTTLES,RV-2,1,Facial
";

#[tokio::test]
async fn test_import_across_sections() {
    let mut ledger = StockLedger::new(MemoryStorage::new());

    let report = ledger.import_csv(MIXED_SECTIONS, day(30)).await.unwrap();

    assert_eq!(report.stats.summary(), "4 processed, 3 succeeded, 1 failed");
    assert_eq!(report.stats.errors[0].line, 10);
    assert!(report.stats.errors[0].message.contains("mrp_incl_gst"));
    assert_eq!(report.products_created, 1);
    assert_eq!(report.reconciled, 1);
    assert_eq!(
        report.stale_views,
        vec![
            LedgerView::Products,
            LedgerView::Purchases,
            LedgerView::Sales,
            LedgerView::Consumption,
            LedgerView::BalanceStock
        ]
    );

    // The toner was never bought and had no price, so it was not created
    let products = ledger.list_products().await.unwrap();
    assert_eq!(products.len(), 1);
    let shampoo = &products[0];

    // Sale and consumption are costed from the purchase earlier in the sheet
    let purchase = ledger.list_purchases(None).await.unwrap().remove(0);
    let sale = ledger.list_sales(None).await.unwrap().remove(0);
    assert_eq!(sale.payment_method, PaymentMethod::Card);
    assert_eq!(sale.amounts.taxable_value, dec("450.00"));
    assert_eq!(sale.cost.basis.source, CostSource::Purchase(purchase.id));
    assert_eq!(sale.cost.amounts.taxable_value, dec("270.00"));
    let consumption = ledger.list_consumption(None).await.unwrap().remove(0);
    assert_eq!(consumption.purpose, "Hair spa");
    assert_eq!(consumption.cost.amounts.taxable_value, dec("180.00"));

    let balance = ledger.balance_stock(shampoo.id).await.unwrap().unwrap();
    assert_eq!(balance.quantity, dec("5"));
    assert_eq!(balance.amounts.taxable_value, dec("450.00"));
    assert_eq!(balance.amounts.invoice_value, dec("531.00"));
}

#[tokio::test]
async fn test_reconcile_twice_is_byte_identical() {
    let mut ledger = StockLedger::new(MemoryStorage::new());
    let product = new_product(&mut ledger, "Hair Serum").await;
    ledger
        .record_purchase(&purchase_form(product.id, 1, "7", "100"))
        .await
        .unwrap();
    ledger
        .record_sale(&sale_form(product.id, 2, "3", PaymentMethod::Online))
        .await
        .unwrap();

    let first = serde_json::to_string(&ledger.balance_stock(product.id).await.unwrap()).unwrap();
    let outcome = ledger.reconcile_product(product.id).await.unwrap();
    let second = serde_json::to_string(&ledger.balance_stock(product.id).await.unwrap()).unwrap();

    assert!(matches!(outcome, ReconcileOutcome::Unchanged(_)));
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_quantity_is_conserved() {
    let mut ledger = StockLedger::new(MemoryStorage::new());
    let product = new_product(&mut ledger, "Hair Spray").await;

    ledger.record_purchase(&purchase_form(product.id, 1, "12", "118")).await.unwrap();
    ledger.record_purchase(&purchase_form(product.id, 5, "2.5", "120")).await.unwrap();
    ledger.record_sale(&sale_form(product.id, 6, "4", PaymentMethod::Cash)).await.unwrap();
    ledger.record_consumption(&consumption_form(product.id, 7, "1.5")).await.unwrap();
    ledger.record_sale(&sale_form(product.id, 8, "3", PaymentMethod::Card)).await.unwrap();

    let purchased: BigDecimal = ledger
        .list_purchases(Some(product.id))
        .await
        .unwrap()
        .iter()
        .map(|p| &p.quantity)
        .sum();
    let sold: BigDecimal = ledger
        .list_sales(Some(product.id))
        .await
        .unwrap()
        .iter()
        .map(|s| &s.quantity)
        .sum();
    let consumed: BigDecimal = ledger
        .list_consumption(Some(product.id))
        .await
        .unwrap()
        .iter()
        .map(|c| &c.quantity)
        .sum();

    let balance = ledger.balance_stock(product.id).await.unwrap().unwrap();
    assert_eq!(balance.quantity, purchased - sold - consumed);
    assert_eq!(balance.quantity, dec("6"));
    assert!(balance.amounts.is_consistent());
    assert_eq!(balance.amounts.cgst, balance.amounts.sgst);
}

#[tokio::test]
async fn test_running_out_keeps_a_zero_row() {
    let mut ledger = StockLedger::new(MemoryStorage::new());
    let product = new_product(&mut ledger, "Cuticle Oil").await;

    ledger.record_purchase(&purchase_form(product.id, 1, "2", "118")).await.unwrap();
    let recorded = ledger
        .record_sale(&sale_form(product.id, 2, "2", PaymentMethod::Cash))
        .await
        .unwrap();

    let balance = recorded.balance.unwrap();
    assert_eq!(balance.quantity, dec("0"));
    assert_eq!(balance.total_purchased, dec("2"));
    assert_eq!(balance.amounts.taxable_value, dec("0"));
    assert_eq!(ledger.list_balance_stock().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_legacy_policy_writes_no_row_for_missing_stock() {
    let settings = Settings {
        balance_policy: BalancePolicy::LegacyUpdateOrSkip,
        ..Settings::default()
    };
    let mut ledger = StockLedger::with_settings(MemoryStorage::new(), settings);
    let product = new_product(&mut ledger, "Toner").await;

    let recorded = ledger
        .record_sale(&sale_form(product.id, 1, "1", PaymentMethod::Cash))
        .await
        .unwrap();

    assert!(recorded.is_reconciled());
    assert!(recorded.balance.is_none());
    assert!(ledger.balance_stock(product.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_legacy_policy_updates_existing_row_to_zero() {
    let settings = Settings {
        balance_policy: BalancePolicy::LegacyUpdateOrSkip,
        ..Settings::default()
    };
    let mut ledger = StockLedger::with_settings(MemoryStorage::new(), settings);
    let product = new_product(&mut ledger, "Hair Tonic").await;

    let bought = ledger
        .record_purchase(&purchase_form(product.id, 1, "2", "118"))
        .await
        .unwrap();
    assert_eq!(bought.balance.unwrap().quantity, dec("2"));

    let sold = ledger
        .record_sale(&sale_form(product.id, 2, "2", PaymentMethod::Cash))
        .await
        .unwrap();

    let balance = sold.balance.unwrap();
    assert_eq!(balance.quantity, dec("0"));
    assert_eq!(balance.total_sold, dec("2"));
    assert_eq!(balance.amounts.taxable_value, dec("0"));
    assert_eq!(balance.amounts.invoice_value, dec("0"));
    assert_eq!(ledger.balance_stock(product.id).await.unwrap(), Some(balance));
}

#[tokio::test]
async fn test_fifo_costing_from_settings() {
    let config = config::Config::builder()
        .set_override("costing", "fifo")
        .unwrap()
        .build()
        .unwrap();
    let settings = Settings::from_config(config).unwrap();
    assert_eq!(settings.costing, CostingMethod::Fifo);

    let mut ledger = StockLedger::with_settings(MemoryStorage::new(), settings);
    let product = new_product(&mut ledger, "Hair Colour").await;

    // 10 @ 90.00 then 10 @ 110.00; selling 10 leaves only the newer layer
    ledger.record_purchase(&purchase_form(product.id, 1, "10", "106.20")).await.unwrap();
    ledger.record_purchase(&purchase_form(product.id, 2, "10", "129.80")).await.unwrap();
    let recorded = ledger
        .record_sale(&sale_form(product.id, 3, "10", PaymentMethod::Card))
        .await
        .unwrap();

    let balance = recorded.balance.unwrap();
    assert_eq!(balance.quantity, dec("10"));
    assert_eq!(balance.avg_cost_per_unit, dec("110.00"));
    assert_eq!(balance.amounts.taxable_value, dec("1100.00"));
}

#[tokio::test]
async fn test_inter_state_jurisdiction_charges_igst() {
    let settings = Settings {
        jurisdiction: JurisdictionKind::InterState,
        ..Settings::default()
    };
    let mut ledger = StockLedger::with_settings(MemoryStorage::new(), settings);
    let product = new_product(&mut ledger, "Sunscreen").await;

    let recorded = ledger
        .record_purchase(&purchase_form(product.id, 1, "5", "118"))
        .await
        .unwrap();

    assert_eq!(recorded.record.amounts.igst, dec("90.00"));
    assert_eq!(recorded.record.amounts.cgst, dec("0"));
    let balance = recorded.balance.unwrap();
    assert_eq!(balance.amounts.igst, dec("90.00"));
    assert_eq!(balance.amounts.invoice_value, dec("590.00"));
}

#[tokio::test]
async fn test_cash_sale_conversion() {
    let mut ledger = StockLedger::new(MemoryStorage::new());
    let product = new_product(&mut ledger, "Massage Cream").await;

    ledger.record_purchase(&purchase_form(product.id, 1, "10", "106.20")).await.unwrap();
    let cash = ledger
        .record_sale(&sale_form(product.id, 2, "2", PaymentMethod::Cash))
        .await
        .unwrap();
    assert_eq!(cash.balance.as_ref().unwrap().quantity, dec("8"));

    let converted = ledger.convert_cash_sale(cash.record.id).await.unwrap();
    assert_eq!(converted.record.original_sale_id, Some(cash.record.id));
    assert_eq!(converted.record.quantity, dec("2"));
    assert_eq!(converted.record.cost.amounts, cash.record.cost.amounts);
    assert_eq!(
        converted.stale_views,
        vec![LedgerView::Sales, LedgerView::Consumption, LedgerView::BalanceStock]
    );

    // Reclassified, not removed twice
    let balance = converted.balance.unwrap();
    assert_eq!(balance.quantity, dec("8"));
    assert_eq!(balance.total_sold, dec("0"));
    assert_eq!(balance.total_consumed, dec("2"));

    // The sale itself is untouched
    assert_eq!(ledger.list_sales(None).await.unwrap(), vec![cash.record.clone()]);

    let again = ledger.convert_cash_sale(cash.record.id).await.unwrap_err();
    assert!(again.is_validation());

    let card = ledger
        .record_sale(&sale_form(product.id, 3, "1", PaymentMethod::Card))
        .await
        .unwrap();
    assert!(ledger
        .convert_cash_sale(card.record.id)
        .await
        .unwrap_err()
        .is_validation());

    let missing = Uuid::new_v4();
    assert!(matches!(
        ledger.convert_cash_sale(missing).await.unwrap_err(),
        StockError::SaleNotFound(id) if id == missing
    ));
}

#[tokio::test]
async fn test_export_has_balance_row_per_product() {
    let mut ledger = StockLedger::new(MemoryStorage::new());
    let shampoo = new_product(&mut ledger, "Shampoo").await;
    let untouched = new_product(&mut ledger, "Aloe Gel").await;

    ledger.record_purchase(&purchase_form(shampoo.id, 1, "4", "118")).await.unwrap();
    ledger.record_sale(&sale_form(shampoo.id, 2, "1", PaymentMethod::Cash)).await.unwrap();
    ledger.record_consumption(&consumption_form(shampoo.id, 3, "1")).await.unwrap();

    let as_of = day(30);
    let csv_text = ledger.export_csv(as_of).await.unwrap();
    let mut reader = csv::Reader::from_reader(csv_text.as_bytes());
    let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();

    let kinds: Vec<&str> = records.iter().map(|r| &r[4]).collect();
    assert_eq!(
        kinds,
        vec!["Purchase", "Sale", "Consumption", BALANCE_STOCK_TYPE, BALANCE_STOCK_TYPE]
    );

    let balance_rows: Vec<&csv::StringRecord> =
        records.iter().filter(|r| &r[4] == BALANCE_STOCK_TYPE).collect();
    assert_eq!(&balance_rows[0][1], untouched.name.as_str());
    assert_eq!(&balance_rows[1][1], shampoo.name.as_str());
    assert!(balance_rows.iter().all(|r| &r[0] == "2024-04-30"));
    assert_eq!(&balance_rows[1][27], "2");
}

#[tokio::test]
async fn test_referenced_product_cannot_be_deleted() {
    let mut ledger = StockLedger::new(MemoryStorage::new());
    let used = new_product(&mut ledger, "Hair Wax").await;
    let unused = new_product(&mut ledger, "Lip Balm").await;

    ledger.record_purchase(&purchase_form(used.id, 1, "1", "118")).await.unwrap();

    let err = ledger.delete_product(used.id).await.unwrap_err();
    assert!(err.is_validation());
    assert!(ledger.get_product(used.id).await.unwrap().is_some());

    ledger.delete_product(unused.id).await.unwrap();
    assert!(ledger.get_product(unused.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_invalid_sale_reports_every_field() {
    let mut ledger = StockLedger::new(MemoryStorage::new());
    let product = new_product(&mut ledger, "Foot Scrub").await;

    let mut form = sale_form(product.id, 1, "0", PaymentMethod::Cash);
    form.invoice_number = String::new();
    form.mrp_incl_gst = dec("0");
    form.discount_percentage = dec("-1");
    form.gst_percentage = dec("-18");

    let errors = match ledger.record_sale(&form).await.unwrap_err() {
        StockError::Validation(errors) => errors,
        other => panic!("expected a validation error, got {other}"),
    };
    let fields: Vec<&str> = errors.errors().iter().map(|e| e.field.as_str()).collect();
    assert_eq!(
        fields,
        vec![
            "invoice_number",
            "quantity",
            "mrp_incl_gst",
            "discount_percentage",
            "gst_percentage"
        ]
    );
    assert!(ledger.list_sales(None).await.unwrap().is_empty());
    assert!(ledger.balance_stock(product.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_purchase_without_gst_defaults_to_eighteen() {
    let mut ledger = StockLedger::new(MemoryStorage::new());
    let product = new_product(&mut ledger, "Neem Soap").await;

    let mut form = purchase_form(product.id, 1, "1", "118");
    form.gst_percentage = Some(dec("0"));
    let recorded = ledger.record_purchase(&form).await.unwrap();

    assert_eq!(recorded.record.gst_percentage, dec("18"));
    assert_eq!(recorded.record.amounts.invoice_value, dec("118.00"));
}

/// Storage whose consumption reads can be made to fail
#[derive(Clone, Default)]
struct FlakyStorage {
    inner: MemoryStorage,
    fail_consumption_reads: Arc<AtomicBool>,
}

impl FlakyStorage {
    fn set_failing(&self, failing: bool) {
        self.fail_consumption_reads.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl StockStorage for FlakyStorage {
    async fn save_product(&mut self, product: &Product) -> StockResult<()> {
        self.inner.save_product(product).await
    }

    async fn get_product(&self, product_id: Uuid) -> StockResult<Option<Product>> {
        self.inner.get_product(product_id).await
    }

    async fn find_product(&self, name: &str, hsn_code: &str) -> StockResult<Option<Product>> {
        self.inner.find_product(name, hsn_code).await
    }

    async fn list_products(&self) -> StockResult<Vec<Product>> {
        self.inner.list_products().await
    }

    async fn update_product(&mut self, product: &Product) -> StockResult<()> {
        self.inner.update_product(product).await
    }

    async fn delete_product(&mut self, product_id: Uuid) -> StockResult<()> {
        self.inner.delete_product(product_id).await
    }

    async fn insert_purchase(&mut self, purchase: &Purchase) -> StockResult<()> {
        self.inner.insert_purchase(purchase).await
    }

    async fn list_purchases(&self, product_id: Option<Uuid>) -> StockResult<Vec<Purchase>> {
        self.inner.list_purchases(product_id).await
    }

    async fn insert_sale(&mut self, sale: &Sale) -> StockResult<()> {
        self.inner.insert_sale(sale).await
    }

    async fn get_sale(&self, sale_id: Uuid) -> StockResult<Option<Sale>> {
        self.inner.get_sale(sale_id).await
    }

    async fn list_sales(&self, product_id: Option<Uuid>) -> StockResult<Vec<Sale>> {
        self.inner.list_sales(product_id).await
    }

    async fn insert_consumption(&mut self, consumption: &Consumption) -> StockResult<()> {
        self.inner.insert_consumption(consumption).await
    }

    async fn list_consumption(&self, product_id: Option<Uuid>) -> StockResult<Vec<Consumption>> {
        if self.fail_consumption_reads.load(Ordering::SeqCst) {
            return Err(StockError::Persistence("consumption table unavailable".into()));
        }
        self.inner.list_consumption(product_id).await
    }

    async fn get_balance(&self, product_id: Uuid) -> StockResult<Option<BalanceStock>> {
        self.inner.get_balance(product_id).await
    }

    async fn upsert_balance(&mut self, balance: &BalanceStock) -> StockResult<()> {
        self.inner.upsert_balance(balance).await
    }

    async fn delete_balance(&mut self, product_id: Uuid) -> StockResult<()> {
        self.inner.delete_balance(product_id).await
    }

    async fn list_balances(&self) -> StockResult<Vec<BalanceStock>> {
        self.inner.list_balances().await
    }
}

#[tokio::test]
async fn test_failed_reconciliation_keeps_transaction() {
    let storage = FlakyStorage::default();
    let mut ledger = StockLedger::new(storage.clone());
    let product = new_product(&mut ledger, "Henna").await;

    ledger.record_purchase(&purchase_form(product.id, 1, "10", "118")).await.unwrap();
    let before = ledger.balance_stock(product.id).await.unwrap().unwrap();

    storage.set_failing(true);
    let recorded = ledger
        .record_purchase(&purchase_form(product.id, 2, "5", "118"))
        .await
        .unwrap();

    assert!(!recorded.is_reconciled());
    assert!(matches!(
        recorded.reconciliation_error,
        Some(StockError::Reconciliation { product_id, .. }) if product_id == product.id
    ));
    assert!(recorded.balance.is_none());
    assert_eq!(
        recorded.stale_views,
        vec![LedgerView::Purchases, LedgerView::BalanceStock]
    );

    // Transaction committed, balance untouched
    assert_eq!(ledger.list_purchases(Some(product.id)).await.unwrap().len(), 2);
    assert_eq!(ledger.balance_stock(product.id).await.unwrap(), Some(before));

    // The reconciler can simply be re-run once storage recovers
    storage.set_failing(false);
    let summary = ledger.reconcile_all().await.unwrap();
    assert!(summary.is_clean());
    assert_eq!(summary.written, 1);
    let after = ledger.balance_stock(product.id).await.unwrap().unwrap();
    assert_eq!(after.quantity, dec("15"));
}
