//! A month of salon stock, end to end

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use salon_stock_core::utils::MemoryStorage;
use salon_stock_core::{
    ConsumptionForm, PaymentMethod, PurchaseForm, SaleForm, Settings, StockLedger,
};
use tracing_subscriber::EnvFilter;

const OPENING_SHEET: &str = "\
,PURCHASE - STOCK IN,,,,,,,,,,
Date,Product Name,HSN Code,UNITS,Invoice No.,Qty.,Incl. GST,Ex. GST,Taxable Value,IGST,CGST,SGST
01-04-2024,Hair Mask,3305,JAR-JARS,GT-101,6,590,500,3000,0,270,270
01-04-2024,Face Wash,3401,BTL-BOTTLES,GT-101,12,236,200,2400,0,216,216
,SALON CONSUMPTION - STOCK OUT,,,,,
Date,Product Name,HSN Code,UNITS,Requisition Voucher No.,Qty.,Purpose
03-04-2024,Hair Mask,3305,JAR-JARS,RV-7,1,Hair spa
03-04-2024,Face Wash,3401,BTL-BOTTLES,RV-8,two,Facial
";

fn date(day: u32) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    NaiveDate::from_ymd_opt(2024, 4, day).ok_or_else(|| "invalid date".into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("💇 Salon Stock Core - Stock Walkthrough\n");

    let settings = Settings::load()?;
    let mut ledger = StockLedger::with_settings(MemoryStorage::new(), settings);

    // 1. Products
    println!("📦 Creating Products...");
    let shampoo = ledger
        .create_product("Keratin Shampoo".into(), "3305".into(), "BTL-BOTTLES".into())
        .await?;
    println!("  ✓ {} (HSN {}, {})", shampoo.name, shampoo.hsn_code, shampoo.units);
    println!();

    // 2. Stock in
    println!("🚚 Recording Purchase...");
    let purchase = ledger
        .record_purchase(&PurchaseForm {
            product_id: shampoo.id,
            date: date(1)?,
            invoice_number: "GT-100".into(),
            supplier: Some("Glow Traders".into()),
            quantity: BigDecimal::from(10),
            mrp_incl_gst: BigDecimal::from(118),
            discount_percentage: BigDecimal::from(10),
            gst_percentage: Some(BigDecimal::from(18)),
        })
        .await?;
    println!(
        "  ✓ 10 × ₹118 less 10%: taxable ₹{}, invoice ₹{}",
        purchase.record.amounts.taxable_value, purchase.record.amounts.invoice_value
    );
    println!();

    // 3. Stock out
    println!("🛍️ Recording Sale and Consumption...");
    let sale = ledger
        .record_sale(&SaleForm {
            product_id: shampoo.id,
            date: date(2)?,
            invoice_number: "S-001".into(),
            customer: Some("Walk-in".into()),
            payment_method: PaymentMethod::Cash,
            quantity: BigDecimal::from(3),
            mrp_incl_gst: BigDecimal::from(177),
            discount_percentage: BigDecimal::from(0),
            gst_percentage: BigDecimal::from(18),
        })
        .await?;
    println!(
        "  ✓ Sale of 3: revenue ₹{}, cost ₹{}, margin ₹{}",
        sale.record.amounts.taxable_value,
        sale.record.cost.amounts.taxable_value,
        sale.record.margin()
    );

    let consumption = ledger
        .record_consumption(&ConsumptionForm {
            product_id: shampoo.id,
            date: date(3)?,
            requisition_voucher_number: "RV-1".into(),
            purpose: "Hair spa".into(),
            quantity: BigDecimal::from(2),
            reference_mrp_incl_gst: None,
            reference_gst_percentage: None,
        })
        .await?;
    println!(
        "  ✓ Consumption of 2 at cost: ₹{}",
        consumption.record.cost.amounts.taxable_value
    );

    // The cash sale was really used in the salon
    let converted = ledger.convert_cash_sale(sale.record.id).await?;
    println!(
        "  ✓ Converted sale {} to consumption ({})",
        sale.record.invoice_number, converted.record.purpose
    );
    println!();

    // 4. Bulk import
    println!("📥 Importing Opening Sheet...");
    let report = ledger.import_csv(OPENING_SHEET, date(1)?).await?;
    println!("  {}", report.stats);
    for failure in &report.stats.errors {
        println!("  ❌ Line {}: {}", failure.line, failure.message);
    }
    println!("  Products created: {}", report.products_created);
    println!();

    // 5. Balance stock
    println!("📊 Balance Stock:");
    for product in ledger.list_products().await? {
        match ledger.balance_stock(product.id).await? {
            Some(balance) => println!(
                "  {:<16} qty {:>4}  avg ₹{:>8}  value ₹{:>9}  incl. GST ₹{:>9}",
                product.name,
                balance.display_quantity(),
                balance.avg_cost_per_unit,
                balance.amounts.taxable_value,
                balance.amounts.invoice_value
            ),
            None => println!("  {:<16} no balance row", product.name),
        }
    }
    println!();

    // 6. Integrity and export
    let integrity = ledger.validate_integrity().await?;
    if integrity.is_valid {
        println!("✅ {} products checked, ledger is consistent", integrity.products_checked);
    } else {
        for issue in &integrity.issues {
            println!("  ⚠️ {}", issue);
        }
    }

    let csv_text = ledger.export_csv(date(30)?).await?;
    println!("\n📤 Export ({} rows):", csv_text.lines().count().saturating_sub(1));
    for row in csv_text.lines().take(4) {
        println!("  {}", row);
    }

    println!("\n🎉 Stock walkthrough completed successfully!");
    Ok(())
}
