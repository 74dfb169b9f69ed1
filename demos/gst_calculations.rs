//! GST calculation examples

use bigdecimal::BigDecimal;
use salon_stock_core::{
    GstRate, InterState, IntraState, LegacyFractionalRate, LineCalculation, LineInput,
    RoundingPolicy, TaxCalculator, TaxJurisdiction,
};
use std::str::FromStr;

fn line(mrp: &str, gst: &str, discount: &str, qty: &str) -> Result<LineInput, Box<dyn std::error::Error>> {
    Ok(LineInput {
        mrp_incl_gst: BigDecimal::from_str(mrp)?,
        gst_percentage: BigDecimal::from_str(gst)?,
        discount_percentage: BigDecimal::from_str(discount)?,
        quantity: BigDecimal::from_str(qty)?,
    })
}

fn print_line(calc: &LineCalculation) {
    println!("  MRP Excl. GST:   ₹{}", calc.mrp_excl_gst);
    println!("  Discounted Rate: ₹{}", calc.discounted_rate);
    println!("  Taxable Value:   ₹{}", calc.amounts.taxable_value);
    println!("  CGST:            ₹{}", calc.amounts.cgst);
    println!("  SGST:            ₹{}", calc.amounts.sgst);
    println!("  IGST:            ₹{}", calc.amounts.igst);
    println!("  Invoice Value:   ₹{}", calc.amounts.invoice_value);
    println!();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🧾 Salon Stock Core - GST Calculation Examples\n");

    let intra = TaxCalculator::default();

    // 1. A bottle sold at MRP, tax taken out of the printed price
    println!("🏢 Intra-state Line (CGST + SGST): 1 × ₹118 @ 18%");
    print_line(&intra.calculate_line(&line("118", "18", "0", "1")?)?);

    // 2. Same bottle with a trade discount
    println!("🏷️ Discounted Line: 1 × ₹118 @ 18%, 10% off");
    print_line(&intra.calculate_line(&line("118", "18", "10", "1")?)?);

    // 3. Inter-state purchase
    println!("🌍 Inter-state Line (IGST only): 5 × ₹118 @ 18%");
    let inter = TaxCalculator::new(RoundingPolicy::Chained, Box::new(InterState));
    print_line(&inter.calculate_line(&line("118", "18", "0", "5")?)?);

    // 4. Rounding policies diverge once rounded unit prices are multiplied
    println!("🔄 Rounding Policies: 3 × ₹100 @ 18%");
    let single = TaxCalculator::new(RoundingPolicy::SinglePoint, Box::new(IntraState));
    let chained_calc = intra.calculate_line(&line("100", "18", "0", "3")?)?;
    let single_calc = single.calculate_line(&line("100", "18", "0", "3")?)?;
    println!(
        "  Chained:      taxable ₹{} + GST ₹{} = ₹{}",
        chained_calc.amounts.taxable_value,
        chained_calc.amounts.total_gst(),
        chained_calc.amounts.invoice_value
    );
    println!(
        "  Single point: taxable ₹{} + GST ₹{} = ₹{}",
        single_calc.amounts.taxable_value,
        single_calc.amounts.total_gst(),
        single_calc.amounts.invoice_value
    );
    println!();

    // 5. Tax on a value that is already excl. GST (cost side)
    println!("📦 Cost-side Amounts: taxable ₹450 @ 18%");
    let cost = intra.amounts_for_taxable(&BigDecimal::from(450), &BigDecimal::from(18))?;
    println!("  CGST: ₹{}  SGST: ₹{}  Total: ₹{}", cost.cgst, cost.sgst, cost.invoice_value);
    println!();

    // 6. Legacy data stored GST as a fraction
    println!("🗄️ Legacy Fractional Rates:");
    for raw in ["0.05", "0.18", "18"] {
        let rate = LegacyFractionalRate.rate_for(&BigDecimal::from_str(raw)?);
        println!(
            "  {:>5} -> total {}% ({})",
            raw,
            rate.total_rate,
            if rate.is_inter_state() { "IGST" } else { "CGST + SGST" }
        );
    }
    println!();

    // 7. Validation
    println!("✅ GST Rate Validation:");
    match GstRate::intra_state(BigDecimal::from(18)).validate() {
        Ok(()) => println!("  ✓ Valid intra-state rate: CGST 9% + SGST 9% = 18%"),
        Err(e) => println!("  ❌ Invalid rate: {}", e),
    }
    match GstRate::intra_state(BigDecimal::from(-5)).validate() {
        Ok(()) => println!("  ✓ Valid rate"),
        Err(e) => println!("  ❌ Invalid rate: {}", e),
    }

    println!("\n🎉 GST calculation examples completed successfully!");
    Ok(())
}
