//! Validation utilities

use crate::traits::*;
use crate::types::*;

/// Validate a product name
pub fn validate_product_name(name: &str) -> StockResult<()> {
    if name.trim().is_empty() {
        return Err(StockError::validation("name", "Product name cannot be empty"));
    }

    if name.len() > 200 {
        return Err(StockError::validation(
            "name",
            "Product name cannot exceed 200 characters",
        ));
    }

    Ok(())
}

/// Validate an HSN code: 4 to 8 digits
pub fn validate_hsn_code(hsn_code: &str) -> StockResult<()> {
    let hsn_code = hsn_code.trim();
    if hsn_code.is_empty() {
        return Err(StockError::validation("hsn_code", "HSN code cannot be empty"));
    }

    if !(4..=8).contains(&hsn_code.len()) || !hsn_code.chars().all(|c| c.is_ascii_digit()) {
        return Err(StockError::validation(
            "hsn_code",
            "HSN code must be 4 to 8 digits",
        ));
    }

    Ok(())
}

/// Map the long unit labels used in stock sheets to their short codes
pub fn standardize_unit(units: &str) -> String {
    let trimmed = units.trim();
    match trimmed.to_ascii_uppercase().as_str() {
        "BTL-BOTTLES" | "BOTTLES" | "BOTTLE" => "BTL".to_string(),
        "PCS-PIECES" | "PIECES" | "PIECE" => "PCS".to_string(),
        "BOX-BOXES" | "BOXES" => "BOX".to_string(),
        "JAR-JARS" | "JARS" => "JAR".to_string(),
        "PKT-PACKETS" | "PACKETS" | "PACKET" => "PKT".to_string(),
        "TUB-TUBES" | "TUBES" | "TUBE" => "TUB".to_string(),
        _ => trimmed.to_string(),
    }
}

/// Product validator that also checks the HSN code format
pub struct StrictProductValidator;

impl ProductValidator for StrictProductValidator {
    fn validate_product(&self, product: &Product) -> StockResult<()> {
        let mut errors = ValidationErrors::new();

        for result in [
            validate_product_name(&product.name),
            validate_hsn_code(&product.hsn_code),
        ] {
            if let Err(StockError::Validation(found)) = result {
                errors.merge(found);
            }
        }

        if product.units.trim().is_empty() {
            errors.add("units", "Units cannot be empty");
        }

        errors.into_result()
    }
}
