//! Product catalogue management

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::traits::*;
use crate::types::*;

/// Metadata correction for an existing product
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub hsn_code: Option<String>,
    pub units: Option<String>,
}

/// Product manager for handling catalogue operations
pub struct ProductManager<S: StockStorage> {
    pub(crate) storage: S,
    validator: Box<dyn ProductValidator>,
}

impl<S: StockStorage> ProductManager<S> {
    /// Create a new product manager
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            validator: Box::new(DefaultProductValidator),
        }
    }

    /// Create a new product manager with custom validator
    pub fn with_validator(storage: S, validator: Box<dyn ProductValidator>) -> Self {
        Self { storage, validator }
    }

    /// Create a new product
    pub async fn create_product(
        &mut self,
        name: String,
        hsn_code: String,
        units: String,
    ) -> StockResult<Product> {
        let product = self.prepare(&name, &hsn_code, &units)?;

        if self
            .storage
            .find_product(&product.name, &product.hsn_code)
            .await?
            .is_some()
        {
            return Err(StockError::validation(
                "name",
                format!(
                    "Product '{}' with HSN code {} already exists",
                    product.name, product.hsn_code
                ),
            ));
        }

        self.save_new(&product).await?;
        Ok(product)
    }

    fn prepare(&self, name: &str, hsn_code: &str, units: &str) -> StockResult<Product> {
        let product = Product::new(
            name.trim().to_string(),
            hsn_code.trim().to_string(),
            units.trim().to_string(),
        );
        self.validator.validate_product(&product)?;
        Ok(product)
    }

    /// Look a product up by name and HSN code, or build a validated one
    ///
    /// The flag is true when the product is new and not saved yet; pass it
    /// to [`ProductManager::save_new`] once whatever refers to it is valid.
    pub async fn find_or_prepare(
        &self,
        name: &str,
        hsn_code: &str,
        units: &str,
    ) -> StockResult<(Product, bool)> {
        if let Some(existing) = self.storage.find_product(name.trim(), hsn_code.trim()).await? {
            return Ok((existing, false));
        }
        Ok((self.prepare(name, hsn_code, units)?, true))
    }

    /// Save a product built by [`ProductManager::find_or_prepare`]
    pub async fn save_new(&mut self, product: &Product) -> StockResult<()> {
        self.storage.save_product(product).await?;
        info!(product_id = %product.id, name = %product.name, "Product created");
        Ok(())
    }

    /// Get a product by ID
    pub async fn get_product(&self, product_id: Uuid) -> StockResult<Option<Product>> {
        self.storage.get_product(product_id).await
    }

    /// Get a product by ID, returning an error if not found
    pub async fn get_product_required(&self, product_id: Uuid) -> StockResult<Product> {
        self.storage
            .get_product(product_id)
            .await?
            .ok_or(StockError::ProductNotFound(product_id))
    }

    /// List all products
    pub async fn list_products(&self) -> StockResult<Vec<Product>> {
        self.storage.list_products().await
    }

    /// Correct a product's name, HSN code or units
    ///
    /// Recorded transactions keep referring to the product by id, so the
    /// edit never touches them.
    pub async fn update_product(
        &mut self,
        product_id: Uuid,
        update: ProductUpdate,
    ) -> StockResult<Product> {
        let mut product = self.get_product_required(product_id).await?;

        if let Some(name) = update.name {
            product.name = name.trim().to_string();
        }
        if let Some(hsn_code) = update.hsn_code {
            product.hsn_code = hsn_code.trim().to_string();
        }
        if let Some(units) = update.units {
            product.units = units.trim().to_string();
        }

        self.validator.validate_product(&product)?;

        if let Some(other) = self
            .storage
            .find_product(&product.name, &product.hsn_code)
            .await?
        {
            if other.id != product.id {
                return Err(StockError::validation(
                    "name",
                    format!(
                        "Product '{}' with HSN code {} already exists",
                        product.name, product.hsn_code
                    ),
                ));
            }
        }

        product.updated_at = chrono::Utc::now().naive_utc();
        self.storage.update_product(&product).await?;
        debug!(%product_id, "Product metadata updated");
        Ok(product)
    }

    /// Delete a product that no transaction refers to
    pub async fn delete_product(&mut self, product_id: Uuid) -> StockResult<()> {
        self.get_product_required(product_id).await?;

        let references = self.storage.list_purchases(Some(product_id)).await?.len()
            + self.storage.list_sales(Some(product_id)).await?.len()
            + self.storage.list_consumption(Some(product_id)).await?.len();
        if references > 0 {
            return Err(StockError::validation(
                "product_id",
                format!("Product is referenced by {references} transactions and cannot be deleted"),
            ));
        }

        self.storage.delete_balance(product_id).await?;
        self.storage.delete_product(product_id).await?;
        info!(%product_id, "Product deleted");
        Ok(())
    }
}
