//! In-memory storage implementation for testing

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::traits::*;
use crate::types::*;

#[derive(Debug, Default)]
struct Tables {
    products: HashMap<Uuid, Product>,
    purchases: Vec<Purchase>,
    sales: Vec<Sale>,
    consumption: Vec<Consumption>,
    balances: HashMap<Uuid, BalanceStock>,
}

/// In-memory storage implementation for testing and development
///
/// Clones share the same tables. Ledger rows keep insertion order;
/// products and balances are listed in a stable order.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) -> StockResult<()> {
        *self.write()? = Tables::default();
        Ok(())
    }

    fn read(&self) -> StockResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StockError::Persistence("storage lock poisoned".to_string()))
    }

    fn write(&self) -> StockResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StockError::Persistence("storage lock poisoned".to_string()))
    }
}

fn for_product<T: Clone>(rows: &[T], product_id: Option<Uuid>, key: impl Fn(&T) -> Uuid) -> Vec<T> {
    rows.iter()
        .filter(|row| product_id.is_none_or(|id| key(row) == id))
        .cloned()
        .collect()
}

#[async_trait]
impl StockStorage for MemoryStorage {
    async fn save_product(&mut self, product: &Product) -> StockResult<()> {
        let mut tables = self.write()?;
        if tables.products.contains_key(&product.id) {
            return Err(StockError::Persistence(format!(
                "product {} already exists",
                product.id
            )));
        }
        tables.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn get_product(&self, product_id: Uuid) -> StockResult<Option<Product>> {
        Ok(self.read()?.products.get(&product_id).cloned())
    }

    async fn find_product(&self, name: &str, hsn_code: &str) -> StockResult<Option<Product>> {
        Ok(self
            .read()?
            .products
            .values()
            .find(|p| p.name == name && p.hsn_code == hsn_code)
            .cloned())
    }

    async fn list_products(&self) -> StockResult<Vec<Product>> {
        let mut products: Vec<Product> = self.read()?.products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then(a.created_at.cmp(&b.created_at)));
        Ok(products)
    }

    async fn update_product(&mut self, product: &Product) -> StockResult<()> {
        let mut tables = self.write()?;
        match tables.products.get_mut(&product.id) {
            Some(existing) => {
                *existing = product.clone();
                Ok(())
            }
            None => Err(StockError::ProductNotFound(product.id)),
        }
    }

    async fn delete_product(&mut self, product_id: Uuid) -> StockResult<()> {
        if self.write()?.products.remove(&product_id).is_some() {
            Ok(())
        } else {
            Err(StockError::ProductNotFound(product_id))
        }
    }

    async fn insert_purchase(&mut self, purchase: &Purchase) -> StockResult<()> {
        self.write()?.purchases.push(purchase.clone());
        Ok(())
    }

    async fn list_purchases(&self, product_id: Option<Uuid>) -> StockResult<Vec<Purchase>> {
        Ok(for_product(&self.read()?.purchases, product_id, |p| p.product_id))
    }

    async fn insert_sale(&mut self, sale: &Sale) -> StockResult<()> {
        self.write()?.sales.push(sale.clone());
        Ok(())
    }

    async fn get_sale(&self, sale_id: Uuid) -> StockResult<Option<Sale>> {
        Ok(self.read()?.sales.iter().find(|s| s.id == sale_id).cloned())
    }

    async fn list_sales(&self, product_id: Option<Uuid>) -> StockResult<Vec<Sale>> {
        Ok(for_product(&self.read()?.sales, product_id, |s| s.product_id))
    }

    async fn insert_consumption(&mut self, consumption: &Consumption) -> StockResult<()> {
        self.write()?.consumption.push(consumption.clone());
        Ok(())
    }

    async fn list_consumption(&self, product_id: Option<Uuid>) -> StockResult<Vec<Consumption>> {
        Ok(for_product(&self.read()?.consumption, product_id, |c| c.product_id))
    }

    async fn get_balance(&self, product_id: Uuid) -> StockResult<Option<BalanceStock>> {
        Ok(self.read()?.balances.get(&product_id).cloned())
    }

    async fn upsert_balance(&mut self, balance: &BalanceStock) -> StockResult<()> {
        self.write()?
            .balances
            .insert(balance.product_id, balance.clone());
        Ok(())
    }

    async fn delete_balance(&mut self, product_id: Uuid) -> StockResult<()> {
        self.write()?.balances.remove(&product_id);
        Ok(())
    }

    async fn list_balances(&self) -> StockResult<Vec<BalanceStock>> {
        let mut balances: Vec<BalanceStock> = self.read()?.balances.values().cloned().collect();
        balances.sort_by_key(|b| b.product_id);
        Ok(balances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clones_share_tables() {
        let storage = MemoryStorage::new();
        let mut writer = storage.clone();
        let product = Product::new("Shampoo".into(), "3305".into(), "BTL".into());

        writer.save_product(&product).await.unwrap();

        let found = storage.find_product("Shampoo", "3305").await.unwrap();
        assert_eq!(found.map(|p| p.id), Some(product.id));
        assert!(storage.find_product("Shampoo", "3304").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_product_rejected() {
        let mut storage = MemoryStorage::new();
        let product = Product::new("Gel".into(), "3305".into(), "JAR".into());

        storage.save_product(&product).await.unwrap();
        let err = storage.save_product(&product).await.unwrap_err();
        assert!(matches!(err, StockError::Persistence(_)));
    }

    #[tokio::test]
    async fn test_missing_product_update_fails() {
        let mut storage = MemoryStorage::new();
        let product = Product::new("Wax".into(), "3307".into(), "JAR".into());

        let err = storage.update_product(&product).await.unwrap_err();
        assert!(matches!(err, StockError::ProductNotFound(id) if id == product.id));

        storage.clear().unwrap();
        assert!(storage.list_products().await.unwrap().is_empty());
    }
}
