//! Carts on PostgreSQL

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{query, query_as, query_scalar, PgPool, Postgres, Transaction};

use crate::domain::aggregates::{Cart, CartItem, CartStatus};
use crate::domain::pricing::{self, CartTotals};
use crate::domain::value_objects::MoneyError;
use crate::store::{CartStore, StoreError, StoreResult};

// The no-op DO UPDATE makes RETURNING yield the existing active cart on conflict.
const FIND_OR_CREATE_ACTIVE_CART_SQL: &str = r#"
    INSERT INTO carts (user_id, expires_at)
    VALUES ($1, $2)
    ON CONFLICT (user_id) WHERE status = 'active'
    DO UPDATE SET user_id = EXCLUDED.user_id
    RETURNING id, user_id, status, subtotal, discount, tax, total, created_at, updated_at, expires_at
"#;

const FIND_CART_SQL: &str = r#"
    SELECT id, user_id, status, subtotal, discount, tax, total, created_at, updated_at, expires_at
    FROM carts
    WHERE id = $1
"#;

const ADD_ITEM_SQL: &str = r#"
    INSERT INTO cart_items (cart_id, product_id, name, description, quantity, snapshot_price, discount_rate, image_url)
    SELECT $1, p.id, p.name, p.description, $3, p.price, p.discount_rate, p.image_url
    FROM products p
    WHERE p.id = $2
    ON CONFLICT (cart_id, product_id)
    DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity, updated_at = NOW()
    RETURNING *
"#;

const LOCK_ITEM_SQL: &str = "SELECT * FROM cart_items WHERE cart_id = $1 AND product_id = $2 FOR UPDATE";
const DELETE_ITEM_SQL: &str = "DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2";
const SET_ITEM_QUANTITY_SQL: &str = "UPDATE cart_items SET quantity = $3, total_price = $4, updated_at = NOW() WHERE cart_id = $1 AND product_id = $2";
const SET_ITEM_TOTAL_SQL: &str = "UPDATE cart_items SET total_price = $3 WHERE cart_id = $1 AND product_id = $2";
const LOCK_CART_STATUS_SQL: &str = "SELECT status FROM carts WHERE id = $1 FOR UPDATE";
const TOUCH_CART_SQL: &str = "UPDATE carts SET updated_at = NOW(), expires_at = $2 WHERE id = $1";
const GET_ITEMS_SQL: &str = "SELECT * FROM cart_items WHERE cart_id = $1 ORDER BY added_at, product_id";
const SAVE_TOTALS_SQL: &str = "UPDATE carts SET subtotal = $2, discount = $3, tax = $4, total = $5, updated_at = NOW() WHERE id = $1";
const CLEAR_SQL: &str = "DELETE FROM cart_items WHERE cart_id = $1";
const SET_COMPLETED_SQL: &str = "UPDATE carts SET status = 'completed', updated_at = NOW() WHERE id = $1 AND status = 'active'";
const ABANDON_EXPIRED_SQL: &str = r#"
    UPDATE carts SET status = 'abandoned', updated_at = NOW()
    WHERE status = 'active' AND expires_at IS NOT NULL AND expires_at < $1
"#;

#[derive(Debug, Clone)]
pub struct PgCartStore {
    pool: PgPool,
    cart_ttl: Duration,
}

impl PgCartStore {
    pub fn new(pool: PgPool, cart_ttl: Duration) -> Self { Self { pool, cart_ttl } }

    async fn add_quantity(tx: &mut Transaction<'_, Postgres>, cart_id: i64, product_id: i64, quantity: i32) -> StoreResult<()> {
        let item = query_as::<_, CartItem>(ADD_ITEM_SQL)
            .bind(cart_id)
            .bind(product_id)
            .bind(quantity)
            .fetch_optional(&mut **tx)
            .await
            .map_err(StoreError::database("upsert cart item"))?
            .ok_or_else(|| StoreError::not_found("product"))?;

        let total = pricing::item_total(&item).map_err(StoreError::Amount)?;
        query(SET_ITEM_TOTAL_SQL)
            .bind(cart_id)
            .bind(product_id)
            .bind(total)
            .execute(&mut **tx)
            .await
            .map_err(StoreError::database("update cart item total"))?;
        Ok(())
    }

    async fn remove_quantity(tx: &mut Transaction<'_, Postgres>, cart_id: i64, product_id: i64, quantity: i32) -> StoreResult<()> {
        let Some(mut item) = query_as::<_, CartItem>(LOCK_ITEM_SQL)
            .bind(cart_id)
            .bind(product_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(StoreError::database("lock cart item"))?
        else {
            return Ok(());
        };

        item.quantity = item.quantity.checked_add(quantity).ok_or(StoreError::Amount(MoneyError::Overflow))?;
        if item.quantity <= 0 {
            query(DELETE_ITEM_SQL)
                .bind(cart_id)
                .bind(product_id)
                .execute(&mut **tx)
                .await
                .map_err(StoreError::database("delete cart item"))?;
            return Ok(());
        }

        let total = pricing::item_total(&item).map_err(StoreError::Amount)?;
        query(SET_ITEM_QUANTITY_SQL)
            .bind(cart_id)
            .bind(product_id)
            .bind(item.quantity)
            .bind(total)
            .execute(&mut **tx)
            .await
            .map_err(StoreError::database("update cart item quantity"))?;
        Ok(())
    }
}

#[async_trait]
impl CartStore for PgCartStore {
    async fn find_or_create_active_cart(&self, user_id: i64) -> StoreResult<Cart> {
        query_as::<_, Cart>(FIND_OR_CREATE_ACTIVE_CART_SQL)
            .bind(user_id)
            .bind(Utc::now() + self.cart_ttl)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::database("find or create active cart"))
    }

    async fn find_cart(&self, cart_id: i64) -> StoreResult<Cart> {
        query_as::<_, Cart>(FIND_CART_SQL)
            .bind(cart_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::database("find cart"))?
            .ok_or_else(|| StoreError::not_found("cart"))
    }

    async fn upsert_item(&self, cart_id: i64, product_id: i64, quantity: i32) -> StoreResult<()> {
        if quantity == 0 {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(StoreError::database("begin cart item transaction"))?;

        // Holding the cart row keeps completion and expiry out until this commits.
        let status = query_scalar::<_, CartStatus>(LOCK_CART_STATUS_SQL)
            .bind(cart_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(StoreError::database("lock cart"))?
            .ok_or_else(|| StoreError::not_found("cart"))?;
        if status.is_terminal() {
            return Err(StoreError::CartNotActive);
        }

        if quantity > 0 {
            Self::add_quantity(&mut tx, cart_id, product_id, quantity).await?;
        } else {
            Self::remove_quantity(&mut tx, cart_id, product_id, quantity).await?;
        }

        query(TOUCH_CART_SQL)
            .bind(cart_id)
            .bind(Utc::now() + self.cart_ttl)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::database("touch cart"))?;

        tx.commit().await.map_err(StoreError::database("commit cart item transaction"))
    }

    async fn get_items(&self, cart_id: i64) -> StoreResult<Vec<CartItem>> {
        query_as::<_, CartItem>(GET_ITEMS_SQL)
            .bind(cart_id)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::database("get cart items"))
    }

    async fn save_totals(&self, cart_id: i64, totals: CartTotals) -> StoreResult<()> {
        let rows = query(SAVE_TOTALS_SQL)
            .bind(cart_id)
            .bind(totals.subtotal)
            .bind(totals.discount)
            .bind(totals.tax)
            .bind(totals.total)
            .execute(&self.pool)
            .await
            .map_err(StoreError::database("save cart totals"))?
            .rows_affected();

        if rows == 0 {
            return Err(StoreError::not_found("cart"));
        }
        Ok(())
    }

    async fn clear(&self, cart_id: i64) -> StoreResult<()> {
        query(CLEAR_SQL)
            .bind(cart_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::database("clear cart"))?;
        Ok(())
    }

    async fn set_completed(&self, cart_id: i64) -> StoreResult<()> {
        let rows = query(SET_COMPLETED_SQL)
            .bind(cart_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::database("complete cart"))?
            .rows_affected();

        if rows == 0 {
            return Err(StoreError::not_found("active cart"));
        }
        Ok(())
    }

    async fn abandon_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let rows = query(ABANDON_EXPIRED_SQL)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(StoreError::database("abandon expired carts"))?
            .rows_affected();
        Ok(rows)
    }
}
