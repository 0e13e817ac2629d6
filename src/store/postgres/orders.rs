//! Orders on PostgreSQL

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{query, query_as, query_scalar, PgPool};

use crate::domain::aggregates::{NewOrder, Order, OrderItem, OrderPatch};
use crate::pagination::Page;
use crate::store::{OrderStore, StoreError, StoreResult};

// Row lock on the cart: a second order for the same cart waits here, then sees zero rows.
const CLAIM_CART_SQL: &str = r#"
    UPDATE carts SET status = 'completed', updated_at = NOW()
    WHERE id = $1 AND user_id = $2 AND status = 'active'
"#;

const INSERT_ORDER_SQL: &str = r#"
    INSERT INTO orders (user_id, total, status, shipping_address, payment_method)
    VALUES ($1, $2, $3, $4, $5)
    RETURNING id, user_id, total, status, shipping_address, payment_method, created_at, updated_at
"#;

const INSERT_ORDER_ITEM_SQL: &str = r#"
    INSERT INTO order_items (order_id, product_id, quantity, price)
    VALUES ($1, $2, $3, $4)
    RETURNING id, order_id, product_id, quantity, price
"#;

const FIND_ORDER_SQL: &str = r#"
    SELECT id, user_id, total, status, shipping_address, payment_method, created_at, updated_at
    FROM orders
    WHERE id = $1
"#;

const LIST_ORDERS_BY_USER_SQL: &str = r#"
    SELECT id, user_id, total, status, shipping_address, payment_method, created_at, updated_at
    FROM orders
    WHERE user_id = $1
    ORDER BY created_at DESC, id DESC
    LIMIT $2 OFFSET $3
"#;

const COUNT_ORDERS_BY_USER_SQL: &str = "SELECT COUNT(*) FROM orders WHERE user_id = $1";

const ITEMS_FOR_ORDERS_SQL: &str = r#"
    SELECT id, order_id, product_id, quantity, price
    FROM order_items
    WHERE order_id = ANY($1)
    ORDER BY order_id, id
"#;

const UPDATE_ORDER_SQL: &str = r#"
    UPDATE orders
    SET status = COALESCE($2, status),
        shipping_address = COALESCE($3, shipping_address),
        updated_at = NOW()
    WHERE id = $1
    RETURNING id, user_id, total, status, shipping_address, payment_method, created_at, updated_at
"#;

const DELETE_ORDER_SQL: &str = "DELETE FROM orders WHERE id = $1";

#[derive(Debug, Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    async fn attach_items(&self, orders: &mut [Order]) -> StoreResult<()> {
        if orders.is_empty() {
            return Ok(());
        }

        let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
        let items = query_as::<_, OrderItem>(ITEMS_FOR_ORDERS_SQL)
            .bind(&ids)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::database("load order items"))?;

        let mut by_order: HashMap<i64, Vec<OrderItem>> = HashMap::new();
        for item in items {
            by_order.entry(item.order_id).or_default().push(item);
        }
        for order in orders.iter_mut() {
            order.items = by_order.remove(&order.id).unwrap_or_default();
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn create(&self, new: NewOrder) -> StoreResult<Order> {
        // Dropping `tx` before commit rolls back every row written below.
        let mut tx = self.pool.begin().await.map_err(StoreError::database("begin order transaction"))?;

        let claimed = query(CLAIM_CART_SQL)
            .bind(new.cart_id)
            .bind(new.user_id)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::database("complete source cart"))?
            .rows_affected();
        if claimed == 0 {
            return Err(StoreError::CartNotActive);
        }

        let mut order = query_as::<_, Order>(INSERT_ORDER_SQL)
            .bind(new.user_id)
            .bind(new.total)
            .bind(new.status)
            .bind(&new.shipping_address)
            .bind(&new.payment_method)
            .fetch_one(&mut *tx)
            .await
            .map_err(StoreError::database("insert order"))?;

        order.items.reserve(new.items.len());
        for (position, item) in new.items.iter().enumerate() {
            let row = query_as::<_, OrderItem>(INSERT_ORDER_ITEM_SQL)
                .bind(order.id)
                .bind(item.product_id)
                .bind(item.quantity)
                .bind(item.price)
                .fetch_one(&mut *tx)
                .await
                .map_err(StoreError::database(format!("insert order item #{}", position + 1)))?;
            order.items.push(row);
        }

        tx.commit().await.map_err(StoreError::database("commit order transaction"))?;
        Ok(order)
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Order> {
        let order = query_as::<_, Order>(FIND_ORDER_SQL)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::database("find order"))?
            .ok_or_else(|| StoreError::not_found("order"))?;

        let mut orders = [order];
        self.attach_items(&mut orders).await?;
        let [order] = orders;
        Ok(order)
    }

    async fn list_by_user(&self, user_id: i64, page: Page) -> StoreResult<(Vec<Order>, i64)> {
        let total = query_scalar::<_, i64>(COUNT_ORDERS_BY_USER_SQL)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::database("count orders"))?;

        let mut orders = query_as::<_, Order>(LIST_ORDERS_BY_USER_SQL)
            .bind(user_id)
            .bind(i64::from(page.limit))
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::database("list orders"))?;

        self.attach_items(&mut orders).await?;
        Ok((orders, total))
    }

    async fn update(&self, id: i64, patch: OrderPatch) -> StoreResult<Order> {
        let order = query_as::<_, Order>(UPDATE_ORDER_SQL)
            .bind(id)
            .bind(patch.status)
            .bind(patch.shipping_address)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::database("update order"))?
            .ok_or_else(|| StoreError::not_found("order"))?;

        let mut orders = [order];
        self.attach_items(&mut orders).await?;
        let [order] = orders;
        Ok(order)
    }

    async fn delete(&self, id: i64) -> StoreResult<()> {
        let rows = query(DELETE_ORDER_SQL)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::database("delete order"))?
            .rows_affected();

        if rows == 0 {
            return Err(StoreError::not_found("order"));
        }
        Ok(())
    }
}
