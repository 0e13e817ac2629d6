//! In-memory backend with the same contracts as the PostgreSQL one.
//!
//! Every operation runs under a single lock, which gives the one-active-cart and
//! all-or-nothing order guarantees without a database. Products must be registered with
//! [`MemoryStore::insert_product`] before they can be added to carts or ordered, mirroring the
//! foreign keys of the SQL schema.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::domain::aggregates::{Cart, CartItem, CartStatus, NewOrder, Order, OrderItem, OrderPatch, Product};
use crate::domain::pricing::{self, CartTotals};
use crate::domain::value_objects::MoneyError;
use crate::pagination::Page;
use crate::store::{CartStore, OrderStore, StoreError, StoreResult};

#[derive(Debug, Default)]
struct State {
    products: HashMap<i64, Product>,
    carts: BTreeMap<i64, Cart>,
    cart_items: BTreeMap<(i64, i64), CartItem>,
    orders: BTreeMap<i64, Order>,
    next_cart_id: i64,
    next_order_id: i64,
    next_order_item_id: i64,
}

impl State {
    fn cart_mut(&mut self, cart_id: i64) -> StoreResult<&mut Cart> {
        self.carts.get_mut(&cart_id).ok_or_else(|| StoreError::not_found("cart"))
    }
}

#[derive(Debug, Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    cart_ttl: Option<Duration>,
}

impl Default for MemoryStore {
    fn default() -> Self { Self::new() }
}

impl MemoryStore {
    pub fn new() -> Self { Self { state: Arc::new(Mutex::new(State::default())), cart_ttl: None } }

    pub fn with_cart_ttl(mut self, ttl: Duration) -> Self { self.cart_ttl = Some(ttl); self }

    pub async fn insert_product(&self, product: Product) {
        self.state.lock().await.products.insert(product.id, product);
    }

    pub async fn order_count(&self) -> usize { self.state.lock().await.orders.len() }

    pub async fn order_item_count(&self) -> usize {
        self.state.lock().await.orders.values().map(Order::item_count).sum()
    }

    /// Every cart ever created for the user, oldest first.
    pub async fn carts_for_user(&self, user_id: i64) -> Vec<Cart> {
        self.state.lock().await.carts.values().filter(|c| c.user_id == user_id).cloned().collect()
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn find_or_create_active_cart(&self, user_id: i64) -> StoreResult<Cart> {
        let mut state = self.state.lock().await;
        if let Some(cart) = state.carts.values().find(|c| c.user_id == user_id && c.is_active()) {
            return Ok(cart.clone());
        }

        state.next_cart_id += 1;
        let now = Utc::now();
        let cart = Cart::new(state.next_cart_id, user_id, now, self.cart_ttl.map(|ttl| now + ttl));
        state.carts.insert(cart.id, cart.clone());
        Ok(cart)
    }

    async fn find_cart(&self, cart_id: i64) -> StoreResult<Cart> {
        let state = self.state.lock().await;
        state.carts.get(&cart_id).cloned().ok_or_else(|| StoreError::not_found("cart"))
    }

    async fn upsert_item(&self, cart_id: i64, product_id: i64, quantity: i32) -> StoreResult<()> {
        if quantity == 0 {
            return Ok(());
        }

        let mut state = self.state.lock().await;
        if !state.cart_mut(cart_id)?.is_active() {
            return Err(StoreError::CartNotActive);
        }
        let now = Utc::now();
        let key = (cart_id, product_id);

        // Work on a copy; the stored line only changes once every check has passed.
        let item = match state.cart_items.get(&key) {
            Some(existing) => {
                let mut item = existing.clone();
                item.quantity = item.quantity.checked_add(quantity).ok_or(StoreError::Amount(MoneyError::Overflow))?;
                item.updated_at = now;
                item
            }
            None if quantity < 0 => return Ok(()),
            None => {
                let product = state.products.get(&product_id).ok_or_else(|| StoreError::not_found("product"))?;
                CartItem {
                    cart_id, product_id, name: product.name.clone(), description: product.description.clone(), quantity,
                    snapshot_price: product.price, discount_rate: product.discount_rate, total_price: product.price,
                    image_url: product.image_url.clone(), added_at: now, updated_at: now,
                }
            }
        };

        if item.quantity > 0 {
            let mut item = item;
            item.total_price = pricing::item_total(&item).map_err(StoreError::Amount)?;
            state.cart_items.insert(key, item);
        } else {
            state.cart_items.remove(&key);
        }

        let expires_at = self.cart_ttl.map(|ttl| now + ttl);
        let cart = state.cart_mut(cart_id)?;
        cart.updated_at = now;
        if expires_at.is_some() {
            cart.expires_at = expires_at;
        }
        Ok(())
    }

    async fn get_items(&self, cart_id: i64) -> StoreResult<Vec<CartItem>> {
        let state = self.state.lock().await;
        Ok(state.cart_items.range((cart_id, i64::MIN)..=(cart_id, i64::MAX)).map(|(_, item)| item.clone()).collect())
    }

    async fn save_totals(&self, cart_id: i64, totals: CartTotals) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let cart = state.cart_mut(cart_id)?;
        cart.apply_totals(totals);
        cart.updated_at = Utc::now();
        Ok(())
    }

    async fn clear(&self, cart_id: i64) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.cart_items.retain(|(owner, _), _| *owner != cart_id);
        Ok(())
    }

    async fn set_completed(&self, cart_id: i64) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        match state.carts.get_mut(&cart_id) {
            Some(cart) if cart.is_active() => {
                cart.status = CartStatus::Completed;
                cart.updated_at = Utc::now();
                Ok(())
            }
            _ => Err(StoreError::not_found("active cart")),
        }
    }

    async fn abandon_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.state.lock().await;
        let mut count = 0;
        for cart in state.carts.values_mut() {
            if cart.is_active() && cart.expires_at.is_some_and(|at| at < now) {
                cart.status = CartStatus::Abandoned;
                cart.updated_at = now;
                count += 1;
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn create(&self, new: NewOrder) -> StoreResult<Order> {
        let mut state = self.state.lock().await;

        let claimable = state.carts.get(&new.cart_id).is_some_and(|c| c.is_active() && c.user_id == new.user_id);
        if !claimable {
            return Err(StoreError::CartNotActive);
        }

        // Stage everything first; nothing is visible until every row is valid.
        let order_id = state.next_order_id + 1;
        let mut next_item_id = state.next_order_item_id;
        let mut items = Vec::with_capacity(new.items.len());
        for (position, item) in new.items.iter().enumerate() {
            if !state.products.contains_key(&item.product_id) {
                return Err(StoreError::Constraint(format!(
                    "insert order item #{}: product {} does not exist", position + 1, item.product_id
                )));
            }
            if item.quantity <= 0 {
                return Err(StoreError::Constraint(format!("insert order item #{}: quantity must be positive", position + 1)));
            }
            next_item_id += 1;
            items.push(OrderItem { id: next_item_id, order_id, product_id: item.product_id, quantity: item.quantity, price: item.price });
        }

        let now = Utc::now();
        let order = Order {
            id: order_id, user_id: new.user_id, items, total: new.total, status: new.status,
            shipping_address: new.shipping_address, payment_method: new.payment_method, created_at: now, updated_at: now,
        };

        state.next_order_id = order_id;
        state.next_order_item_id = next_item_id;
        state.orders.insert(order_id, order.clone());
        let cart = state.cart_mut(new.cart_id)?;
        cart.status = CartStatus::Completed;
        cart.updated_at = now;
        Ok(order)
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Order> {
        let state = self.state.lock().await;
        state.orders.get(&id).cloned().ok_or_else(|| StoreError::not_found("order"))
    }

    async fn list_by_user(&self, user_id: i64, page: Page) -> StoreResult<(Vec<Order>, i64)> {
        let state = self.state.lock().await;
        let mut orders: Vec<&Order> = state.orders.values().filter(|o| o.user_id == user_id).collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = orders.len() as i64;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let data = orders.into_iter().skip(offset).take(page.limit as usize).cloned().collect();
        Ok((data, total))
    }

    async fn update(&self, id: i64, patch: OrderPatch) -> StoreResult<Order> {
        let mut state = self.state.lock().await;
        let order = state.orders.get_mut(&id).ok_or_else(|| StoreError::not_found("order"))?;
        order.apply(&patch, Utc::now());
        Ok(order.clone())
    }

    async fn delete(&self, id: i64) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.orders.remove(&id).map(|_| ()).ok_or_else(|| StoreError::not_found("order"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{NewOrderItem, OrderStatus};
    use crate::domain::value_objects::{DiscountRate, Money};
    use rust_decimal::Decimal;

    async fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_product(Product::new(1, "Laptop", Money::from_minor(120_000)).with_discount(DiscountRate::new(Decimal::new(10, 0)).unwrap())).await;
        store.insert_product(Product::new(3, "Coffee Maker", Money::from_minor(15_000))).await;
        store
    }

    fn new_order(cart_id: i64, items: Vec<NewOrderItem>) -> NewOrder {
        NewOrder {
            user_id: 1, cart_id, items, total: Money::from_minor(123_000), status: OrderStatus::Pending,
            shipping_address: "123 Main St, Anytown, USA".into(), payment_method: "credit_card".into(),
        }
    }

    #[tokio::test]
    async fn test_upsert_increments_quantity() {
        let store = store().await;
        let cart = store.find_or_create_active_cart(1).await.unwrap();
        store.upsert_item(cart.id, 3, 2).await.unwrap();
        store.upsert_item(cart.id, 3, 3).await.unwrap();

        let items = store.get_items(cart.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 5);
        assert_eq!(items[0].total_price, Money::from_minor(75_000));
    }

    #[tokio::test]
    async fn test_upsert_takes_price_snapshot() {
        let store = store().await;
        let cart = store.find_or_create_active_cart(1).await.unwrap();
        store.upsert_item(cart.id, 1, 1).await.unwrap();

        store.insert_product(Product::new(1, "Laptop", Money::from_minor(999_999))).await;
        store.upsert_item(cart.id, 1, 1).await.unwrap();

        let items = store.get_items(cart.id).await.unwrap();
        assert_eq!(items[0].snapshot_price, Money::from_minor(120_000));
        assert_eq!(items[0].total_price, Money::from_minor(216_000));
    }

    #[tokio::test]
    async fn test_negative_delta_to_zero_removes_line() {
        let store = store().await;
        let cart = store.find_or_create_active_cart(1).await.unwrap();
        store.upsert_item(cart.id, 3, 2).await.unwrap();
        store.upsert_item(cart.id, 3, -1).await.unwrap();
        assert_eq!(store.get_items(cart.id).await.unwrap()[0].quantity, 1);

        store.upsert_item(cart.id, 3, -5).await.unwrap();
        assert!(store.get_items(cart.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_increment_keeps_existing_line() {
        let store = store().await;
        store.insert_product(Product::new(7, "Gold Bar", Money::from_minor(i64::MAX / 4))).await;
        let cart = store.find_or_create_active_cart(1).await.unwrap();
        store.upsert_item(cart.id, 7, 2).await.unwrap();

        let err = store.upsert_item(cart.id, 7, 3).await.unwrap_err();
        assert!(matches!(err, StoreError::Amount(MoneyError::Overflow)));

        let items = store.get_items(cart.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_quantity_overflow_is_an_amount_error() {
        let store = store().await;
        let cart = store.find_or_create_active_cart(1).await.unwrap();
        store.upsert_item(cart.id, 3, 1).await.unwrap();

        let err = store.upsert_item(cart.id, 3, i32::MAX).await.unwrap_err();
        assert!(matches!(err, StoreError::Amount(_)));
        assert_eq!(store.get_items(cart.id).await.unwrap()[0].quantity, 1);
    }

    #[tokio::test]
    async fn test_upsert_into_terminal_cart_is_refused() {
        let store = store().await.with_cart_ttl(Duration::hours(1));
        let completed = store.find_or_create_active_cart(1).await.unwrap();
        store.set_completed(completed.id).await.unwrap();
        assert!(matches!(store.upsert_item(completed.id, 3, 1).await, Err(StoreError::CartNotActive)));
        assert!(store.get_items(completed.id).await.unwrap().is_empty());

        let abandoned = store.find_or_create_active_cart(1).await.unwrap();
        store.abandon_expired(Utc::now() + Duration::hours(2)).await.unwrap();
        assert!(matches!(store.upsert_item(abandoned.id, 3, 1).await, Err(StoreError::CartNotActive)));
    }

    #[tokio::test]
    async fn test_upsert_extends_expiry() {
        let store = store().await.with_cart_ttl(Duration::hours(1));
        let cart = store.find_or_create_active_cart(1).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.upsert_item(cart.id, 3, 1).await.unwrap();

        let touched = store.find_cart(cart.id).await.unwrap();
        assert!(touched.expires_at > cart.expires_at);
    }

    #[tokio::test]
    async fn test_negative_delta_on_missing_line_is_noop() {
        let store = store().await;
        let cart = store.find_or_create_active_cart(1).await.unwrap();
        store.upsert_item(cart.id, 3, -2).await.unwrap();
        assert!(store.get_items(cart.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let store = store().await;
        let cart = store.find_or_create_active_cart(1).await.unwrap();
        let err = store.upsert_item(cart.id, 42, 1).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_concurrent_find_or_create_yields_one_cart() {
        let store = store().await;
        let (a, b) = tokio::join!(store.find_or_create_active_cart(9), store.find_or_create_active_cart(9));
        assert_eq!(a.unwrap().id, b.unwrap().id);
        assert_eq!(store.carts_for_user(9).await.len(), 1);
    }

    #[tokio::test]
    async fn test_completed_cart_is_never_returned_again() {
        let store = store().await;
        let first = store.find_or_create_active_cart(1).await.unwrap();
        store.set_completed(first.id).await.unwrap();

        let second = store.find_or_create_active_cart(1).await.unwrap();
        assert_ne!(first.id, second.id);
        assert!(second.is_active());
        assert!(store.set_completed(first.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_clear_keeps_status() {
        let store = store().await;
        let cart = store.find_or_create_active_cart(1).await.unwrap();
        store.upsert_item(cart.id, 1, 1).await.unwrap();
        store.clear(cart.id).await.unwrap();

        assert!(store.get_items(cart.id).await.unwrap().is_empty());
        assert!(store.find_cart(cart.id).await.unwrap().is_active());
    }

    #[tokio::test]
    async fn test_abandon_expired() {
        let store = store().await.with_cart_ttl(Duration::hours(1));
        let cart = store.find_or_create_active_cart(1).await.unwrap();

        assert_eq!(store.abandon_expired(Utc::now()).await.unwrap(), 0);
        assert_eq!(store.abandon_expired(Utc::now() + Duration::hours(2)).await.unwrap(), 1);
        assert_eq!(store.find_cart(cart.id).await.unwrap().status, CartStatus::Abandoned);
        assert_ne!(store.find_or_create_active_cart(1).await.unwrap().id, cart.id);
    }

    async fn open_cart(store: &MemoryStore) -> i64 { store.find_or_create_active_cart(1).await.unwrap().id }

    #[tokio::test]
    async fn test_create_order_assigns_ids() {
        let store = store().await;
        let cart_id = open_cart(&store).await;
        let order = store.create(new_order(cart_id, vec![
            NewOrderItem { product_id: 1, quantity: 1, price: Money::from_minor(108_000) },
            NewOrderItem { product_id: 3, quantity: 1, price: Money::from_minor(15_000) },
        ])).await.unwrap();

        assert_eq!(order.id, 1);
        assert_eq!(order.items.len(), 2);
        assert!(order.items.iter().all(|i| i.order_id == order.id));
        assert_eq!(store.find_by_id(order.id).await.unwrap(), order);
        assert_eq!(store.find_cart(cart_id).await.unwrap().status, CartStatus::Completed);
    }

    #[tokio::test]
    async fn test_second_order_for_same_cart_is_refused() {
        let store = store().await;
        let cart_id = open_cart(&store).await;
        let item = || vec![NewOrderItem { product_id: 3, quantity: 1, price: Money::from_minor(15_000) }];

        store.create(new_order(cart_id, item())).await.unwrap();
        let err = store.create(new_order(cart_id, item())).await.unwrap_err();

        assert!(matches!(err, StoreError::CartNotActive));
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_order_for_someone_elses_cart_is_refused() {
        let store = store().await;
        let cart_id = store.find_or_create_active_cart(2).await.unwrap().id;
        let err = store.create(new_order(cart_id, vec![NewOrderItem { product_id: 3, quantity: 1, price: Money::from_minor(15_000) }])).await.unwrap_err();

        assert!(matches!(err, StoreError::CartNotActive));
        assert!(store.find_cart(cart_id).await.unwrap().is_active());
    }

    #[tokio::test]
    async fn test_create_order_failing_second_item_writes_nothing() {
        let store = store().await;
        let cart_id = open_cart(&store).await;
        let err = store.create(new_order(cart_id, vec![
            NewOrderItem { product_id: 1, quantity: 1, price: Money::from_minor(108_000) },
            NewOrderItem { product_id: 404, quantity: 1, price: Money::from_minor(15_000) },
        ])).await.unwrap_err();

        assert!(matches!(err, StoreError::Constraint(ref msg) if msg.contains("#2")));
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.order_item_count().await, 0);
        assert!(store.find_cart(cart_id).await.unwrap().is_active());

        let order = store.create(new_order(cart_id, vec![NewOrderItem { product_id: 3, quantity: 1, price: Money::from_minor(15_000) }])).await.unwrap();
        assert_eq!(order.id, 1);
        assert_eq!(order.items[0].id, 1);
    }

    #[tokio::test]
    async fn test_update_missing_order_is_not_found() {
        let store = store().await;
        let patch = OrderPatch { status: Some(OrderStatus::Shipped), shipping_address: None };
        assert!(store.update(99, patch).await.unwrap_err().is_not_found());
        assert!(store.delete(99).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_by_user_is_newest_first_and_paginated() {
        let store = store().await;
        for _ in 0..3 {
            let cart_id = open_cart(&store).await;
            store.create(new_order(cart_id, vec![NewOrderItem { product_id: 3, quantity: 1, price: Money::from_minor(15_000) }])).await.unwrap();
        }

        let (first, total) = store.list_by_user(1, Page::new(1, 2)).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(first.iter().map(|o| o.id).collect::<Vec<_>>(), vec![3, 2]);

        let (second, _) = store.list_by_user(1, Page::new(2, 2)).await.unwrap();
        assert_eq!(second.iter().map(|o| o.id).collect::<Vec<_>>(), vec![1]);

        let (none, total) = store.list_by_user(2, Page::new(1, 2)).await.unwrap();
        assert!(none.is_empty());
        assert_eq!(total, 0);
    }
}
