//! `PostgreSQL` document store backend.
//!
//! Entities keep their document shape: line items and message history
//! are JSONB columns, owner keys flatten to `(owner_kind, owner_ref)`
//! with a unique index so one owner holds at most one cart. Queries are
//! built at runtime so the crate compiles without a live database.

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;

use shopmate_core::{
    CartId, ChatSessionId, OrderId, OrderStatus, OwnerKey, Price, ProductId, SessionKey, UserId,
};

use crate::models::{Cart, CartItem, ChatMessage, ChatSession, Order, OrderItem, Product};

use super::{
    CartStore, ChatSessionStore, OrderStore, ProductStore, RepositoryError, StockDecrement,
};

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    use secrecy::ExposeSecret;
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Document store backed by `PostgreSQL`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn owner_columns(owner: &OwnerKey) -> (&'static str, &str) {
    match owner {
        OwnerKey::User { user_id } => ("user", user_id.as_str()),
        OwnerKey::Anonymous { session_key } => ("anonymous", session_key.as_str()),
    }
}

fn owner_from_columns(kind: &str, reference: &str) -> Result<OwnerKey, RepositoryError> {
    match kind {
        "user" => Ok(OwnerKey::user(UserId::new(reference))),
        "anonymous" => Ok(OwnerKey::anonymous(SessionKey::new(reference))),
        other => Err(RepositoryError::DataCorruption(format!(
            "unknown owner kind in database: {other:?}"
        ))),
    }
}

fn json_column<T: serde::de::DeserializeOwned>(
    row: &PgRow,
    column: &str,
) -> Result<T, RepositoryError> {
    let value: serde_json::Value = row.try_get(column)?;
    serde_json::from_value(value).map_err(|e| {
        RepositoryError::DataCorruption(format!("invalid {column} JSON in database: {e}"))
    })
}

fn product_from_row(row: &PgRow) -> Result<Product, RepositoryError> {
    let stock: i32 = row.try_get("stock_count")?;
    let stock_count = u32::try_from(stock).map_err(|_| {
        RepositoryError::DataCorruption(format!("negative stock count in database: {stock}"))
    })?;
    Ok(Product {
        id: ProductId::new(row.try_get::<String, _>("id")?),
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        price: Price::new(row.try_get::<String, _>("price")?),
        image_ref: row.try_get("image_ref")?,
        category_id: row
            .try_get::<Option<String>, _>("category_id")?
            .map(Into::into),
        stock_count,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn cart_from_row(row: &PgRow) -> Result<Cart, RepositoryError> {
    let kind: String = row.try_get("owner_kind")?;
    let reference: String = row.try_get("owner_ref")?;
    let items: Vec<CartItem> = json_column(row, "items")?;
    Ok(Cart {
        id: CartId::new(row.try_get::<String, _>("id")?),
        owner: owner_from_columns(&kind, &reference)?,
        items,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn order_from_row(row: &PgRow) -> Result<Order, RepositoryError> {
    let status: String = row.try_get("status")?;
    let status = OrderStatus::parse(&status).ok_or_else(|| {
        RepositoryError::DataCorruption(format!("unknown order status in database: {status:?}"))
    })?;
    let items: Vec<OrderItem> = json_column(row, "items")?;
    Ok(Order {
        id: OrderId::new(row.try_get::<String, _>("id")?),
        user_id: UserId::new(row.try_get::<String, _>("user_id")?),
        items,
        total_amount: row.try_get("total_amount")?,
        status,
        shipping_address: row.try_get("shipping_address")?,
        payment_method: row.try_get("payment_method")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn session_from_row(row: &PgRow) -> Result<ChatSession, RepositoryError> {
    let kind: String = row.try_get("owner_kind")?;
    let reference: String = row.try_get("owner_ref")?;
    let messages: Vec<ChatMessage> = json_column(row, "messages")?;
    Ok(ChatSession {
        id: ChatSessionId::new(row.try_get::<String, _>("id")?),
        key: SessionKey::new(row.try_get::<String, _>("session_key")?),
        owner: owner_from_columns(&kind, &reference)?,
        messages,
        cart_id: row.try_get::<Option<String>, _>("cart_id")?.map(Into::into),
        expiry_date: row.try_get("expiry_date")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, RepositoryError> {
    serde_json::to_value(value)
        .map_err(|e| RepositoryError::DataCorruption(format!("unserializable entity: {e}")))
}

#[async_trait]
impl ProductStore for PgStore {
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(
            r"
            SELECT id, title, description, price, image_ref, category_id,
                   stock_count, created_at, updated_at
            FROM products
            WHERE id = $1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(product_from_row).transpose()
    }

    async fn insert_product(&self, product: &Product) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO products
                (id, title, description, price, image_ref, category_id,
                 stock_count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                price = EXCLUDED.price,
                image_ref = EXCLUDED.image_ref,
                category_id = EXCLUDED.category_id,
                stock_count = EXCLUDED.stock_count,
                updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(product.id.as_str())
        .bind(&product.title)
        .bind(&product.description)
        .bind(product.price.as_str())
        .bind(&product.image_ref)
        .bind(product.category_id.as_ref().map(|c| c.as_str()))
        .bind(i32::try_from(product.stock_count).unwrap_or(i32::MAX))
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn decrement_stock(
        &self,
        id: &ProductId,
        quantity: u32,
    ) -> Result<StockDecrement, RepositoryError> {
        // Single conditional UPDATE so concurrent checkouts cannot both
        // pass a stale read-then-write stock check.
        let result = sqlx::query(
            r"
            UPDATE products
            SET stock_count = stock_count - $2, updated_at = NOW()
            WHERE id = $1 AND stock_count >= $2
            ",
        )
        .bind(id.as_str())
        .bind(i64::from(quantity))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(StockDecrement::Applied);
        }

        let row = sqlx::query("SELECT stock_count FROM products WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        let available: i32 = row.try_get("stock_count")?;
        Ok(StockDecrement::Insufficient {
            available: u32::try_from(available).unwrap_or(0),
        })
    }

    async fn increment_stock(&self, id: &ProductId, quantity: u32) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE products
            SET stock_count = stock_count + $2, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id.as_str())
        .bind(i64::from(quantity))
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn get_cart(&self, id: &CartId) -> Result<Option<Cart>, RepositoryError> {
        let row = sqlx::query(
            r"
            SELECT id, owner_kind, owner_ref, items, created_at, updated_at
            FROM carts
            WHERE id = $1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(cart_from_row).transpose()
    }

    async fn find_cart_by_owner(&self, owner: &OwnerKey) -> Result<Option<Cart>, RepositoryError> {
        let (kind, reference) = owner_columns(owner);
        let row = sqlx::query(
            r"
            SELECT id, owner_kind, owner_ref, items, created_at, updated_at
            FROM carts
            WHERE owner_kind = $1 AND owner_ref = $2
            ",
        )
        .bind(kind)
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(cart_from_row).transpose()
    }

    async fn insert_cart(&self, cart: &Cart) -> Result<(), RepositoryError> {
        let (kind, reference) = owner_columns(&cart.owner);
        let result = sqlx::query(
            r"
            INSERT INTO carts (id, owner_kind, owner_ref, items, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(cart.id.as_str())
        .bind(kind)
        .bind(reference)
        .bind(to_json(&cart.items)?)
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(
                RepositoryError::Conflict(format!("cart already exists for owner {}", cart.owner)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_cart(&self, cart: &Cart) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE carts
            SET items = $2, updated_at = $3
            WHERE id = $1
            ",
        )
        .bind(cart.id.as_str())
        .bind(to_json(&cart.items)?)
        .bind(cart.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete_cart(&self, id: &CartId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM carts WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn reassign_cart_owner(
        &self,
        id: &CartId,
        owner: &OwnerKey,
    ) -> Result<(), RepositoryError> {
        let (kind, reference) = owner_columns(owner);
        // Single UPDATE keeps the id and lines; the unique owner index
        // rejects a second cart for the target owner.
        let result = sqlx::query(
            r"
            UPDATE carts
            SET owner_kind = $2, owner_ref = $3, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id.as_str())
        .bind(kind)
        .bind(reference)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Err(RepositoryError::NotFound),
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(
                RepositoryError::Conflict(format!("cart already exists for owner {owner}")),
            ),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert_order(&self, order: &Order) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO orders
                (id, user_id, items, total_amount, status, shipping_address,
                 payment_method, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(order.id.as_str())
        .bind(order.user_id.as_str())
        .bind(to_json(&order.items)?)
        .bind(order.total_amount)
        .bind(order.status.as_str())
        .bind(&order.shipping_address)
        .bind(&order.payment_method)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_orders(&self, user_id: &UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, items, total_amount, status, shipping_address,
                   payment_method, created_at, updated_at
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC
            ",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(order_from_row).collect()
    }

    async fn get_order_for_user(
        &self,
        user_id: &UserId,
        id: &OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, items, total_amount, status, shipping_address,
                   payment_method, created_at, updated_at
            FROM orders
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(id.as_str())
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(order_from_row).transpose()
    }
}

#[async_trait]
impl ChatSessionStore for PgStore {
    async fn get_session_by_key(
        &self,
        key: &SessionKey,
    ) -> Result<Option<ChatSession>, RepositoryError> {
        let row = sqlx::query(
            r"
            SELECT id, session_key, owner_kind, owner_ref, messages, cart_id,
                   expiry_date, created_at, updated_at
            FROM chat_sessions
            WHERE session_key = $1
            ",
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn find_session_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<ChatSession>, RepositoryError> {
        let row = sqlx::query(
            r"
            SELECT id, session_key, owner_kind, owner_ref, messages, cart_id,
                   expiry_date, created_at, updated_at
            FROM chat_sessions
            WHERE owner_kind = 'user' AND owner_ref = $1
            ORDER BY updated_at DESC
            LIMIT 1
            ",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn insert_session(&self, session: &ChatSession) -> Result<(), RepositoryError> {
        let (kind, reference) = owner_columns(&session.owner);
        let result = sqlx::query(
            r"
            INSERT INTO chat_sessions
                (id, session_key, owner_kind, owner_ref, messages, cart_id,
                 expiry_date, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(session.id.as_str())
        .bind(session.key.as_str())
        .bind(kind)
        .bind(reference)
        .bind(to_json(&session.messages)?)
        .bind(session.cart_id.as_ref().map(|c| c.as_str()))
        .bind(session.expiry_date)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(RepositoryError::Conflict(format!(
                    "session key {} already exists",
                    session.key
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn append_message(
        &self,
        key: &SessionKey,
        message: &ChatMessage,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE chat_sessions
            SET messages = messages || $2::jsonb, updated_at = NOW()
            WHERE session_key = $1
            ",
        )
        .bind(key.as_str())
        .bind(to_json(&message)?)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
