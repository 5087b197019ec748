use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction, postgres::PgRow};

use crate::{
    Money, NewOrder, Order, OrderAggregate, OrderId, OrderLine, OrderLineId, OrderPage,
    OrderPatch, OrderQuery, Product, ProductId, Result, RevenueSummary, StoreError,
    store::{OrderStore, StoreTransaction},
};

const ORDER_COLUMNS: &str =
    "id, order_code, order_type, order_status, total_price_cents, created_at, updated_at";

/// PostgreSQL-backed order store implementation.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("order store migrations applied");
        Ok(())
    }
}

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        quantity: row.try_get("quantity")?,
        price: Money::from_cents(row.try_get("price_cents")?),
    })
}

fn row_to_order(row: PgRow) -> Result<Order> {
    Ok(Order {
        id: OrderId::new(row.try_get("id")?),
        order_code: row.try_get("order_code")?,
        order_type: row.try_get::<String, _>("order_type")?.parse()?,
        order_status: row.try_get::<String, _>("order_status")?.parse()?,
        total_price: Money::from_cents(row.try_get("total_price_cents")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_line(row: PgRow) -> Result<OrderLine> {
    Ok(OrderLine {
        id: OrderLineId::new(row.try_get("id")?),
        order_id: OrderId::new(row.try_get("order_id")?),
        product_id: ProductId::new(row.try_get("product_id")?),
        quantity: row.try_get("quantity")?,
    })
}

/// Maps constraint violations to their store-level meaning.
fn map_constraint(
    err: sqlx::Error,
    order_code: Option<&str>,
    product: Option<ProductId>,
) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        match db_err.constraint() {
            Some("orders_order_code_unique") => {
                return StoreError::DuplicateOrderCode(order_code.unwrap_or_default().to_string());
            }
            Some("products_quantity_non_negative") => {
                if let Some(id) = product {
                    return StoreError::NegativeStock(id);
                }
            }
            _ => {}
        }
    }
    StoreError::Database(err)
}

async fn fetch_order(
    conn: &mut PgConnection,
    id: OrderId,
    for_update: bool,
) -> Result<Option<OrderAggregate>> {
    let sql = if for_update {
        format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE")
    } else {
        format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1")
    };

    let row: Option<PgRow> = sqlx::query(&sql)
        .bind(id.as_i64())
        .fetch_optional(&mut *conn)
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let order = row_to_order(row)?;

    let lines = sqlx::query(
        r#"
        SELECT id, order_id, product_id, quantity
        FROM order_lines
        WHERE order_id = $1
        ORDER BY id ASC
        "#,
    )
    .bind(id.as_i64())
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(row_to_line)
    .collect::<Result<Vec<_>>>()?;

    Ok(Some(OrderAggregate { order, lines }))
}

fn raw_ids(ids: &[ProductId]) -> Vec<i64> {
    let mut raw: Vec<i64> = ids.iter().map(ProductId::as_i64).collect();
    raw.sort_unstable();
    raw.dedup();
    raw
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    type Transaction = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction> {
        Ok(PostgresTransaction {
            tx: self.pool.begin().await?,
        })
    }

    async fn insert_product(&self, name: &str, quantity: i64, price: Money) -> Result<Product> {
        let row = sqlx::query(
            r#"
            INSERT INTO products (name, quantity, price_cents)
            VALUES ($1, $2, $3)
            RETURNING id, name, quantity, price_cents
            "#,
        )
        .bind(name)
        .bind(quantity)
        .bind(price.cents())
        .fetch_one(&self.pool)
        .await?;

        row_to_product(row)
    }

    async fn find_products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, quantity, price_cents
            FROM products
            WHERE id = ANY($1)
            ORDER BY id ASC
            "#,
        )
        .bind(raw_ids(ids))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_product).collect()
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<OrderAggregate>> {
        let mut conn = self.pool.acquire().await?;
        fetch_order(&mut conn, id, false).await
    }

    async fn list_orders(&self, query: &OrderQuery) -> Result<OrderPage> {
        let mut filter = String::from(" WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic filter
        if query.id.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND id = ${param_count}"));
        }
        if query.order_code.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND order_code = ${param_count}"));
        }
        if query.order_type.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND order_type = ${param_count}"));
        }
        if query.order_status.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND order_status = ${param_count}"));
        }

        let count_sql = format!("SELECT COUNT(*) FROM orders{filter}");
        let page_sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders{filter} ORDER BY id DESC LIMIT ${} OFFSET ${}",
            param_count + 1,
            param_count + 2
        );

        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        let mut page_query = sqlx::query(&page_sql);

        if let Some(id) = query.id {
            count_query = count_query.bind(id.as_i64());
            page_query = page_query.bind(id.as_i64());
        }
        if let Some(ref code) = query.order_code {
            count_query = count_query.bind(code.clone());
            page_query = page_query.bind(code.clone());
        }
        if let Some(t) = query.order_type {
            count_query = count_query.bind(t.as_str());
            page_query = page_query.bind(t.as_str());
        }
        if let Some(s) = query.order_status {
            count_query = count_query.bind(s.as_str());
            page_query = page_query.bind(s.as_str());
        }
        page_query = page_query
            .bind(i64::from(query.limit))
            .bind(query.offset() as i64);

        let total_count = count_query.fetch_one(&self.pool).await?;
        let data = page_query
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(row_to_order)
            .collect::<Result<Vec<_>>>()?;

        Ok(OrderPage {
            total_count,
            page: query.page,
            limit: query.limit,
            data,
        })
    }

    async fn delete_order(&self, id: OrderId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;

        tracing::debug!(order_id = %id, deleted = result.rows_affected(), "delete order");
        Ok(result.rows_affected() > 0)
    }

    async fn revenue_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<RevenueSummary> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(total_price_cents), 0)::BIGINT AS revenue,
                   COUNT(*) AS number_of_orders
            FROM orders
            WHERE updated_at >= $1 AND updated_at < $2
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(RevenueSummary {
            revenue: Money::from_cents(row.try_get("revenue")?),
            number_of_orders: row.try_get("number_of_orders")?,
        })
    }
}

/// Transaction over a [`PostgresOrderStore`].
///
/// Wraps a `sqlx` transaction, which rolls back when dropped uncommitted.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn lock_order(&mut self, id: OrderId) -> Result<Option<OrderAggregate>> {
        fetch_order(&mut self.tx, id, true).await
    }

    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>> {
        // ORDER BY is applied before FOR UPDATE, so rows lock in id order.
        let rows = sqlx::query(
            r#"
            SELECT id, name, quantity, price_cents
            FROM products
            WHERE id = ANY($1)
            ORDER BY id ASC
            FOR UPDATE
            "#,
        )
        .bind(raw_ids(ids))
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_product).collect()
    }

    async fn decrement_stock(&mut self, id: ProductId, delta: i64) -> Result<i64> {
        let quantity: Option<i64> = sqlx::query_scalar(
            "UPDATE products SET quantity = quantity - $2 WHERE id = $1 RETURNING quantity",
        )
        .bind(id.as_i64())
        .bind(delta)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_constraint(e, None, Some(id)))?;

        quantity.ok_or(StoreError::RowNotFound {
            entity: "product",
            id: id.as_i64(),
        })
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        let sql = format!(
            "INSERT INTO orders (order_code, order_type, order_status, total_price_cents) \
             VALUES ($1, $2, $3, $4) RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&order.order_code)
            .bind(order.order_type.as_str())
            .bind(order.order_status.as_str())
            .bind(order.total_price.cents())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_constraint(e, Some(&order.order_code), None))?;

        row_to_order(row)
    }

    async fn insert_lines(
        &mut self,
        order_id: OrderId,
        lines: &[(ProductId, i64)],
    ) -> Result<Vec<OrderLine>> {
        let mut inserted = Vec::with_capacity(lines.len());
        for &(product_id, quantity) in lines {
            let row = sqlx::query(
                r#"
                INSERT INTO order_lines (order_id, product_id, quantity)
                VALUES ($1, $2, $3)
                RETURNING id, order_id, product_id, quantity
                "#,
            )
            .bind(order_id.as_i64())
            .bind(product_id.as_i64())
            .bind(quantity)
            .fetch_one(&mut *self.tx)
            .await?;

            inserted.push(row_to_line(row)?);
        }
        Ok(inserted)
    }

    async fn update_order(&mut self, id: OrderId, patch: OrderPatch) -> Result<Order> {
        let sql = format!(
            "UPDATE orders SET \
                order_type = COALESCE($2, order_type), \
                order_status = COALESCE($3, order_status), \
                total_price_cents = $4, \
                updated_at = now() \
             WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        );
        let row: Option<PgRow> = sqlx::query(&sql)
            .bind(id.as_i64())
            .bind(patch.order_type.map(|t| t.as_str()))
            .bind(patch.order_status.map(|s| s.as_str()))
            .bind(patch.total_price.cents())
            .fetch_optional(&mut *self.tx)
            .await?;

        match row {
            Some(row) => row_to_order(row),
            None => Err(StoreError::RowNotFound {
                entity: "order",
                id: id.as_i64(),
            }),
        }
    }

    async fn update_line_quantities(
        &mut self,
        lines: &[(OrderLineId, i64)],
    ) -> Result<Vec<OrderLine>> {
        let mut updated = Vec::with_capacity(lines.len());
        for &(id, quantity) in lines {
            let row: Option<PgRow> = sqlx::query(
                r#"
                UPDATE order_lines SET quantity = $2
                WHERE id = $1
                RETURNING id, order_id, product_id, quantity
                "#,
            )
            .bind(id.as_i64())
            .bind(quantity)
            .fetch_optional(&mut *self.tx)
            .await?;

            let row = row.ok_or(StoreError::RowNotFound {
                entity: "order_line",
                id: id.as_i64(),
            })?;
            updated.push(row_to_line(row)?);
        }
        Ok(updated)
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        tracing::debug!("rolling back order transaction");
        self.tx.rollback().await?;
        Ok(())
    }
}
