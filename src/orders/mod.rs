//! Order Placement
//!
//! `OrderProcessor` prices an item, assigns the next order id and records the
//! order with its payment status.
//!
//! # Order identifiers
//! Ids are `max(orderid) + 1` (or `1` for the first order), computed and inserted
//! by a single `INSERT .. SELECT` statement. Two sessions can still compute the
//! same id; the primary key rejects the second insert, the store reports a
//! conflict, and the insert is retried with a fresh maximum. Ids therefore stay
//! unique and dense under concurrent placement.

use std::fmt;
use std::time::Duration;

use chrono::NaiveDateTime;

use crate::engine::{QueryExecutor, Row, SqlParam};
use crate::error::{CafeError, Result};
use crate::money::Money;

const INSERT_ORDER: &str = "INSERT INTO Orders (orderid, login, paid, total) \
     SELECT COALESCE(MAX(orderid), 0) + 1, CAST($1 AS TEXT), CAST($2 AS BOOLEAN), \
     CAST(CAST($3 AS TEXT) AS NUMERIC) FROM Orders \
     RETURNING orderid, timeStampReceived";

/// How the customer pays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentChoice {
    Now,
    Later,
}

/// A recorded order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub order_id: i64,
    pub login: String,
    pub paid: bool,
    pub total: Money,
    pub placed_at: Option<NaiveDateTime>,
}

impl Order {
    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            order_id: row.integer(0, "orderid")?,
            login: row.required(1, "login")?.to_string(),
            paid: row.boolean(2, "paid")?,
            total: Money::parse(row.required(3, "total")?)
                .map_err(|e| CafeError::persistence(format!("stored total is invalid: {e}")))?,
            placed_at: row.get(4).and_then(parse_timestamp),
        })
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Order #{}: ${} ({})",
            self.order_id,
            self.total,
            if self.paid { "paid" } else { "pay later" }
        )?;
        if let Some(placed_at) = self.placed_at {
            write!(f, " at {}", placed_at.format("%Y-%m-%d %H:%M:%S"))?;
        }
        Ok(())
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}

pub struct OrderProcessor<'a, Q> {
    db: &'a Q,
    max_attempts: u32,
}

impl<'a, Q: QueryExecutor> OrderProcessor<'a, Q> {
    /// `max_attempts` bounds how often an insert that lost an id race is retried
    #[must_use]
    pub fn new(db: &'a Q, max_attempts: u32) -> Self {
        Self { db, max_attempts: max_attempts.max(1) }
    }

    /// The id the next order would get if placed now
    ///
    /// Informational only; [`OrderProcessor::place_order`] assigns ids atomically.
    pub async fn next_order_id(&self) -> Result<i64> {
        let rows = self.db.query("SELECT COALESCE(MAX(orderid), 0) + 1 FROM Orders", &[]).await?;
        rows.first()
            .ok_or_else(|| CafeError::persistence("max(orderid) query returned no row"))?
            .integer(0, "orderid")
    }

    /// Current price of an item; the lowest `itemId` wins if the name is not unique
    ///
    /// # Errors
    /// * `NotFound` if no item has that name
    pub async fn price_of(&self, item_name: &str) -> Result<Money> {
        let rows = self
            .db
            .query(
                "SELECT CAST(price AS TEXT) FROM Menu WHERE itemName = $1 ORDER BY itemId LIMIT 1",
                &[SqlParam::text(item_name)],
            )
            .await?;

        let row = rows
            .first()
            .ok_or_else(|| CafeError::not_found(format!("menu item '{item_name}'")))?;
        Money::parse(row.required(0, "price")?)
            .map_err(|e| CafeError::persistence(format!("stored price is invalid: {e}")))
    }

    /// Price `item_name` and record a single-item order for `login`
    ///
    /// The order row is written by one statement, so a failure never leaves a
    /// partial order behind.
    pub async fn place_order(&self, login: &str, item_name: &str, payment: PaymentChoice) -> Result<Order> {
        let total = self.price_of(item_name).await?;
        let paid = payment == PaymentChoice::Now;
        let params = [SqlParam::text(login), SqlParam::Bool(paid), SqlParam::Text(total.to_string())];

        let mut attempt = 1;
        let rows = loop {
            match self.db.query(INSERT_ORDER, &params).await {
                Ok(rows) => break rows,
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    tracing::debug!(login, attempt, error = %e, "order id taken, retrying");
                    tokio::time::sleep(Duration::from_millis(u64::from(attempt) * 5)).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::warn!(login, item = item_name, attempt, error = %e, "order placement failed");
                    return Err(e);
                }
            }
        };

        let row = rows.first().ok_or_else(|| CafeError::persistence("order insert returned no row"))?;
        let order = Order {
            order_id: row.integer(0, "orderid")?,
            login: login.to_string(),
            paid,
            total,
            placed_at: row.get(1).and_then(parse_timestamp),
        };

        tracing::info!(login, order_id = order.order_id, item = item_name, total = %total, paid, "order placed");
        Ok(order)
    }

    /// The user's most recent orders, newest first
    pub async fn history(&self, login: &str, limit: u32) -> Result<Vec<Order>> {
        self.db
            .query(
                "SELECT orderid, login, paid, CAST(total AS TEXT), timeStampReceived \
                 FROM Orders WHERE login = $1 ORDER BY orderid DESC LIMIT $2",
                &[SqlParam::text(login), SqlParam::Integer(i64::from(limit))],
            )
            .await?
            .iter()
            .map(Order::from_row)
            .collect()
    }
}
