//! Commerce domain: customers, orders, products, sellers, payments, reviews.
//!
//! Key layout:
//!
//! | Key                           | Kind       | Holds                                  |
//! |-------------------------------|------------|----------------------------------------|
//! | `customer:{id}`               | record     | zip, city, state                       |
//! | `customer:{id}:orders`        | list       | order ids, newest first                |
//! | `order:{id}`                  | record     | customer, status, timestamps, freight  |
//! | `order:{id}:items`            | list       | product ids in item order              |
//! | `order:{id}:payments`         | list       | encoded [`Payment`]s                   |
//! | `order:{id}:review`           | record     | score, comment                         |
//! | `product:{id}`                | record     | category, dimensions, price            |
//! | `seller:{id}`                 | record     | zip, city, state                       |
//! | `order:status:{status}`       | set        | order ids                              |
//! | `state:{state}:customers`     | set        | customer ids                           |
//! | `state:{state}:sellers`       | set        | seller ids                             |
//! | `category:{c}:products`       | set        | product ids                            |
//! | `product:sales`               | ranked set | product id by units sold               |
//! | `product:revenue`             | ranked set | product id by revenue                  |
//! | `category:revenue`            | ranked set | category by revenue                    |
//! | `review:scores`               | ranked set | order id by review score               |
//! | `review:score:distribution`   | ranked set | star value by number of reviews        |

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use ahash::AHashMap;
use kvdex_core::keys::owned_key;
use kvdex_core::{codec, Fields, RankOrder, ScoredEntry};
use serde::{Deserialize, Serialize};

use super::{open_source, DomainError, DomainResult};
use crate::client::{StoreClient, WriteOp};
use crate::consistency::{CategoryChange, EntityIndex, EntitySchema};
use crate::index::{RankingIndex, RelationshipIndex};
use crate::loader::{
    Averages, BatchLoader, EntityRows, LoadError, LoadReport, Row, RowError, RowHandler, Tally,
};

pub const PRODUCT_SALES: &str = "product:sales";
pub const PRODUCT_REVENUE: &str = "product:revenue";
pub const CATEGORY_REVENUE: &str = "category:revenue";
pub const REVIEW_SCORES: &str = "review:scores";
pub const REVIEW_DISTRIBUTION: &str = "review:score:distribution";

/// Bucket for products whose category is unknown or whose product row is missing.
pub const UNKNOWN_CATEGORY: &str = "unknown";

/// Order statuses reported by [`Commerce::orders_by_status`].
pub const ORDER_STATUSES: [&str; 8] = [
    "created",
    "approved",
    "invoiced",
    "processing",
    "shipped",
    "delivered",
    "canceled",
    "unavailable",
];

pub const CUSTOMERS_FILE: &str = "customers.jsonl";
pub const ORDERS_FILE: &str = "orders.jsonl";
pub const PRODUCTS_FILE: &str = "products.jsonl";
pub const ORDER_ITEMS_FILE: &str = "order_items.jsonl";
pub const PAYMENTS_FILE: &str = "payments.jsonl";
pub const REVIEWS_FILE: &str = "reviews.jsonl";
pub const SELLERS_FILE: &str = "sellers.jsonl";

const COMMENT_LIMIT: usize = 500;

// ---------------------------------------------------------------------------
// Schemas and value objects
// ---------------------------------------------------------------------------

#[must_use]
pub fn customer_schema() -> EntitySchema {
    EntitySchema::new("customer")
        .partition_by_category("state", "state", "customers")
        .owns("orders")
}

#[must_use]
pub fn order_schema() -> EntitySchema {
    EntitySchema::new("order")
        .partition_by_field("status")
        .child_of("customer_id", "customer", "orders")
        .ranked_in(REVIEW_SCORES)
        .owns("items")
        .owns("payments")
        .owns("review")
}

#[must_use]
pub fn product_schema() -> EntitySchema {
    EntitySchema::new("product")
        .partition_by_category("category", "category", "products")
        .ranked_in(PRODUCT_SALES)
        .ranked_in(PRODUCT_REVENUE)
}

#[must_use]
pub fn seller_schema() -> EntitySchema {
    EntitySchema::new("seller").partition_by_category("state", "state", "sellers")
}

/// One payment of an order, stored in `order:{id}:payments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Position among the order's payments; keeps equal payments distinct.
    pub sequential: u32,
    pub kind: String,
    pub installments: u32,
    pub value: f64,
}

/// Entity counts from the all-sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub customers: usize,
    pub orders: usize,
    pub products: usize,
    pub sellers: usize,
}

/// Copies each present, non-blank `column` of `row` into `fields` as `name`.
fn copy_columns(fields: &mut Fields, row: &Row, columns: &[(&str, &str)]) {
    for (column, name) in columns {
        if let Some(value) = row.get(column).map(str::trim).filter(|v| !v.is_empty()) {
            fields.insert(*name, value);
        }
    }
}

fn review_key(order_id: &str) -> String {
    owned_key("order", order_id, "review")
}

// ---------------------------------------------------------------------------
// Row handlers
// ---------------------------------------------------------------------------

/// `customers.jsonl`: `customer_id`, `customer_state`, `customer_city`, `customer_zip_code_prefix`.
///
/// # Errors
///
/// [`RowError::MissingField`] without a state.
pub fn customer_fields(row: &Row) -> Result<Fields, RowError> {
    let mut fields = Fields::new().with("state", row.required("customer_state")?);
    copy_columns(
        &mut fields,
        row,
        &[("customer_city", "city"), ("customer_zip_code_prefix", "zip")],
    );
    Ok(fields)
}

/// `sellers.jsonl`: `seller_id`, `seller_state`, `seller_city`, `seller_zip_code_prefix`.
///
/// # Errors
///
/// [`RowError::MissingField`] without a state.
pub fn seller_fields(row: &Row) -> Result<Fields, RowError> {
    let mut fields = Fields::new().with("state", row.required("seller_state")?);
    copy_columns(
        &mut fields,
        row,
        &[("seller_city", "city"), ("seller_zip_code_prefix", "zip")],
    );
    Ok(fields)
}

/// `orders.jsonl`: `order_id`, `customer_id`, `order_status` and optional timestamps.
///
/// # Errors
///
/// [`RowError::MissingField`] without a customer or status.
pub fn order_fields(row: &Row) -> Result<Fields, RowError> {
    let mut fields = Fields::new()
        .with("customer_id", row.required("customer_id")?)
        .with("status", row.required("order_status")?);
    copy_columns(
        &mut fields,
        row,
        &[
            ("order_purchase_timestamp", "purchase_ts"),
            ("order_approved_at", "approved_ts"),
            ("order_delivered_carrier_date", "delivered_carrier_ts"),
            ("order_delivered_customer_date", "delivered_customer_ts"),
            ("order_estimated_delivery_date", "estimated_delivery_ts"),
        ],
    );
    Ok(fields)
}

fn category_of(row: &Row) -> &str {
    row.get("product_category_name")
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(UNKNOWN_CATEGORY)
}

/// `products.jsonl`: `product_id`, optional `product_category_name` and dimensions.
///
/// # Errors
///
/// Never fails; the signature matches [`RowMapper`](crate::loader::RowMapper).
pub fn product_fields(row: &Row) -> Result<Fields, RowError> {
    let mut fields = Fields::new().with("category", category_of(row));
    copy_columns(
        &mut fields,
        row,
        &[
            ("product_weight_g", "weight"),
            ("product_length_cm", "length"),
            ("product_height_cm", "height"),
            ("product_width_cm", "width"),
        ],
    );
    Ok(fields)
}

/// Product id → category, read from the products source ahead of the items step.
///
/// A missing source gives an empty map; every item then counts toward
/// [`UNKNOWN_CATEGORY`].
pub fn product_categories<S>(source: Option<S>) -> AHashMap<String, String>
where
    S: IntoIterator<Item = Result<Row, RowError>>,
{
    let Some(source) = source else {
        tracing::warn!("products source missing, category revenue goes to `unknown`");
        return AHashMap::new();
    };
    source
        .into_iter()
        .filter_map(Result::ok)
        .filter_map(|row| {
            let id = row.required("product_id").ok()?.to_string();
            Some((id, category_of(&row).to_string()))
        })
        .collect()
}

/// `order_items.jsonl`: `order_id`, `order_item_id`, `product_id`, `seller_id`, `price`, `freight_value`.
///
/// Publishes `product:sales`, `product:revenue` and `category:revenue`, and
/// rewrites each order's item list in item order.
pub struct OrderItemRows {
    categories: AHashMap<String, String>,
    items: BTreeMap<String, Vec<(u32, String)>>,
    sales: Tally,
    revenue: Tally,
    category_revenue: Tally,
}

impl OrderItemRows {
    #[must_use]
    pub fn new(categories: AHashMap<String, String>) -> Self {
        Self {
            categories,
            items: BTreeMap::new(),
            sales: Tally::new(),
            revenue: Tally::new(),
            category_revenue: Tally::new(),
        }
    }
}

impl RowHandler for OrderItemRows {
    fn handle(&mut self, row: &Row, ops: &mut Vec<WriteOp>) -> Result<(), RowError> {
        let order_id = row.required("order_id")?;
        let product_id = row.required("product_id")?;
        let seller_id = row.required("seller_id")?;
        let price: f64 = row.parse("price")?;
        let freight: f64 = row.parse("freight_value")?;
        let position: u32 = row.optional("order_item_id")?.unwrap_or(1);

        ops.push(WriteOp::SetFields {
            key: kvdex_core::keys::record_key("product", product_id),
            fields: Fields::new().with("price", price),
        });
        ops.push(WriteOp::SetFields {
            key: kvdex_core::keys::record_key("order", order_id),
            fields: Fields::new()
                .with("freight_value", freight)
                .with("seller_id", seller_id),
        });

        self.items
            .entry(order_id.to_string())
            .or_default()
            .push((position, product_id.to_string()));
        self.sales.add(product_id, 1.0);
        self.revenue.add(product_id, price);
        let category = self
            .categories
            .get(product_id)
            .map_or(UNKNOWN_CATEGORY, String::as_str);
        self.category_revenue.add(category, price);
        Ok(())
    }

    fn finish(&mut self, ops: &mut Vec<WriteOp>) -> Result<(), LoadError> {
        for (order_id, mut items) in std::mem::take(&mut self.items) {
            let key = owned_key("order", &order_id, "items");
            items.sort_by_key(|(position, _)| *position);
            ops.push(WriteOp::Delete { key: key.clone() });
            ops.extend(items.into_iter().map(|(_, product)| WriteOp::PushBack {
                key: key.clone(),
                value: product,
            }));
        }
        for (ranking, tally) in [
            (PRODUCT_SALES, &mut self.sales),
            (PRODUCT_REVENUE, &mut self.revenue),
            (CATEGORY_REVENUE, &mut self.category_revenue),
        ] {
            ops.extend(tally.finalize().into_iter().map(|(member, score)| WriteOp::RankedAdd {
                key: ranking.to_string(),
                member,
                score,
            }));
        }
        Ok(())
    }
}

/// `payments.jsonl`: `order_id`, `payment_sequential`, `payment_type`, `payment_installments`, `payment_value`.
#[derive(Default)]
pub struct PaymentRows;

impl RowHandler for PaymentRows {
    fn handle(&mut self, row: &Row, ops: &mut Vec<WriteOp>) -> Result<(), RowError> {
        let order_id = row.required("order_id")?;
        let payment = Payment {
            sequential: row.optional("payment_sequential")?.unwrap_or(1),
            kind: row.required("payment_type")?.to_string(),
            installments: row.parse("payment_installments")?,
            value: row.parse("payment_value")?,
        };
        let key = owned_key("order", order_id, "payments");
        let encoded = codec::encode(&payment)?;
        // Remove-then-push keeps a re-import from listing the payment twice.
        ops.push(WriteOp::RemoveFromList {
            key: key.clone(),
            count: 0,
            value: encoded.clone(),
        });
        ops.push(WriteOp::PushFront {
            key,
            value: encoded,
        });
        Ok(())
    }
}

/// `reviews.jsonl`: `order_id`, `review_score` (1 to 5), optional title, message and date.
#[derive(Default)]
pub struct ReviewRows {
    distribution: Tally,
}

impl RowHandler for ReviewRows {
    fn handle(&mut self, row: &Row, ops: &mut Vec<WriteOp>) -> Result<(), RowError> {
        let order_id = row.required("order_id")?;
        let score: u8 = row.parse("review_score")?;
        RowError::check_range("review_score", f64::from(score), 1.0, 5.0)?;

        let mut fields = Fields::new().with("score", score);
        copy_columns(
            &mut fields,
            row,
            &[
                ("review_comment_title", "comment_title"),
                ("review_creation_date", "creation_date"),
            ],
        );
        if let Some(message) = row.get("review_comment_message").filter(|m| !m.trim().is_empty()) {
            fields.insert("comment", message.chars().take(COMMENT_LIMIT).collect::<String>());
        }

        ops.push(WriteOp::SetFields {
            key: review_key(order_id),
            fields,
        });
        ops.push(WriteOp::RankedAdd {
            key: REVIEW_SCORES.to_string(),
            member: order_id.to_string(),
            score: f64::from(score),
        });
        self.distribution.add(&score.to_string(), 1.0);
        Ok(())
    }

    fn finish(&mut self, ops: &mut Vec<WriteOp>) -> Result<(), LoadError> {
        ops.extend(
            self.distribution
                .finalize()
                .into_iter()
                .map(|(stars, count)| WriteOp::RankedAdd {
                    key: REVIEW_DISTRIBUTION.to_string(),
                    member: stars,
                    score: count,
                }),
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// CRUD and analytical queries over the commerce data.
#[derive(Clone)]
pub struct Commerce {
    client: Arc<dyn StoreClient>,
    customers: EntityIndex,
    orders: EntityIndex,
    products: EntityIndex,
    sellers: EntityIndex,
    customer_orders: RelationshipIndex,
    rankings: RankingIndex,
}

impl Commerce {
    #[must_use]
    pub fn new(client: Arc<dyn StoreClient>) -> Self {
        Self {
            customers: EntityIndex::new(Arc::clone(&client), customer_schema()),
            orders: EntityIndex::new(Arc::clone(&client), order_schema()),
            products: EntityIndex::new(Arc::clone(&client), product_schema()),
            sellers: EntityIndex::new(Arc::clone(&client), seller_schema()),
            customer_orders: RelationshipIndex::new(Arc::clone(&client), "customer", "orders"),
            rankings: RankingIndex::new(Arc::clone(&client)),
            client,
        }
    }

    #[must_use]
    pub fn orders(&self) -> &EntityIndex {
        &self.orders
    }

    #[must_use]
    pub fn customers(&self) -> &EntityIndex {
        &self.customers
    }

    /// Imports every commerce file found in `data_dir`. Missing files are
    /// reported and skipped.
    ///
    /// # Errors
    ///
    /// Store failures and unreadable files abort the import.
    pub async fn import_all(&self, loader: &BatchLoader, data_dir: &Path) -> Result<Vec<LoadReport>, LoadError> {
        let mut reports = Vec::with_capacity(7);

        let mut customers = EntityRows::new(self.customers.clone(), "customer_id", customer_fields);
        reports.push(loader.load("customers", open_source(data_dir, CUSTOMERS_FILE)?, &mut customers).await?);

        let mut orders = EntityRows::new(self.orders.clone(), "order_id", order_fields);
        reports.push(loader.load("orders", open_source(data_dir, ORDERS_FILE)?, &mut orders).await?);

        let mut products = EntityRows::new(self.products.clone(), "product_id", product_fields);
        reports.push(loader.load("products", open_source(data_dir, PRODUCTS_FILE)?, &mut products).await?);

        let categories = product_categories(open_source(data_dir, PRODUCTS_FILE)?);
        let mut items = OrderItemRows::new(categories);
        reports.push(loader.load("order_items", open_source(data_dir, ORDER_ITEMS_FILE)?, &mut items).await?);

        reports.push(loader.load("payments", open_source(data_dir, PAYMENTS_FILE)?, &mut PaymentRows).await?);

        let mut reviews = ReviewRows::default();
        reports.push(loader.load("reviews", open_source(data_dir, REVIEWS_FILE)?, &mut reviews).await?);

        let mut sellers = EntityRows::new(self.sellers.clone(), "seller_id", seller_fields);
        reports.push(loader.load("sellers", open_source(data_dir, SELLERS_FILE)?, &mut sellers).await?);

        Ok(reports)
    }

    // --- Create ---

    /// Creates an order and links it to its customer. Re-creating an
    /// existing order moves it to the new status and customer.
    ///
    /// # Errors
    ///
    /// Store failures, or an empty id.
    pub async fn create_order(&self, order_id: &str, customer_id: &str, status: &str) -> DomainResult<()> {
        let fields = Fields::new()
            .with("customer_id", customer_id)
            .with("status", status);
        self.orders.create(order_id, &fields).await?;
        Ok(())
    }

    /// Reviews an order, replacing any earlier review.
    ///
    /// Keeps `review:score:distribution` in step by moving one count from the
    /// old star bucket to the new one.
    ///
    /// # Errors
    ///
    /// [`DomainError::Invalid`] for a score outside 1..=5; store failures.
    pub async fn add_review(&self, order_id: &str, score: u8, comment: &str) -> DomainResult<()> {
        if !(1..=5).contains(&score) {
            return Err(DomainError::Invalid {
                field: "score",
                reason: format!("{score} is outside 1..=5"),
            });
        }
        let previous = self.rankings.score_of(REVIEW_SCORES, order_id).await?;

        let fields = Fields::new()
            .with("score", score)
            .with("comment", comment.chars().take(COMMENT_LIMIT).collect::<String>());
        self.client.set_fields(&review_key(order_id), &fields).await?;
        self.rankings.set_score(REVIEW_SCORES, order_id, f64::from(score)).await?;

        if let Some(previous) = previous {
            self.rankings
                .increment_score(REVIEW_DISTRIBUTION, &star_bucket(previous), -1.0)
                .await?;
        }
        self.rankings
            .increment_score(REVIEW_DISTRIBUTION, &score.to_string(), 1.0)
            .await?;
        Ok(())
    }

    /// Prepends a payment to the order's payment list.
    ///
    /// # Errors
    ///
    /// Store or encoding failures.
    pub async fn add_payment(&self, order_id: &str, payment: &Payment) -> DomainResult<()> {
        let encoded = codec::encode(payment).map_err(crate::error::StoreError::from)?;
        self.client
            .push_front(&owned_key("order", order_id, "payments"), &encoded)
            .await?;
        Ok(())
    }

    // --- Read ---

    /// # Errors
    ///
    /// Store failures.
    pub async fn get_order(&self, order_id: &str) -> DomainResult<Fields> {
        Ok(self.orders.get(order_id).await?)
    }

    /// # Errors
    ///
    /// Store failures.
    pub async fn get_customer(&self, customer_id: &str) -> DomainResult<Fields> {
        Ok(self.customers.get(customer_id).await?)
    }

    /// # Errors
    ///
    /// Store failures.
    pub async fn get_product(&self, product_id: &str) -> DomainResult<Fields> {
        Ok(self.products.get(product_id).await?)
    }

    /// # Errors
    ///
    /// Store failures.
    pub async fn order_review(&self, order_id: &str) -> DomainResult<Fields> {
        Ok(self.client.get_fields(&review_key(order_id)).await?)
    }

    /// Up to `limit` of the customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn customer_orders(&self, customer_id: &str, limit: usize) -> DomainResult<Vec<String>> {
        let Some(stop) = limit.checked_sub(1).and_then(|s| i64::try_from(s).ok()) else {
            return Ok(Vec::new());
        };
        Ok(self.customer_orders.range(customer_id, 0, stop).await?)
    }

    /// # Errors
    ///
    /// Store failures, or a stored payment that does not decode.
    pub async fn order_payments(&self, order_id: &str) -> DomainResult<Vec<Payment>> {
        let encoded = self
            .client
            .list_range(&owned_key("order", order_id, "payments"), 0, -1)
            .await?;
        encoded
            .iter()
            .map(|member| codec::decode(member).map_err(|e| DomainError::Store(e.into())))
            .collect()
    }

    // --- Update / delete ---

    /// # Errors
    ///
    /// [`EntityError::NotFound`](crate::consistency::EntityError::NotFound)
    /// for an unknown order; store failures.
    pub async fn update_order_status(&self, order_id: &str, status: &str) -> DomainResult<CategoryChange> {
        Ok(self.orders.change_category(order_id, "status", status).await?)
    }

    /// Deletes the order with its items, payments and review. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn delete_order(&self, order_id: &str) -> DomainResult<bool> {
        if let Some(score) = self.rankings.score_of(REVIEW_SCORES, order_id).await? {
            self.rankings
                .increment_score(REVIEW_DISTRIBUTION, &star_bucket(score), -1.0)
                .await?;
        }
        Ok(self.orders.delete(order_id).await?)
    }

    // --- Analytics ---

    /// # Errors
    ///
    /// Store failures.
    pub async fn top_selling(&self, n: usize) -> DomainResult<Vec<ScoredEntry>> {
        Ok(self.rankings.top(PRODUCT_SALES, n).await?)
    }

    /// # Errors
    ///
    /// Store failures.
    pub async fn top_revenue(&self, n: usize) -> DomainResult<Vec<ScoredEntry>> {
        Ok(self.rankings.top(PRODUCT_REVENUE, n).await?)
    }

    /// # Errors
    ///
    /// Store failures.
    pub async fn top_categories(&self, n: usize) -> DomainResult<Vec<ScoredEntry>> {
        Ok(self.rankings.top(CATEGORY_REVENUE, n).await?)
    }

    /// # Errors
    ///
    /// Store failures.
    pub async fn best_reviewed(&self, n: usize) -> DomainResult<Vec<ScoredEntry>> {
        Ok(self.rankings.top(REVIEW_SCORES, n).await?)
    }

    /// # Errors
    ///
    /// Store failures.
    pub async fn worst_reviewed(&self, n: usize) -> DomainResult<Vec<ScoredEntry>> {
        Ok(self.rankings.bottom(REVIEW_SCORES, n).await?)
    }

    /// Non-empty status partitions with their sizes, in [`ORDER_STATUSES`] order.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn orders_by_status(&self) -> DomainResult<Vec<(&'static str, usize)>> {
        let mut counts = Vec::new();
        for status in ORDER_STATUSES {
            let count = self.orders.count_in_category("status", status).await?;
            if count > 0 {
                counts.push((status, count));
            }
        }
        Ok(counts)
    }

    /// # Errors
    ///
    /// Store failures.
    pub async fn counts(&self) -> DomainResult<Counts> {
        Ok(Counts {
            customers: self.customers.count().await?,
            orders: self.orders.count().await?,
            products: self.products.count().await?,
            sellers: self.sellers.count().await?,
        })
    }

    /// # Errors
    ///
    /// Store failures.
    pub async fn customers_in_state(&self, state: &str) -> DomainResult<usize> {
        Ok(self.customers.count_in_category("state", state).await?)
    }

    /// # Errors
    ///
    /// Store failures.
    pub async fn sellers_in_state(&self, state: &str) -> DomainResult<usize> {
        Ok(self.sellers.count_in_category("state", state).await?)
    }

    /// `(stars, reviews)` pairs with at least one review, by stars.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn review_distribution(&self) -> DomainResult<Vec<(u8, u64)>> {
        let entries = self
            .rankings
            .rank_range(REVIEW_DISTRIBUTION, 0, -1, RankOrder::Ascending)
            .await?;
        let mut distribution: Vec<(u8, u64)> = entries
            .into_iter()
            .filter_map(|entry| {
                let stars = entry.id.parse().ok()?;
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let count = entry.score.round().max(0.0) as u64;
                (count > 0).then_some((stars, count))
            })
            .collect();
        distribution.sort_unstable();
        Ok(distribution)
    }

    /// Mean star rating over all reviews, `None` when there are none.
    ///
    /// # Errors
    ///
    /// Store failures.
    #[allow(clippy::cast_precision_loss)]
    pub async fn average_review_score(&self) -> DomainResult<Option<f64>> {
        let distribution = self.review_distribution().await?;
        let total: u64 = distribution.iter().map(|(_, count)| count).sum();
        if total == 0 {
            return Ok(None);
        }
        let weighted: u64 = distribution
            .iter()
            .map(|(stars, count)| u64::from(*stars) * count)
            .sum();
        Ok(Some(weighted as f64 / total as f64))
    }

    /// Mean freight per customer state over a random sample of orders,
    /// highest first. Orders or customers that vanished are ignored.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn average_freight_by_state(&self, sample_size: usize) -> DomainResult<Vec<(String, f64)>> {
        let ids = self.orders.sample(sample_size).await?;
        let mut freight = Averages::new();
        for (_, order) in self.orders.resolve(&ids).await? {
            let Some(customer_id) = order.get("customer_id") else {
                continue;
            };
            let customer = self.customers.get(customer_id).await?;
            if let Some(state) = customer.get("state") {
                freight.add(state, order.parse("freight_value").unwrap_or(0.0));
            }
        }
        let mut by_state = freight.finalize(1);
        by_state.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(by_state)
    }
}

/// Distribution member for a stored review score.
fn star_bucket(score: f64) -> String {
    #[allow(clippy::cast_possible_truncation)]
    let stars = score.round() as i64;
    stars.to_string()
}
