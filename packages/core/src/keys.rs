//! Key naming scheme for records and their indexes.
//!
//! The store has no schema, so every index is reachable only by a
//! deterministic key name. All components build keys through this module:
//!
//! | Shape                        | Example                 | Used for                       |
//! |------------------------------|-------------------------|--------------------------------|
//! | `{type}:{id}`                | `order:O1`              | a record                       |
//! | `{type}:{id}:{relation}`     | `customer:C1:orders`    | a sub-index owned by one entity|
//! | `{category}:{value}:{type}`  | `state:SP:customers`    | cross-entity partition         |
//! | `{type}:{field}:{value}`     | `order:status:shipped`  | partition by a record field    |
//! | `{type}:all`                 | `order:all`             | every live entity of a type    |
//!
//! Global rankings use bare names such as `product:sales`.

/// Separator between key segments.
pub const SEPARATOR: char = ':';

/// Key of the record for entity `id` of type `kind`.
///
/// ```
/// use kvdex_core::keys::record_key;
///
/// assert_eq!(record_key("order", "O1"), "order:O1");
/// ```
#[must_use]
pub fn record_key(kind: &str, id: &str) -> String {
    format!("{kind}{SEPARATOR}{id}")
}

/// Key of a sub-collection owned by a single entity.
///
/// ```
/// use kvdex_core::keys::owned_key;
///
/// assert_eq!(owned_key("customer", "C1", "orders"), "customer:C1:orders");
/// ```
#[must_use]
pub fn owned_key(kind: &str, id: &str, relation: &str) -> String {
    format!("{kind}{SEPARATOR}{id}{SEPARATOR}{relation}")
}

/// Key of a partition grouping entities of type `kind` by a shared category value.
#[must_use]
pub fn category_key(category: &str, value: &str, kind: &str) -> String {
    format!("{category}{SEPARATOR}{value}{SEPARATOR}{kind}")
}

/// Key of a partition grouping entities of type `kind` by the value of one of their fields.
#[must_use]
pub fn field_partition_key(kind: &str, field: &str, value: &str) -> String {
    format!("{kind}{SEPARATOR}{field}{SEPARATOR}{value}")
}

/// Key of the set holding every live entity of type `kind`.
#[must_use]
pub fn all_key(kind: &str) -> String {
    format!("{kind}{SEPARATOR}all")
}
