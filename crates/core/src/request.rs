//! Request shapes handed to the store: put conditions, key-condition queries
//! and partial updates.

use std::collections::HashMap;

use crate::codec;
use crate::error::{CoreError, Result};
use crate::table::TableDescriptor;
use crate::value::{Item, NativeItem, NativeValue};

// ============================================================================
// Conditions
// ============================================================================

/// Placeholder used for the attribute named in a condition.
const CONDITION_NAME: &str = "#cond";

/// Existence predicate evaluated by the store at write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    AttributeNotExists(String),
    AttributeExists(String),
}

impl Condition {
    /// Condition expression using the `#cond` placeholder.
    pub fn expression(&self) -> String {
        match self {
            Condition::AttributeNotExists(_) => format!("attribute_not_exists({CONDITION_NAME})"),
            Condition::AttributeExists(_) => format!("attribute_exists({CONDITION_NAME})"),
        }
    }

    pub fn attribute(&self) -> &str {
        match self {
            Condition::AttributeNotExists(name) | Condition::AttributeExists(name) => name,
        }
    }

    /// Expression attribute names the expression refers to.
    pub fn names(&self) -> HashMap<String, String> {
        HashMap::from([(CONDITION_NAME.to_string(), self.attribute().to_string())])
    }

    /// Evaluates the predicate against the currently stored item.
    pub fn holds_for(&self, existing: Option<&Item>) -> bool {
        let present = existing.is_some_and(|item| item.contains_key(self.attribute()));
        match self {
            Condition::AttributeNotExists(_) => !present,
            Condition::AttributeExists(_) => present,
        }
    }
}

// ============================================================================
// Queries
// ============================================================================

/// Result ordering by sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    /// Maps to the store's `ScanIndexForward` flag.
    pub fn scan_forward(&self) -> bool {
        matches!(self, SortOrder::Ascending)
    }
}

/// A key-condition query. The expression is opaque here and forwarded as is.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryRequest {
    pub key_condition: String,
    pub values: Item,
    pub names: HashMap<String, String>,
    pub limit: Option<u32>,
    pub order: SortOrder,
}

impl QueryRequest {
    pub fn new(key_condition: impl Into<String>) -> Self {
        Self {
            key_condition: key_condition.into(),
            ..Self::default()
        }
    }

    /// Binds an expression value such as `:pk`.
    pub fn bind(mut self, placeholder: impl Into<String>, value: impl Into<NativeValue>) -> Self {
        self.values
            .insert(placeholder.into(), codec::marshal(&value.into()));
        self
    }

    /// Binds every entry of a native map.
    pub fn bind_all(mut self, values: &NativeItem) -> Self {
        self.values.extend(codec::marshal_map(values));
        self
    }

    /// Adds an expression attribute name such as `#sk`.
    pub fn name(mut self, placeholder: impl Into<String>, attribute: impl Into<String>) -> Self {
        self.names.insert(placeholder.into(), attribute.into());
        self
    }

    /// Caps the number of rows returned.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn descending(self) -> Self {
        self.order(SortOrder::Descending)
    }
}

// ============================================================================
// Partial updates
// ============================================================================

/// A `SET` update with its placeholders and guard condition.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePlan {
    pub expression: String,
    pub names: HashMap<String, String>,
    pub values: Item,
    pub condition: Condition,
}

/// Plans `SET #f1 = :v1, #f2 = :v2, ...` for every entry of `updates`,
/// guarded by the item existing.
///
/// Placeholders are numbered in attribute-name order.
pub fn plan_set_update(descriptor: &TableDescriptor, updates: &NativeItem) -> Result<UpdatePlan> {
    if updates.is_empty() {
        return Err(CoreError::InvalidUpdate(
            "at least one attribute is required".to_string(),
        ));
    }

    let condition = Condition::AttributeExists(descriptor.partition_key.name.clone());
    let mut names = condition.names();
    let mut values = Item::new();
    let mut assignments = Vec::with_capacity(updates.len());

    for (i, (attribute, value)) in updates.iter().enumerate() {
        if descriptor.is_key_attribute(attribute) {
            return Err(CoreError::InvalidUpdate(format!(
                "key attribute '{attribute}' cannot be updated"
            )));
        }
        let name_placeholder = format!("#f{}", i + 1);
        let value_placeholder = format!(":v{}", i + 1);
        assignments.push(format!("{name_placeholder} = {value_placeholder}"));
        names.insert(name_placeholder, attribute.clone());
        values.insert(value_placeholder, codec::marshal(value));
    }

    Ok(UpdatePlan {
        expression: format!("SET {}", assignments.join(", ")),
        names,
        values,
        condition,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::KeyAttribute;
    use crate::value::AttributeValue;

    fn users() -> TableDescriptor {
        TableDescriptor::new("users", KeyAttribute::string("user_id")).unwrap()
    }

    #[test]
    fn test_condition_expressions() {
        let cond = Condition::AttributeNotExists("PK".to_string());
        assert_eq!(cond.expression(), "attribute_not_exists(#cond)");
        assert_eq!(cond.names()["#cond"], "PK");
    }

    #[test]
    fn test_condition_holds_for() {
        let mut stored = Item::new();
        stored.insert("PK".to_string(), AttributeValue::S("1".to_string()));

        let not_exists = Condition::AttributeNotExists("PK".to_string());
        assert!(not_exists.holds_for(None));
        assert!(!not_exists.holds_for(Some(&stored)));

        let exists = Condition::AttributeExists("PK".to_string());
        assert!(exists.holds_for(Some(&stored)));
        assert!(!exists.holds_for(None));
    }

    #[test]
    fn test_query_request_builder() {
        let request = QueryRequest::new("PK = :pk AND begins_with(#sk, :prefix)")
            .bind(":pk", "GROUP#DEV")
            .bind(":prefix", "USER#")
            .name("#sk", "SK")
            .limit(2)
            .descending();

        assert_eq!(request.values[":pk"], AttributeValue::S("GROUP#DEV".to_string()));
        assert_eq!(request.names["#sk"], "SK");
        assert_eq!(request.limit, Some(2));
        assert!(!request.order.scan_forward());
    }

    #[test]
    fn test_plan_set_update() {
        let mut updates = NativeItem::new();
        updates.insert("cc".to_string(), false.into());
        updates.insert("bb".to_string(), false.into());

        let plan = plan_set_update(&users(), &updates).unwrap();

        assert_eq!(plan.expression, "SET #f1 = :v1, #f2 = :v2");
        assert_eq!(plan.names["#f1"], "bb");
        assert_eq!(plan.names["#f2"], "cc");
        assert_eq!(plan.names["#cond"], "user_id");
        assert_eq!(plan.values[":v1"], AttributeValue::Bool(false));
        assert_eq!(
            plan.condition,
            Condition::AttributeExists("user_id".to_string())
        );
    }

    #[test]
    fn test_plan_set_update_rejects_empty_and_key_updates() {
        assert!(matches!(
            plan_set_update(&users(), &NativeItem::new()),
            Err(CoreError::InvalidUpdate(_))
        ));

        let mut updates = NativeItem::new();
        updates.insert("user_id".to_string(), "other".into());
        assert!(matches!(
            plan_set_update(&users(), &updates),
            Err(CoreError::InvalidUpdate(_))
        ));
    }
}
