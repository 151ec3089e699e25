//! Table descriptors and readiness states (Functional Core - pure data).

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Scalar types allowed for key attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScalarType {
    #[default]
    S,
    N,
    B,
}

impl ScalarType {
    /// Wire tag of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarType::S => "S",
            ScalarType::N => "N",
            ScalarType::B => "B",
        }
    }
}

/// A key attribute definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAttribute {
    pub name: String,
    #[serde(rename = "type", default)]
    pub attribute_type: ScalarType,
}

impl KeyAttribute {
    pub fn new(name: impl Into<String>, attribute_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
        }
    }

    /// A string-typed key attribute.
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ScalarType::S)
    }

    /// A number-typed key attribute.
    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, ScalarType::N)
    }

    /// A binary-typed key attribute.
    pub fn binary(name: impl Into<String>) -> Self {
        Self::new(name, ScalarType::B)
    }
}

/// Billing mode for the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BillingMode {
    /// Pay per request, no capacity settings.
    #[default]
    OnDemand,
    /// Explicit read/write capacity units.
    Provisioned { read_units: i64, write_units: i64 },
}

/// Identifies a logical table and its key schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub partition_key: KeyAttribute,
    #[serde(default)]
    pub sort_key: Option<KeyAttribute>,
    #[serde(default)]
    pub billing: BillingMode,
}

impl TableDescriptor {
    /// Creates an on-demand descriptor with only a partition key.
    pub fn new(name: impl Into<String>, partition_key: KeyAttribute) -> Result<Self> {
        let descriptor = Self {
            name: name.into(),
            partition_key,
            sort_key: None,
            billing: BillingMode::OnDemand,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Declares a sort key. Every item written afterwards must carry it.
    pub fn with_sort_key(mut self, sort_key: KeyAttribute) -> Result<Self> {
        self.sort_key = Some(sort_key);
        self.validate()?;
        Ok(self)
    }

    /// Sets the billing mode.
    pub fn with_billing(mut self, billing: BillingMode) -> Result<Self> {
        self.billing = billing;
        self.validate()?;
        Ok(self)
    }

    /// Checks naming rules, key schema and capacity settings.
    pub fn validate(&self) -> Result<()> {
        let len = self.name.len();
        if !(3..=255).contains(&len) {
            return Err(CoreError::InvalidDescriptor(format!(
                "table name '{}' must be 3-255 characters long",
                self.name
            )));
        }
        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return Err(CoreError::InvalidDescriptor(format!(
                "table name '{}' may only contain [A-Za-z0-9_.-]",
                self.name
            )));
        }
        if self.partition_key.name.is_empty() {
            return Err(CoreError::InvalidDescriptor(
                "partition key name must not be empty".to_string(),
            ));
        }
        if let Some(sk) = &self.sort_key {
            if sk.name.is_empty() {
                return Err(CoreError::InvalidDescriptor(
                    "sort key name must not be empty".to_string(),
                ));
            }
            if sk.name == self.partition_key.name {
                return Err(CoreError::InvalidDescriptor(format!(
                    "sort key '{}' must differ from the partition key",
                    sk.name
                )));
            }
        }
        if let BillingMode::Provisioned {
            read_units,
            write_units,
        } = self.billing
        {
            if read_units < 1 || write_units < 1 {
                return Err(CoreError::InvalidDescriptor(format!(
                    "provisioned capacity must be positive (read: {read_units}, write: {write_units})"
                )));
            }
        }
        Ok(())
    }

    /// Names of the key attributes, partition key first.
    pub fn key_names(&self) -> Vec<&str> {
        let mut names = vec![self.partition_key.name.as_str()];
        if let Some(sk) = &self.sort_key {
            names.push(sk.name.as_str());
        }
        names
    }

    /// True when `attribute` is part of the primary key.
    pub fn is_key_attribute(&self, attribute: &str) -> bool {
        self.key_names().contains(&attribute)
    }
}

/// Readiness of a table, derived from each describe call and never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableReadinessState {
    Unknown,
    Creating,
    Active,
    Failed,
}

impl TableReadinessState {
    /// Maps the store's raw table status text.
    pub fn from_status(status: &str) -> Self {
        match status {
            "ACTIVE" => TableReadinessState::Active,
            "CREATING" | "UPDATING" => TableReadinessState::Creating,
            "DELETING" | "ARCHIVING" | "ARCHIVED" | "INACCESSIBLE_ENCRYPTION_CREDENTIALS" => {
                TableReadinessState::Failed
            }
            _ => TableReadinessState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TableReadinessState::Unknown => "unknown",
            TableReadinessState::Creating => "creating",
            TableReadinessState::Active => "active",
            TableReadinessState::Failed => "failed",
        }
    }
}

/// Observed state of an existing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescription {
    pub name: String,
    pub state: TableReadinessState,
    pub item_count: Option<i64>,
    pub size_bytes: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_with_sort_key() {
        let descriptor = TableDescriptor::new("user_logs_1", KeyAttribute::string("PK"))
            .unwrap()
            .with_sort_key(KeyAttribute::string("SK"))
            .unwrap();

        assert_eq!(descriptor.key_names(), vec!["PK", "SK"]);
        assert!(descriptor.is_key_attribute("SK"));
        assert!(!descriptor.is_key_attribute("Name"));
        assert_eq!(descriptor.billing, BillingMode::OnDemand);
    }

    #[test]
    fn test_descriptor_rejects_bad_names() {
        assert!(TableDescriptor::new("ab", KeyAttribute::string("PK")).is_err());
        assert!(TableDescriptor::new("bad name", KeyAttribute::string("PK")).is_err());
        assert!(TableDescriptor::new("orders", KeyAttribute::string("")).is_err());
    }

    #[test]
    fn test_descriptor_rejects_sort_key_equal_to_partition_key() {
        let result = TableDescriptor::new("orders", KeyAttribute::string("PK"))
            .unwrap()
            .with_sort_key(KeyAttribute::number("PK"));
        assert!(matches!(result, Err(CoreError::InvalidDescriptor(_))));
    }

    #[test]
    fn test_descriptor_rejects_zero_capacity() {
        let result = TableDescriptor::new("orders", KeyAttribute::string("PK"))
            .unwrap()
            .with_billing(BillingMode::Provisioned {
                read_units: 0,
                write_units: 5,
            });
        assert!(matches!(result, Err(CoreError::InvalidDescriptor(_))));
    }

    #[test]
    fn test_descriptor_deserializes_with_defaults() {
        let json = r#"{
            "name": "orders",
            "partition_key": { "name": "PK" },
            "sort_key": { "name": "Seq", "type": "N" },
            "billing": { "mode": "provisioned", "read_units": 5, "write_units": 2 }
        }"#;
        let descriptor: TableDescriptor = serde_json::from_str(json).unwrap();

        assert_eq!(descriptor.partition_key, KeyAttribute::string("PK"));
        assert_eq!(descriptor.sort_key, Some(KeyAttribute::number("Seq")));
        assert_eq!(
            descriptor.billing,
            BillingMode::Provisioned {
                read_units: 5,
                write_units: 2
            }
        );
    }

    #[test]
    fn test_readiness_from_status() {
        assert_eq!(
            TableReadinessState::from_status("ACTIVE"),
            TableReadinessState::Active
        );
        assert_eq!(
            TableReadinessState::from_status("CREATING"),
            TableReadinessState::Creating
        );
        assert_eq!(
            TableReadinessState::from_status("DELETING"),
            TableReadinessState::Failed
        );
        assert_eq!(
            TableReadinessState::from_status("SOMETHING_NEW"),
            TableReadinessState::Unknown
        );
    }
}
