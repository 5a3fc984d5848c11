use serde::{Deserialize, Serialize};

use super::types::DataType;

/// A single attribute (spreadsheet column) of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    /// User-facing column name, as written in queries.
    pub column: String,
    /// Property URI; the key under which values live in the `data` blob.
    pub uri: String,
    #[serde(default)]
    pub data_type: DataType,
}

impl Attribute {
    pub fn new(column: &str, uri: &str) -> Self {
        Self {
            column: column.into(),
            uri: uri.into(),
            data_type: DataType::String,
        }
    }

    pub fn with_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }
}

/// A named data type backed by its own table in the project schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub concept_alias: String,
    #[serde(default)]
    pub parent_entity: Option<String>,
    /// Column name of the attribute holding the row's local identifier.
    pub unique_key: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl Entity {
    pub fn new(concept_alias: &str, unique_key: &str) -> Self {
        Self {
            concept_alias: concept_alias.into(),
            parent_entity: None,
            unique_key: unique_key.into(),
            attributes: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent: &str) -> Self {
        self.parent_entity = Some(parent.into());
        self
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn is_child_entity(&self) -> bool {
        self.parent_entity.is_some()
    }

    /// Look up an attribute by its column name.
    pub fn attribute(&self, column: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.column == column)
    }

    pub fn attribute_uri(&self, column: &str) -> Option<&str> {
        self.attribute(column).map(|a| a.uri.as_str())
    }

    /// URI of the unique key attribute.
    pub fn unique_key_uri(&self) -> Option<&str> {
        self.attribute_uri(&self.unique_key)
    }
}
