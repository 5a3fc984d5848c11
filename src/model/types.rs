//! Attribute data types and their SQL cast mapping.

use serde::{Deserialize, Serialize};

/// Declared data type of an attribute.
///
/// Attribute values are stored as text inside the entity's JSON `data` column,
/// so ordered comparisons need both the column access and the bound literal
/// cast to a comparable SQL type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    #[default]
    String,
    Integer,
    Float,
    Date,
    Datetime,
    Time,
    Boolean,
}

impl DataType {
    /// Database function that converts the stored text into this type.
    ///
    /// `None` means values are compared as text.
    pub fn cast_function(&self) -> Option<&'static str> {
        match self {
            DataType::Integer => Some("convert_to_int"),
            DataType::Float => Some("convert_to_float"),
            DataType::Date => Some("convert_to_date"),
            DataType::Datetime => Some("convert_to_datetime"),
            DataType::Time => Some("convert_to_time"),
            DataType::Boolean => Some("convert_to_bool"),
            DataType::String => None,
        }
    }

    /// SQL type name a bound literal is cast to (`:1::int`).
    pub fn sql_type(&self) -> Option<&'static str> {
        match self {
            DataType::Integer => Some("int"),
            DataType::Float => Some("float"),
            DataType::Date => Some("date"),
            DataType::Datetime => Some("timestamp"),
            DataType::Time => Some("time"),
            DataType::Boolean => Some("boolean"),
            DataType::String => None,
        }
    }
}
