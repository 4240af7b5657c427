use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// Attribute key holding the entity type name.
pub const NAME_KEY: &str = "name";

/// Full attribute snapshot of an entity at one stage.
pub type AttributeSet = BTreeMap<String, AttributeValue>;

/// A single attribute value. Equality is structural, nested records included.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<AttributeValue>),
    Record(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&BTreeMap<String, AttributeValue>> {
        match self {
            AttributeValue::Record(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(value) => write!(f, "{}", value),
            AttributeValue::Int(value) => write!(f, "{}", value),
            AttributeValue::Float(value) => write!(f, "{}", value),
            AttributeValue::String(value) => write!(f, "{:?}", value),
            AttributeValue::List(values) => {
                write!(f, "[")?;
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, "]")
            }
            AttributeValue::Record(entries) => {
                write!(f, "{{")?;
                for (index, (key, value)) in entries.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Int(i64::from(value))
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<Vec<AttributeValue>> for AttributeValue {
    fn from(value: Vec<AttributeValue>) -> Self {
        AttributeValue::List(value)
    }
}

impl From<BTreeMap<String, AttributeValue>> for AttributeValue {
    fn from(value: BTreeMap<String, AttributeValue>) -> Self {
        AttributeValue::Record(value)
    }
}

/// Reads the type name out of an attribute set.
pub fn name_of(attributes: &AttributeSet) -> Option<&str> {
    attributes.get(NAME_KEY).and_then(AttributeValue::as_str)
}

/// Builds an [`AttributeSet`] from `key => value` pairs.
///
/// ```
/// # use stageplan_shared::{attributes, AttributeValue};
/// let set = attributes! { "name" => "inserter", "override" => 1 };
/// assert_eq!(set.get("override"), Some(&AttributeValue::Int(1)));
/// ```
#[macro_export]
macro_rules! attributes {
    () => { $crate::AttributeSet::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut set = $crate::AttributeSet::new();
        $( set.insert(::std::string::String::from($key), $crate::AttributeValue::from($value)); )+
        set
    }};
}
