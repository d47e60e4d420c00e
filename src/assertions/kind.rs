use serde_json::Value;
use std::fmt;

use super::compare;
use crate::extract::Extracted;

/// Declared data type of an assertion; drives value coercion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    String,
    Int,
    Float,
    Bool,
    Date,
    List,
    Dict,
    Any,
}

impl DataType {
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase();
        let data_type = match normalized.as_str() {
            "string" | "str" | "text" => DataType::String,
            "int" | "integer" | "long" => DataType::Int,
            "float" | "double" | "number" | "decimal" => DataType::Float,
            "bool" | "boolean" => DataType::Bool,
            "date" | "datetime" | "timestamp" => DataType::Date,
            "list" | "array" => DataType::List,
            "dict" | "object" | "map" => DataType::Dict,
            "any" => DataType::Any,
            _ => return None,
        };
        Some(data_type)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Int => "int",
            DataType::Float => "float",
            DataType::Bool => "bool",
            DataType::Date => "date",
            DataType::List => "list",
            DataType::Dict => "dict",
            DataType::Any => "any",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison method of an assertion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Contains,
    NotContains,
    Matches,
    LengthEquals,
    IsTruthy,
    IsFalsy,
    IsNull,
    IsNotNull,
}

impl Method {
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase().replace(['-', ' '], "_");
        let method = match normalized.as_str() {
            "equals" | "equal" | "eq" | "==" => Method::Equals,
            "not_equals" | "not_equal" | "ne" | "!=" => Method::NotEquals,
            "greater_than" | "gt" | ">" => Method::GreaterThan,
            "greater_than_or_equal" | "greater_than_or_equals" | "gte" | "ge" | ">=" => {
                Method::GreaterThanOrEqual
            }
            "less_than" | "lt" | "<" => Method::LessThan,
            "less_than_or_equal" | "less_than_or_equals" | "lte" | "le" | "<=" => {
                Method::LessThanOrEqual
            }
            "contains" | "in" => Method::Contains,
            "not_contains" | "not_in" => Method::NotContains,
            "matches" | "regex" => Method::Matches,
            "length_equals" | "len" | "length" => Method::LengthEquals,
            "is_truthy" | "truthy" | "is_true" => Method::IsTruthy,
            "is_falsy" | "falsy" | "is_false" => Method::IsFalsy,
            "is_null" | "null" | "is_none" => Method::IsNull,
            "is_not_null" | "not_null" | "exists" => Method::IsNotNull,
            _ => return None,
        };
        Some(method)
    }

    /// Unary methods never consume an expected value
    pub fn is_unary(&self) -> bool {
        matches!(
            self,
            Method::IsTruthy | Method::IsFalsy | Method::IsNull | Method::IsNotNull
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Equals => "equals",
            Method::NotEquals => "not_equals",
            Method::GreaterThan => "greater_than",
            Method::GreaterThanOrEqual => "greater_than_or_equal",
            Method::LessThan => "less_than",
            Method::LessThanOrEqual => "less_than_or_equal",
            Method::Contains => "contains",
            Method::NotContains => "not_contains",
            Method::Matches => "matches",
            Method::LengthEquals => "length_equals",
            Method::IsTruthy => "is_truthy",
            Method::IsFalsy => "is_falsy",
            Method::IsNull => "is_null",
            Method::IsNotNull => "is_not_null",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unary check; `Err` carries the mismatch description
pub type UnaryCheck = fn(&Extracted<'_>) -> Result<(), String>;

/// Binary check against an expected value, coerced per data type
pub type BinaryCheck = fn(&Extracted<'_>, &Value, DataType) -> Result<(), String>;

/// Comparison function bound to an assertion kind
#[derive(Clone, Copy)]
pub enum Comparison {
    Unary(UnaryCheck),
    Binary(BinaryCheck),
}

/// A recognized (data type, method) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssertionKind {
    pub data_type: DataType,
    pub method: Method,
}

impl AssertionKind {
    /// Resolve raw config strings. `None` for unknown names or unsupported pairs.
    pub fn resolve(data_type: &str, method: &str) -> Option<Self> {
        let kind = AssertionKind {
            data_type: DataType::parse(data_type)?,
            method: Method::parse(method)?,
        };
        kind.is_supported().then_some(kind)
    }

    fn is_supported(&self) -> bool {
        use DataType::*;
        match self.method {
            Method::Equals
            | Method::NotEquals
            | Method::IsTruthy
            | Method::IsFalsy
            | Method::IsNull
            | Method::IsNotNull => true,
            Method::GreaterThan
            | Method::GreaterThanOrEqual
            | Method::LessThan
            | Method::LessThanOrEqual => matches!(self.data_type, Int | Float | Date | String),
            Method::Contains | Method::NotContains => {
                matches!(self.data_type, String | List | Dict)
            }
            Method::Matches => self.data_type == String,
            Method::LengthEquals => matches!(self.data_type, String | List | Dict),
        }
    }

    /// Dispatch table from kind to comparison function
    pub fn comparison(&self) -> Comparison {
        match self.method {
            Method::Equals => Comparison::Binary(compare::equals),
            Method::NotEquals => Comparison::Binary(compare::not_equals),
            Method::GreaterThan => Comparison::Binary(compare::greater_than),
            Method::GreaterThanOrEqual => Comparison::Binary(compare::greater_than_or_equal),
            Method::LessThan => Comparison::Binary(compare::less_than),
            Method::LessThanOrEqual => Comparison::Binary(compare::less_than_or_equal),
            Method::Contains => Comparison::Binary(compare::contains),
            Method::NotContains => Comparison::Binary(compare::not_contains),
            Method::Matches => Comparison::Binary(compare::matches),
            Method::LengthEquals => Comparison::Binary(compare::length_equals),
            Method::IsTruthy => Comparison::Unary(compare::is_truthy),
            Method::IsFalsy => Comparison::Unary(compare::is_falsy),
            Method::IsNull => Comparison::Unary(compare::is_null),
            Method::IsNotNull => Comparison::Unary(compare::is_not_null),
        }
    }
}

impl fmt::Display for AssertionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.data_type, self.method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_aliases() {
        let kind = AssertionKind::resolve("Integer", "==").unwrap();
        assert_eq!(kind.data_type, DataType::Int);
        assert_eq!(kind.method, Method::Equals);

        let kind = AssertionKind::resolve("datetime", "greater-than-or-equal").unwrap();
        assert_eq!(kind.method, Method::GreaterThanOrEqual);
    }

    #[test]
    fn test_resolve_rejects_unknown_and_unsupported() {
        assert!(AssertionKind::resolve("uuid", "equals").is_none());
        assert!(AssertionKind::resolve("int", "approximately").is_none());
        assert!(AssertionKind::resolve("bool", "greater_than").is_none());
        assert!(AssertionKind::resolve("int", "matches").is_none());
        assert!(AssertionKind::resolve("int", "contains").is_none());
        assert!(AssertionKind::resolve("any", "contains").is_none());
        assert!(AssertionKind::resolve("any", "not_contains").is_none());
        assert!(AssertionKind::resolve("dict", "not_contains").is_some());
    }

    #[test]
    fn test_unary_methods() {
        assert!(Method::IsTruthy.is_unary());
        assert!(Method::IsNotNull.is_unary());
        assert!(!Method::Contains.is_unary());
        assert!(matches!(
            AssertionKind::resolve("any", "is_falsy").unwrap().comparison(),
            Comparison::Unary(_)
        ));
    }
}
