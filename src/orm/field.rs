//! Column descriptors: name, column type, primary-key flag and default.

use serde_json::Value;
use std::fmt;

/// Default for an unset field: nothing, a literal, or a producer called on first read.
#[derive(Clone)]
pub enum FieldDefault {
    None,
    Literal(Value),
    Producer(fn() -> Value),
}

impl FieldDefault {
    /// Resolve the default. Producers are invoked on every call; caching is the caller's job.
    pub fn resolve(&self) -> Option<Value> {
        match self {
            FieldDefault::None => None,
            FieldDefault::Literal(v) => Some(v.clone()),
            FieldDefault::Producer(f) => Some(f()),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, FieldDefault::None)
    }
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldDefault::None => f.write_str("None"),
            FieldDefault::Literal(v) => write!(f, "Literal({v})"),
            FieldDefault::Producer(_) => f.write_str("Producer"),
        }
    }
}

/// One mapped column. Built through the typed constructors and never mutated after declaration.
#[derive(Clone, Debug)]
pub struct Field {
    /// Column name override; the attribute name is used when absent.
    pub name: Option<String>,
    pub column_type: String,
    pub primary_key: bool,
    pub default: FieldDefault,
}

impl Field {
    fn new(column_type: &str, default: FieldDefault) -> Self {
        Field {
            name: None,
            column_type: column_type.to_string(),
            primary_key: false,
            default,
        }
    }

    /// `varchar(100)` column with no default.
    pub fn string() -> Self {
        Self::new("varchar(100)", FieldDefault::None)
    }

    /// Stored with the column type `Boolean`; defaults to `false`. Never a key.
    pub fn boolean() -> Self {
        Self::new("Boolean", FieldDefault::Literal(Value::Bool(false)))
    }

    pub fn integer() -> Self {
        Self::new("int", FieldDefault::Literal(Value::from(0)))
    }

    pub fn float() -> Self {
        Self::new("float", FieldDefault::Literal(Value::from(0.0)))
    }

    /// `text` column with no default. Never a key.
    pub fn text() -> Self {
        Self::new("text", FieldDefault::None)
    }

    /// Override the column type (e.g. `varchar(50)`). Passed through to SQL verbatim.
    pub fn ddl(mut self, column_type: &str) -> Self {
        self.column_type = column_type.to_string();
        self
    }

    pub fn primary_key(mut self) -> Self {
        if self.column_type != "Boolean" && self.column_type != "text" {
            self.primary_key = true;
        }
        self
    }

    pub fn named(mut self, column: &str) -> Self {
        self.name = Some(column.to_string());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = FieldDefault::Literal(value.into());
        self
    }

    pub fn default_with(mut self, producer: fn() -> Value) -> Self {
        self.default = FieldDefault::Producer(producer);
        self
    }

    /// Column name for SQL: the override when set, else the attribute name.
    pub fn column<'a>(&'a self, attr: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(attr)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{}, {}{}>",
            self.name.as_deref().unwrap_or("-"),
            self.column_type,
            if self.primary_key { ", pk" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_carry_column_types_and_defaults() {
        assert_eq!(Field::string().column_type, "varchar(100)");
        assert!(Field::string().default.is_none());
        assert_eq!(Field::boolean().column_type, "Boolean");
        assert_eq!(Field::boolean().default.resolve(), Some(Value::Bool(false)));
        assert_eq!(Field::integer().default.resolve(), Some(Value::from(0)));
        assert_eq!(Field::float().column_type, "float");
        assert!(Field::text().default.is_none());
    }

    #[test]
    fn boolean_and_text_cannot_be_keys() {
        assert!(!Field::boolean().primary_key().primary_key);
        assert!(!Field::text().primary_key().primary_key);
        assert!(Field::string().ddl("varchar(50)").primary_key().primary_key);
    }

    #[test]
    fn producer_default_is_called_on_resolve() {
        let f = Field::float().default_with(|| Value::from(42.5));
        assert_eq!(f.default.resolve(), Some(Value::from(42.5)));
    }

    #[test]
    fn column_name_falls_back_to_attribute() {
        assert_eq!(Field::string().column("email"), "email");
        assert_eq!(Field::string().named("mail").column("email"), "mail");
    }
}
