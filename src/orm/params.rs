//! Convert serde_json::Value to types that sqlx can bind.
//!
//! Statements are prepared once per SQL text and reused, so a parameter position
//! must carry the same wire type on every call. Values bound for a mapped column
//! take that type from the column declaration, NULL included.

use crate::error::AppError;
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::{Database, Type};

/// Wire type of a declared column, derived from its `column_type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Bool,
    Int,
    BigInt,
    Float,
    Text,
    /// Column type not recognised; the value decides, NULL is left to the server.
    Untyped,
}

impl ColumnKind {
    pub fn of(column_type: &str) -> Self {
        let t = column_type.trim().to_ascii_lowercase();
        let base = t.split('(').next().unwrap_or_default().trim();
        match base {
            "bool" | "boolean" => ColumnKind::Bool,
            "int" | "integer" | "int4" | "smallint" | "int2" | "serial" => ColumnKind::Int,
            "bigint" | "int8" | "bigserial" => ColumnKind::BigInt,
            "float" | "float8" | "double precision" | "real" | "float4" => ColumnKind::Float,
            "varchar" | "character varying" | "char" | "character" | "text" => ColumnKind::Text,
            _ => ColumnKind::Untyped,
        }
    }

    fn type_info(self) -> PgTypeInfo {
        match self {
            ColumnKind::Bool => <bool as Type<Postgres>>::type_info(),
            ColumnKind::Int => <i32 as Type<Postgres>>::type_info(),
            ColumnKind::BigInt => <i64 as Type<Postgres>>::type_info(),
            ColumnKind::Float => <f64 as Type<Postgres>>::type_info(),
            ColumnKind::Text => <String as Type<Postgres>>::type_info(),
            ColumnKind::Untyped => PgTypeInfo::with_name("unknown"),
        }
    }
}

/// A value that can be bound to a PostgreSQL query.
#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    Null(ColumnKind),
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    String(String),
}

impl PgBindValue {
    /// Bind by the JSON value's own shape. Used for free-form `where` and `limit` arguments.
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => PgBindValue::Null(ColumnKind::Untyped),
            Value::Bool(b) => PgBindValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    PgBindValue::I64(i)
                } else {
                    PgBindValue::F64(n.as_f64().unwrap_or(0.0))
                }
            }
            Value::String(s) => PgBindValue::String(s.clone()),
            Value::Array(_) | Value::Object(_) => PgBindValue::String(v.to_string()),
        }
    }

    /// Bind `v` as a value of a `kind` column, converting where the value is compatible.
    pub fn for_column(v: &Value, kind: ColumnKind, column: &str) -> Result<Self, AppError> {
        let invalid = || {
            AppError::InvalidArgument(format!("value {} does not fit column {} ({:?})", v, column, kind))
        };
        if v.is_null() {
            return Ok(PgBindValue::Null(kind));
        }
        Ok(match kind {
            ColumnKind::Untyped => Self::from_json(v),
            ColumnKind::Bool => match v {
                Value::Bool(b) => PgBindValue::Bool(*b),
                Value::Number(n) => PgBindValue::Bool(n.as_f64().ok_or_else(invalid)? != 0.0),
                Value::String(s) => PgBindValue::Bool(s.parse::<bool>().map_err(|_| invalid())?),
                _ => return Err(invalid()),
            },
            ColumnKind::Int => {
                let n = integer(v).ok_or_else(invalid)?;
                PgBindValue::I32(i32::try_from(n).map_err(|_| invalid())?)
            }
            ColumnKind::BigInt => PgBindValue::I64(integer(v).ok_or_else(invalid)?),
            ColumnKind::Float => match v {
                Value::Number(n) => PgBindValue::F64(n.as_f64().ok_or_else(invalid)?),
                Value::String(s) => PgBindValue::F64(s.trim().parse().map_err(|_| invalid())?),
                _ => return Err(invalid()),
            },
            ColumnKind::Text => match v {
                Value::String(s) => PgBindValue::String(s.clone()),
                other => PgBindValue::String(other.to_string()),
            },
        })
    }
}

/// Whole number from a JSON number (integral floats included) or numeric string.
fn integer(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            PgBindValue::Null(_) => <Option<i32> as Encode<Postgres>>::encode_by_ref(&None, buf)?,
            PgBindValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf)?,
            PgBindValue::I32(n) => <i32 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::F64(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::String(s) => {
                let s_ref: &str = s.as_str();
                <&str as Encode<Postgres>>::encode_by_ref(&s_ref, buf)?
            }
        })
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(match self {
            PgBindValue::Null(kind) => kind.type_info(),
            PgBindValue::Bool(_) => ColumnKind::Bool.type_info(),
            PgBindValue::I32(_) => ColumnKind::Int.type_info(),
            PgBindValue::I64(_) => ColumnKind::BigInt.type_info(),
            PgBindValue::F64(_) => ColumnKind::Float.type_info(),
            PgBindValue::String(_) => ColumnKind::Text.type_info(),
        })
    }
}

impl Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_json_scalars() {
        assert_eq!(PgBindValue::from_json(&Value::Null), PgBindValue::Null(ColumnKind::Untyped));
        assert_eq!(PgBindValue::from_json(&json!(true)), PgBindValue::Bool(true));
        assert_eq!(PgBindValue::from_json(&json!(5)), PgBindValue::I64(5));
        assert_eq!(PgBindValue::from_json(&json!(1.5)), PgBindValue::F64(1.5));
        assert_eq!(PgBindValue::from_json(&json!("x")), PgBindValue::String("x".into()));
    }

    #[test]
    fn composite_values_bind_as_json_text() {
        assert_eq!(
            PgBindValue::from_json(&json!([1, 2])),
            PgBindValue::String("[1,2]".into())
        );
    }

    #[test]
    fn column_kinds_from_declared_types() {
        assert_eq!(ColumnKind::of("Boolean"), ColumnKind::Bool);
        assert_eq!(ColumnKind::of("int"), ColumnKind::Int);
        assert_eq!(ColumnKind::of("bigint"), ColumnKind::BigInt);
        assert_eq!(ColumnKind::of("float"), ColumnKind::Float);
        assert_eq!(ColumnKind::of("varchar(50)"), ColumnKind::Text);
        assert_eq!(ColumnKind::of("text"), ColumnKind::Text);
        assert_eq!(ColumnKind::of("uuid"), ColumnKind::Untyped);
    }

    #[test]
    fn null_and_value_share_the_column_wire_type() {
        for (kind, value) in [
            (ColumnKind::Int, json!(7)),
            (ColumnKind::Float, json!(3)),
            (ColumnKind::Bool, json!(1)),
            (ColumnKind::Text, json!(42)),
        ] {
            let null = PgBindValue::for_column(&Value::Null, kind, "c").unwrap();
            let bound = PgBindValue::for_column(&value, kind, "c").unwrap();
            assert_eq!(null.produces(), bound.produces(), "{:?}", kind);
        }
    }

    #[test]
    fn values_are_converted_to_the_column_type() {
        assert_eq!(
            PgBindValue::for_column(&json!(7), ColumnKind::Int, "hits").unwrap(),
            PgBindValue::I32(7)
        );
        assert_eq!(
            PgBindValue::for_column(&json!(2), ColumnKind::Float, "score").unwrap(),
            PgBindValue::F64(2.0)
        );
        assert_eq!(
            PgBindValue::for_column(&json!(0), ColumnKind::Bool, "admin").unwrap(),
            PgBindValue::Bool(false)
        );
        assert_eq!(
            PgBindValue::for_column(&json!(12), ColumnKind::Text, "name").unwrap(),
            PgBindValue::String("12".into())
        );
        assert!(matches!(
            PgBindValue::for_column(&json!(i64::MAX), ColumnKind::Int, "hits"),
            Err(AppError::InvalidArgument(_))
        ));
        assert!(matches!(
            PgBindValue::for_column(&json!("many"), ColumnKind::Int, "hits"),
            Err(AppError::InvalidArgument(_))
        ));
    }
}
