//! Convert serde_json::Value to a bindable PostgreSQL parameter.

use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::{Database, Type};

/// A bound parameter. Every value travels as `text` and the placeholder casts it to the
/// column type (`$n::double precision`), so a statement's parameter types never depend on
/// which JSON shape arrived first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PgBindValue {
    Null,
    Text(String),
}

impl PgBindValue {
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => PgBindValue::Null,
            Value::String(s) => PgBindValue::Text(s.clone()),
            Value::Bool(b) => PgBindValue::Text(b.to_string()),
            Value::Number(n) => PgBindValue::Text(n.to_string()),
            Value::Array(_) | Value::Object(_) => PgBindValue::Text(v.to_string()),
        }
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        match self {
            PgBindValue::Null => Ok(IsNull::Yes),
            PgBindValue::Text(s) => <String as Encode<Postgres>>::encode_by_ref(s, buf),
        }
    }
}

impl Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <String as Type<Postgres>>::compatible(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_become_cast_friendly_text() {
        assert_eq!(PgBindValue::from_json(&Value::from(7)), PgBindValue::Text("7".into()));
        assert_eq!(PgBindValue::from_json(&Value::from(9.99)), PgBindValue::Text("9.99".into()));
        assert_eq!(PgBindValue::from_json(&Value::Bool(true)), PgBindValue::Text("true".into()));
        assert_eq!(PgBindValue::from_json(&Value::Null), PgBindValue::Null);
    }

    #[test]
    fn parameter_type_does_not_depend_on_the_value() {
        let text = <String as Type<Postgres>>::type_info();
        assert_eq!(<PgBindValue as Type<Postgres>>::type_info(), text);
        for v in [Value::from(10), Value::from(2.5), Value::Null] {
            assert_eq!(PgBindValue::from_json(&v).produces(), None);
        }
    }
}
