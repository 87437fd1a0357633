use std::cmp::Ordering;

/// A column's declared storage type. Distinct from [`Value`]: a column can only ever
/// hold one of these four kinds, while a [`Value`] may additionally be `Bool` (a
/// predicate-evaluation result, never a storable column type) or `Null`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SqlType {
    Int,
    Text,
    Date,
    Datetime,
}

impl SqlType {
    /// Parse a reserved type-name keyword (`INT`, `TEXT`, `DATE`, `DATETIME`).
    pub fn from_keyword(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "INT" => Some(Self::Int),
            "TEXT" => Some(Self::Text),
            "DATE" => Some(Self::Date),
            "DATETIME" => Some(Self::Datetime),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Int => "INT",
            Self::Text => "TEXT",
            Self::Date => "DATE",
            Self::Datetime => "DATETIME",
        }
    }
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A runtime value flowing through expressions and rows.
///
/// `Date`/`Datetime` are kept as validated ISO-8601 strings (`YYYY-MM-DD` /
/// `YYYY-MM-DD HH:MM:SS`) rather than a structured calendar type: this system never
/// performs calendar arithmetic, only comparison and storage, and lexicographic
/// ordering of ISO-8601 strings already agrees with chronological ordering.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Int(i64),
    Text(String),
    Date(String),
    Datetime(String),
    Bool(bool),
    Null,
}

impl Value {
    pub fn sql_type(&self) -> Option<SqlType> {
        match self {
            Value::Int(_) => Some(SqlType::Int),
            Value::Text(_) => Some(SqlType::Text),
            Value::Date(_) => Some(SqlType::Date),
            Value::Datetime(_) => Some(SqlType::Datetime),
            Value::Bool(_) | Value::Null => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Coerce a textual or numeric literal into a value of the given declared
    /// column type, as performed on `INSERT`. `NULL` coerces to `NULL` regardless
    /// of the target type.
    pub fn coerce_to(&self, target: SqlType) -> Option<Value> {
        if self.is_null() {
            return Some(Value::Null);
        }
        match (self, target) {
            (Value::Int(_), SqlType::Int) => Some(self.clone()),
            (Value::Text(s), SqlType::Text) => Some(Value::Text(s.clone())),
            (Value::Text(s), SqlType::Int) => s.parse::<i64>().ok().map(Value::Int),
            (Value::Int(i), SqlType::Text) => Some(Value::Text(i.to_string())),
            (Value::Text(s), SqlType::Date) => is_valid_date(s).then(|| Value::Date(s.clone())),
            (Value::Date(s), SqlType::Date) => Some(Value::Date(s.clone())),
            (Value::Text(s), SqlType::Datetime) => {
                is_valid_datetime(s).then(|| Value::Datetime(s.clone()))
            }
            (Value::Datetime(s), SqlType::Datetime) => Some(Value::Datetime(s.clone())),
            _ => None,
        }
    }

    pub fn cmp_same_type(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Datetime(a), Value::Datetime(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn eq_same_type(&self, other: &Value) -> Option<bool> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.eq(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.eq(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.eq(b)),
            (Value::Datetime(a), Value::Datetime(b)) => Some(a.eq(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.eq(b)),
            _ => None,
        }
    }
}

fn is_valid_date(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && s[0..4].bytes().all(|b| b.is_ascii_digit())
        && s[5..7].bytes().all(|b| b.is_ascii_digit())
        && s[8..10].bytes().all(|b| b.is_ascii_digit())
}

fn is_valid_datetime(s: &str) -> bool {
    let Some((date, time)) = s.split_once(' ') else {
        return false;
    };
    let tb = time.as_bytes();
    is_valid_date(date)
        && tb.len() == 8
        && tb[2] == b':'
        && tb[5] == b':'
        && time[0..2].bytes().all(|b| b.is_ascii_digit())
        && time[3..5].bytes().all(|b| b.is_ascii_digit())
        && time[6..8].bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cmp::Ordering::{Equal, Greater, Less};

    #[test]
    fn cmp_same_type_works() {
        assert_eq!(Value::Int(1).cmp_same_type(&Value::Int(2)), Some(Less));
        assert_eq!(Value::Int(1).cmp_same_type(&Value::Text("1".into())), None);
    }

    #[test]
    fn truthiness_is_strict() {
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Bool(false).as_bool(), Some(false));
        assert_eq!(Value::Int(1).as_bool(), None);
        assert_eq!(Value::Text("true".into()).as_bool(), None);
        assert_eq!(Value::Null.as_bool(), None);
    }

    #[test]
    fn comparisons_require_same_type() {
        assert_eq!(Value::Int(1).cmp_same_type(&Value::Int(2)), Some(Less));
        assert_eq!(
            Value::Text("a".into()).cmp_same_type(&Value::Text("a".into())),
            Some(Equal)
        );
        assert_eq!(
            Value::Bool(true).cmp_same_type(&Value::Bool(false)),
            Some(Greater)
        );
        assert_eq!(Value::Int(1).cmp_same_type(&Value::Text("1".into())), None);
        assert_eq!(Value::Null.cmp_same_type(&Value::Int(1)), None);
    }

    #[test]
    fn equality_requires_same_type() {
        assert_eq!(Value::Int(1).eq_same_type(&Value::Int(1)), Some(true));
        assert_eq!(Value::Int(1).eq_same_type(&Value::Int(2)), Some(false));
        assert_eq!(
            Value::Text("abc".into()).eq_same_type(&Value::Text("abc".into())),
            Some(true)
        );
        assert_eq!(
            Value::Bool(true).eq_same_type(&Value::Bool(false)),
            Some(false)
        );
        assert_eq!(Value::Text("1".into()).eq_same_type(&Value::Int(1)), None);
    }

    #[test]
    fn serde_round_trip_stability() {
        let vals = vec![
            Value::Int(-42),
            Value::Text("Ada".into()),
            Value::Date("2026-07-28".into()),
            Value::Datetime("2026-07-28 10:30:00".into()),
            Value::Bool(true),
            Value::Null,
        ];

        let json = serde_json::to_string(&vals).unwrap();
        let back: Vec<Value> = serde_json::from_str(&json).unwrap();

        assert_eq!(vals, back);
    }

    #[test]
    fn ordering_is_consistent() {
        let a = Value::Int(5);
        let b = Value::Int(7);
        let c = Value::Int(5);

        assert_eq!(a.cmp_same_type(&b), Some(Less));
        assert_eq!(b.cmp_same_type(&a), Some(Greater));
        assert_eq!(a.cmp_same_type(&c), Some(Equal));
    }

    #[test]
    fn coerce_text_to_declared_type() {
        assert_eq!(
            Value::Text("42".into()).coerce_to(SqlType::Int),
            Some(Value::Int(42))
        );
        assert_eq!(Value::Text("nope".into()).coerce_to(SqlType::Int), None);
        assert_eq!(
            Value::Text("2026-07-28".into()).coerce_to(SqlType::Date),
            Some(Value::Date("2026-07-28".into()))
        );
        assert_eq!(Value::Text("not-a-date".into()).coerce_to(SqlType::Date), None);
        assert_eq!(Value::Null.coerce_to(SqlType::Int), Some(Value::Null));
    }

    #[test]
    fn datetime_validation_requires_both_halves() {
        assert!(is_valid_datetime("2026-07-28 10:30:00"));
        assert!(!is_valid_datetime("2026-07-28"));
        assert!(!is_valid_datetime("2026-07-28T10:30:00"));
    }

    proptest! {
        #[test]
        fn order_is_antisymmetric(i in any::<i64>(), j in any::<i64>()) {
            let a = Value::Int(i);
            let b = Value::Int(j);
            let ord1 = a.cmp_same_type(&b);
            let ord2 = b.cmp_same_type(&a);
            match (ord1, ord2) {
                (Some(o1), Some(o2)) => assert_eq!(o1, o2.reverse()),
                _ => prop_assert!(true),
            }
        }

        #[test]
        fn eq_reflexive(val in any::<i64>()) {
            let v = Value::Int(val);
            assert_eq!(v.eq_same_type(&v), Some(true));
        }

        #[test]
        fn text_cmp_matches_std(a in ".*", b in ".*") {
            let va = Value::Text(a.clone());
            let vb = Value::Text(b.clone());
            assert_eq!(va.cmp_same_type(&vb), Some(a.cmp(&b)));
        }
    }
}
