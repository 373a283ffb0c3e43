use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A single property value
///
/// Variants mirror the storage classes of the backing store so values
/// survive a round trip without coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Real(r) if r.fract() == 0.0 => Some(*r as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Rank of the storage class in the store's cross-type ordering
    fn class_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Integer(_) | Value::Real(_) => 1,
            Value::Text(_) => 2,
            Value::Blob(_) => 3,
        }
    }

    /// Compare two values the way the backing store orders them
    ///
    /// NULL sorts first, numbers compare numerically across Integer/Real,
    /// text compares bytewise, blobs sort last.
    pub fn store_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Integer(a), Value::Real(b)) => (*a as f64).total_cmp(b),
            (Value::Real(a), Value::Integer(b)) => a.total_cmp(&(*b as f64)),
            (Value::Real(a), Value::Real(b)) => a.total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Value::Blob(a), Value::Blob(b)) => a.cmp(b),
            _ => self.class_rank().cmp(&other.class_rank()),
        }
    }

    /// Text form the store gives a value when it is used as a string (LIKE)
    ///
    /// `None` for NULL. Reals render with 15 significant digits and always
    /// carry a fraction (`1.0`, `1.0e+20`); blobs read as UTF-8 up to the
    /// first NUL byte.
    pub fn sql_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Integer(i) => Some(i.to_string()),
            Value::Real(r) => Some(real_text(*r)),
            Value::Text(s) => Some(s.clone()),
            Value::Blob(b) => {
                let end = b.iter().position(|&c| c == 0).unwrap_or(b.len());
                Some(String::from_utf8_lossy(&b[..end]).into_owned())
            }
        }
    }

    /// Three-valued comparison used by filter evaluation
    ///
    /// Returns `None` when either side is NULL (the comparison is unknown,
    /// which a WHERE clause treats as false).
    pub fn sql_cmp(&self, other: &Value) -> Option<Ordering> {
        if self.is_null() || other.is_null() {
            return None;
        }
        Some(self.store_cmp(other))
    }
}

const REAL_DIGITS: i32 = 15;

fn real_text(r: f64) -> String {
    if r.is_nan() {
        return "NaN".to_string();
    }
    if r.is_infinite() {
        return if r > 0.0 { "Inf" } else { "-Inf" }.to_string();
    }
    if r == 0.0 {
        return "0.0".to_string();
    }

    let sci = format!("{:.*e}", (REAL_DIGITS - 1) as usize, r);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    if exp < -4 || exp >= REAL_DIGITS {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", keep_one_decimal(mantissa), sign, exp.abs())
    } else {
        let decimals = (REAL_DIGITS - 1 - exp) as usize;
        keep_one_decimal(&format!("{:.*}", decimals, r))
    }
}

/// Strip trailing zeros from a decimal, leaving at least one fraction digit
fn keep_one_decimal(digits: &str) -> String {
    if !digits.contains('.') {
        return format!("{}.0", digits);
    }
    let trimmed = digits.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{}0", trimmed)
    } else {
        trimmed.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => f.write_str(s),
            Value::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Primary key of a record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl RecordId {
    /// Interpret a stored value as a primary key
    pub fn from_value(value: &Value) -> Option<RecordId> {
        match value {
            Value::Integer(i) => Some(RecordId::Int(*i)),
            Value::Text(s) => Some(RecordId::Text(s.clone())),
            Value::Real(r) if r.fract() == 0.0 => Some(RecordId::Int(*r as i64)),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RecordId::Int(i) => Value::Integer(*i),
            RecordId::Text(s) => Value::Text(s.clone()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(i) => write!(f, "{}", i),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(v: i64) -> Self {
        RecordId::Int(v)
    }
}

impl From<i32> for RecordId {
    fn from(v: i32) -> Self {
        RecordId::Int(v.into())
    }
}

impl From<&str> for RecordId {
    fn from(v: &str) -> Self {
        RecordId::Text(v.to_string())
    }
}

impl From<String> for RecordId {
    fn from(v: String) -> Self {
        RecordId::Text(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_text_renders_reals_like_the_store() {
        let text = |r: f64| Value::Real(r).sql_text().unwrap();
        assert_eq!(text(1.0), "1.0");
        assert_eq!(text(0.5), "0.5");
        assert_eq!(text(-2.25), "-2.25");
        assert_eq!(text(0.1 + 0.2), "0.3");
        assert_eq!(text(1e14), "100000000000000.0");
        assert_eq!(text(1e15), "1.0e+15");
        assert_eq!(text(1.5e20), "1.5e+20");
        assert_eq!(text(0.0001), "0.0001");
        assert_eq!(text(0.00001), "1.0e-05");
        assert_eq!(text(0.0), "0.0");
        assert_eq!(Value::Null.sql_text(), None);
        assert_eq!(Value::Integer(-4).sql_text().as_deref(), Some("-4"));
        assert_eq!(Value::Blob(b"hi".to_vec()).sql_text().as_deref(), Some("hi"));
    }

    #[test]
    fn test_numeric_comparison_crosses_integer_and_real() {
        assert_eq!(
            Value::Integer(2).store_cmp(&Value::Real(2.5)),
            Ordering::Less
        );
        assert_eq!(
            Value::Real(3.0).store_cmp(&Value::Integer(3)),
            Ordering::Equal
        );
    }

    #[test]
    fn test_cross_class_ordering() {
        assert_eq!(Value::Null.store_cmp(&Value::Integer(0)), Ordering::Less);
        assert_eq!(
            Value::Integer(999).store_cmp(&Value::from("1")),
            Ordering::Less
        );
    }

    #[test]
    fn test_null_comparison_is_unknown() {
        assert_eq!(Value::Null.sql_cmp(&Value::Null), None);
        assert_eq!(Value::from(1).sql_cmp(&Value::Null), None);
    }

    #[test]
    fn test_untagged_json_shape() {
        let json = serde_json::to_string(&vec![
            Value::Null,
            Value::Integer(3),
            Value::from("x"),
        ])
        .unwrap();
        assert_eq!(json, r#"[null,3,"x"]"#);

        let back: Vec<Value> = serde_json::from_str(r#"[null,3,2.5,"x"]"#).unwrap();
        assert_eq!(
            back,
            vec![
                Value::Null,
                Value::Integer(3),
                Value::Real(2.5),
                Value::from("x")
            ]
        );
    }

    #[test]
    fn test_record_id_from_value() {
        assert_eq!(
            RecordId::from_value(&Value::Integer(7)),
            Some(RecordId::Int(7))
        );
        assert_eq!(RecordId::from_value(&Value::Null), None);
        assert_eq!(RecordId::from(7).to_value(), Value::Integer(7));
    }
}
