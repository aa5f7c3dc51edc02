use std::cmp::Ordering;
use std::fmt;

/// A single scalar produced by a column accessor
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Null,
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// True for numeric zero; text and null are never "zero"
    pub fn is_zero(&self) -> bool {
        match self {
            CellValue::Integer(i) => *i == 0,
            CellValue::Float(f) => *f == 0.0,
            _ => false,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Integer(i) => Some(*i),
            CellValue::Float(f) => Some(*f as i64),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Integer(i) => write!(f, "{}", i),
            CellValue::Float(fl) if fl.fract() == 0.0 => write!(f, "{}", fl),
            CellValue::Float(fl) => write!(f, "{:.1}", fl),
            CellValue::Null => write!(f, "-"),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Integer(i)
    }
}

impl From<f64> for CellValue {
    fn from(f: f64) -> Self {
        CellValue::Float(f)
    }
}

/// Total ordering used by the row sort.
/// Null < numbers < text; integers and floats compare by numeric value.
/// Text ignores case, with the exact bytes breaking ties.
pub fn compare_cell_values(a: &CellValue, b: &CellValue) -> Ordering {
    match (a, b) {
        (CellValue::Integer(a), CellValue::Integer(b)) => a.cmp(b),
        (CellValue::Float(a), CellValue::Float(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (CellValue::Integer(i), CellValue::Float(f)) => {
            (*i as f64).partial_cmp(f).unwrap_or(Ordering::Equal)
        }
        (CellValue::Float(f), CellValue::Integer(i)) => {
            f.partial_cmp(&(*i as f64)).unwrap_or(Ordering::Equal)
        }
        (CellValue::Text(a), CellValue::Text(b)) => a
            .to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b)),

        (CellValue::Null, CellValue::Null) => Ordering::Equal,
        (CellValue::Null, _) => Ordering::Less,
        (_, CellValue::Null) => Ordering::Greater,

        (CellValue::Text(_), _) => Ordering::Greater,
        (_, CellValue::Text(_)) => Ordering::Less,
    }
}
