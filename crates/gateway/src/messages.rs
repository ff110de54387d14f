//! Wire-format types for the protocols the gateway speaks on its ingress
//! side, with conversions to and from the canonical schema.

pub mod claude;
pub mod openai;

use serde_json::Number;

/// Wire numbers may arrive integer- or float-encoded; both are accepted
/// wherever an integer is expected.
fn number_as_u32(number: &Number) -> Option<u32> {
    if let Some(value) = number.as_u64() {
        return u32::try_from(value).ok();
    }

    let value = number.as_f64()?;
    if value.fract() != 0.0 || value < 0.0 || value > f64::from(u32::MAX) {
        return None;
    }

    Some(value as u32)
}

#[cfg(test)]
mod tests {
    use serde_json::Number;

    use super::number_as_u32;

    #[test]
    fn accepts_integer_and_float_encodings() {
        assert_eq!(number_as_u32(&Number::from(5u32)), Some(5));
        assert_eq!(number_as_u32(&Number::from_f64(5.0).unwrap()), Some(5));
    }

    #[test]
    fn rejects_fractional_and_negative_values() {
        assert_eq!(number_as_u32(&Number::from_f64(5.5).unwrap()), None);
        assert_eq!(number_as_u32(&Number::from(-5i64)), None);
    }
}
