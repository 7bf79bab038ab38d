use crate::domain::errors::ValidationError;
use serde::{Deserialize, Serialize};

/// A strictly positive, finite price.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(f64);

impl Price {
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if value.is_finite() && value > 0.0 {
            Ok(Price(value))
        } else {
            Err(ValidationError::InvalidPrice)
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn multiply(&self, factor: f64) -> Result<Price, ValidationError> {
        Price::new(self.0 * factor)
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_new_valid() {
        let price = Price::new(66000.0);
        assert!(price.is_ok());
        assert_eq!(price.unwrap().value(), 66000.0);
    }

    #[test]
    fn test_price_new_zero() {
        assert!(Price::new(0.0).is_err());
    }

    #[test]
    fn test_price_new_negative() {
        assert!(Price::new(-10.0).is_err());
    }

    #[test]
    fn test_price_new_nan() {
        assert!(Price::new(f64::NAN).is_err());
    }

    #[test]
    fn test_price_multiply() {
        let price = Price::new(10.0).unwrap();
        assert_eq!(price.multiply(2.5).unwrap().value(), 25.0);
    }

    #[test]
    fn test_price_multiply_to_zero_fails() {
        let price = Price::new(10.0).unwrap();
        assert!(price.multiply(0.0).is_err());
    }
}
