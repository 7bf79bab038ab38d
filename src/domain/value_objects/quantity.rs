use crate::domain::errors::ValidationError;
use serde::{Deserialize, Serialize};

/// A non-negative, finite order or position size in base units.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(f64);

impl Quantity {
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if value.is_finite() && value >= 0.0 {
            Ok(Quantity(value))
        } else {
            Err(ValidationError::InvalidQuantity)
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn add(&self, other: Quantity) -> Result<Quantity, ValidationError> {
        Quantity::new(self.0 + other.0)
    }

    pub fn subtract(&self, other: Quantity) -> Result<Quantity, ValidationError> {
        Quantity::new(self.0 - other.0)
    }
}
