//! Base dimensions for water-quality unit algebra.
//!
//! A [`Dimension`] holds the integer exponent of each base dimension. Unit
//! multiplication adds exponent vectors, division subtracts them. Turbidity
//! is a domain pseudo-dimension: NTU-family units share it and are therefore
//! incompatible with every physical unit, which forces turbidity rewrites to
//! go through the empirical conversions instead of linear scaling.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimension {
    pub mass: i8,
    pub length: i8,
    pub time: i8,
    pub temperature: i8,
    pub amount: i8,
    pub current: i8,
    pub turbidity: i8,
}

impl Dimension {
    pub const NONE: Dimension = Dimension {
        mass: 0,
        length: 0,
        time: 0,
        temperature: 0,
        amount: 0,
        current: 0,
        turbidity: 0,
    };
    pub const MASS: Dimension = Dimension { mass: 1, ..Self::NONE };
    pub const LENGTH: Dimension = Dimension { length: 1, ..Self::NONE };
    pub const TIME: Dimension = Dimension { time: 1, ..Self::NONE };
    pub const TEMPERATURE: Dimension = Dimension { temperature: 1, ..Self::NONE };
    pub const AMOUNT: Dimension = Dimension { amount: 1, ..Self::NONE };
    pub const CURRENT: Dimension = Dimension { current: 1, ..Self::NONE };
    pub const TURBIDITY: Dimension = Dimension { turbidity: 1, ..Self::NONE };

    /// Mass per volume, the shape of mg/l and the water density unit.
    pub const DENSITY: Dimension = Dimension {
        mass: 1,
        length: -3,
        ..Self::NONE
    };

    pub fn is_dimensionless(&self) -> bool {
        *self == Self::NONE
    }

    /// Base dimension by the name used in registry definition strings,
    /// e.g. `[turbidity]`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "mass" => Some(Self::MASS),
            "length" => Some(Self::LENGTH),
            "time" => Some(Self::TIME),
            "temperature" => Some(Self::TEMPERATURE),
            "amount" | "substance" => Some(Self::AMOUNT),
            "current" => Some(Self::CURRENT),
            "turbidity" => Some(Self::TURBIDITY),
            _ => None,
        }
    }

    pub fn pow(self, exp: i32) -> Self {
        let scale = |v: i8| -> i8 { (v as i32 * exp) as i8 };
        Dimension {
            mass: scale(self.mass),
            length: scale(self.length),
            time: scale(self.time),
            temperature: scale(self.temperature),
            amount: scale(self.amount),
            current: scale(self.current),
            turbidity: scale(self.turbidity),
        }
    }

    fn components(&self) -> [(&'static str, i8); 7] {
        [
            ("mass", self.mass),
            ("length", self.length),
            ("time", self.time),
            ("temperature", self.temperature),
            ("amount", self.amount),
            ("current", self.current),
            ("turbidity", self.turbidity),
        ]
    }
}

/// Exponent-wise addition: the dimension of a unit product.
impl Add for Dimension {
    type Output = Dimension;

    fn add(self, rhs: Dimension) -> Dimension {
        Dimension {
            mass: self.mass + rhs.mass,
            length: self.length + rhs.length,
            time: self.time + rhs.time,
            temperature: self.temperature + rhs.temperature,
            amount: self.amount + rhs.amount,
            current: self.current + rhs.current,
            turbidity: self.turbidity + rhs.turbidity,
        }
    }
}

/// Exponent-wise subtraction: the dimension of a unit quotient.
impl Sub for Dimension {
    type Output = Dimension;

    fn sub(self, rhs: Dimension) -> Dimension {
        self + (-rhs)
    }
}

impl Neg for Dimension {
    type Output = Dimension;

    fn neg(self) -> Dimension {
        self.pow(-1)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dimensionless() {
            return write!(f, "dimensionless");
        }
        let mut first = true;
        for (name, exp) in self.components() {
            if exp == 0 {
                continue;
            }
            if !first {
                write!(f, " ")?;
            }
            if exp == 1 {
                write!(f, "[{name}]")?;
            } else {
                write!(f, "[{name}]^{exp}")?;
            }
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_and_quotient_exponents() {
        let density = Dimension::MASS - Dimension::LENGTH.pow(3);
        assert_eq!(density, Dimension::DENSITY);
        assert_eq!(density + Dimension::LENGTH.pow(3), Dimension::MASS);
    }

    #[test]
    fn test_turbidity_incompatible_with_physical_dimensions() {
        assert_ne!(Dimension::TURBIDITY, Dimension::NONE);
        assert_ne!(Dimension::TURBIDITY, Dimension::LENGTH);
        assert!(!Dimension::TURBIDITY.is_dimensionless());
    }

    #[test]
    fn test_display() {
        assert_eq!(Dimension::NONE.to_string(), "dimensionless");
        assert_eq!(Dimension::DENSITY.to_string(), "[mass] [length]^-3");
        let conductivity = Dimension {
            mass: -1,
            length: -2,
            time: 3,
            current: 2,
            ..Dimension::NONE
        } - Dimension::LENGTH;
        assert_eq!(
            conductivity.to_string(),
            "[mass]^-1 [length]^-3 [time]^3 [current]^2"
        );
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Dimension::from_name("turbidity"), Some(Dimension::TURBIDITY));
        assert_eq!(Dimension::from_name("mass"), Some(Dimension::MASS));
        assert_eq!(Dimension::from_name("luminosity"), None);
    }
}
