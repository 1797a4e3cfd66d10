//! Parameter expression language.
//!
//! Geometry templates are parameterized by string expressions in the style of
//! `"R_in+((R_out-R_in)/2)"` or `"(Theta<360[deg]) && (N_holes>0)"`. This
//! module parses them once into an [`Expr`] tree and evaluates them against a
//! name-resolution context, carrying physical units through the arithmetic so
//! that mixing lengths and angles fails instead of producing wrong geometry.

mod eval;
mod parser;

pub use eval::{Bindings, EvalContext};

use std::fmt;

use crate::error::ExprError;

/// Dimension of a quantity, tracked as exponents over the two base
/// dimensions this domain needs. Canonical units are micrometers and radians.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dim {
    /// Length exponent (micrometers).
    pub length: i8,
    /// Angle exponent (radians).
    pub angle: i8,
}

impl Dim {
    /// Dimensionless.
    pub const NONE: Dim = Dim { length: 0, angle: 0 };
    /// Plain length.
    pub const LENGTH: Dim = Dim { length: 1, angle: 0 };
    /// Plain angle.
    pub const ANGLE: Dim = Dim { length: 0, angle: 1 };

    #[must_use]
    pub fn is_none(self) -> bool {
        self == Dim::NONE
    }

    #[must_use]
    pub fn mul(self, other: Dim) -> Dim {
        Dim {
            length: self.length + other.length,
            angle: self.angle + other.angle,
        }
    }

    #[must_use]
    pub fn div(self, other: Dim) -> Dim {
        Dim {
            length: self.length - other.length,
            angle: self.angle - other.angle,
        }
    }

    #[must_use]
    pub fn pow(self, exp: i8) -> Dim {
        Dim {
            length: self.length * exp,
            angle: self.angle * exp,
        }
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return write!(f, "1");
        }
        let mut parts = Vec::new();
        for (sym, exp) in [("um", self.length), ("rad", self.angle)] {
            match exp {
                0 => {}
                1 => parts.push(sym.to_string()),
                e => parts.push(format!("{sym}^{e}")),
            }
        }
        write!(f, "{}", parts.join("*"))
    }
}

/// A numeric value with an attached dimension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity {
    pub value: f64,
    pub dim: Dim,
}

impl Quantity {
    /// A dimensionless scalar.
    #[must_use]
    pub fn scalar(value: f64) -> Self {
        Self {
            value,
            dim: Dim::NONE,
        }
    }

    /// A length in micrometers.
    #[must_use]
    pub fn length_um(value: f64) -> Self {
        Self {
            value,
            dim: Dim::LENGTH,
        }
    }

    /// An angle in radians.
    #[must_use]
    pub fn angle_rad(value: f64) -> Self {
        Self {
            value,
            dim: Dim::ANGLE,
        }
    }

    /// Boolean interpretation: any non-zero value is true.
    #[must_use]
    pub fn is_truthy(self) -> bool {
        self.value != 0.0
    }

    fn expect_dim(self, wanted: Dim, context: &'static str) -> Result<f64, ExprError> {
        if self.dim.is_none() || self.dim == wanted {
            Ok(self.value)
        } else {
            Err(ExprError::UnitMismatch {
                context,
                left: self.dim.to_string(),
                right: wanted.to_string(),
            })
        }
    }

    /// Extracts a length in micrometers. Dimensionless values pass through
    /// (bare zero literals are common in positions).
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::UnitMismatch`] for any other dimension.
    pub fn as_length(self) -> Result<f64, ExprError> {
        self.expect_dim(Dim::LENGTH, "length parameter")
    }

    /// Extracts an angle in radians; dimensionless values pass through.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::UnitMismatch`] for any other dimension.
    pub fn as_angle(self) -> Result<f64, ExprError> {
        self.expect_dim(Dim::ANGLE, "angle parameter")
    }

    /// Extracts a dimensionless scalar.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::UnitMismatch`] for dimensioned values.
    pub fn as_scalar(self) -> Result<f64, ExprError> {
        self.expect_dim(Dim::NONE, "dimensionless parameter")
    }
}

/// Converts a bracketed unit name into a scale factor onto the canonical
/// unit plus the resulting dimension.
pub(crate) fn unit_factor(name: &str) -> Result<(f64, Dim), ExprError> {
    let f = match name {
        "m" => (1e6, Dim::LENGTH),
        "cm" => (1e4, Dim::LENGTH),
        "mm" => (1e3, Dim::LENGTH),
        "um" | "\u{b5}m" => (1.0, Dim::LENGTH),
        "nm" => (1e-3, Dim::LENGTH),
        "deg" => (std::f64::consts::PI / 180.0, Dim::ANGLE),
        "rad" => (1.0, Dim::ANGLE),
        other => return Err(ExprError::UnknownUnit(other.to_string())),
    };
    Ok(f)
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Binary operators in precedence-climbing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// Built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Sin,
    Cos,
    Tan,
    Sqrt,
    Abs,
    Min,
    Max,
}

impl Func {
    pub(crate) fn from_name(name: &str) -> Result<Self, ExprError> {
        Ok(match name {
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "tan" => Func::Tan,
            "sqrt" => Func::Sqrt,
            "abs" => Func::Abs,
            "min" => Func::Min,
            "max" => Func::Max,
            other => return Err(ExprError::UnknownFunction(other.to_string())),
        })
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Tan => "tan",
            Func::Sqrt => "sqrt",
            Func::Abs => "abs",
            Func::Min => "min",
            Func::Max => "max",
        }
    }

    pub(crate) fn arity(self) -> usize {
        match self {
            Func::Min | Func::Max => 2,
            _ => 1,
        }
    }
}

/// A parsed parameter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal with its unit already applied.
    Number(Quantity),
    /// Reference to a named parameter.
    Ident(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Func, Vec<Expr>),
}

impl Expr {
    /// Parses an expression string.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::Parse`] on malformed input, and
    /// [`ExprError::UnknownUnit`] / [`ExprError::UnknownFunction`] for
    /// unrecognized bracket units or call targets.
    pub fn parse(text: &str) -> Result<Self, ExprError> {
        parser::parse(text)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn literal_with_unit_is_canonicalized() {
        let e = Expr::parse("10 [mm]").unwrap();
        assert_eq!(e, Expr::Number(Quantity::length_um(10_000.0)));
    }

    #[test]
    fn degrees_convert_to_radians() {
        let e = Expr::parse("180 [deg]").unwrap();
        let Expr::Number(q) = e else { panic!("not a literal") };
        assert!((q.value - std::f64::consts::PI).abs() < 1e-12);
        assert_eq!(q.dim, Dim::ANGLE);
    }

    #[test]
    fn unknown_unit_is_rejected() {
        assert!(matches!(
            Expr::parse("3 [furlong]"),
            Err(ExprError::UnknownUnit(_))
        ));
    }

    #[test]
    fn dim_display() {
        assert_eq!(Dim::LENGTH.to_string(), "um");
        assert_eq!(Dim::NONE.to_string(), "1");
        assert_eq!(Dim::LENGTH.pow(2).to_string(), "um^2");
    }
}
