//! Expression evaluation against a name-resolution context.

use std::collections::BTreeMap;

use crate::error::{ExprError, ParamError, Result};

use super::{BinaryOp, Dim, Expr, Func, Quantity, UnaryOp};

/// Resolves parameter names to quantities during evaluation.
///
/// The parameter store implements this with recursive, cycle-checked
/// resolution; template runs implement it with a flat binding map.
pub trait EvalContext {
    /// Resolves a name to its value.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is unknown or its own evaluation fails.
    fn resolve(&mut self, name: &str) -> Result<Quantity>;
}

/// A flat name-to-quantity map, used for template input bindings.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: BTreeMap<String, Quantity>,
}

impl Bindings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Quantity) {
        self.values.insert(name.into(), value);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Quantity> {
        self.values.get(name).copied()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

impl EvalContext for Bindings {
    fn resolve(&mut self, name: &str) -> Result<Quantity> {
        self.get(name).ok_or_else(|| {
            ParamError::UnresolvedReference {
                name: name.to_string(),
            }
            .into()
        })
    }
}

fn mismatch(context: &'static str, left: Dim, right: Dim) -> ExprError {
    ExprError::UnitMismatch {
        context,
        left: left.to_string(),
        right: right.to_string(),
    }
}

fn bool_q(b: bool) -> Quantity {
    Quantity::scalar(if b { 1.0 } else { 0.0 })
}

impl Expr {
    /// Evaluates the expression.
    ///
    /// # Errors
    ///
    /// Returns an error if a referenced name cannot be resolved or if the
    /// arithmetic combines incompatible dimensions.
    pub fn eval(&self, ctx: &mut dyn EvalContext) -> Result<Quantity> {
        match self {
            Expr::Number(q) => Ok(*q),
            Expr::Ident(name) => {
                if name == "pi" {
                    return Ok(Quantity::scalar(std::f64::consts::PI));
                }
                ctx.resolve(name)
            }
            Expr::Unary(op, inner) => {
                let q = inner.eval(ctx)?;
                Ok(match op {
                    UnaryOp::Neg => Quantity {
                        value: -q.value,
                        dim: q.dim,
                    },
                    UnaryOp::Not => bool_q(!q.is_truthy()),
                })
            }
            Expr::Binary(op, lhs, rhs) => {
                let a = lhs.eval(ctx)?;
                // Short-circuit logic before evaluating the right side.
                match op {
                    BinaryOp::And if !a.is_truthy() => return Ok(bool_q(false)),
                    BinaryOp::Or if a.is_truthy() => return Ok(bool_q(true)),
                    _ => {}
                }
                let b = rhs.eval(ctx)?;
                eval_binary(*op, a, b)
            }
            Expr::Call(func, args) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(arg.eval(ctx)?);
                }
                eval_call(*func, &values)
            }
        }
    }
}

fn eval_binary(op: BinaryOp, a: Quantity, b: Quantity) -> Result<Quantity> {
    match op {
        BinaryOp::Add | BinaryOp::Sub => {
            if a.dim != b.dim {
                let ctx = if op == BinaryOp::Add {
                    "addition"
                } else {
                    "subtraction"
                };
                return Err(mismatch(ctx, a.dim, b.dim).into());
            }
            let value = if op == BinaryOp::Add {
                a.value + b.value
            } else {
                a.value - b.value
            };
            Ok(Quantity { value, dim: a.dim })
        }
        BinaryOp::Mul => Ok(Quantity {
            value: a.value * b.value,
            dim: a.dim.mul(b.dim),
        }),
        BinaryOp::Div => Ok(Quantity {
            value: a.value / b.value,
            dim: a.dim.div(b.dim),
        }),
        BinaryOp::Pow => {
            if !b.dim.is_none() {
                return Err(mismatch("exponent must be dimensionless", a.dim, b.dim).into());
            }
            let dim = if a.dim.is_none() {
                Dim::NONE
            } else {
                // Dimensioned bases only make sense with small integer exponents.
                let rounded = b.value.round();
                if (b.value - rounded).abs() > f64::EPSILON || rounded.abs() > f64::from(i8::MAX) {
                    return Err(
                        mismatch("non-integer power of a dimensioned value", a.dim, b.dim).into(),
                    );
                }
                #[allow(clippy::cast_possible_truncation)]
                a.dim.pow(rounded as i8)
            };
            Ok(Quantity {
                value: a.value.powf(b.value),
                dim,
            })
        }
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            if a.dim != b.dim {
                return Err(mismatch("comparison", a.dim, b.dim).into());
            }
            let r = match op {
                BinaryOp::Eq => a.value == b.value,
                BinaryOp::Ne => a.value != b.value,
                BinaryOp::Lt => a.value < b.value,
                BinaryOp::Le => a.value <= b.value,
                BinaryOp::Gt => a.value > b.value,
                _ => a.value >= b.value,
            };
            Ok(bool_q(r))
        }
        BinaryOp::And => Ok(bool_q(a.is_truthy() && b.is_truthy())),
        BinaryOp::Or => Ok(bool_q(a.is_truthy() || b.is_truthy())),
    }
}

fn eval_call(func: Func, args: &[Quantity]) -> Result<Quantity> {
    // The parser enforces arity, but `Expr` is a public type and call nodes
    // can be built directly.
    if args.len() != func.arity() {
        return Err(ExprError::BadArity {
            func: func.name(),
            expected: func.arity(),
            found: args.len(),
        }
        .into());
    }
    match func {
        Func::Sin | Func::Cos | Func::Tan => {
            let q = args[0];
            if !(q.dim.is_none() || q.dim == Dim::ANGLE) {
                return Err(mismatch("trigonometric argument", q.dim, Dim::ANGLE).into());
            }
            let value = match func {
                Func::Sin => q.value.sin(),
                Func::Cos => q.value.cos(),
                _ => q.value.tan(),
            };
            Ok(Quantity::scalar(value))
        }
        Func::Sqrt => {
            let q = args[0];
            if q.dim.length % 2 != 0 || q.dim.angle % 2 != 0 {
                return Err(mismatch("sqrt of an odd-dimensioned value", q.dim, Dim::NONE).into());
            }
            Ok(Quantity {
                value: q.value.sqrt(),
                dim: Dim {
                    length: q.dim.length / 2,
                    angle: q.dim.angle / 2,
                },
            })
        }
        Func::Abs => Ok(Quantity {
            value: args[0].value.abs(),
            dim: args[0].dim,
        }),
        Func::Min | Func::Max => {
            let (a, b) = (args[0], args[1]);
            if a.dim != b.dim {
                return Err(mismatch("min/max", a.dim, b.dim).into());
            }
            let value = if func == Func::Min {
                a.value.min(b.value)
            } else {
                a.value.max(b.value)
            };
            Ok(Quantity { value, dim: a.dim })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;

    use crate::error::{ExprError, ParamError, PartforgeError};

    use super::*;

    fn eval(text: &str, bindings: &mut Bindings) -> Result<Quantity> {
        Expr::parse(text).unwrap().eval(bindings)
    }

    #[test]
    fn arithmetic_over_bindings() {
        let mut b = Bindings::new();
        b.insert("R_in", Quantity::length_um(1000.0));
        b.insert("R_out", Quantity::length_um(2000.0));
        let q = eval("R_in+((R_out-R_in)/2)", &mut b).unwrap();
        assert_relative_eq!(q.value, 1500.0);
        assert_eq!(q.dim, Dim::LENGTH);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let mut b = Bindings::new();
        b.insert("L", Quantity::length_um(250.0));
        let e = Expr::parse("sqrt(L*L)/2").unwrap();
        let first = e.eval(&mut b).unwrap();
        let second = e.eval(&mut b).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn adding_length_and_angle_fails() {
        let mut b = Bindings::new();
        let err = eval("1 [mm] + 1 [deg]", &mut b).unwrap_err();
        assert!(matches!(
            err,
            PartforgeError::Expr(ExprError::UnitMismatch { .. })
        ));
    }

    #[test]
    fn comparing_mismatched_dims_fails() {
        let mut b = Bindings::new();
        b.insert("Theta", Quantity::angle_rad(1.0));
        let err = eval("Theta == 360", &mut b).unwrap_err();
        assert!(matches!(
            err,
            PartforgeError::Expr(ExprError::UnitMismatch { .. })
        ));
    }

    #[test]
    fn angle_boundary_comparison() {
        let mut b = Bindings::new();
        b.insert("Theta", Quantity::angle_rad(2.0 * std::f64::consts::PI));
        // 360 [deg] canonicalizes to the same radians value.
        assert!(eval("Theta == 360 [deg]", &mut b).unwrap().is_truthy());
        assert!(!eval("Theta < 360 [deg]", &mut b).unwrap().is_truthy());
        b.insert(
            "Theta",
            Quantity::angle_rad(340.0 * std::f64::consts::PI / 180.0),
        );
        assert!(eval("Theta < 360 [deg]", &mut b).unwrap().is_truthy());
    }

    #[test]
    fn trig_takes_angles_and_scalars() {
        let mut b = Bindings::new();
        b.insert("Rot", Quantity::angle_rad(0.0));
        assert_relative_eq!(eval("cos(Rot)", &mut b).unwrap().value, 1.0);
        assert!(eval("cos(1 [mm])", &mut b).is_err());
    }

    #[test]
    fn short_circuit_skips_bad_operand() {
        let mut b = Bindings::new();
        b.insert("N", Quantity::scalar(0.0));
        // Right side references an unknown name but is never evaluated.
        assert!(!eval("(N>0) && (Missing>0)", &mut b).unwrap().is_truthy());
    }

    #[test]
    fn unknown_name_is_unresolved_reference() {
        let mut b = Bindings::new();
        let err = eval("Nope", &mut b).unwrap_err();
        assert!(matches!(
            err,
            PartforgeError::Param(ParamError::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn directly_built_call_with_missing_arguments_errors() {
        let mut b = Bindings::new();
        let err = Expr::Call(Func::Sin, Vec::new()).eval(&mut b).unwrap_err();
        assert!(matches!(
            err,
            PartforgeError::Expr(ExprError::BadArity {
                func: "sin",
                expected: 1,
                found: 0,
            })
        ));
        let half = Expr::Number(Quantity::scalar(0.5));
        let err = Expr::Call(Func::Max, vec![half]).eval(&mut b).unwrap_err();
        assert!(matches!(
            err,
            PartforgeError::Expr(ExprError::BadArity { found: 1, .. })
        ));
    }

    #[test]
    fn division_cancels_units() {
        let mut b = Bindings::new();
        let q = eval("(2 [mm]) / (1 [mm])", &mut b).unwrap();
        assert!(q.dim.is_none());
        assert_relative_eq!(q.value, 2.0);
    }

    #[test]
    fn pi_is_built_in() {
        let mut b = Bindings::new();
        let q = eval("2*pi", &mut b).unwrap();
        assert_relative_eq!(q.value, std::f64::consts::TAU);
    }
}
