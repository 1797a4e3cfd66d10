//! Wire contact: a circular-cross-section conductor wound part-way around
//! the inside of the cuff, with a point source at its angular midpoint.

use crate::backend::WorkPlane;
use crate::error::Result;
use crate::graph::{Operation, PrimitiveOp, SweepOp};
use crate::template::{Template, TemplateBuilder};

/// Builds the `WireContact` template.
///
/// Defaults deliberately reference device-family parameters
/// (`r_conductor_P` and friends): a wire contact is never placed standalone,
/// and the family data supplies the winding geometry.
///
/// # Errors
///
/// Fails only on authoring errors in the template definition itself.
pub fn wire_contact() -> Result<Template> {
    let mut b = TemplateBuilder::new("WireContact");
    b.input("R_conductor", "r_conductor_P")?;
    b.input("R_in", "R_in_P")?;
    b.input("Center", "Center_P")?;
    b.input("Pitch", "Pitch_P")?;
    b.input("Sep_conductor", "sep_conductor_P")?;
    b.input("Theta_conductor", "theta_conductor_P")?;

    let contact_cx = b.selection_non_contributing("CONTACT CROSS SECTION")?;
    let contact_final = b.selection("CONTACT FINAL")?;
    let src = b.selection("SRC")?;

    b.push(Operation::Primitive {
        label: "Contact Cross Section".to_string(),
        shape: PrimitiveOp::Circle {
            plane: WorkPlane::Zx,
            pos: [
                b.expr("Center")?,
                b.expr("R_in-R_conductor-Sep_conductor")?,
            ],
            radius: b.expr("R_conductor")?,
        },
        contribute_to: Some(contact_cx.clone()),
    });
    b.push(Operation::SweepLike {
        label: "Make Contact".to_string(),
        kind: SweepOp::Revolve {
            angle_start: b.expr("0 [deg]")?,
            angle_end: b.expr("Theta_conductor")?,
        },
        input: contact_cx,
        contribute_to: Some(contact_final),
    });
    b.push(Operation::Primitive {
        label: "Src".to_string(),
        shape: PrimitiveOp::Point {
            pos: [
                b.expr("(R_in-R_conductor-Sep_conductor)*cos(Theta_conductor/2)")?,
                b.expr("(R_in-R_conductor-Sep_conductor)*sin(Theta_conductor/2)")?,
                b.expr("Center")?,
            ],
        },
        contribute_to: Some(src),
    });

    Ok(b.build())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::backend::MemoryBackend;
    use crate::expr::{Bindings, Quantity};
    use crate::graph::run_template;
    use crate::selection::EntityKind;

    use super::*;

    #[test]
    fn runs_with_explicit_winding_geometry() {
        let t = wire_contact().unwrap();
        let mut bindings = Bindings::new();
        bindings.insert("R_conductor".to_string(), Quantity::length_um(37.5));
        bindings.insert("R_in".to_string(), Quantity::length_um(250.0));
        bindings.insert("Center".to_string(), Quantity::length_um(10_000.0));
        bindings.insert("Pitch".to_string(), Quantity::length_um(1_500.0));
        bindings.insert("Sep_conductor".to_string(), Quantity::length_um(10.0));
        bindings.insert(
            "Theta_conductor".to_string(),
            Quantity::angle_rad(250.0_f64.to_radians()),
        );
        let mut backend = MemoryBackend::new();
        let reg = run_template(&t, &mut bindings, &mut backend).unwrap();

        let contact = reg.resolve(t.selection_id("CONTACT FINAL").unwrap()).unwrap();
        assert_eq!(contact.kind(), EntityKind::Domain);
        let src = reg.resolve(t.selection_id("SRC").unwrap()).unwrap();
        assert_eq!(src.kind(), EntityKind::Point);
        assert_eq!(src.members().len(), 1);
    }
}
