//! Ribbon contact: a circumferential band electrode revolved from a thin
//! rectangular cross-section, optionally recessed below the cuff's inner
//! surface, with a point source at the contact's angular center.

use crate::backend::{BaseAnchor, WorkPlane};
use crate::error::Result;
use crate::graph::{Branch, Operation, PrimitiveOp, SweepOp};
use crate::template::{Template, TemplateBuilder};

/// Builds the `RibbonContact` template.
///
/// # Errors
///
/// Fails only on authoring errors in the template definition itself.
pub fn ribbon_contact() -> Result<Template> {
    let mut b = TemplateBuilder::new("RibbonContact");
    b.input("Thk_elec", "0.1 [mm]")?;
    b.input("L_elec", "3 [mm]")?;
    b.input("R_in", "1 [mm]")?;
    b.input("Recess", "0.1 [mm]")?;
    b.input("Center", "10 [mm]")?;
    b.input("Theta_contact", "100 [deg]")?;
    b.input("Rot_def", "0 [deg]")?;

    let contact_cx = b.selection_non_contributing("CONTACT CROSS SECTION")?;
    let recess_cx = b.selection_non_contributing("RECESS CROSS SECTION")?;
    let src = b.selection("SRC")?;
    let contact_final = b.selection("CONTACT FINAL")?;
    let recess_final = b.selection("RECESS FINAL")?;

    b.push(Operation::Primitive {
        label: "Contact Cross Section".to_string(),
        shape: PrimitiveOp::Rectangle {
            plane: WorkPlane::Xz,
            pos: [b.expr("R_in+Recess+Thk_elec/2")?, b.expr("Center")?],
            size: [b.expr("Thk_elec")?, b.expr("L_elec")?],
            base: BaseAnchor::Center,
        },
        contribute_to: Some(contact_cx.clone()),
    });
    b.push(Operation::SweepLike {
        label: "Make Contact".to_string(),
        kind: SweepOp::Revolve {
            angle_start: b.expr("Rot_def")?,
            angle_end: b.expr("Rot_def+Theta_contact")?,
        },
        input: contact_cx,
        contribute_to: Some(contact_final),
    });

    // The recess pocket only exists for a strictly positive recess depth.
    b.push(Operation::Conditional {
        label: "If (Recess)".to_string(),
        branches: vec![Branch {
            condition: b.expr("Recess>0[um]")?,
            ops: vec![
                Operation::Primitive {
                    label: "Recess Cross Section".to_string(),
                    shape: PrimitiveOp::Rectangle {
                        plane: WorkPlane::Xz,
                        pos: [b.expr("R_in+Recess/2")?, b.expr("Center")?],
                        size: [b.expr("Recess")?, b.expr("L_elec")?],
                        base: BaseAnchor::Center,
                    },
                    contribute_to: Some(recess_cx.clone()),
                },
                Operation::SweepLike {
                    label: "Make Recess".to_string(),
                    kind: SweepOp::Revolve {
                        angle_start: b.expr("Rot_def")?,
                        angle_end: b.expr("Rot_def+Theta_contact")?,
                    },
                    input: recess_cx,
                    contribute_to: Some(recess_final),
                },
            ],
        }],
    });

    b.push(Operation::Primitive {
        label: "Src".to_string(),
        shape: PrimitiveOp::Point {
            pos: [
                b.expr("(R_in+Recess+Thk_elec/2)*cos(Rot_def+Theta_contact/2)")?,
                b.expr("(R_in+Recess+Thk_elec/2)*sin(Rot_def+Theta_contact/2)")?,
                b.expr("Center")?,
            ],
        },
        contribute_to: Some(src),
    });

    Ok(b.build())
}
