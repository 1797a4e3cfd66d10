//! Circular pad electrode: an elliptical or circular outline extruded
//! radially into the cuff wall, trimmed to the wall's annulus by cutter
//! cylinders, with an optional recess pocket behind the pad.

use crate::backend::{BooleanKind, WorkPlane};
use crate::error::Result;
use crate::graph::{Branch, Operation, PrimitiveOp, SweepOp, TransformOp};
use crate::math::Vector3;
use crate::template::{Template, TemplateBuilder};

/// Builds the `CircleContact` template.
///
/// `Round_def` selects the pad outline: `1` is an ellipse with semiaxes
/// `A_ellipse_contact` by `Diam_contact/2`, `2` is a circle of diameter
/// `Diam_contact`.
///
/// # Errors
///
/// Fails only on authoring errors in the template definition itself.
pub fn circle_contact() -> Result<Template> {
    let mut b = TemplateBuilder::new("CircleContact");
    b.input("Recess", "50 [um]")?;
    b.input("Rotation_angle", "0 [deg]")?;
    b.input("Center", "10 [mm]")?;
    b.input("Round_def", "1")?;
    b.input("R_in", "1 [mm]")?;
    b.input("Contact_depth", "100 [um]")?;
    b.input("Overshoot", "50 [um]")?;
    b.input("A_ellipse_contact", "0.3 [mm]")?;
    b.input("Diam_contact", "0.6 [mm]")?;
    b.input("L", "5 [mm]")?;

    let recess_plane = b.selection_non_contributing("PLANE FOR RECESS")?;
    let pre_cut_recess = b.selection_non_contributing("PRE CUT RECESS")?;
    let recess_cutter_in = b.selection_non_contributing("RECESS CUTTER IN")?;
    let recess_cutter_out = b.selection_non_contributing("RECESS CUTTER OUT")?;
    let recess_final = b.selection("RECESS FINAL")?;
    let contact_plane = b.selection_non_contributing("PLANE FOR CONTACT")?;
    let pre_cut_contact = b.selection_non_contributing("PRE CUT CONTACT")?;
    let contact_cutter_in = b.selection_non_contributing("CONTACT CUTTER IN")?;
    let contact_cutter_out = b.selection_non_contributing("CONTACT CUTTER OUT")?;
    let contact_final = b.selection("CONTACT FINAL")?;
    let src = b.selection("SRC")?;

    // The outline is drawn on the yz plane so the extrusion runs radially
    // along +x; the finished stack then rotates about z into place.
    let outline = |b: &TemplateBuilder,
                   ellipse_label: &str,
                   circle_label: &str,
                   target: &str|
     -> Result<Operation> {
        Ok(Operation::Conditional {
            label: format!("If (Outline: {ellipse_label})"),
            branches: vec![
                Branch {
                    condition: b.expr("Round_def==1")?,
                    ops: vec![Operation::Primitive {
                        label: ellipse_label.to_string(),
                        shape: PrimitiveOp::Ellipse {
                            plane: WorkPlane::Yz,
                            pos: [b.expr("0 [um]")?, b.expr("Center")?],
                            semiaxes: [b.expr("A_ellipse_contact")?, b.expr("Diam_contact/2")?],
                        },
                        contribute_to: Some(target.to_string()),
                    }],
                },
                Branch {
                    condition: b.expr("Round_def==2")?,
                    ops: vec![Operation::Primitive {
                        label: circle_label.to_string(),
                        shape: PrimitiveOp::Circle {
                            plane: WorkPlane::Yz,
                            pos: [b.expr("0 [um]")?, b.expr("Center")?],
                            radius: b.expr("Diam_contact/2")?,
                        },
                        contribute_to: Some(target.to_string()),
                    }],
                },
            ],
        })
    };

    let recess_outline = outline(&b, "Ellipse for Recess", "Circle for Recess", &recess_plane)?;
    b.push(Operation::Conditional {
        label: "If (Recess)".to_string(),
        branches: vec![Branch {
            condition: b.expr("Recess>0[um]")?,
            ops: vec![
                recess_outline,
                Operation::SweepLike {
                    label: "Make Pre Cut Recess Domains".to_string(),
                    kind: SweepOp::Extrude {
                        direction: Vector3::x(),
                        distance: b.expr("R_in+Recess+Overshoot")?,
                    },
                    input: recess_plane,
                    contribute_to: Some(pre_cut_recess.clone()),
                },
                Operation::Transform {
                    label: "Rotate Recess".to_string(),
                    kind: TransformOp::Rotate {
                        origin: [b.expr("0")?, b.expr("0")?, b.expr("0")?],
                        axis: Vector3::z(),
                        angle: b.expr("Rotation_angle")?,
                    },
                    input: pre_cut_recess.clone(),
                    contribute_to: None,
                },
                Operation::Primitive {
                    label: "Recess Cut In".to_string(),
                    shape: PrimitiveOp::Cylinder {
                        pos: [b.expr("0")?, b.expr("0")?, b.expr("Center-L/2")?],
                        radius: b.expr("R_in")?,
                        height: b.expr("L")?,
                        axis: Vector3::z(),
                    },
                    contribute_to: Some(recess_cutter_in.clone()),
                },
                Operation::Primitive {
                    label: "Recess Cut Out".to_string(),
                    shape: PrimitiveOp::Cylinder {
                        pos: [b.expr("0")?, b.expr("0")?, b.expr("Center-L/2")?],
                        radius: b.expr("R_in+Recess")?,
                        height: b.expr("L")?,
                        axis: Vector3::z(),
                    },
                    contribute_to: Some(recess_cutter_out.clone()),
                },
                Operation::Boolean {
                    label: "Execute Recess Cut In".to_string(),
                    kind: BooleanKind::Difference,
                    input: pre_cut_recess,
                    input2: recess_cutter_in,
                    contribute_to: Some(recess_final.clone()),
                },
                Operation::Partition {
                    label: "Partition Outer Recess Sliver".to_string(),
                    input: recess_final.clone(),
                    tool: recess_cutter_out,
                    contribute_to: Some(recess_final),
                },
                Operation::Delete {
                    label: "Remove Recess Overshoot".to_string(),
                    center: [
                        b.expr("(R_in+Recess+Overshoot/2)*cos(Rotation_angle)")?,
                        b.expr("(R_in+Recess+Overshoot/2)*sin(Rotation_angle)")?,
                        b.expr("Center")?,
                    ],
                    radius: b.expr("1 [um]")?,
                },
            ],
        }],
    });

    let contact_outline = outline(
        &b,
        "Ellipse for Contact",
        "Circle for Contact",
        &contact_plane,
    )?;
    b.push(contact_outline);
    b.push(Operation::SweepLike {
        label: "Make Pre Cut Contact Domains".to_string(),
        kind: SweepOp::Extrude {
            direction: Vector3::x(),
            distance: b.expr("R_in+Recess+Contact_depth+Overshoot")?,
        },
        input: contact_plane,
        contribute_to: Some(pre_cut_contact.clone()),
    });
    b.push(Operation::Transform {
        label: "Rotate Contact".to_string(),
        kind: TransformOp::Rotate {
            origin: [b.expr("0")?, b.expr("0")?, b.expr("0")?],
            axis: Vector3::z(),
            angle: b.expr("Rotation_angle")?,
        },
        input: pre_cut_contact.clone(),
        contribute_to: None,
    });
    b.push(Operation::Primitive {
        label: "Contact Cut In".to_string(),
        shape: PrimitiveOp::Cylinder {
            pos: [b.expr("0")?, b.expr("0")?, b.expr("Center-L/2")?],
            radius: b.expr("R_in+Recess")?,
            height: b.expr("L")?,
            axis: Vector3::z(),
        },
        contribute_to: Some(contact_cutter_in.clone()),
    });
    b.push(Operation::Primitive {
        label: "Contact Cut Out".to_string(),
        shape: PrimitiveOp::Cylinder {
            pos: [b.expr("0")?, b.expr("0")?, b.expr("Center-L/2")?],
            radius: b.expr("R_in+Recess+Contact_depth")?,
            height: b.expr("L")?,
            axis: Vector3::z(),
        },
        contribute_to: Some(contact_cutter_out.clone()),
    });
    b.push(Operation::Boolean {
        label: "Execute Contact Cut In".to_string(),
        kind: BooleanKind::Difference,
        input: pre_cut_contact,
        input2: contact_cutter_in,
        contribute_to: Some(contact_final.clone()),
    });
    b.push(Operation::Partition {
        label: "Partition Outer Contact Sliver".to_string(),
        input: contact_final.clone(),
        tool: contact_cutter_out,
        contribute_to: Some(contact_final),
    });
    b.push(Operation::Delete {
        label: "Remove Contact Overshoot".to_string(),
        center: [
            b.expr("(R_in+Recess+Contact_depth+Overshoot/2)*cos(Rotation_angle)")?,
            b.expr("(R_in+Recess+Contact_depth+Overshoot/2)*sin(Rotation_angle)")?,
            b.expr("Center")?,
        ],
        radius: b.expr("1 [um]")?,
    });

    b.push(Operation::Primitive {
        label: "Src".to_string(),
        shape: PrimitiveOp::Point {
            pos: [
                b.expr("(R_in+Recess+Contact_depth/2)*cos(Rotation_angle)")?,
                b.expr("(R_in+Recess+Contact_depth/2)*sin(Rotation_angle)")?,
                b.expr("Center")?,
            ],
        },
        contribute_to: Some(src),
    });

    Ok(b.build())
}
