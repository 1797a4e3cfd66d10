//! Tube cuff: an annular insulating sleeve, optionally split by a seam gap
//! and pierced by one or two conical suture holes.

use crate::backend::{BaseAnchor, BooleanKind, WorkPlane};
use crate::error::Result;
use crate::graph::{Branch, Operation, PrimitiveOp, SweepOp, TransformOp};
use crate::math::Vector3;
use crate::template::{Template, TemplateBuilder};

fn difference(
    label: &str,
    input: String,
    input2: String,
    contribute_to: String,
) -> Operation {
    Operation::Boolean {
        label: label.to_string(),
        kind: BooleanKind::Difference,
        input,
        input2,
        contribute_to: Some(contribute_to),
    }
}

/// Builds the `TubeCuff` template.
///
/// The cuff conformation splits four ways on `(Theta == 360 [deg])` x
/// `(N_holes == 0)`; exactly one branch runs per build, and only the branch
/// for a gapped, holed cuff carries the nested two-hole case.
///
/// # Errors
///
/// Fails only on authoring errors in the template definition itself.
#[allow(clippy::too_many_lines)]
pub fn tube_cuff() -> Result<Template> {
    let mut b = TemplateBuilder::new("TubeCuff");
    b.input("N_holes", "1")?;
    b.input("Theta", "340 [deg]")?;
    b.input("Center", "10 [mm]")?;
    b.input("R_in", "1 [mm]")?;
    b.input("R_out", "2 [mm]")?;
    b.input("L", "5 [mm]")?;
    b.input("Rot_def", "0 [deg]")?;
    b.input("D_hole", "0.3 [mm]")?;
    b.input("Buffer_hole", "0.1 [mm]")?;
    b.input("L_holecenter_cuffseam", "0.3 [mm]")?;
    b.input("Pitch_holecenter_holecenter", "0 [mm]")?;

    let inner = b.selection_non_contributing("INNER CUFF SURFACE")?;
    let outer = b.selection_non_contributing("OUTER CUFF SURFACE")?;
    let cuff_final = b.selection("CUFF FINAL")?;
    let wgap_pre_holes = b.selection_non_contributing("CUFF wGAP PRE HOLES")?;
    let pre_gap = b.selection_non_contributing("CUFF PRE GAP")?;
    let pre_gap_pre_holes = b.selection_non_contributing("CUFF PRE GAP PRE HOLES")?;
    let gap_cx = b.selection_non_contributing("CUFF GAP CROSS SECTION")?;
    let gap = b.selection_non_contributing("CUFF GAP")?;
    let pre_holes = b.selection_non_contributing("CUFF PRE HOLES")?;
    let _hole1 = b.selection_non_contributing("HOLE 1")?;
    let _hole2 = b.selection_non_contributing("HOLE 2")?;
    let holes = b.selection_non_contributing("HOLES")?;

    let cuff_surface = |label: &str, radius: &str, contribute_to: String, b: &TemplateBuilder| {
        Ok::<_, crate::error::PartforgeError>(Operation::Primitive {
            label: label.to_string(),
            shape: PrimitiveOp::Cylinder {
                pos: [b.expr("0")?, b.expr("0")?, b.expr("Center-(L/2)")?],
                radius: b.expr(radius)?,
                height: b.expr("L")?,
                axis: Vector3::z(),
            },
            contribute_to: Some(contribute_to),
        })
    };
    let gap_cross_section = |label: &str, b: &TemplateBuilder| {
        Ok::<_, crate::error::PartforgeError>(Operation::Primitive {
            label: label.to_string(),
            shape: PrimitiveOp::Rectangle {
                plane: WorkPlane::Xz,
                pos: [b.expr("R_in+((R_out-R_in)/2)")?, b.expr("Center")?],
                size: [b.expr("R_out-R_in")?, b.expr("L")?],
                base: BaseAnchor::Center,
            },
            contribute_to: Some(gap_cx.clone()),
        })
    };
    let gap_revolve = |label: &str, b: &TemplateBuilder| {
        Ok::<_, crate::error::PartforgeError>(Operation::SweepLike {
            label: label.to_string(),
            kind: SweepOp::Revolve {
                angle_start: b.expr("Theta")?,
                angle_end: b.expr("360 [deg]")?,
            },
            input: gap_cx.clone(),
            contribute_to: Some(gap.clone()),
        })
    };
    let hole_shape = |label: &str, z_sign: &str, b: &TemplateBuilder| {
        Ok::<_, crate::error::PartforgeError>(Operation::Primitive {
            label: label.to_string(),
            shape: PrimitiveOp::Cone {
                pos: [
                    b.expr("R_in-Buffer_hole/2")?,
                    b.expr("0")?,
                    b.expr(&format!(
                        "Center{z_sign}Pitch_holecenter_holecenter/2"
                    ))?,
                ],
                axis: Vector3::x(),
                semiaxes: [b.expr("D_hole/2")?, b.expr("D_hole/2")?],
                height: b.expr("(R_out-R_in)+Buffer_hole")?,
                ratio: b.expr("R_out/R_in")?,
            },
            contribute_to: Some(holes.clone()),
        })
    };
    let position_holes = |label: &str, b: &TemplateBuilder| {
        Ok::<_, crate::error::PartforgeError>(Operation::Transform {
            label: label.to_string(),
            kind: TransformOp::Rotate {
                origin: [b.expr("0")?, b.expr("0")?, b.expr("0")?],
                axis: Vector3::z(),
                angle: b.expr("(360[deg]*L_holecenter_cuffseam)/(pi*2*R_in)")?,
            },
            input: holes.clone(),
            contribute_to: None,
        })
    };
    let rotate_to_default = |label: &str, b: &TemplateBuilder| {
        Ok::<_, crate::error::PartforgeError>(Operation::Transform {
            label: label.to_string(),
            kind: TransformOp::Rotate {
                origin: [b.expr("0")?, b.expr("0")?, b.expr("0")?],
                axis: Vector3::z(),
                angle: b.expr("Rot_def")?,
            },
            input: cuff_final.clone(),
            contribute_to: None,
        })
    };

    b.push(cuff_surface("Make Inner Cuff Surface", "R_in", inner.clone(), &b)?);
    b.push(cuff_surface("Make Outer Cuff Surface", "R_out", outer.clone(), &b)?);

    // Closed cuff, no holes.
    let closed_no_holes = Branch {
        condition: b.expr("(Theta==360[deg]) && (N_holes==0)")?,
        ops: vec![difference(
            "Remove Domain Within Inner Cuff Surface",
            outer.clone(),
            inner.clone(),
            cuff_final.clone(),
        )],
    };

    // Seam gap, no holes.
    let gap_no_holes = Branch {
        condition: b.expr("(Theta<360[deg]) && (N_holes==0)")?,
        ops: vec![
            difference(
                "Remove Domain Within Inner Cuff Surface 1",
                outer.clone(),
                inner.clone(),
                pre_gap.clone(),
            ),
            gap_cross_section("Make Cuff Gap Cross Section", &b)?,
            gap_revolve("Make Cuff Gap", &b)?,
            difference("Remove Cuff Gap", pre_gap, gap.clone(), cuff_final.clone()),
            rotate_to_default("Rotate to Default Conformation 1", &b)?,
        ],
    };

    // Closed cuff with holes.
    let closed_with_holes = Branch {
        condition: b.expr("(Theta==360[deg]) && (N_holes>0)")?,
        ops: vec![
            difference(
                "Remove Domain Within Inner Cuff Surface 2",
                outer.clone(),
                inner.clone(),
                pre_holes.clone(),
            ),
            hole_shape("Make Hole Shape", "+", &b)?,
            position_holes("Position Hole in Cuff", &b)?,
            difference(
                "Make Inner Cuff Hole",
                pre_holes,
                holes.clone(),
                cuff_final.clone(),
            ),
        ],
    };

    // Seam gap and holes, with a nested branch for the two-hole variant.
    let gap_with_holes = Branch {
        condition: b.expr("(Theta<360[deg]) && (N_holes>0)")?,
        ops: vec![
            difference(
                "Remove Domain Within Inner Cuff Surface 3",
                outer,
                inner,
                pre_gap_pre_holes.clone(),
            ),
            gap_cross_section("Make Cuff Gap Cross Section 1", &b)?,
            gap_revolve("Make Cuff Gap 1", &b)?,
            difference(
                "Remove Cuff Gap 1",
                pre_gap_pre_holes,
                gap,
                wgap_pre_holes.clone(),
            ),
            hole_shape("Make Hole Shape 1", "+", &b)?,
            Operation::Conditional {
                label: "If (2 Holes)".to_string(),
                branches: vec![Branch {
                    condition: b.expr("N_holes==2")?,
                    ops: vec![hole_shape("Make Hole Shape 2", "-", &b)?],
                }],
            },
            position_holes("Position Hole in Cuff 1", &b)?,
            difference(
                "Make Inner Cuff Hole 1",
                wgap_pre_holes,
                holes,
                cuff_final.clone(),
            ),
            rotate_to_default("Rotate to Default Conformation", &b)?,
        ],
    };

    b.push(Operation::Conditional {
        label: "Cuff Conformation".to_string(),
        branches: vec![closed_no_holes, gap_no_holes, closed_with_holes, gap_with_holes],
    });

    Ok(b.build())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn cuff_final_is_csel3() {
        let t = tube_cuff().unwrap();
        assert_eq!(t.selection_id("CUFF FINAL"), Some("csel3"));
        assert!(t.selection("csel3").unwrap().contributing);
        assert!(!t.selection("csel1").unwrap().contributing);
    }

    #[test]
    fn declares_eleven_inputs() {
        let t = tube_cuff().unwrap();
        assert_eq!(t.inputs().len(), 11);
        assert!(t.input("Theta").is_some());
        assert!(t.input("Pitch_holecenter_holecenter").is_some());
    }
}
