//! Helical cuff with an embedded conductor: three rectangular cross-sections
//! swept along consecutive segments of one helix. The middle segment carries
//! both the insulator and, on the same path curve, the electrode conductor;
//! the three insulator turns then merge into a single cuff body.

use crate::backend::{BaseAnchor, BooleanKind, WorkPlane};
use crate::error::Result;
use crate::expr::Expr;
use crate::graph::{Operation, PrimitiveOp, SweepOp, TransformOp};
use crate::math::Vector3;
use crate::template::{Template, TemplateBuilder};

/// Builds the `HelicalCuffnContact` template.
///
/// The helix makes `rev` revolutions over the cuff length; the conductor
/// occupies the middle segment from 0.3 to 0.7 of the winding.
///
/// # Errors
///
/// Fails only on authoring errors in the template definition itself.
pub fn helical_cuff() -> Result<Template> {
    let mut b = TemplateBuilder::new("HelicalCuffnContact");
    b.input("Center", "10 [mm]")?;
    b.input("r_cuff_in", "1.5 [mm]")?;
    b.input("thk_cuff", "0.1 [mm]")?;
    b.input("w_cuff", "0.3 [mm]")?;
    b.input("thk_elec", "0.05 [mm]")?;
    b.input("w_elec", "0.1 [mm]")?;
    b.input("L_cuff", "5 [mm]")?;
    b.input("rev", "2")?;

    let pc1 = b.selection_non_contributing("PC1")?;
    let cuff_cx_p1 = b.selection_non_contributing("CUFF CROSS SECTION P1")?;
    let cuffp1 = b.selection_non_contributing("Cuffp1")?;
    let pc2 = b.selection_non_contributing("PC2")?;
    let cuff_cx_p2 = b.selection_non_contributing("CUFF CROSS SECTION P2")?;
    let conductor_cx_p2 = b.selection_non_contributing("CONDUCTOR CROSS SECTION P2")?;
    let src = b.selection("SRC")?;
    let cuffp2 = b.selection_non_contributing("Cuffp2")?;
    let conductorp2 = b.selection("Conductorp2")?;
    let pc3 = b.selection_non_contributing("PC3")?;
    let cuff_cx_p3 = b.selection_non_contributing("CUFF CROSS SECTION P3")?;
    let cuffp3 = b.selection_non_contributing("Cuffp3")?;
    let cuff_final = b.selection("CUFF FINAL")?;

    // Helix point at winding fraction `f`, on the cuff wall's midline.
    let helix = |b: &TemplateBuilder, f: &str| -> Result<[Expr; 3]> {
        Ok([
            b.expr(&format!("cos(2*pi*rev*{f})*((thk_cuff/2)+r_cuff_in)"))?,
            b.expr(&format!("sin(2*pi*rev*{f})*((thk_cuff/2)+r_cuff_in)"))?,
            b.expr(&format!("Center+L_cuff*{f}-L_cuff/2"))?,
        ])
    };
    // Cross-section rectangle at fraction `f`, rotated to the helix angle.
    let cross_section = |b: &TemplateBuilder,
                         label: &str,
                         radial: &str,
                         size: [&str; 2],
                         f: &str,
                         target: &str|
     -> Result<[Operation; 2]> {
        Ok([
            Operation::Primitive {
                label: label.to_string(),
                shape: PrimitiveOp::Rectangle {
                    plane: WorkPlane::Xz,
                    pos: [
                        b.expr(radial)?,
                        b.expr(&format!("Center-L_cuff/2+L_cuff*{f}"))?,
                    ],
                    size: [b.expr(size[0])?, b.expr(size[1])?],
                    base: BaseAnchor::Center,
                },
                contribute_to: Some(target.to_string()),
            },
            Operation::Transform {
                label: format!("Rotate {label}"),
                kind: TransformOp::Rotate {
                    origin: [b.expr("0")?, b.expr("0")?, b.expr("0")?],
                    axis: Vector3::z(),
                    angle: b.expr(&format!("2*pi*rev*{f}"))?,
                },
                input: target.to_string(),
                contribute_to: None,
            },
        ])
    };

    for op in cross_section(
        &b,
        "Helical Insulator Cross Section Part 1",
        "r_cuff_in+thk_cuff/2",
        ["thk_cuff", "w_cuff"],
        "0",
        &cuff_cx_p1,
    )? {
        b.push(op);
    }
    b.push(Operation::Primitive {
        label: "Parametric Curve Part 1".to_string(),
        shape: PrimitiveOp::Curve {
            start: helix(&b, "0")?,
            end: helix(&b, "0.3")?,
        },
        contribute_to: Some(pc1.clone()),
    });
    b.push(Operation::SweepLike {
        label: "Make Cuff Part 1".to_string(),
        kind: SweepOp::Sweep {
            path: pc1,
            direction_edge: None,
        },
        input: cuff_cx_p1,
        contribute_to: Some(cuffp1.clone()),
    });

    for op in cross_section(
        &b,
        "Helical Insulator Cross Section Part 2",
        "r_cuff_in+thk_cuff/2",
        ["thk_cuff", "w_cuff"],
        "0.3",
        &cuff_cx_p2,
    )? {
        b.push(op);
    }
    for op in cross_section(
        &b,
        "Helical Conductor Cross Section Part 2",
        "r_cuff_in+thk_elec/2",
        ["thk_elec", "w_elec"],
        "0.3",
        &conductor_cx_p2,
    )? {
        b.push(op);
    }
    b.push(Operation::Primitive {
        label: "Parametric Curve Part 2".to_string(),
        shape: PrimitiveOp::Curve {
            start: helix(&b, "0.3")?,
            end: helix(&b, "0.7")?,
        },
        contribute_to: Some(pc2.clone()),
    });
    // Insulator and conductor sweep along the same path curve.
    b.push(Operation::SweepLike {
        label: "Make Cuff Part 2".to_string(),
        kind: SweepOp::Sweep {
            path: pc2.clone(),
            direction_edge: None,
        },
        input: cuff_cx_p2,
        contribute_to: Some(cuffp2.clone()),
    });
    b.push(Operation::SweepLike {
        label: "Make Conductor Part 2".to_string(),
        kind: SweepOp::Sweep {
            path: pc2,
            direction_edge: None,
        },
        input: conductor_cx_p2,
        contribute_to: Some(conductorp2),
    });
    b.push(Operation::Primitive {
        label: "Src".to_string(),
        shape: PrimitiveOp::Point {
            pos: [
                b.expr("cos(2*pi*rev*0.5)*((thk_elec/2)+r_cuff_in)")?,
                b.expr("sin(2*pi*rev*0.5)*((thk_elec/2)+r_cuff_in)")?,
                b.expr("Center")?,
            ],
        },
        contribute_to: Some(src),
    });

    for op in cross_section(
        &b,
        "Helical Insulator Cross Section Part 3",
        "r_cuff_in+thk_cuff/2",
        ["thk_cuff", "w_cuff"],
        "0.7",
        &cuff_cx_p3,
    )? {
        b.push(op);
    }
    b.push(Operation::Primitive {
        label: "Parametric Curve Part 3".to_string(),
        shape: PrimitiveOp::Curve {
            start: helix(&b, "0.7")?,
            end: helix(&b, "1")?,
        },
        contribute_to: Some(pc3.clone()),
    });
    b.push(Operation::SweepLike {
        label: "Make Cuff Part 3".to_string(),
        kind: SweepOp::Sweep {
            path: pc3,
            direction_edge: None,
        },
        input: cuff_cx_p3,
        contribute_to: Some(cuffp3.clone()),
    });

    b.push(Operation::Boolean {
        label: "Join Cuff Parts 1 and 2".to_string(),
        kind: BooleanKind::Union,
        input: cuffp1,
        input2: cuffp2,
        contribute_to: Some(cuff_final.clone()),
    });
    b.push(Operation::Boolean {
        label: "Join Cuff Part 3".to_string(),
        kind: BooleanKind::Union,
        input: cuff_final.clone(),
        input2: cuffp3,
        contribute_to: Some(cuff_final),
    });

    Ok(b.build())
}
