//! Rectangular pad electrode: a fillet-rounded rectangle, width-morphed and
//! extruded radially through the cuff wall, then partitioned against inner
//! and outer cutter cylinders so only the wall-thickness slab remains of
//! interest. An optional recess pocket repeats the chain one wall deeper.

use crate::backend::{BaseAnchor, WorkPlane};
use crate::error::Result;
use crate::graph::{Branch, Operation, PrimitiveOp, SweepOp, TransformOp};
use crate::math::Vector3;
use crate::template::{Template, TemplateBuilder};

/// Builds the `RectangleContact` template.
///
/// `scale_morph_w_contact` widens the pad in the circumferential direction
/// to compensate for wrapping the flat outline onto the cuff wall.
///
/// # Errors
///
/// Fails only on authoring errors in the template definition itself.
#[allow(clippy::too_many_lines)]
pub fn rectangle_contact() -> Result<Template> {
    let mut b = TemplateBuilder::new("RectangleContact");
    b.input("z_center", "0 [mm]")?;
    b.input("rotation_angle", "0 [deg]")?;
    b.input("w_contact", "0.475 [mm]")?;
    b.input("z_contact", "0.475 [mm]")?;
    b.input("fillet_contact", "0.1 [mm]")?;
    b.input("scale_morph_w_contact", "1")?;
    b.input("L_cuff", "4.1917 [mm]")?;
    b.input("r_cuff_in", "1.5 [mm]")?;
    b.input("recess", "0 [mm]")?;
    b.input("thk_contact", "0.018 [mm]")?;

    let contact_pre_fillet = b.selection_non_contributing("CONTACT PRE FILLET")?;
    let contact_filleted = b.selection_non_contributing("CONTACT FILLETED")?;
    let contact_pre_cuts = b.selection_non_contributing("CONTACT PRE CUTS")?;
    let inner_contact_cutter = b.selection_non_contributing("INNER CONTACT CUTTER")?;
    let outer_contact_cutter = b.selection_non_contributing("OUTER CONTACT CUTTER")?;
    let final_contact = b.selection("FINAL CONTACT")?;
    let recess_pre_fillet = b.selection_non_contributing("RECESS PRE FILLET")?;
    let recess_filleted = b.selection_non_contributing("RECESS FILLETED")?;
    let recess_pre_cuts = b.selection_non_contributing("RECESS PRE CUTS")?;
    let inner_recess_cutter = b.selection_non_contributing("INNER RECESS CUTTER")?;
    let outer_recess_cutter = b.selection_non_contributing("OUTER RECESS CUTTER")?;
    let final_recess = b.selection("FINAL RECESS")?;
    let src = b.selection("SRC")?;

    // Pad outline on the yz plane, extruded along +x through the wall, then
    // rotated about z to its circumferential position.
    b.push(Operation::Primitive {
        label: "Contact Pre Fillet Corners".to_string(),
        shape: PrimitiveOp::Rectangle {
            plane: WorkPlane::Yz,
            pos: [b.expr("0 [um]")?, b.expr("0 [um]")?],
            size: [b.expr("w_contact")?, b.expr("z_contact")?],
            base: BaseAnchor::Center,
        },
        contribute_to: Some(contact_pre_fillet.clone()),
    });
    b.push(Operation::Fillet {
        label: "Round Contact Corners".to_string(),
        radius: b.expr("fillet_contact")?,
        input: contact_pre_fillet,
        contribute_to: Some(contact_filleted.clone()),
    });
    b.push(Operation::Transform {
        label: "Scale Contact Width".to_string(),
        kind: TransformOp::Scale {
            origin: [b.expr("0")?, b.expr("0")?, b.expr("0")?],
            factor: [b.expr("1")?, b.expr("scale_morph_w_contact")?, b.expr("1")?],
        },
        input: contact_filleted.clone(),
        contribute_to: None,
    });
    b.push(Operation::Transform {
        label: "Shift Contact to Center".to_string(),
        kind: TransformOp::Move {
            displacement: [b.expr("0")?, b.expr("0")?, b.expr("z_center")?],
        },
        input: contact_filleted.clone(),
        contribute_to: None,
    });
    b.push(Operation::SweepLike {
        label: "Make Contact Pre Cuts".to_string(),
        kind: SweepOp::Extrude {
            direction: Vector3::x(),
            distance: b.expr("2*r_cuff_in")?,
        },
        input: contact_filleted,
        contribute_to: Some(contact_pre_cuts.clone()),
    });
    b.push(Operation::Transform {
        label: "Rotate Contact".to_string(),
        kind: TransformOp::Rotate {
            origin: [b.expr("0")?, b.expr("0")?, b.expr("0")?],
            axis: Vector3::z(),
            angle: b.expr("rotation_angle")?,
        },
        input: contact_pre_cuts.clone(),
        contribute_to: None,
    });
    b.push(Operation::Primitive {
        label: "Inner Contact Cutter".to_string(),
        shape: PrimitiveOp::Cylinder {
            pos: [b.expr("0")?, b.expr("0")?, b.expr("-L_cuff/2+z_center")?],
            radius: b.expr("r_cuff_in+recess")?,
            height: b.expr("L_cuff")?,
            axis: Vector3::z(),
        },
        contribute_to: Some(inner_contact_cutter.clone()),
    });
    b.push(Operation::Primitive {
        label: "Outer Contact Cutter".to_string(),
        shape: PrimitiveOp::Cylinder {
            pos: [b.expr("0")?, b.expr("0")?, b.expr("-L_cuff/2+z_center")?],
            radius: b.expr("r_cuff_in+recess+thk_contact")?,
            height: b.expr("L_cuff")?,
            axis: Vector3::z(),
        },
        contribute_to: Some(outer_contact_cutter.clone()),
    });
    b.push(Operation::Partition {
        label: "Cut Outer Excess".to_string(),
        input: contact_pre_cuts,
        tool: outer_contact_cutter,
        contribute_to: Some(final_contact.clone()),
    });
    b.push(Operation::Partition {
        label: "Cut Inner Excess".to_string(),
        input: final_contact.clone(),
        tool: inner_contact_cutter,
        contribute_to: Some(final_contact),
    });
    b.push(Operation::Delete {
        label: "Delete Inner Excess Contact".to_string(),
        center: [
            b.expr("((r_cuff_in+recess)/2)*cos(rotation_angle)")?,
            b.expr("((r_cuff_in+recess)/2)*sin(rotation_angle)")?,
            b.expr("z_center")?,
        ],
        radius: b.expr("1 [um]")?,
    });
    b.push(Operation::Delete {
        label: "Delete Outer Excess Contact".to_string(),
        center: [
            b.expr("((r_cuff_in+2*r_cuff_in)/2)*cos(rotation_angle)")?,
            b.expr("((r_cuff_in+2*r_cuff_in)/2)*sin(rotation_angle)")?,
            b.expr("z_center")?,
        ],
        radius: b.expr("1 [um]")?,
    });

    b.push(Operation::Conditional {
        label: "If (Recess)".to_string(),
        branches: vec![Branch {
            condition: b.expr("recess>0[um]")?,
            ops: vec![
                Operation::Primitive {
                    label: "Recess Pre Fillet Corners".to_string(),
                    shape: PrimitiveOp::Rectangle {
                        plane: WorkPlane::Yz,
                        pos: [b.expr("0 [um]")?, b.expr("0 [um]")?],
                        size: [b.expr("w_contact")?, b.expr("z_contact")?],
                        base: BaseAnchor::Center,
                    },
                    contribute_to: Some(recess_pre_fillet.clone()),
                },
                Operation::Fillet {
                    label: "Round Recess Corners".to_string(),
                    radius: b.expr("fillet_contact")?,
                    input: recess_pre_fillet,
                    contribute_to: Some(recess_filleted.clone()),
                },
                Operation::Transform {
                    label: "Scale Recess Width".to_string(),
                    kind: TransformOp::Scale {
                        origin: [b.expr("0")?, b.expr("0")?, b.expr("0")?],
                        factor: [
                            b.expr("1")?,
                            b.expr("scale_morph_w_contact")?,
                            b.expr("1")?,
                        ],
                    },
                    input: recess_filleted.clone(),
                    contribute_to: None,
                },
                Operation::Transform {
                    label: "Shift Recess to Center".to_string(),
                    kind: TransformOp::Move {
                        displacement: [b.expr("0")?, b.expr("0")?, b.expr("z_center")?],
                    },
                    input: recess_filleted.clone(),
                    contribute_to: None,
                },
                Operation::SweepLike {
                    label: "Make Recess Pre Cuts".to_string(),
                    kind: SweepOp::Extrude {
                        direction: Vector3::x(),
                        distance: b.expr("2*r_cuff_in")?,
                    },
                    input: recess_filleted,
                    contribute_to: Some(recess_pre_cuts.clone()),
                },
                Operation::Transform {
                    label: "Rotate Recess".to_string(),
                    kind: TransformOp::Rotate {
                        origin: [b.expr("0")?, b.expr("0")?, b.expr("0")?],
                        axis: Vector3::z(),
                        angle: b.expr("rotation_angle")?,
                    },
                    input: recess_pre_cuts.clone(),
                    contribute_to: None,
                },
                Operation::Primitive {
                    label: "Inner Recess Cutter".to_string(),
                    shape: PrimitiveOp::Cylinder {
                        pos: [b.expr("0")?, b.expr("0")?, b.expr("-L_cuff/2+z_center")?],
                        radius: b.expr("r_cuff_in")?,
                        height: b.expr("L_cuff")?,
                        axis: Vector3::z(),
                    },
                    contribute_to: Some(inner_recess_cutter.clone()),
                },
                Operation::Primitive {
                    label: "Outer Recess Cutter".to_string(),
                    shape: PrimitiveOp::Cylinder {
                        pos: [b.expr("0")?, b.expr("0")?, b.expr("-L_cuff/2+z_center")?],
                        radius: b.expr("r_cuff_in+recess")?,
                        height: b.expr("L_cuff")?,
                        axis: Vector3::z(),
                    },
                    contribute_to: Some(outer_recess_cutter.clone()),
                },
                Operation::Partition {
                    label: "Remove Outer Recess Excess".to_string(),
                    input: recess_pre_cuts,
                    tool: outer_recess_cutter,
                    contribute_to: Some(final_recess.clone()),
                },
                Operation::Partition {
                    label: "Remove Inner Recess Excess".to_string(),
                    input: final_recess.clone(),
                    tool: inner_recess_cutter,
                    contribute_to: Some(final_recess),
                },
                Operation::Delete {
                    label: "Delete Inner Excess Recess".to_string(),
                    center: [
                        b.expr("((r_cuff_in+recess)/2)*cos(rotation_angle)")?,
                        b.expr("((r_cuff_in+recess)/2)*sin(rotation_angle)")?,
                        b.expr("z_center")?,
                    ],
                    radius: b.expr("1 [um]")?,
                },
                Operation::Delete {
                    label: "Delete Outer Excess Recess".to_string(),
                    center: [
                        b.expr("((r_cuff_in+2*r_cuff_in)/2)*cos(rotation_angle)")?,
                        b.expr("((r_cuff_in+2*r_cuff_in)/2)*sin(rotation_angle)")?,
                        b.expr("z_center")?,
                    ],
                    radius: b.expr("1 [um]")?,
                },
            ],
        }],
    });

    b.push(Operation::Primitive {
        label: "Src".to_string(),
        shape: PrimitiveOp::Point {
            pos: [
                b.expr("(r_cuff_in+recess+(thk_contact/2))*cos(rotation_angle)")?,
                b.expr("(r_cuff_in+recess+(thk_contact/2))*sin(rotation_angle)")?,
                b.expr("z_center")?,
            ],
        },
        contribute_to: Some(src),
    });

    Ok(b.build())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::backend::{GeometryBackend, MemoryBackend};
    use crate::error::{BuildError, PartforgeError};
    use crate::expr::{Bindings, Quantity};
    use crate::graph::run_template;
    use crate::selection::{EntityKind, Registry};

    use super::*;

    fn default_bindings(t: &Template) -> Bindings {
        let mut bindings = Bindings::new();
        for input in t.inputs() {
            let value = input.default.eval(&mut Bindings::new()).unwrap();
            bindings.insert(input.name.clone(), value);
        }
        bindings
    }

    fn live_members(reg: &Registry, backend: &MemoryBackend, id: &str) -> usize {
        reg.resolve(id)
            .unwrap()
            .members()
            .iter()
            .filter(|&&e| backend.is_alive(e))
            .count()
    }

    #[test]
    fn default_run_builds_the_partitioned_pad() {
        let t = rectangle_contact().unwrap();
        let mut bindings = default_bindings(&t);
        let mut backend = MemoryBackend::new();
        let reg = run_template(&t, &mut bindings, &mut backend).unwrap();

        // Two partition passes over the extruded slab leave four regions.
        assert_eq!(
            live_members(&reg, &backend, t.selection_id("FINAL CONTACT").unwrap()),
            4
        );
        // Default recess is zero, so the pocket chain never ran.
        assert!(reg.resolve(t.selection_id("FINAL RECESS").unwrap()).is_err());

        let src = reg.resolve(t.selection_id("SRC").unwrap()).unwrap();
        assert_eq!(src.kind(), EntityKind::Point);
        assert_eq!(src.members().len(), 1);
    }

    #[test]
    fn positive_recess_builds_the_pocket() {
        let t = rectangle_contact().unwrap();
        let mut bindings = default_bindings(&t);
        bindings.insert("recess".to_string(), Quantity::length_um(100.0));
        let mut backend = MemoryBackend::new();
        let reg = run_template(&t, &mut bindings, &mut backend).unwrap();
        assert_eq!(
            live_members(&reg, &backend, t.selection_id("FINAL RECESS").unwrap()),
            4
        );
        assert_eq!(
            live_members(&reg, &backend, t.selection_id("FINAL CONTACT").unwrap()),
            4
        );
    }

    #[test]
    fn zero_fillet_radius_fails_at_the_rounding_step() {
        let t = rectangle_contact().unwrap();
        let mut bindings = default_bindings(&t);
        bindings.insert("fillet_contact".to_string(), Quantity::length_um(0.0));
        let mut backend = MemoryBackend::new();
        let err = run_template(&t, &mut bindings, &mut backend).unwrap_err();
        let PartforgeError::Build(BuildError::OperationFailed { label, .. }) = err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(label, "Round Contact Corners");
    }
}
