//! Strict in-order execution of a template's operation list.

use tracing::{debug, debug_span};

use crate::backend::{EntityRef, GeometryBackend, PrimitiveSpec, SweepSpec, TransformSpec};
use crate::error::{BuildError, Result};
use crate::expr::{Bindings, Expr, Quantity};
use crate::math::Point3;
use crate::selection::{EntityKind, Registry};
use crate::template::Template;

use super::{Branch, Operation, PrimitiveOp, SweepOp, TransformOp};

/// Runs a template's construction graph against a backend, producing the
/// populated template-local selection registry.
///
/// Operations execute in declared order; any failure aborts the run and is
/// reported with the operation's label and index. No partial registry is
/// returned on failure.
///
/// # Errors
///
/// Returns [`BuildError::OperationFailed`] wrapping the underlying
/// expression, selection, empty-operand, or backend error.
pub fn run_template(
    template: &Template,
    bindings: &mut Bindings,
    backend: &mut dyn GeometryBackend,
) -> Result<Registry> {
    let span = debug_span!("run_template", template = template.name());
    let _guard = span.enter();

    let mut registry = Registry::new();
    let mut runner = Runner {
        template: template.name(),
        bindings,
        registry: &mut registry,
        backend,
        counter: 0,
    };
    runner.run_block(template.ops())?;
    debug!(selections = registry.len(), "template run complete");
    Ok(registry)
}

struct Runner<'a> {
    template: &'a str,
    bindings: &'a mut Bindings,
    registry: &'a mut Registry,
    backend: &'a mut dyn GeometryBackend,
    counter: usize,
}

fn as_length(q: Quantity) -> Result<f64> {
    Ok(q.as_length()?)
}

fn as_angle(q: Quantity) -> Result<f64> {
    Ok(q.as_angle()?)
}

fn as_scalar(q: Quantity) -> Result<f64> {
    Ok(q.as_scalar()?)
}

impl Runner<'_> {
    fn wrap(&self, label: &str, index: usize, source: crate::error::PartforgeError) -> BuildError {
        BuildError::OperationFailed {
            template: self.template.to_string(),
            label: label.to_string(),
            index,
            source: Box::new(source),
        }
    }

    fn run_block(&mut self, ops: &[Operation]) -> Result<()> {
        for op in ops {
            let index = self.counter;
            self.counter += 1;
            if let Operation::Conditional { label, branches } = op {
                self.run_conditional(label, index, branches)?;
            } else {
                self.step(op)
                    .map_err(|e| self.wrap(op.label(), index, e))?;
            }
        }
        Ok(())
    }

    fn run_conditional(&mut self, label: &str, index: usize, branches: &[Branch]) -> Result<()> {
        for branch in branches {
            let taken = branch
                .condition
                .eval(self.bindings)
                .map_err(|e| self.wrap(label, index, e))?
                .is_truthy();
            if taken {
                debug!(label, "conditional branch taken");
                // Branch failures carry their own operation labels.
                return self.run_block(&branch.ops);
            }
        }
        debug!(label, "no conditional branch taken");
        Ok(())
    }

    fn eval(&mut self, e: &Expr) -> Result<Quantity> {
        e.eval(self.bindings)
    }

    fn eval_point(&mut self, pos: &[Expr; 3]) -> Result<Point3> {
        let x = as_length(self.eval(&pos[0])?)?;
        let y = as_length(self.eval(&pos[1])?)?;
        let z = as_length(self.eval(&pos[2])?)?;
        Ok(Point3::new(x, y, z))
    }

    fn eval_len2(&mut self, uv: &[Expr; 2]) -> Result<[f64; 2]> {
        Ok([
            as_length(self.eval(&uv[0])?)?,
            as_length(self.eval(&uv[1])?)?,
        ])
    }

    /// Resolves a selection to its live members and kind.
    fn resolve_live(&self, name: &str) -> Result<(EntityKind, Vec<EntityRef>)> {
        let sel = self.registry.resolve(name)?;
        let backend = &*self.backend;
        let live: Vec<EntityRef> = sel
            .members()
            .iter()
            .copied()
            .filter(|&e| backend.is_alive(e))
            .collect();
        Ok((sel.kind(), live))
    }

    fn require_nonempty(
        &self,
        label: &str,
        selection: &str,
        live: &[EntityRef],
    ) -> Result<()> {
        if live.is_empty() {
            return Err(BuildError::EmptyOperand {
                operation: label.to_string(),
                selection: selection.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn contribute(
        &mut self,
        target: Option<&String>,
        kind: EntityKind,
        entities: &[EntityRef],
    ) -> Result<()> {
        if let Some(name) = target {
            self.registry.contribute(name, kind, entities)?;
        }
        Ok(())
    }

    fn step(&mut self, op: &Operation) -> Result<()> {
        match op {
            Operation::Primitive {
                shape,
                contribute_to,
                ..
            } => {
                let spec = self.primitive_spec(shape)?;
                let kind = spec.produces();
                let refs = self.backend.create_primitive(&spec)?;
                self.contribute(contribute_to.as_ref(), kind, &refs)
            }
            Operation::Boolean {
                label,
                kind,
                input,
                input2,
                contribute_to,
            } => {
                let (sel_kind, a) = self.resolve_live(input)?;
                let (_, b) = self.resolve_live(input2)?;
                self.require_nonempty(label, input, &a)?;
                self.require_nonempty(label, input2, &b)?;
                let refs = self.backend.boolean_op(*kind, &a, &b)?;
                self.contribute(contribute_to.as_ref(), sel_kind, &refs)
            }
            Operation::SweepLike {
                label,
                kind,
                input,
                contribute_to,
            } => {
                let (_, cross_section) = self.resolve_live(input)?;
                self.require_nonempty(label, input, &cross_section)?;
                let spec = self.sweep_spec(label, kind)?;
                let refs = self.backend.sweep_like(&spec, &cross_section)?;
                self.contribute(contribute_to.as_ref(), EntityKind::Domain, &refs)
            }
            Operation::Transform {
                label,
                kind,
                input,
                contribute_to,
            } => {
                let (sel_kind, old) = self.resolve_live(input)?;
                self.require_nonempty(label, input, &old)?;
                let spec = self.transform_spec(kind)?;
                let new = self.backend.transform(&spec, &old)?;
                // The kernel replaced identities; every selection holding the
                // old handles must now see the new ones.
                let pairs: Vec<_> = old.into_iter().zip(new.iter().copied()).collect();
                self.registry.remap(&pairs);
                self.contribute(contribute_to.as_ref(), sel_kind, &new)
            }
            Operation::Partition {
                label,
                input,
                tool,
                contribute_to,
            } => {
                let (sel_kind, a) = self.resolve_live(input)?;
                let (_, t) = self.resolve_live(tool)?;
                self.require_nonempty(label, input, &a)?;
                self.require_nonempty(label, tool, &t)?;
                let refs = self.backend.partition(&a, &t)?;
                self.contribute(contribute_to.as_ref(), sel_kind, &refs)
            }
            Operation::Fillet {
                label,
                radius,
                input,
                contribute_to,
            } => {
                let (sel_kind, old) = self.resolve_live(input)?;
                self.require_nonempty(label, input, &old)?;
                let radius = as_length(self.eval(radius)?)?;
                let new = self.backend.fillet(radius, &old)?;
                let pairs: Vec<_> = old.into_iter().zip(new.iter().copied()).collect();
                self.registry.remap(&pairs);
                self.contribute(contribute_to.as_ref(), sel_kind, &new)
            }
            Operation::Delete { center, radius, .. } => {
                let center = self.eval_point(center)?;
                let radius = as_length(self.eval(radius)?)?;
                let removed = self.backend.delete_in_ball(center, radius)?;
                if !removed.is_empty() {
                    let backend = &*self.backend;
                    self.registry.prune_dead(|e| backend.is_alive(e));
                }
                Ok(())
            }
            Operation::Conditional { .. } => unreachable!("handled in run_block"),
        }
    }

    fn primitive_spec(&mut self, shape: &PrimitiveOp) -> Result<PrimitiveSpec> {
        Ok(match shape {
            PrimitiveOp::Cylinder {
                pos,
                radius,
                height,
                axis,
            } => PrimitiveSpec::Cylinder {
                pos: self.eval_point(pos)?,
                radius: as_length(self.eval(radius)?)?,
                height: as_length(self.eval(height)?)?,
                axis: *axis,
            },
            PrimitiveOp::Sphere { pos, radius } => PrimitiveSpec::Sphere {
                pos: self.eval_point(pos)?,
                radius: as_length(self.eval(radius)?)?,
            },
            PrimitiveOp::Cone {
                pos,
                axis,
                semiaxes,
                height,
                ratio,
            } => PrimitiveSpec::Cone {
                pos: self.eval_point(pos)?,
                axis: *axis,
                semiaxes: self.eval_len2(semiaxes)?,
                height: as_length(self.eval(height)?)?,
                ratio: as_scalar(self.eval(ratio)?)?,
            },
            PrimitiveOp::Rectangle {
                plane,
                pos,
                size,
                base,
            } => PrimitiveSpec::Rectangle {
                plane: *plane,
                pos: self.eval_len2(pos)?,
                size: self.eval_len2(size)?,
                base: *base,
            },
            PrimitiveOp::Circle { plane, pos, radius } => PrimitiveSpec::Circle {
                plane: *plane,
                pos: self.eval_len2(pos)?,
                radius: as_length(self.eval(radius)?)?,
            },
            PrimitiveOp::Ellipse {
                plane,
                pos,
                semiaxes,
            } => PrimitiveSpec::Ellipse {
                plane: *plane,
                pos: self.eval_len2(pos)?,
                semiaxes: self.eval_len2(semiaxes)?,
            },
            PrimitiveOp::Point { pos } => PrimitiveSpec::Point {
                pos: self.eval_point(pos)?,
            },
            PrimitiveOp::Curve { start, end } => PrimitiveSpec::Curve {
                start: self.eval_point(start)?,
                end: self.eval_point(end)?,
            },
        })
    }

    fn sweep_spec(&mut self, label: &str, kind: &SweepOp) -> Result<SweepSpec> {
        Ok(match kind {
            SweepOp::Revolve {
                angle_start,
                angle_end,
            } => SweepSpec::Revolve {
                angle_start: as_angle(self.eval(angle_start)?)?,
                angle_end: as_angle(self.eval(angle_end)?)?,
            },
            SweepOp::Extrude {
                direction,
                distance,
            } => SweepSpec::Extrude {
                direction: *direction,
                distance: as_length(self.eval(distance)?)?,
            },
            SweepOp::Sweep {
                path,
                direction_edge,
            } => {
                let (_, path_refs) = self.resolve_live(path)?;
                self.require_nonempty(label, path, &path_refs)?;
                let direction_edge = match direction_edge {
                    Some(sel) => {
                        let (_, edges) = self.resolve_live(sel)?;
                        self.require_nonempty(label, sel, &edges)?;
                        Some(edges[0])
                    }
                    None => None,
                };
                SweepSpec::Sweep {
                    path: path_refs,
                    direction_edge,
                }
            }
        })
    }

    fn transform_spec(&mut self, kind: &TransformOp) -> Result<TransformSpec> {
        Ok(match kind {
            TransformOp::Rotate {
                origin,
                axis,
                angle,
            } => TransformSpec::Rotate {
                origin: self.eval_point(origin)?,
                axis: *axis,
                angle: as_angle(self.eval(angle)?)?,
            },
            TransformOp::Move { displacement } => {
                let p = self.eval_point(displacement)?;
                TransformSpec::Translate {
                    displacement: p.coords,
                }
            }
            TransformOp::Scale { origin, factor } => TransformSpec::Scale {
                origin: self.eval_point(origin)?,
                factor: [
                    as_scalar(self.eval(&factor[0])?)?,
                    as_scalar(self.eval(&factor[1])?)?,
                    as_scalar(self.eval(&factor[2])?)?,
                ],
            },
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;

    use crate::backend::{BaseAnchor, BooleanKind, MemoryBackend, WorkPlane};
    use crate::error::{BuildError, PartforgeError};
    use crate::math::Vector3;
    use crate::template::TemplateBuilder;

    use super::*;

    fn expr(text: &str) -> Expr {
        Expr::parse(text).unwrap()
    }

    fn rect(label: &str, target: &str) -> Operation {
        Operation::Primitive {
            label: label.to_string(),
            shape: PrimitiveOp::Rectangle {
                plane: WorkPlane::Xz,
                pos: [expr("1 [mm]"), expr("0")],
                size: [expr("1 [mm]"), expr("1 [mm]")],
                base: BaseAnchor::Center,
            },
            contribute_to: Some(target.to_string()),
        }
    }

    fn run(template: &Template) -> (Result<Registry>, MemoryBackend) {
        let mut bindings = Bindings::new();
        let mut backend = MemoryBackend::new();
        let result = run_template(template, &mut bindings, &mut backend);
        (result, backend)
    }

    #[test]
    fn consumed_operand_aborts_with_label_and_index() {
        let mut b = TemplateBuilder::new("Gadget");
        let face_a = b.selection("FACE A").unwrap();
        let face_b = b.selection("FACE B").unwrap();
        let cut = b.selection("CUT RESULT").unwrap();
        b.push(rect("Face A", &face_a));
        b.push(rect("Face B", &face_b));
        b.push(Operation::Boolean {
            label: "First Difference".to_string(),
            kind: BooleanKind::Difference,
            input: face_a.clone(),
            input2: face_b,
            contribute_to: Some(cut.clone()),
        });
        // FACE A was consumed above, so its only member is no longer live.
        b.push(Operation::Boolean {
            label: "Second Difference".to_string(),
            kind: BooleanKind::Difference,
            input: face_a.clone(),
            input2: cut,
            contribute_to: None,
        });

        let (result, _) = run(&b.build());
        let err = result.unwrap_err();
        let PartforgeError::Build(BuildError::OperationFailed {
            template,
            label,
            index,
            source,
        }) = err
        else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(template, "Gadget");
        assert_eq!(label, "Second Difference");
        assert_eq!(index, 3);
        let PartforgeError::Build(BuildError::EmptyOperand { selection, .. }) = *source else {
            panic!("unexpected source: {source}");
        };
        assert_eq!(selection, face_a);
    }

    #[test]
    fn partition_move_and_ball_delete_run_in_sequence() {
        let mut b = TemplateBuilder::new("Widget");
        let solid = b.selection("SOLID").unwrap();
        let tool = b.selection("TOOL").unwrap();
        let parts = b.selection("PARTS").unwrap();
        b.push(Operation::Primitive {
            label: "Solid".to_string(),
            shape: PrimitiveOp::Cylinder {
                pos: [expr("0"), expr("0"), expr("0")],
                radius: expr("1 [mm]"),
                height: expr("2 [mm]"),
                axis: Vector3::z(),
            },
            contribute_to: Some(solid.clone()),
        });
        b.push(rect("Tool", &tool));
        b.push(Operation::Partition {
            label: "Split Solid".to_string(),
            input: solid,
            tool,
            contribute_to: Some(parts.clone()),
        });
        b.push(Operation::Transform {
            label: "Shift Parts".to_string(),
            kind: TransformOp::Move {
                displacement: [expr("1 [mm]"), expr("0"), expr("0")],
            },
            input: parts.clone(),
            contribute_to: None,
        });
        // Off to the side of both subdomains; removes nothing.
        b.push(Operation::Delete {
            label: "Prune Slivers".to_string(),
            center: [expr("5 [mm]"), expr("0"), expr("0")],
            radius: expr("1 [um]"),
        });

        let (result, backend) = run(&b.build());
        let reg = result.unwrap();
        let sel = reg.resolve(&parts).unwrap();
        let live: Vec<_> = sel
            .members()
            .iter()
            .copied()
            .filter(|&e| backend.is_alive(e))
            .collect();
        assert_eq!(live.len(), 2);
        for e in live {
            let p = backend.entity(e).unwrap().position;
            assert_relative_eq!(p.x, 1000.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn sweep_extrude_and_scale_flow_through_the_runner() {
        let mut b = TemplateBuilder::new("Coil");
        let path = b.selection("PATH").unwrap();
        let coil_face = b.selection("COIL FACE").unwrap();
        let coil = b.selection("COIL").unwrap();
        let slab_face = b.selection("SLAB FACE").unwrap();
        let slab = b.selection("SLAB").unwrap();
        b.push(Operation::Primitive {
            label: "Path".to_string(),
            shape: PrimitiveOp::Curve {
                start: [expr("1 [mm]"), expr("0"), expr("0")],
                end: [expr("0"), expr("1 [mm]"), expr("2 [mm]")],
            },
            contribute_to: Some(path.clone()),
        });
        b.push(rect("Coil Face", &coil_face));
        b.push(Operation::SweepLike {
            label: "Make Coil".to_string(),
            kind: SweepOp::Sweep {
                path: path.clone(),
                direction_edge: Some(path.clone()),
            },
            input: coil_face,
            contribute_to: Some(coil.clone()),
        });
        b.push(rect("Slab Face", &slab_face));
        b.push(Operation::SweepLike {
            label: "Make Slab".to_string(),
            kind: SweepOp::Extrude {
                direction: Vector3::x(),
                distance: expr("2 [mm]"),
            },
            input: slab_face,
            contribute_to: Some(slab.clone()),
        });
        b.push(Operation::Transform {
            label: "Stretch Slab".to_string(),
            kind: TransformOp::Scale {
                origin: [expr("0"), expr("0"), expr("0")],
                factor: [expr("2"), expr("1"), expr("1")],
            },
            input: slab.clone(),
            contribute_to: None,
        });

        let (result, backend) = run(&b.build());
        let reg = result.unwrap();

        let coil_sel = reg.resolve(&coil).unwrap();
        assert_eq!(coil_sel.kind(), EntityKind::Domain);
        assert!(backend.is_alive(coil_sel.members()[0]));

        // The path curve survives its use as a sweep spine.
        let path_sel = reg.resolve(&path).unwrap();
        assert_eq!(path_sel.kind(), EntityKind::Edge);
        assert!(backend.is_alive(path_sel.members()[0]));

        // Rect anchored at x=1mm, extruded 2mm along +x, scaled x2 about
        // the origin: (1000 + 1000) * 2.
        let slab_sel = reg.resolve(&slab).unwrap();
        let p = backend.entity(slab_sel.members()[0]).unwrap().position;
        assert_relative_eq!(p.x, 4000.0, epsilon = 1e-9);
    }
}
