//! Cuff fill: the cylinder of encapsulation/saline medium surrounding a
//! cuff, later partitioned against the parts placed inside it.

use crate::error::Result;
use crate::graph::{Operation, PrimitiveOp};
use crate::math::Vector3;
use crate::template::{Template, TemplateBuilder};

/// Builds the `CuffFill` template.
///
/// # Errors
///
/// Fails only on authoring errors in the template definition itself.
pub fn cuff_fill() -> Result<Template> {
    let mut b = TemplateBuilder::new("CuffFill");
    b.input("Radius", "0.5 [mm]")?;
    b.input("Thk", "100 [um]")?;
    b.input("L", "2.5 [mm]")?;
    b.input("z_center", "0 [um]")?;

    let fill_final = b.selection("CUFF FILL FINAL")?;

    b.push(Operation::Primitive {
        label: "Make Fill".to_string(),
        shape: PrimitiveOp::Cylinder {
            pos: [b.expr("0")?, b.expr("0")?, b.expr("z_center-(L/2)")?],
            radius: b.expr("Radius")?,
            height: b.expr("L")?,
            axis: Vector3::z(),
        },
        contribute_to: Some(fill_final),
    });

    Ok(b.build())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::backend::MemoryBackend;
    use crate::expr::Bindings;
    use crate::graph::run_template;
    use crate::selection::EntityKind;

    use super::*;

    #[test]
    fn default_run_yields_one_fill_domain() {
        let t = cuff_fill().unwrap();
        let mut bindings = Bindings::new();
        for input in t.inputs() {
            let value = input.default.eval(&mut Bindings::new()).unwrap();
            bindings.insert(input.name.clone(), value);
        }
        let mut backend = MemoryBackend::new();
        let reg = run_template(&t, &mut bindings, &mut backend).unwrap();
        let fill = reg.resolve("csel1").unwrap();
        assert_eq!(fill.kind(), EntityKind::Domain);
        assert_eq!(fill.members().len(), 1);
    }
}
