//! Built-in cuff part templates.
//!
//! Each template transcribes one part primitive of the nerve-cuff device
//! catalogue into the generic construction graph. Per-device variation
//! (radii, pitches, contact counts) lives in device-family parameter data,
//! not here.

mod circle_contact;
mod cuff_fill;
mod helical_cuff;
mod rectangle_contact;
mod ribbon_contact;
mod tube_cuff;
mod wire_contact;

pub use circle_contact::circle_contact;
pub use cuff_fill::cuff_fill;
pub use helical_cuff::helical_cuff;
pub use rectangle_contact::rectangle_contact;
pub use ribbon_contact::ribbon_contact;
pub use tube_cuff::tube_cuff;
pub use wire_contact::wire_contact;

use crate::error::Result;
use crate::template::TemplateTable;

/// Registers every built-in template.
///
/// # Errors
///
/// Propagates template-definition failures, such as malformed default
/// expressions or duplicate labels. These are authoring bugs and surface
/// at initialization.
pub fn standard_templates() -> Result<TemplateTable> {
    let mut table = TemplateTable::new();
    table.register(tube_cuff()?)?;
    table.register(ribbon_contact()?)?;
    table.register(wire_contact()?)?;
    table.register(circle_contact()?)?;
    table.register(helical_cuff()?)?;
    table.register(rectangle_contact()?)?;
    table.register(cuff_fill()?)?;
    Ok(table)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn all_templates_register() {
        let table = standard_templates().unwrap();
        for name in [
            "TubeCuff",
            "RibbonContact",
            "WireContact",
            "CircleContact",
            "HelicalCuffnContact",
            "RectangleContact",
            "CuffFill",
        ] {
            assert!(table.get(name).is_ok(), "{name} missing");
        }
    }
}
