//! Converting a notebook between text formats.
//!
//! Run with: cargo run --example convert

use nbtext::{convert, detect_format, from_str, metadata, to_string, Cell, Format, Notebook};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    let notebook = Notebook::new(vec![
        Cell::markdown("# Analysis\n\nA short *example*."),
        Cell::code("import math\nmath.sqrt(2)"),
        Cell::code("%timeit math.sqrt(2)").with_metadata(metadata!({"tags": ["timing"]})),
    ]);

    // Write the notebook as a percent script
    let percent = to_string(&notebook, "py:percent")?;
    println!("py:percent output:\n{}", percent);

    // The format is recognized from the content
    let fmt = detect_format(&percent, ".py");
    println!("Detected format: {}\n", fmt);

    // Read back, and check the cells survived
    let back = from_str(&percent, "py:percent")?;
    for (cell, original) in back.cells.iter().zip(&notebook.cells) {
        assert_eq!(cell.source, original.source);
    }
    println!("✓ Round-trip successful\n");

    // Percent to Markdown in one call
    let markdown = convert(&percent, &Format::new(".py"), &"md".parse()?)?;
    println!("md output:\n{}", markdown);

    Ok(())
}
