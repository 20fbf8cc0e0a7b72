//! Scenarios command implementation.

use crate::error::Result;
use crate::output::Formatter;

/// Execute the scenarios command.
pub fn execute_scenarios(formatter: &Formatter) -> Result<()> {
    println!("{}", formatter.format_scenarios()?);
    Ok(())
}
