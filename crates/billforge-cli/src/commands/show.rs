//! Show command implementation.

use crate::cli::ShowArgs;
use crate::error::Result;
use crate::session::Session;
use billforge_domain::traits::ArtifactStore;

/// Execute the show command.
pub fn execute_show(args: ShowArgs, session: &Session) -> Result<()> {
    let artifact = session.store()?.load(&args.name)?;
    println!("{}", session.formatter.format_artifact(&artifact, args.truth)?);
    Ok(())
}
