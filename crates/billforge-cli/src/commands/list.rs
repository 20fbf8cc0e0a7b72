//! List command implementation.

use crate::error::Result;
use crate::output::Listing;
use crate::session::Session;
use billforge_domain::traits::ArtifactStore;
use tracing::warn;

/// Execute the list command.
pub fn execute_list(session: &Session) -> Result<()> {
    let store = session.store()?;
    let listings: Vec<Listing> = store
        .list()?
        .into_iter()
        .map(|name| {
            let artifact = match store.load(&name) {
                Ok(artifact) => Some(artifact),
                Err(e) => {
                    warn!("Skipping '{}': {}", name, e);
                    None
                }
            };
            Listing { name, artifact }
        })
        .collect();

    println!("{}", session.formatter.format_listing(&listings)?);
    Ok(())
}
