//! BillForge Generation Pipeline
//!
//! Builds a labeled billing artifact through dependent phases, each owning
//! one fragment and each able to fall back to a deterministic stub:
//!
//! ```text
//! Identity ─▶ Clinical ─▶ Coding ─▶ Financial ─▶ Reconciliation ─▶ Sentinel ─▶ Publish ─▶ (Review)
//!  facility    narrative   codes     lines and     deterministic      verify/     document   oracle
//!  + NPIs      + dates     + tracks  totals        invariants         repair      projection notes
//! ```
//!
//! Identifiers, prices and totals are always computed; the oracle only
//! supplies names, narrative text and proposed codes, and every fragment it
//! returns is checked before use.
//!
//! # Example
//!
//! ```no_run
//! use billforge_generator::{Generator, GeneratorConfig};
//! use billforge_llm::{OllamaProvider, Oracle};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let generator = Generator::new(GeneratorConfig::default())?
//!     .with_oracle(Oracle::new(OllamaProvider::default_endpoint("llama3")));
//!
//! let generation = generator.generate("duplicate").await?;
//! println!("{}", generation.to_json()?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod clinical;
mod coding;
mod config;
mod error;
mod financial;
mod identity;
mod phase;
mod pipeline;
mod prompt;
mod publish;
mod review;

pub use config::GeneratorConfig;
pub use error::GeneratorError;
pub use phase::stage;
pub use pipeline::{Generation, Generator};
pub use publish::document_for;
