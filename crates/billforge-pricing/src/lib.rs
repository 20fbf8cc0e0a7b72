//! BillForge Pricing Resolver
//!
//! Turns procedure codes into money. Two operations:
//!
//! - [`PricingResolver::resolve_rate`]: a reference rate for a code, looked
//!   up through cache → benchmark table → oracle, with a per-prefix default
//!   when everything else fails. Total: it never errors and never returns a
//!   non-finite or non-positive rate.
//! - [`billed_price`]: the price a facility puts on the bill, derived from the
//!   reference rate by payer, region and modifier multipliers. Pure.
//!
//! The cache is injected and explicitly owned. Clone the [`RateCache`] handle
//! to share it between resolvers.

#![warn(missing_docs)]

pub mod cache;
pub mod error;
pub mod factors;
pub mod resolver;
pub mod table;

pub use cache::RateCache;
pub use error::PricingError;
pub use factors::{
    billed_price, locality_reference, modifier_factor, payer_factor, region_factor, Location,
    PayerFactor, GOUGING_MULTIPLIER, METRO_BONUS,
};
pub use resolver::{default_rate_for, PricingResolver, RateQuote, RateSource};
pub use table::BenchmarkTable;
