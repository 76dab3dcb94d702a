//! Parameterized Postgres statements. Identifiers come from the resolved model; values are always bound.

mod builder;
mod params;

pub use builder::*;
pub use params::PgBindValue;
