//! Route table plus the fixed operational and documentation routes.

mod common;
mod docs;
pub mod table;

pub use common::common_routes;
pub use docs::docs_routes;
pub use table::{Action, Lookup, PathPattern, RouteDescriptor, RouteMatch, RouteTable, ShapeRef};
