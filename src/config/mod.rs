//! Resource definitions: serde types, validation, resolution into the runtime model.

pub mod loader;
pub mod resolved;
pub mod types;
pub mod validator;

pub use loader::{load_from_path, resolve};
pub use resolved::*;
pub use types::*;
pub use validator::validate;
