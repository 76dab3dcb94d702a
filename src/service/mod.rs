//! CrudService: generic CRUD over the persistence collaborator.

mod crud;
pub use crud::{derived_values, parse_id, CrudService};
