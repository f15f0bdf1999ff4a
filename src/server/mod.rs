pub mod route_builder;

pub use route_builder::{build_state, build_storages, register_routes};
