pub mod ad;
pub mod file;
pub mod user;
