pub mod ads;
pub mod validation;

pub use ads::{AdService, ArchiveReport};
