pub mod archiver;
pub mod reconcile;
