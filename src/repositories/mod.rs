//! SQL access. Every function takes any SQLite executor so the same query
//! runs against the pool or inside an open transaction.

pub mod ads;
pub mod categories;
pub mod files;
pub mod users;
pub mod wishlist;

#[cfg(test)]
pub(crate) async fn test_pool() -> (crate::database::DbPool, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("test.db").display());
    let pool = crate::database::create_pool(&url).await.unwrap();
    (pool, dir)
}
