//! All database logic for the match coordinator lives in this module,
//! grounded on the teacher's `db/mod.rs`/`db/game.rs` (a `Pool` wrapping
//! `sqlx::sqlite::SqlitePool`, a `Connection` type alias, `query!`-style
//! calls). Unlike the teacher's single-table game writes, this crate's
//! `log_game_atomically` (§1) must wrap four tables in one transaction,
//! so that is this module's own responsibility rather than a pattern
//! copied verbatim.

pub mod sqlite;

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{Sqlite, SqlitePool};

#[derive(Clone)]
pub struct Pool(pub sqlx::pool::Pool<Sqlite>);

pub type Connection = PoolConnection<Sqlite>;

impl Pool {
    pub async fn new(database_path: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePool::connect(database_path).await?;
        Ok(Pool(pool))
    }

    pub async fn conn(&self) -> Result<Connection, sqlx::Error> {
        self.0.acquire().await
    }
}
