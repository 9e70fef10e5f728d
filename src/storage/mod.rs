//! The embedded relational store: schema, migrations, and one repository
//! method set per entity from `spec.md` §3. A thin wrapper over
//! `rusqlite` in WAL mode, matching the original's single
//! `*sql.DB` + prepared statements, adapted to Rust's single-writer
//! discipline with a `Mutex<Connection>`.

mod sqlite;

pub use sqlite::Store;
