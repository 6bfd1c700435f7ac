//! Database adapters.

pub mod mysql;

pub use mysql::MySqlAccountStore;
