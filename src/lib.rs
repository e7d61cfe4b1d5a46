//! Academic records engine: a grade ledger with referential integrity,
//! pure aggregate statistics over it, and the filter/sort layer the dashboard
//! views are built from.

pub mod backup;
pub mod calc;
pub mod config;
pub mod db;
pub mod error;
pub mod insight;
pub mod ipc;
pub mod ledger;
pub mod model;
pub mod query;
pub mod seed;
