pub mod cli;
pub mod config;
pub mod database_ops;
pub mod logging;
pub mod sql_queries;
pub mod transform;

pub mod util {
    pub mod env;
}

pub use config::WarehouseConfig;
pub use database_ops::db::Db;
