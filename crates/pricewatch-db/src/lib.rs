pub mod config;
pub mod connections;
pub mod database;
pub mod item_repository;
pub mod ledger_repository;

pub use config::DatabaseConfig;
pub use connections::Connections;
pub use database::Database;
pub use item_repository::ItemRepository;
pub use ledger_repository::LedgerRepository;
