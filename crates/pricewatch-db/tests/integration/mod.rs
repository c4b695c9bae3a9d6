pub mod common;
mod connection_tests;
mod item_tests;
mod ledger_tests;
