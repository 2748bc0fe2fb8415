//! `SeaORM` entities for the tables the engine reads and writes

pub mod bot_settings;
pub mod bots;
pub mod exchange_wallets;
pub mod legacy_api_keys;
pub mod scripts;
pub mod signals;
pub mod trades;
pub mod user_quotas;
