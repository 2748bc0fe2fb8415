//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;

/// Audit log of every actionable signal and what became of it
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "signals")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub bot_id: i64,
    pub symbol: String,
    pub timeframe: String,
    pub action: String, // "BUY", "SELL", "CLOSE"
    #[sea_orm(column_type = "Decimal(Some((28, 12)))")]
    pub price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((28, 12)))", nullable)]
    pub stop_loss: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((28, 12)))", nullable)]
    pub take_profit: Option<Decimal>,
    #[sea_orm(column_type = "Text")]
    pub reason: String,
    pub status: String, // "executed", "skipped", "failed"
    #[sea_orm(column_type = "Text", nullable)]
    pub detail: Option<String>,
    #[sea_orm(nullable)]
    pub trade_id: Option<i64>,
    pub candle_open_time: i64,
    #[sea_orm(column_type = "Text", nullable)]
    pub indicator_values: Option<String>, // JSON snapshot, e.g. {"rsi(14)": 30.5}
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
