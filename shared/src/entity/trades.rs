//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "trades")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub bot_id: i64,
    pub symbol: String,
    pub timeframe: String,
    pub market_type: String, // "spot", "futures", "inverse"
    pub side: String,        // "BUY" or "SELL"
    pub status: String,      // "PENDING", "OPEN", "CLOSED", "FAILED"
    #[sea_orm(column_type = "Decimal(Some((28, 12)))", nullable)]
    pub quantity: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((28, 12)))", nullable)]
    pub entry_price: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((28, 12)))", nullable)]
    pub exit_price: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((28, 12)))", nullable)]
    pub stop_loss: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((28, 12)))", nullable)]
    pub take_profit: Option<Decimal>,
    pub leverage: i32,
    /// Open time (epoch ms) of the candle the entry signal fired on
    pub candle_open_time: i64,
    #[sea_orm(nullable)]
    pub exchange_order_id: Option<String>,
    #[sea_orm(nullable)]
    pub quota_unit: Option<String>, // "free_trade" or "coin"
    pub quota_consumed: bool,
    #[sea_orm(column_type = "Text", nullable)]
    pub signal_reason: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub opened_at: Option<DateTimeUtc>,
    pub closed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::bots::Entity",
        from = "Column::BotId",
        to = "super::bots::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Bots,
}

impl Related<super::bots::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bots.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
