//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;

/// Per-user overrides layered over a bot's own settings. A row without `bot_id` applies to
/// every bot of the user; a bot-specific row wins over it.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "bot_settings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    #[sea_orm(nullable)]
    pub bot_id: Option<i64>,
    #[sea_orm(nullable)]
    pub symbol: Option<String>,
    #[sea_orm(nullable)]
    pub timeframe: Option<String>,
    #[sea_orm(nullable)]
    pub market_type: Option<String>,
    #[sea_orm(nullable)]
    pub leverage: Option<i32>,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
