//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;

/// A strategy instance: one script bound to a symbol, timeframe and market
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "bots")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub script_id: i64,
    pub name: String,
    pub symbol: String,
    pub timeframe: String,
    pub market_type: String,
    pub leverage: i32,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::scripts::Entity",
        from = "Column::ScriptId",
        to = "super::scripts::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Scripts,
    #[sea_orm(has_many = "super::trades::Entity")]
    Trades,
}

impl Related<super::scripts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Scripts.def()
    }
}

impl Related<super::trades::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Trades.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
