use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Trades::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Trades::Id).big_integer().auto_increment().primary_key())
                    .col(ColumnDef::new(Trades::UserId).big_integer().not_null())
                    .col(ColumnDef::new(Trades::BotId).big_integer().not_null())
                    .col(ColumnDef::new(Trades::Symbol).string().not_null())
                    .col(ColumnDef::new(Trades::Timeframe).string().not_null())
                    .col(ColumnDef::new(Trades::MarketType).string().not_null())
                    .col(ColumnDef::new(Trades::Side).string().not_null()) // "BUY" or "SELL"
                    .col(ColumnDef::new(Trades::Status).string().not_null().default("PENDING"))
                    .col(ColumnDef::new(Trades::Quantity).decimal_len(28, 12).null())
                    .col(ColumnDef::new(Trades::EntryPrice).decimal_len(28, 12).null())
                    .col(ColumnDef::new(Trades::ExitPrice).decimal_len(28, 12).null())
                    .col(ColumnDef::new(Trades::StopLoss).decimal_len(28, 12).null())
                    .col(ColumnDef::new(Trades::TakeProfit).decimal_len(28, 12).null())
                    .col(ColumnDef::new(Trades::Leverage).integer().not_null().default(1))
                    .col(ColumnDef::new(Trades::CandleOpenTime).big_integer().not_null())
                    .col(ColumnDef::new(Trades::ExchangeOrderId).string().null())
                    .col(ColumnDef::new(Trades::QuotaUnit).string().null())
                    .col(ColumnDef::new(Trades::QuotaConsumed).boolean().not_null().default(false))
                    .col(ColumnDef::new(Trades::SignalReason).text().null())
                    .col(ColumnDef::new(Trades::ErrorMessage).text().null())
                    .col(ColumnDef::new(Trades::CreatedAt).timestamp().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .col(ColumnDef::new(Trades::UpdatedAt).timestamp().default(Expr::cust("CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP")))
                    .col(ColumnDef::new(Trades::OpenedAt).timestamp().null())
                    .col(ColumnDef::new(Trades::ClosedAt).timestamp().null())
                    // Duplicate-candle guard and active-trade lookups
                    .index(
                        Index::create()
                            .name("idx_trades_instance_candle")
                            .table(Trades::Table)
                            .col(Trades::UserId)
                            .col(Trades::BotId)
                            .col(Trades::Symbol)
                            .col(Trades::CandleOpenTime),
                    )
                    .index(
                        Index::create()
                            .name("idx_trades_user_status")
                            .table(Trades::Table)
                            .col(Trades::UserId)
                            .col(Trades::Status),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_trades_bot")
                            .from(Trades::Table, Trades::BotId)
                            .to(Bots::Table, Bots::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Signals::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Signals::Id).big_integer().auto_increment().primary_key())
                    .col(ColumnDef::new(Signals::UserId).big_integer().not_null())
                    .col(ColumnDef::new(Signals::BotId).big_integer().not_null())
                    .col(ColumnDef::new(Signals::Symbol).string().not_null())
                    .col(ColumnDef::new(Signals::Timeframe).string().not_null())
                    .col(ColumnDef::new(Signals::Action).string().not_null())
                    .col(ColumnDef::new(Signals::Price).decimal_len(28, 12).not_null())
                    .col(ColumnDef::new(Signals::StopLoss).decimal_len(28, 12).null())
                    .col(ColumnDef::new(Signals::TakeProfit).decimal_len(28, 12).null())
                    .col(ColumnDef::new(Signals::Reason).text().not_null())
                    .col(ColumnDef::new(Signals::Status).string().not_null()) // "executed", "skipped", "failed"
                    .col(ColumnDef::new(Signals::Detail).text().null())
                    .col(ColumnDef::new(Signals::TradeId).big_integer().null())
                    .col(ColumnDef::new(Signals::CandleOpenTime).big_integer().not_null())
                    .col(ColumnDef::new(Signals::IndicatorValues).text().null())
                    .col(ColumnDef::new(Signals::CreatedAt).timestamp().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .index(
                        Index::create()
                            .name("idx_signals_bot_created")
                            .table(Signals::Table)
                            .col(Signals::BotId)
                            .col(Signals::CreatedAt),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Signals::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Trades::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Trades {
    Table,
    Id,
    UserId,
    BotId,
    Symbol,
    Timeframe,
    MarketType,
    Side,
    Status,
    Quantity,
    EntryPrice,
    ExitPrice,
    StopLoss,
    TakeProfit,
    Leverage,
    CandleOpenTime,
    ExchangeOrderId,
    QuotaUnit,
    QuotaConsumed,
    SignalReason,
    ErrorMessage,
    CreatedAt,
    UpdatedAt,
    OpenedAt,
    ClosedAt,
}

#[derive(DeriveIden)]
enum Signals {
    Table,
    Id,
    UserId,
    BotId,
    Symbol,
    Timeframe,
    Action,
    Price,
    StopLoss,
    TakeProfit,
    Reason,
    Status,
    Detail,
    TradeId,
    CandleOpenTime,
    IndicatorValues,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Bots {
    Table,
    Id,
}
