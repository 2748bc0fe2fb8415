use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserQuotas::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(UserQuotas::UserId).big_integer().not_null().primary_key())
                    .col(ColumnDef::new(UserQuotas::FreeTrades).integer().not_null().default(0))
                    .col(ColumnDef::new(UserQuotas::CoinBalance).integer().not_null().default(0))
                    .col(ColumnDef::new(UserQuotas::AutoTradingEnabled).boolean().not_null().default(false))
                    .col(ColumnDef::new(UserQuotas::UpdatedAt).timestamp().default(Expr::cust("CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP")))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ExchangeWallets::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ExchangeWallets::Id).big_integer().auto_increment().primary_key())
                    .col(ColumnDef::new(ExchangeWallets::UserId).big_integer().not_null())
                    .col(ColumnDef::new(ExchangeWallets::Exchange).string().not_null().default("binance"))
                    .col(ColumnDef::new(ExchangeWallets::ApiKey).text().not_null())
                    .col(ColumnDef::new(ExchangeWallets::ApiSecret).text().not_null())
                    .col(ColumnDef::new(ExchangeWallets::IsActive).boolean().not_null().default(true))
                    .col(ColumnDef::new(ExchangeWallets::CreatedAt).timestamp().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .index(
                        Index::create()
                            .name("idx_wallets_user_exchange")
                            .table(ExchangeWallets::Table)
                            .col(ExchangeWallets::UserId)
                            .col(ExchangeWallets::Exchange),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LegacyApiKeys::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(LegacyApiKeys::Id).big_integer().auto_increment().primary_key())
                    .col(ColumnDef::new(LegacyApiKeys::UserId).big_integer().not_null())
                    .col(ColumnDef::new(LegacyApiKeys::ApiKey).text().not_null())
                    .col(ColumnDef::new(LegacyApiKeys::ApiSecret).text().not_null())
                    .col(ColumnDef::new(LegacyApiKeys::CreatedAt).timestamp().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .index(
                        Index::create()
                            .name("idx_legacy_keys_user")
                            .table(LegacyApiKeys::Table)
                            .col(LegacyApiKeys::UserId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Scripts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Scripts::Id).big_integer().auto_increment().primary_key())
                    .col(ColumnDef::new(Scripts::UserId).big_integer().not_null())
                    .col(ColumnDef::new(Scripts::Name).string().not_null())
                    .col(ColumnDef::new(Scripts::Content).text().not_null())
                    .col(ColumnDef::new(Scripts::CreatedAt).timestamp().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .col(ColumnDef::new(Scripts::UpdatedAt).timestamp().default(Expr::cust("CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP")))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Bots::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Bots::Id).big_integer().auto_increment().primary_key())
                    .col(ColumnDef::new(Bots::UserId).big_integer().not_null())
                    .col(ColumnDef::new(Bots::ScriptId).big_integer().not_null())
                    .col(ColumnDef::new(Bots::Name).string().not_null())
                    .col(ColumnDef::new(Bots::Symbol).string().not_null())
                    .col(ColumnDef::new(Bots::Timeframe).string().not_null())
                    .col(ColumnDef::new(Bots::MarketType).string().not_null().default("spot"))
                    .col(ColumnDef::new(Bots::Leverage).integer().not_null().default(1))
                    .col(ColumnDef::new(Bots::IsActive).boolean().not_null().default(true))
                    .col(ColumnDef::new(Bots::CreatedAt).timestamp().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .index(
                        Index::create()
                            .name("idx_bots_active")
                            .table(Bots::Table)
                            .col(Bots::IsActive),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_bots_script")
                            .from(Bots::Table, Bots::ScriptId)
                            .to(Scripts::Table, Scripts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // bot_id NULL holds a user-wide override
        manager
            .create_table(
                Table::create()
                    .table(BotSettings::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(BotSettings::Id).big_integer().auto_increment().primary_key())
                    .col(ColumnDef::new(BotSettings::UserId).big_integer().not_null())
                    .col(ColumnDef::new(BotSettings::BotId).big_integer().null())
                    .col(ColumnDef::new(BotSettings::Symbol).string().null())
                    .col(ColumnDef::new(BotSettings::Timeframe).string().null())
                    .col(ColumnDef::new(BotSettings::MarketType).string().null())
                    .col(ColumnDef::new(BotSettings::Leverage).integer().null())
                    .col(ColumnDef::new(BotSettings::UpdatedAt).timestamp().default(Expr::cust("CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP")))
                    .index(
                        Index::create()
                            .name("idx_bot_settings_user")
                            .table(BotSettings::Table)
                            .col(BotSettings::UserId)
                            .col(BotSettings::BotId),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BotSettings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Bots::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Scripts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LegacyApiKeys::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ExchangeWallets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserQuotas::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UserQuotas {
    Table,
    UserId,
    FreeTrades,
    CoinBalance,
    AutoTradingEnabled,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ExchangeWallets {
    Table,
    Id,
    UserId,
    Exchange,
    ApiKey,
    ApiSecret,
    IsActive,
    CreatedAt,
}

#[derive(DeriveIden)]
enum LegacyApiKeys {
    Table,
    Id,
    UserId,
    ApiKey,
    ApiSecret,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Scripts {
    Table,
    Id,
    UserId,
    Name,
    Content,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Bots {
    Table,
    Id,
    UserId,
    ScriptId,
    Name,
    Symbol,
    Timeframe,
    MarketType,
    Leverage,
    IsActive,
    CreatedAt,
}

#[derive(DeriveIden)]
enum BotSettings {
    Table,
    Id,
    UserId,
    BotId,
    Symbol,
    Timeframe,
    MarketType,
    Leverage,
    UpdatedAt,
}
