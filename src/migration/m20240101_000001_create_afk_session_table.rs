use sea_orm_migration::prelude::*;

/// Creates the `afk_session` table.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AfkSession::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(AfkSession::Id).text().not_null().primary_key())
                    .col(ColumnDef::new(AfkSession::Name).text().not_null())
                    .col(
                        ColumnDef::new(AfkSession::TotalAfkTimeMs)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(AfkSession::TotalRewards)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(AfkSession::LastRewardAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AfkSession::LastRewardName)
                            .text()
                            .not_null()
                            .default("None"),
                    )
                    .col(
                        ColumnDef::new(AfkSession::RewardsDisabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(AfkSession::RewardTier)
                            .text()
                            .not_null()
                            .default("default"),
                    )
                    .col(ColumnDef::new(AfkSession::RewardsByType).binary().not_null())
                    .col(
                        ColumnDef::new(AfkSession::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AfkSession::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AfkSession {
    Table,
    Id,
    Name,
    TotalAfkTimeMs,
    TotalRewards,
    LastRewardAt,
    LastRewardName,
    RewardsDisabled,
    RewardTier,
    RewardsByType,
    UpdatedAt,
}
