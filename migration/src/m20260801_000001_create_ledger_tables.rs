use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Accounts::UserId)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Accounts::DisplayName)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Accounts::Product).string_len(64).null())
                    .col(
                        ColumnDef::new(Accounts::AllTimeReceived)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Accounts::AllTimeGiven)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Accounts::DailyReceived)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Accounts::DailyGiven)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Accounts::WeeklyReceived)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Accounts::WeeklyGiven)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Accounts::MonthlyReceived)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Accounts::MonthlyGiven)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Accounts::LastDailyReset).date().null())
                    .col(ColumnDef::new(Accounts::LastWeeklyReset).date().null())
                    .col(ColumnDef::new(Accounts::LastMonthlyReset).date().null())
                    .col(
                        ColumnDef::new(Accounts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Accounts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PendingTransfers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PendingTransfers::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PendingTransfers::RecipientId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PendingTransfers::SenderId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PendingTransfers::SenderName)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PendingTransfers::Amount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PendingTransfers::Note)
                            .string_len(512)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PendingTransfers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_pending_transfers_recipient")
                            .from(PendingTransfers::Table, PendingTransfers::RecipientId)
                            .to(Accounts::Table, Accounts::UserId)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_pending_transfers_sender")
                            .from(PendingTransfers::Table, PendingTransfers::SenderId)
                            .to(Accounts::Table, Accounts::UserId)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_pending_transfers_recipient")
                    .table(PendingTransfers::Table)
                    .col(PendingTransfers::RecipientId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ActivityEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ActivityEntries::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ActivityEntries::AccountId)
                            .string_len(64)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ActivityEntries::Message)
                            .string_len(512)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ActivityEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_activity_entries_account")
                            .from(ActivityEntries::Table, ActivityEntries::AccountId)
                            .to(Accounts::Table, Accounts::UserId)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_activity_entries_account")
                    .table(ActivityEntries::Table)
                    .col(ActivityEntries::AccountId)
                    .col(ActivityEntries::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ActivityEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PendingTransfers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Accounts {
    Table,
    UserId,
    DisplayName,
    Product,
    AllTimeReceived,
    AllTimeGiven,
    DailyReceived,
    DailyGiven,
    WeeklyReceived,
    WeeklyGiven,
    MonthlyReceived,
    MonthlyGiven,
    LastDailyReset,
    LastWeeklyReset,
    LastMonthlyReset,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum PendingTransfers {
    Table,
    Id,
    RecipientId,
    SenderId,
    SenderName,
    Amount,
    Note,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ActivityEntries {
    Table,
    Id,
    AccountId,
    Message,
    CreatedAt,
}
