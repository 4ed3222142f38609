use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Partial unique index: only one row may carry `is_active = true`.
const SINGLE_ACTIVE_DAY_INDEX: &str = "CREATE UNIQUE INDEX IF NOT EXISTS ux_event_days_single_active \
     ON event_days (is_active) WHERE is_active";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create users table
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(big_integer(Users::UserId).primary_key())
                    .col(string(Users::LastName))
                    .col(string(Users::FirstName))
                    .col(string_null(Users::MiddleName))
                    .col(string(Users::GroupName))
                    .col(timestamp_with_time_zone(Users::RegisteredAt))
                    .to_owned(),
            )
            .await?;

        // Create event_days table
        manager
            .create_table(
                Table::create()
                    .table(EventDays::Table)
                    .if_not_exists()
                    .col(integer(EventDays::DayNumber).primary_key())
                    .col(string(EventDays::Code).unique_key())
                    .col(boolean(EventDays::IsActive).default(false))
                    .col(timestamp_with_time_zone(EventDays::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(SINGLE_ACTIVE_DAY_INDEX)
            .await?;

        // Create attendance table, one row per (user, day)
        manager
            .create_table(
                Table::create()
                    .table(Attendance::Table)
                    .if_not_exists()
                    .col(big_integer(Attendance::UserId))
                    .col(integer(Attendance::DayNumber))
                    .col(timestamp_with_time_zone(Attendance::MarkedAt))
                    .primary_key(
                        Index::create()
                            .name("pk_attendance")
                            .col(Attendance::UserId)
                            .col(Attendance::DayNumber),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_attendance_user")
                            .from(Attendance::Table, Attendance::UserId)
                            .to(Users::Table, Users::UserId)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_attendance_day")
                            .from(Attendance::Table, Attendance::DayNumber)
                            .to(EventDays::Table, EventDays::DayNumber)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_attendance_day")
                    .table(Attendance::Table)
                    .col(Attendance::DayNumber)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Attendance::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(EventDays::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    UserId,
    LastName,
    FirstName,
    MiddleName,
    GroupName,
    RegisteredAt,
}

#[derive(DeriveIden)]
enum EventDays {
    Table,
    DayNumber,
    Code,
    IsActive,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Attendance {
    Table,
    UserId,
    DayNumber,
    MarkedAt,
}
