//! Create friend table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Friend::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Friend::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Friend::UserId).string().not_null())
                    .col(ColumnDef::new(Friend::FriendId).string().not_null())
                    .col(
                        ColumnDef::new(Friend::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_friend_user")
                            .from(Friend::Table, Friend::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One edge per (owner, friend) pair keeps the mirror upsert idempotent
        manager
            .create_index(
                Index::create()
                    .name("idx_friend_user_friend")
                    .table(Friend::Table)
                    .col(Friend::UserId)
                    .col(Friend::FriendId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Friend::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Friend {
    Table,
    Id,
    UserId,
    FriendId,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
