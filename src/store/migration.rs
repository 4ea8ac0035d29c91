//! Metadata store migrations

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20240601_000001_create_file_records::Migration)]
    }
}

mod m20240601_000001_create_file_records {
    use super::*;

    #[derive(DeriveMigrationName)]
    pub struct Migration;

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(FileRecords::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(FileRecords::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(FileRecords::ContentHash)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(FileRecords::FileName).string().not_null())
                        .col(
                            ColumnDef::new(FileRecords::FileSizeBytes)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(FileRecords::Tags).json())
                        .col(ColumnDef::new(FileRecords::SourceId).string().not_null())
                        .col(
                            ColumnDef::new(FileRecords::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FileRecords::ModifiedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_file_records_source_id")
                        .table(FileRecords::Table)
                        .col(FileRecords::SourceId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(FileRecords::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum FileRecords {
        Table,
        Id,
        ContentHash,
        FileName,
        FileSizeBytes,
        Tags,
        SourceId,
        CreatedAt,
        ModifiedAt,
    }
}
