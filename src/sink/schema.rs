//! Destination table definition using sea-query.
//!
//! Every project writes to its own table with the same columns; the table
//! name is only known at runtime, so it is passed as an alias.

use sea_query::{Alias, ColumnDef, InsertStatement, Query, Table, TableCreateStatement};

use super::MetricRecord;

/// Columns of a destination table.
#[derive(sea_query::Iden)]
pub enum UpdateMetrics {
    #[iden = "id"]
    Id,
    #[iden = "project_name"]
    ProjectName,
    #[iden = "table_name"]
    TableName,
    #[iden = "update_count"]
    UpdateCount,
    #[iden = "last_updated"]
    LastUpdated,
    #[iden = "top_user"]
    TopUser,
    #[iden = "top_user_count"]
    TopUserCount,
    #[iden = "total_users"]
    TotalUsers,
    #[iden = "detected_timestamp"]
    DetectedTimestamp,
    #[iden = "day"]
    Day,
    #[iden = "weekday"]
    Weekday,
    #[iden = "month"]
    Month,
}

/// `CREATE TABLE IF NOT EXISTS` for a destination.
pub fn create_destination_table(destination: &str) -> TableCreateStatement {
    Table::create()
        .table(Alias::new(destination))
        .if_not_exists()
        .col(
            ColumnDef::new(UpdateMetrics::Id)
                .integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(ColumnDef::new(UpdateMetrics::ProjectName).string_len(255).not_null())
        .col(ColumnDef::new(UpdateMetrics::TableName).string_len(255).not_null())
        .col(ColumnDef::new(UpdateMetrics::UpdateCount).integer().not_null())
        .col(ColumnDef::new(UpdateMetrics::LastUpdated).timestamp())
        .col(ColumnDef::new(UpdateMetrics::TopUser).string_len(255))
        .col(ColumnDef::new(UpdateMetrics::TopUserCount).integer())
        .col(ColumnDef::new(UpdateMetrics::TotalUsers).integer().not_null())
        .col(ColumnDef::new(UpdateMetrics::DetectedTimestamp).timestamp())
        .col(ColumnDef::new(UpdateMetrics::Day).date())
        .col(ColumnDef::new(UpdateMetrics::Weekday).integer())
        .col(ColumnDef::new(UpdateMetrics::Month).integer())
        .to_owned()
}

/// `INSERT` of one record into a destination.
pub fn insert_metric(destination: &str, record: &MetricRecord) -> InsertStatement {
    Query::insert()
        .into_table(Alias::new(destination))
        .columns([
            UpdateMetrics::ProjectName,
            UpdateMetrics::TableName,
            UpdateMetrics::UpdateCount,
            UpdateMetrics::LastUpdated,
            UpdateMetrics::TopUser,
            UpdateMetrics::TopUserCount,
            UpdateMetrics::TotalUsers,
            UpdateMetrics::DetectedTimestamp,
            UpdateMetrics::Day,
            UpdateMetrics::Weekday,
            UpdateMetrics::Month,
        ])
        .values_panic([
            record.project_name.clone().into(),
            record.table_name.clone().into(),
            record.update_count.into(),
            record.last_updated.clone().into(),
            record.top_user.clone().into(),
            record.top_user_count.into(),
            record.total_users.into(),
            record.detected_timestamp.clone().into(),
            record.day.clone().into(),
            record.weekday.into(),
            record.month.into(),
        ])
        .to_owned()
}
