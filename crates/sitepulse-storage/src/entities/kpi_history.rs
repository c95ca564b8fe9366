use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "kpi_history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub project_id: String,
    pub kpi_id: String,
    pub value: f64,
    pub target: f64,
    pub status: String,
    pub source: String,
    pub recorded_at: DateTimeWithTimeZone,
    pub period_start: DateTimeWithTimeZone,
    pub period_end: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
