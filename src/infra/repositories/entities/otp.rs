use sea_orm::entity::prelude::*;

use crate::domain::Otp;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "otps")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub email: String,
    pub code_hash: String,
    pub purpose: String,
    pub attempts: i32,
    pub expires_at: DateTimeUtc,
    pub consumed_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Otp {
    fn from(model: Model) -> Self {
        Otp {
            id: model.id,
            email: model.email,
            code_hash: model.code_hash,
            purpose: model.purpose,
            attempts: model.attempts,
            expires_at: model.expires_at,
            consumed_at: model.consumed_at,
            created_at: model.created_at,
        }
    }
}
