//! Password reset codes. Every operation runs inside a transaction, so
//! there is no pooled store.

use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use super::entities::otp::{self, ActiveModel, Entity as OtpEntity};
use crate::domain::{NewOtp, Otp};
use crate::errors::AppResult;

/// Mark every outstanding code for `email` as consumed.
pub(crate) async fn consume_outstanding<C: ConnectionTrait>(
    db: &C,
    email: &str,
    purpose: &str,
    now: DateTime<Utc>,
) -> AppResult<u64> {
    let result = OtpEntity::update_many()
        .col_expr(otp::Column::ConsumedAt, Expr::value(Some(now)))
        .filter(otp::Column::Email.eq(email))
        .filter(otp::Column::Purpose.eq(purpose))
        .filter(otp::Column::ConsumedAt.is_null())
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

pub(crate) async fn create<C: ConnectionTrait>(db: &C, new_otp: NewOtp) -> AppResult<Otp> {
    let active_model = ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(new_otp.email),
        code_hash: Set(new_otp.code_hash),
        purpose: Set(new_otp.purpose),
        attempts: Set(0),
        expires_at: Set(new_otp.expires_at),
        consumed_at: Set(None),
        created_at: Set(Utc::now()),
    };

    let model = active_model.insert(db).await?;
    Ok(Otp::from(model))
}

/// Most recent unconsumed code for `email`
pub(crate) async fn latest_outstanding<C: ConnectionTrait>(
    db: &C,
    email: &str,
    purpose: &str,
) -> AppResult<Option<Otp>> {
    let result = OtpEntity::find()
        .filter(otp::Column::Email.eq(email))
        .filter(otp::Column::Purpose.eq(purpose))
        .filter(otp::Column::ConsumedAt.is_null())
        .order_by_desc(otp::Column::CreatedAt)
        .one(db)
        .await?;

    Ok(result.map(Otp::from))
}

pub(crate) async fn record_attempt<C: ConnectionTrait>(db: &C, id: Uuid) -> AppResult<()> {
    OtpEntity::update_many()
        .col_expr(otp::Column::Attempts, Expr::col(otp::Column::Attempts).add(1))
        .filter(otp::Column::Id.eq(id))
        .exec(db)
        .await?;

    Ok(())
}

pub(crate) async fn consume<C: ConnectionTrait>(db: &C, id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
    OtpEntity::update_many()
        .col_expr(otp::Column::ConsumedAt, Expr::value(Some(now)))
        .filter(otp::Column::Id.eq(id))
        .exec(db)
        .await?;

    Ok(())
}
