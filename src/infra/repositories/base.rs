//! Query helpers shared by every repository.
//!
//! Queries are written once against `ConnectionTrait` so the pooled stores
//! and the transaction-bound repositories run the same SQL.

use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait, Select};

use crate::errors::AppResult;
use crate::types::PaginationParams;

/// Fetch one page of `select` plus the total row count.
pub(crate) async fn fetch_page<E, C>(
    select: Select<E>,
    db: &C,
    params: &PaginationParams,
) -> AppResult<(Vec<E::Model>, u64)>
where
    E: EntityTrait,
    E::Model: Send + Sync,
    C: ConnectionTrait,
{
    let paginator = select.paginate(db, params.limit());
    let total = paginator.num_items().await?;
    let data = paginator.fetch_page(params.page.saturating_sub(1)).await?;
    Ok((data, total))
}

/// `true` when `db` is Postgres, where row locks are available.
pub(crate) fn supports_row_locks<C: ConnectionTrait>(db: &C) -> bool {
    matches!(db.get_database_backend(), sea_orm::DatabaseBackend::Postgres)
}
