//! Request and response types shared by the API and the repositories.

mod pagination;
mod response;

pub use pagination::{
    Paginated, PaginatedExpenses, PaginatedUsers, PaginationMeta, PaginationParams,
};
pub use response::{Accepted, Created, MessageResponse, NoContent};
