//! HTTP layer: routes, handlers, middleware and the OpenAPI document.
//!
//! Handlers stay thin. They validate input, pull the caller from the
//! request extensions and hand off to the services in [`AppState`].

pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use routes::create_router;
pub use state::AppState;
