/*
 * Responsibility
 * - Public surface of v1 (routes() re-export, handler-facing extractors)
 */
pub mod dto;
pub mod extractors;
pub mod handlers;
mod routes;

pub use routes::routes;
