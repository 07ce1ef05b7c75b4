/*
 * Responsibility
 * - Public interface of the middleware layer
 * - auth: bearer-token pipeline (route-level), http: transport concerns (app-level)
 */
pub mod auth;
pub mod http;
