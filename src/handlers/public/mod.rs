// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Signup, confirmation, login and password flows. Every other route lives
// under /api and goes through the bearer token middleware.

pub mod auth;
