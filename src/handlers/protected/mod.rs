// handlers/protected/mod.rs - Protected handlers (bearer token required)
//
// Route Prefix: /api/*
// Middleware: jwt_auth_middleware injects the caller as `AuthUser`

pub mod offices;   // /api/offices, /api/offices/detail
pub mod rooms;     // /api/rooms, /api/rooms/config
pub mod telemetry; // /api/telemetry
pub mod users;     // /api/users, /api/users/profile
