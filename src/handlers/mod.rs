// handlers/mod.rs - Handlers grouped by security tier
//
// Public (no auth, /auth/*) → Protected (bearer token, /api/*)

pub mod public;    // Signup, confirmation, login and password flows
pub mod protected; // Office, room, telemetry and user administration
