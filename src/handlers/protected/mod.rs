// handlers/protected/mod.rs - JWT authentication required
//
// Route prefix: /api/*
// Every handler receives the caller as `Extension<AuthUser>`; the write
// handlers pass it on to the coordinator, which enforces the role gate.
pub mod attendance;
pub mod auth;
pub mod marks;
pub mod students;
