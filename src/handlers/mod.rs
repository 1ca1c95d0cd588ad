// handlers/mod.rs
//
// Public reads and login take no token. Everything that mutates runs with
// the caller the auth middleware resolved, or none.
pub mod health;
pub mod items;
pub mod session;
pub mod users;
