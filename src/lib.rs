// Authorgate Server Library
// Models, services and admin commands behind the binary

pub mod commands;
pub mod models;
pub mod services;
