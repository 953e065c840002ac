//! User/role accounts with role permission propagation, and a login endpoint
//! issuing access/refresh JWTs.

pub mod accounts;
pub mod app;
pub mod auth;
pub mod config;
pub mod state;
pub mod telemetry;
