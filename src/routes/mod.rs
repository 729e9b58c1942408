//! Router Module Index
//!
//! Splits the portal's endpoints by who may call them. Access control for the `admin`
//! and `judge` routers is applied as a layer in `create_router`; the `api` router checks
//! the session inside each handler because its endpoints serve both portals.

/// Routes reachable without a session (health, sign-in, sign-out).
pub mod public;

/// Administrator routes, mounted under `/admin` behind the admin session gate.
pub mod admin;

/// Judge routes, mounted under `/judge` behind the judge session gate.
pub mod judge;

/// Routes under `/api`, each guarded by the `AdminSession` or `JudgeSession` extractor.
pub mod api;
