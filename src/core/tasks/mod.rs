// src/core/tasks/mod.rs

//! Long-running background tasks that support the connection core.

pub mod liveness;
