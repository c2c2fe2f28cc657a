//! Authentication primitives (JWT validation).

pub mod jwt;
