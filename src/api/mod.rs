//! REST front end
//!
//! warp routes for the v3 REST surface. Every route runs the endpoint access gate before
//! its handler; denials surface as 404 or 405 depending on whether the path is otherwise
//! reachable.

pub mod handlers;
pub mod models;
pub mod routes;
pub mod server;

pub use server::{routes, AccessRejection, ApiState, RestApi};
