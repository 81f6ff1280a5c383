//! HTTP control surface
//!
//! Any `GET` whose path ends in `/start`, `/stop` or `/status` is accepted,
//! so the surface can sit behind an arbitrary URL prefix. Every answer is a
//! JSON body of the form `{"Success": bool, "Message": "..."}`.

pub mod handlers;
pub mod routes;
pub mod server;

pub use handlers::ApiResponse;
pub use routes::build_router;
pub use server::{AppState, WebServer};
