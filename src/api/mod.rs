pub mod auth;
mod error;
pub mod models;
mod server;
pub mod services;
pub mod state;
pub(crate) mod utils;
pub(crate) mod validation;

pub use auth::{AuthPolicy, ClusterSecret, SECRET_HEADER};
pub use error::ApiError;
pub use server::router;
