pub mod routes;

pub use routes::{create_router, MAX_BODY_BYTES};
