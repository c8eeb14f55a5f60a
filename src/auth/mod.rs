//! Authentication Module
//! Mission: Accounts, sessions, and password recovery for the storefront

pub mod api;
pub mod db;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod reset_ledger;
pub mod user_store;
pub mod validation;

pub use api::{AuthApiError, AuthState};
pub use db::{AuthDb, StoreError};
pub use jwt::{JwtHandler, SessionError};
pub use middleware::auth_middleware;
pub use password::PasswordHasher;
pub use reset_ledger::ResetLedger;
pub use user_store::UserStore;
