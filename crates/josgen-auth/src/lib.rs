//! Token storage for the josgen API client
//!
//! Holds the access/refresh token pair issued by the backend's `/auth/login`,
//! `/auth/register` and `/auth/refresh` endpoints. This crate has no HTTP
//! dependency; the gateway crate owns the network side and drives the store.
//!
//! Token lifecycle:
//! 1. Login/register response carries a `TokenPair`, saved via `TokenStore::set_tokens()`
//! 2. Every outbound request reads `TokenStore::access_token()`
//! 3. A 401 triggers a refresh with `TokenStore::refresh_token()`
//! 4. Refreshed tokens are written back; a failed refresh calls `clear_tokens()`

pub mod constants;
pub mod error;
pub mod store;
pub mod token;

pub use constants::*;
pub use error::{Error, Result};
pub use store::{FileStore, KeyValueStore, MemoryStore, TokenStore};
pub use token::TokenPair;
