//! Session authentication for the dashboard API client
//!
//! Owns the short-lived access token and the protocol for rotating it. This
//! crate performs no request interception of its own; `api-client` wires it
//! into the request pipeline.
//!
//! Token lifecycle:
//! 1. `CredentialStore::load()` hydrates the token from the session cache once
//! 2. Login or a rotated-token response header calls `CredentialStore::set()`
//! 3. On a 401 the client calls `RefreshProtocol::refresh()`, which relies on
//!    the HttpOnly refresh cookie the transport carries
//! 4. Logout or a terminal refresh failure calls `CredentialStore::clear()`

pub mod cache;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod refresh;

pub use cache::{FileSessionCache, MemorySessionCache, SessionCache};
pub use constants::*;
pub use credentials::{AccessToken, CredentialStore};
pub use error::{Error, Result};
pub use refresh::{RefreshProtocol, RefreshedSession, SessionPayload};
