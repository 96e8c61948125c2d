//! HTTP request pipeline shared by all commands
//!
//! - `client`: redirect-following, gzip decoding and success/failure
//!   classification on top of reqwest
//! - `api`: default headers, credential resolution and URL resolution
//!   against the configured API host
//! - `auth`: stored credentials (`~/.netrc`)

mod api;
mod auth;
mod client;

pub use api::{resolve_url, ApiClient};
pub use auth::{resolve_authorization, CredentialStore, NetrcStore};
pub use client::{Body, HttpClient, HttpError, Response, StatusFailure};

pub use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
pub use reqwest::{Method, StatusCode};
