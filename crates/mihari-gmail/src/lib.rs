//! Gmail account linking and message search.
//!
//! This crate holds the server-side core of mihari:
//!
//! - [`TokenExchanger`] - authorization code to [`TokenBundle`], once per link
//! - [`TokenRefresher`] - stored [`EncryptedToken`] to a fresh [`AccessToken`]
//! - [`MessageSearcher`] - keyword query to ordered [`MessageSummary`] values
//! - [`GmailService`] - per-user facade with an access-token cache
//! - [`GmailError`] - error type with relink / retry / audience helpers
//!
//! # Architecture
//!
//! ```text
//!   link                          search
//!    │                              │
//!    ▼                              ▼
//! ┌────────────────┐   ┌─────────────────────┐
//! │ TokenExchanger │   │   TokenRefresher    │◀── TokenCipher + BlobStore
//! └───────┬────────┘   └──────────┬──────────┘
//!         │    TokenEndpoint      │ AccessToken
//!         └───────────┬───────────┘
//!                     │            ┌─────────────────┐
//!                     ▼            │ MessageSearcher │── MailboxApi
//!              Google OAuth        └────────┬────────┘
//!                                           ▼
//!                                  Vec<MessageSummary>
//! ```
//!
//! # Example
//!
//! ```ignore
//! use mihari_gmail::{GmailService, OAuthClientConfig};
//! use mihari_core::SearchQuery;
//!
//! let service = GmailService::from_config(OAuthClientConfig::from_env()?, cipher, store)?;
//! let hits = service.search("user-1", &SearchQuery::new("invoice")).await?;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod mailbox;
pub mod normalize;
pub mod oauth;
pub mod search;
pub mod service;
pub mod tokens;
pub mod vault;

pub use client::GmailClient;
pub use config::OAuthClientConfig;
pub use error::{ErrorAudience, GmailError, GmailErrorCode, GmailResult};
pub use mailbox::{BoxFuture, MailboxApi, MessageHeader, MessageMetadata, MessageRef};
pub use mihari_core::{MessageSummary, SearchQuery};
pub use oauth::{GoogleTokenEndpoint, PkceFlow, TokenEndpoint, TokenGrant, TokenResponse};
pub use search::{FetchFailurePolicy, MessageSearcher};
pub use service::GmailService;
pub use tokens::{AccessToken, TokenBundle, TokenExchanger, TokenRefresher};
pub use vault::{BlobStore, EncryptedToken, MemoryBlobStore, TokenCipher};
