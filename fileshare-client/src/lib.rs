//! Client core for fileshare.
//!
//! Provides the two stateful pieces behind the file-sharing front-end:
//! - Session token management with single-flight refresh and one-shot
//!   replay of requests rejected for an expired access token
//! - Encrypted uploads: seal a file client-side, send it as one multipart
//!   request, and track per-task progress
//!
//! Plus the REST client that carries both, a persisted token store and
//! configuration.

pub mod api_client;
pub mod config;
pub mod error;
pub mod session;
pub mod token_store;
pub mod types;
pub mod upload;

pub use api_client::{ApiClient, EnvelopeSender, ProgressSink};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult, ErrorKind};
pub use session::{RequestAttempt, RetryDecision, SessionTokenManager};
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use types::*;
pub use upload::{UploadOrchestrator, UploadPolicy};
