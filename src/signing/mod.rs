//! Signed URL subsystem.
//!
//! # Data Flow
//! ```text
//! Issue:
//!     UrlGenerator::signed_route (path for a named route)
//!     → signer.rs (identifier + expiry + HMAC)
//!     → storage.rs (persist usage budget)
//!     → URL with ?expires=…&identifier=…&signature=…
//!
//! Verify:
//!     Incoming request path + query
//!     → signer.rs (recompute HMAC, constant-time compare, check expiry)
//!     → storage.rs (atomic consume; record removed at zero)
//!     → VerifiedUrl or SignedUrlError
//! ```
//!
//! # Design Decisions
//! - Verification outcomes are typed, never booleans
//! - Every failure path fails closed
//! - Expired-but-unused records are purged by gc.rs, independently of verification

pub mod error;
pub mod gc;
pub mod signer;
pub mod storage;

pub use error::{SignedUrlError, SigningError, StorageError};
pub use gc::spawn_garbage_collector;
pub use signer::{Clock, ManualClock, SignedUrl, SigningSecret, SystemClock, UrlSigner, VerifiedUrl};
pub use storage::{FileStorage, InMemoryStorage, SessionStorage, SignedUrlRecord, SignedUrlStorage};
