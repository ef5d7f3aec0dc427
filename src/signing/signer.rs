//! Signed URL issuing and verification.
//!
//! # Responsibilities
//! - Issue URLs carrying `expires`, `identifier` and an HMAC `signature`
//! - Record each issuance with its usage budget in storage
//! - Verify signature (constant time), expiry, then consume one usage
//!
//! # Design Decisions
//! - HMAC-SHA256 over `identifier|expires|target`, where target is the path
//!   plus every non-signature query parameter
//! - Signature is checked before expiry, so a tampered expiry is reported
//!   as an invalid signature rather than as expired
//! - Identifiers are UUID v4, unique across all protected paths

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::http::Request;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use url::form_urlencoded;
use uuid::Uuid;

use crate::observability::metrics;
use crate::signing::error::{SignedUrlError, SigningError};
use crate::signing::storage::{SignedUrlRecord, SignedUrlStorage};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_PARAM: &str = "signature";
pub const EXPIRES_PARAM: &str = "expires";
pub const IDENTIFIER_PARAM: &str = "identifier";

const RESERVED: [&str; 3] = [SIGNATURE_PARAM, EXPIRES_PARAM, IDENTIFIER_PARAM];

/// Source of the current unix time in seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// Manually advanced clock for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new(now: u64) -> Self {
        Self(AtomicU64::new(now))
    }

    pub fn advance(&self, by: Duration) {
        self.0.fetch_add(by.as_secs(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Application secret keying the MAC. Never printed.
#[derive(Clone)]
pub struct SigningSecret(Vec<u8>);

impl SigningSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, SigningError> {
        let bytes = hex::decode(hex_str.trim()).map_err(|_| SigningError::InvalidSecret)?;
        if bytes.len() < 16 {
            return Err(SigningError::InvalidSecret);
        }
        Ok(Self(bytes))
    }

    /// 32 random bytes.
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    fn mac(&self) -> Result<HmacSha256, SigningError> {
        HmacSha256::new_from_slice(&self.0).map_err(|_| SigningError::InvalidSecret)
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(..)")
    }
}

/// An issued signed URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrl {
    pub identifier: String,
    /// Unix timestamp (seconds).
    pub expires: u64,
    pub max_usage: u32,
    /// Path plus non-signature query, exactly as covered by the signature.
    pub protected_path: String,
    pub signature: String,
}

impl SignedUrl {
    /// Relative URL including the signature parameters.
    pub fn url(&self) -> String {
        let params = form_urlencoded::Serializer::new(String::new())
            .append_pair(EXPIRES_PARAM, &self.expires.to_string())
            .append_pair(IDENTIFIER_PARAM, &self.identifier)
            .append_pair(SIGNATURE_PARAM, &self.signature)
            .finish();
        let sep = if self.protected_path.contains('?') { '&' } else { '?' };
        format!("{}{}{}", self.protected_path, sep, params)
    }
}

/// A successfully verified request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedUrl {
    pub identifier: String,
    pub remaining_usage: u32,
}

/// Issues and verifies signed URLs.
pub struct UrlSigner {
    secret: SigningSecret,
    storage: Arc<dyn SignedUrlStorage>,
    clock: Arc<dyn Clock>,
    default_lifetime: Duration,
    default_max_usage: u32,
}

impl fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlSigner")
            .field("default_lifetime", &self.default_lifetime)
            .field("default_max_usage", &self.default_max_usage)
            .finish_non_exhaustive()
    }
}

impl UrlSigner {
    pub fn new(secret: SigningSecret, storage: Arc<dyn SignedUrlStorage>) -> Self {
        Self {
            secret,
            storage,
            clock: Arc::new(SystemClock),
            default_lifetime: Duration::from_secs(3600),
            default_max_usage: 1,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_defaults(mut self, lifetime: Duration, max_usage: u32) -> Self {
        self.default_lifetime = lifetime;
        self.default_max_usage = max_usage.max(1);
        self
    }

    pub fn default_lifetime(&self) -> Duration {
        self.default_lifetime
    }

    pub fn default_max_usage(&self) -> u32 {
        self.default_max_usage
    }

    pub fn storage(&self) -> &Arc<dyn SignedUrlStorage> {
        &self.storage
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Issue a signed URL for `target` (a path, optionally with a query).
    pub fn sign(&self, target: &str, lifetime: Duration, max_usage: u32) -> Result<SignedUrl, SigningError> {
        if max_usage == 0 {
            return Err(SigningError::InvalidMaxUsage(max_usage));
        }

        let (path, query) = split_target(target);
        let pairs = parse_query(query);
        if let Some((reserved, _)) = pairs.iter().find(|(k, _)| RESERVED.contains(&k.as_str())) {
            return Err(SigningError::ReservedParameter(reserved.clone()));
        }
        let protected_path = canonical_target(path, &pairs);

        let identifier = Uuid::new_v4().simple().to_string();
        let expires = self.clock.now().saturating_add(lifetime.as_secs());
        let signature = hex::encode(self.compute(&identifier, expires, &protected_path)?.finalize().into_bytes());

        self.storage.store(SignedUrlRecord {
            identifier: identifier.clone(),
            expires_at: expires,
            remaining_usage: max_usage,
            protected_path: protected_path.clone(),
        })?;

        tracing::debug!(
            identifier = %identifier,
            path = %protected_path,
            expires,
            max_usage,
            "Signed URL issued"
        );
        metrics::record_signed_url("issued");

        Ok(SignedUrl {
            identifier,
            expires,
            max_usage,
            protected_path,
            signature,
        })
    }

    /// Verify a path + query and consume one usage on success.
    pub fn verify(&self, path: &str, query: Option<&str>) -> Result<VerifiedUrl, SignedUrlError> {
        let result = self.check(path, query);
        match &result {
            Ok(verified) => {
                tracing::debug!(
                    identifier = %verified.identifier,
                    remaining = verified.remaining_usage,
                    "Signed URL accepted"
                );
                metrics::record_signed_url("accepted");
            }
            Err(e) => {
                tracing::warn!(path = %path, reason = e.kind(), "Signed URL rejected");
                metrics::record_signed_url(e.kind());
            }
        }
        result
    }

    /// Verify the URI of an incoming request.
    pub fn verify_request(&self, request: &Request<Body>) -> Result<VerifiedUrl, SignedUrlError> {
        self.verify(request.uri().path(), request.uri().query())
    }

    fn check(&self, path: &str, query: Option<&str>) -> Result<VerifiedUrl, SignedUrlError> {
        let mut identifier = None;
        let mut expires = None;
        let mut signature = None;
        let mut rest = Vec::new();

        for (k, v) in parse_query(query) {
            match k.as_str() {
                IDENTIFIER_PARAM => identifier = Some(v),
                EXPIRES_PARAM => expires = Some(v),
                SIGNATURE_PARAM => signature = Some(v),
                _ => rest.push((k, v)),
            }
        }

        let (Some(identifier), Some(expires), Some(signature)) = (identifier, expires, signature) else {
            return Err(SignedUrlError::InvalidSignature);
        };
        let expires: u64 = expires.parse().map_err(|_| SignedUrlError::InvalidSignature)?;
        let signature = hex::decode(signature).map_err(|_| SignedUrlError::InvalidSignature)?;

        let protected_path = canonical_target(path, &rest);
        let mac = self
            .compute(&identifier, expires, &protected_path)
            .map_err(|_| SignedUrlError::InvalidSignature)?;
        mac.verify_slice(&signature)
            .map_err(|_| SignedUrlError::InvalidSignature)?;

        if expires <= self.clock.now() {
            return Err(SignedUrlError::Expired);
        }

        match self.storage.consume(&identifier)? {
            Some(remaining_usage) => Ok(VerifiedUrl {
                identifier,
                remaining_usage,
            }),
            None => Err(SignedUrlError::BadIdentifier),
        }
    }

    /// Purge expired records from storage.
    pub fn gc(&self) -> Result<usize, SigningError> {
        let purged = self.storage.gc(self.clock.now())?;
        if purged > 0 {
            tracing::info!(purged, "Expired signed URLs purged");
            metrics::record_signed_urls_purged(purged);
        }
        Ok(purged)
    }

    fn compute(&self, identifier: &str, expires: u64, target: &str) -> Result<HmacSha256, SigningError> {
        let mut mac = self.secret.mac()?;
        mac.update(identifier.as_bytes());
        mac.update(b"|");
        mac.update(expires.to_string().as_bytes());
        mac.update(b"|");
        mac.update(target.as_bytes());
        Ok(mac)
    }
}

fn split_target(target: &str) -> (&str, Option<&str>) {
    match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    }
}

fn parse_query(query: Option<&str>) -> Vec<(String, String)> {
    query
        .map(|q| {
            form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default()
}

fn canonical_target(path: &str, pairs: &[(String, String)]) -> String {
    if pairs.is_empty() {
        return path.to_string();
    }
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    format!("{}?{}", path, query)
}
