//! Response caching keyed by request signature.
//!
//! On `*_CREATED` the subscriber looks every cacheable request up and, on a
//! hit, injects the cached response so the transport is skipped. On
//! `*_SENT` it stores successful responses and invalidates the cached
//! `GET`/`HEAD` entries of a URL whenever an unsafe method succeeds on it.
//!
//! Vary headers split one URL into several entries. The subscriber keeps an
//! index of the `GET`/`HEAD` keys it stored per URL so invalidation removes
//! every variant, whatever headers the unsafe request carried.
//!
//! Requests carrying the `"cache_bypass"` marker are neither looked up nor
//! stored.

use courier_core::cache::CacheAdapter;
use courier_core::event::{EventKind, PipelineEvent};
use courier_core::message::{
    HttpMethod, Request, Response, CACHE_HIT_PARAMETER, REQUEST_PARAMETER,
};
use courier_core::subscriber::{Subscriber, Subscription};
use courier_core::Result;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Priority of every cache subscription.
pub const CACHE_PRIORITY: i32 = -100;

/// Looks responses up before transport and stores them after.
pub struct CacheSubscriber {
    cache: Arc<dyn CacheAdapter>,
    lifetime: Duration,
    force_cache: bool,
    vary_headers: Vec<String>,
    variants: Mutex<HashMap<String, HashSet<String>>>,
}

impl CacheSubscriber {
    /// Cache through `cache`, storing entries for `lifetime` (zero means no
    /// expiry).
    #[must_use]
    pub fn new(cache: Arc<dyn CacheAdapter>, lifetime: Duration) -> Self {
        Self {
            cache,
            lifetime,
            force_cache: false,
            vary_headers: Vec::new(),
            variants: Mutex::new(HashMap::new()),
        }
    }

    /// Cache every method, not only `GET` and `HEAD`.
    #[must_use]
    pub const fn force_cache(mut self, force: bool) -> Self {
        self.force_cache = force;
        self
    }

    /// Include the values of these request headers in the cache key.
    #[must_use]
    pub fn vary_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vary_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    /// Deterministic key for `request`: hex SHA-256 of method, URL, body and
    /// the configured vary headers.
    #[must_use]
    pub fn cache_key(&self, request: &Request) -> String {
        signature(
            request.method(),
            request.url(),
            request.body(),
            self.vary_headers
                .iter()
                .map(|name| (name.as_str(), request.header(name))),
        )
    }

    fn safe_key(&self, method: HttpMethod, request: &Request) -> String {
        signature(
            method,
            request.url(),
            None,
            self.vary_headers
                .iter()
                .map(|name| (name.as_str(), request.header(name))),
        )
    }

    fn remember(&self, url: &str, key: String) {
        self.variants
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(url.to_string())
            .or_default()
            .insert(key);
    }

    fn forget(&self, url: &str, key: &str) {
        let mut variants = self.variants.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(keys) = variants.get_mut(url) {
            keys.remove(key);
            if keys.is_empty() {
                variants.remove(url);
            }
        }
    }

    fn is_cacheable_method(&self, method: HttpMethod) -> bool {
        self.force_cache || matches!(method, HttpMethod::Get | HttpMethod::Head)
    }

    fn lookup(&self, request: &Request) -> Option<Response> {
        if request.bypasses_cache() || !self.is_cacheable_method(request.method()) {
            return None;
        }

        let key = self.cache_key(request);
        let Some(serialized) = self.cache.get(&key) else {
            tracing::debug!(key, url = request.url(), "Cache miss");
            self.forget(request.url(), &key);
            return None;
        };

        match serde_json::from_str::<Response>(&serialized) {
            Ok(cached) => {
                tracing::debug!(key, url = request.url(), "Cache hit");
                Some(
                    cached
                        .with_parameter(CACHE_HIT_PARAMETER, true)
                        .with_request(request.clone()),
                )
            }
            Err(error) => {
                tracing::warn!(key, error = %error, "Discarding unreadable cache entry");
                self.cache.remove(&key);
                self.forget(request.url(), &key);
                None
            }
        }
    }

    fn store(&self, request: &Request, response: &Response) {
        if response.is_cache_hit() || request.bypasses_cache() || !response.is_success() {
            return;
        }

        if !request.method().is_safe() {
            self.invalidate(request);
        }

        if !self.is_cacheable_method(request.method()) {
            return;
        }

        let stored = response.clone().without_parameter(REQUEST_PARAMETER);
        match serde_json::to_string(&stored) {
            Ok(serialized) => {
                let key = self.cache_key(request);
                if self.cache.set(&key, &serialized, self.lifetime) {
                    tracing::debug!(key, url = request.url(), "Response cached");
                    if request.method().is_safe() {
                        self.remember(request.url(), key);
                    }
                }
            }
            Err(error) => {
                tracing::warn!(url = request.url(), error = %error, "Response not serializable");
            }
        }
    }

    fn invalidate(&self, request: &Request) {
        let mut keys = self
            .variants
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(request.url())
            .unwrap_or_default();
        // Entries stored by another process sharing the engine are not
        // indexed here; the variant matching this request is still reachable.
        for method in [HttpMethod::Get, HttpMethod::Head] {
            keys.insert(self.safe_key(method, request));
        }

        for key in keys {
            if self.cache.has(&key) {
                self.cache.remove(&key);
                tracing::debug!(key, url = request.url(), "Cache entry invalidated");
            }
        }
    }
}

fn signature<'a>(
    method: HttpMethod,
    url: &str,
    body: Option<&str>,
    vary: impl Iterator<Item = (&'a str, Option<&'a str>)>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hasher.update(b"\n");
    hasher.update(body.unwrap_or_default().as_bytes());
    for (name, value) in vary {
        hasher.update(b"\n");
        hasher.update(name.to_ascii_lowercase().as_bytes());
        hasher.update(b":");
        hasher.update(value.unwrap_or_default().as_bytes());
    }

    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

impl fmt::Debug for CacheSubscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheSubscriber")
            .field("lifetime", &self.lifetime)
            .field("force_cache", &self.force_cache)
            .field("vary_headers", &self.vary_headers)
            .finish_non_exhaustive()
    }
}

impl Subscriber for CacheSubscriber {
    fn name(&self) -> &'static str {
        "cache"
    }

    fn subscribed_events(&self) -> Vec<Subscription> {
        vec![
            Subscription::new(EventKind::RequestCreated, CACHE_PRIORITY),
            Subscription::new(EventKind::MultiRequestCreated, CACHE_PRIORITY),
            Subscription::new(EventKind::RequestSent, CACHE_PRIORITY),
            Subscription::new(EventKind::MultiRequestSent, CACHE_PRIORITY),
        ]
    }

    fn on_request_created(&self, event: &mut PipelineEvent) -> Result<()> {
        if event.has_response() {
            return Ok(());
        }
        if let Some(hit) = event.request().and_then(|request| self.lookup(request)) {
            event.set_response(hit);
        }
        Ok(())
    }

    fn on_request_sent(&self, event: &mut PipelineEvent) -> Result<()> {
        if let Some(response) = event.response() {
            if let Some(request) = response.request().or(event.request()) {
                self.store(request, response);
            }
        }
        Ok(())
    }

    fn on_multi_request_created(&self, event: &mut PipelineEvent) -> Result<()> {
        let mut remaining = Vec::with_capacity(event.requests().len());
        for request in event.take_requests() {
            match self.lookup(&request) {
                Some(hit) => event.add_response(hit),
                None => remaining.push(request),
            }
        }
        event.set_requests(remaining);
        Ok(())
    }

    fn on_multi_request_sent(&self, event: &mut PipelineEvent) -> Result<()> {
        for response in event.responses() {
            if let Some(request) = response.request() {
                self.store(request, response);
            }
        }
        Ok(())
    }
}
