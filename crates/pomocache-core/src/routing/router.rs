use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, error, warn};
use url::Url;

use crate::cache::{CacheStorage, ExpirationPolicy};
use crate::clock::Clock;
use crate::config::Config;
use crate::lifecycle::CacheNames;
use crate::lifetime::EventLifetime;
use crate::models::{cache_key, Destination, Method, Request, Response};
use crate::net::Network;
use crate::sync::RetryQueue;

use super::{ResourceClass, RoutePolicy, Strategy};

/// Routes intercepted requests to a caching strategy.
/// Clone is cheap - shared state sits behind `Arc`s.
#[derive(Clone)]
pub struct Router {
    pub(super) storage: Arc<CacheStorage>,
    pub(super) network: Arc<dyn Network>,
    pub(super) clock: Arc<dyn Clock>,
    queue: Arc<RetryQueue>,
    pub(super) names: CacheNames,
    origin: Url,
    offline_document: String,
    api_prefix: String,
}

impl Router {
    pub fn new(
        config: &Config,
        names: CacheNames,
        storage: Arc<CacheStorage>,
        network: Arc<dyn Network>,
        clock: Arc<dyn Clock>,
        queue: Arc<RetryQueue>,
    ) -> Result<Self> {
        Ok(Self {
            storage,
            network,
            clock,
            queue,
            names,
            origin: config.origin_url()?,
            offline_document: config.offline_document.clone(),
            api_prefix: config.api_prefix.clone(),
        })
    }

    /// Same-origin URLs are keyed by path and query so that `/index.html`
    /// and `https://app.example/index.html` share one cache entry.
    pub fn normalize_url(&self, url: &str) -> String {
        match self.origin.join(url) {
            Ok(resolved) if resolved.origin() == self.origin.origin() => {
                match resolved.query() {
                    Some(query) => format!("{}?{}", resolved.path(), query),
                    None => resolved.path().to_string(),
                }
            }
            Ok(resolved) => resolved.to_string(),
            Err(_) => url.to_string(),
        }
    }

    fn is_api_request(&self, request: &Request) -> bool {
        self.origin
            .join(&request.url)
            .map(|u| u.origin() == self.origin.origin() && u.path().starts_with(&self.api_prefix))
            .unwrap_or(false)
    }

    pub fn classify(&self, request: &Request) -> ResourceClass {
        if request.method.is_mutating() {
            return if self.is_api_request(request) {
                ResourceClass::ApiMutation
            } else {
                ResourceClass::Other
            };
        }
        if request.method != Method::Get {
            return ResourceClass::Other;
        }
        match request.destination {
            Destination::Document => ResourceClass::Navigation,
            Destination::Script | Destination::Style | Destination::Worker => ResourceClass::Asset,
            Destination::Image => ResourceClass::Image,
            Destination::Audio => ResourceClass::Audio,
            Destination::Font | Destination::Fetch | Destination::Unknown => ResourceClass::Other,
        }
    }

    /// Strategy and partition for a class. `None` means the request goes
    /// straight to the network.
    pub fn route(&self, class: ResourceClass) -> Option<RoutePolicy> {
        let (strategy, partition, expiration) = match class {
            ResourceClass::Navigation => (
                Strategy::NetworkFirst,
                &self.names.pages,
                ExpirationPolicy::unbounded(),
            ),
            ResourceClass::Asset => (
                Strategy::StaleWhileRevalidate,
                &self.names.assets,
                ExpirationPolicy::unbounded(),
            ),
            ResourceClass::Image => (
                Strategy::CacheFirst,
                &self.names.images,
                ExpirationPolicy::images(),
            ),
            ResourceClass::Audio => (
                Strategy::CacheFirst,
                &self.names.audio,
                ExpirationPolicy::audio(),
            ),
            ResourceClass::ApiMutation | ResourceClass::Other => return None,
        };
        Some(RoutePolicy {
            strategy,
            partition: partition.clone(),
            expiration,
        })
    }

    /// Answer an intercepted request. Never fails: network errors fall back
    /// to the cache, the offline document or a synthesized error response.
    pub async fn handle(&self, mut request: Request, lifetime: &EventLifetime) -> Response {
        request.url = self.normalize_url(&request.url);
        let class = self.classify(&request);
        debug!(method = %request.method, url = %request.url, ?class, "Routing request");

        if class == ResourceClass::ApiMutation {
            return self.send_or_queue(request).await;
        }
        let Some(policy) = self.route(class) else {
            return self.pass_through(&request).await;
        };

        match policy.strategy {
            Strategy::NetworkFirst => self.network_first(&request, &policy).await,
            Strategy::StaleWhileRevalidate => {
                self.stale_while_revalidate(&request, &policy, lifetime).await
            }
            Strategy::CacheFirst => self.cache_first(&request, &policy).await,
        }
    }

    /// Forward to the network without touching any cache.
    pub async fn pass_through(&self, request: &Request) -> Response {
        match self.network.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %request.url, error = %e, "Fetch failed");
                self.offline_fallback(request)
            }
        }
    }

    /// Send a mutating API request, parking it in the retry queue if the
    /// network is unreachable.
    async fn send_or_queue(&self, request: Request) -> Response {
        match self.network.fetch(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %request.url, error = %e, "API request failed, deferring to background sync");
                match self.queue.push(request, self.clock.now()) {
                    Ok(_) => Response::deferred(),
                    Err(e) => {
                        error!(error = %e, "Failed to queue request for background sync");
                        Response::network_error()
                    }
                }
            }
        }
    }

    /// Last resort when neither network nor a cached copy can answer:
    /// navigations get the offline document, everything else a plain 404.
    pub(super) fn offline_fallback(&self, request: &Request) -> Response {
        if request.is_navigation() {
            let key = cache_key(Method::Get, &self.offline_document);
            if let Some(document) = self.storage.match_any(&key) {
                debug!(url = %request.url, "Serving offline document");
                return document;
            }
            warn!(document = %self.offline_document, "Offline document is not cached");
        }
        Response::network_error()
    }
}
