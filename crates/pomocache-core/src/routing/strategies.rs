//! Caching strategies. Each one reads the cache before any network
//! write-back for the same request and writes back through
//! `CacheStorage::store_if_cacheable`.

use tracing::{debug, warn};

use crate::cache::ExpirationPolicy;
use crate::lifetime::EventLifetime;
use crate::models::{Request, Response};

use super::{RoutePolicy, Router};

impl Router {
    /// Cached copy from the route's partition, falling back to the precache.
    fn cached(&self, policy: &RoutePolicy, key: &str) -> Option<Response> {
        let now = self.clock.now();
        self.storage
            .lookup(&policy.partition, key, &policy.expiration, now)
            .or_else(|| {
                self.storage
                    .lookup(&self.names.precache, key, &ExpirationPolicy::unbounded(), now)
            })
    }

    fn write_back(&self, policy: &RoutePolicy, request: &Request, response: &Response) {
        self.storage.store_if_cacheable(
            &policy.partition,
            &policy.expiration,
            request,
            response,
            self.clock.now(),
        );
    }

    /// Try the network; on failure serve the cached copy, then the offline
    /// document.
    pub(super) async fn network_first(&self, request: &Request, policy: &RoutePolicy) -> Response {
        match self.network.fetch(request).await {
            Ok(response) => {
                self.write_back(policy, request, &response);
                response
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, "Network failed, falling back to cache");
                request
                    .cache_key()
                    .and_then(|key| self.cached(policy, &key).or_else(|| self.storage.match_any(&key)))
                    .unwrap_or_else(|| self.offline_fallback(request))
            }
        }
    }

    /// Serve the cached copy right away and refresh it in the background.
    /// Only a cache miss waits for the network.
    pub(super) async fn stale_while_revalidate(
        &self,
        request: &Request,
        policy: &RoutePolicy,
        lifetime: &EventLifetime,
    ) -> Response {
        let cached = request.cache_key().and_then(|key| self.cached(policy, &key));

        if let Some(response) = cached {
            debug!(url = %request.url, "Serving from cache, revalidating");
            let router = self.clone();
            let request = request.clone();
            let policy = policy.clone();
            lifetime.wait_until(async move {
                match router.network.fetch(&request).await {
                    Ok(fresh) => router.write_back(&policy, &request, &fresh),
                    Err(e) => debug!(url = %request.url, error = %e, "Revalidation failed"),
                }
            });
            return response;
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                self.write_back(policy, request, &response);
                response
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, "Fetch failed with nothing cached");
                self.offline_fallback(request)
            }
        }
    }

    /// Serve from cache when possible; otherwise fetch and store.
    pub(super) async fn cache_first(&self, request: &Request, policy: &RoutePolicy) -> Response {
        if let Some(response) = request.cache_key().and_then(|key| self.cached(policy, &key)) {
            debug!(url = %request.url, "Serving from cache");
            return response;
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                self.write_back(policy, request, &response);
                response
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, "Fetch failed with nothing cached");
                self.offline_fallback(request)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;

    use crate::cache::{CacheStorage, ExpirationPolicy};
    use crate::clock::{Clock, ManualClock};
    use crate::config::Config;
    use crate::lifecycle::CacheNames;
    use crate::lifetime::EventLifetime;
    use crate::models::response::NETWORK_ERROR_BODY;
    use crate::models::{Destination, Method, Request, Response};
    use crate::routing::{ResourceClass, Router, Strategy};
    use crate::sync::RetryQueue;
    use crate::testing::FakeNetwork;

    struct Fixture {
        router: Router,
        network: Arc<FakeNetwork>,
        storage: Arc<CacheStorage>,
        queue: Arc<RetryQueue>,
        clock: Arc<ManualClock>,
        names: CacheNames,
    }

    fn fixture() -> Fixture {
        fixture_with(CacheStorage::in_memory())
    }

    fn fixture_with(storage: CacheStorage) -> Fixture {
        let config = Config {
            origin: "https://pomo.example".to_string(),
            ..Config::default()
        };
        let names = CacheNames::from_config(&config);
        let network = Arc::new(FakeNetwork::new());
        let storage = Arc::new(storage);
        let queue = Arc::new(RetryQueue::in_memory(&config.sync_tag));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let router = Router::new(
            &config,
            names.clone(),
            storage.clone(),
            network.clone(),
            clock.clone(),
            queue.clone(),
        )
        .unwrap();
        Fixture {
            router,
            network,
            storage,
            queue,
            clock,
            names,
        }
    }

    #[test]
    fn test_route_table() {
        let f = fixture();
        let images = f.router.route(ResourceClass::Image).unwrap();
        assert_eq!(images.strategy, Strategy::CacheFirst);
        assert_eq!(images.partition, f.names.images);
        assert_eq!(images.expiration, ExpirationPolicy::images());
        assert_eq!(
            f.router.route(ResourceClass::Asset).unwrap().strategy,
            Strategy::StaleWhileRevalidate
        );
        assert_eq!(f.router.route(ResourceClass::Navigation).unwrap().partition, f.names.pages);
        assert!(f.router.route(ResourceClass::Other).is_none());
        assert!(f.router.route(ResourceClass::ApiMutation).is_none());
    }

    #[test]
    fn test_classify_by_destination() {
        let f = fixture();
        let class = |req: Request| f.router.classify(&req);

        assert_eq!(class(Request::navigate("/")), ResourceClass::Navigation);
        assert_eq!(class(Request::get("/js/app.js", Destination::Script)), ResourceClass::Asset);
        assert_eq!(class(Request::get("/css/style.css", Destination::Style)), ResourceClass::Asset);
        assert_eq!(class(Request::get("/sw.js", Destination::Worker)), ResourceClass::Asset);
        assert_eq!(class(Request::get("/tomato.png", Destination::Image)), ResourceClass::Image);
        assert_eq!(class(Request::get("/musics/a.mp3", Destination::Audio)), ResourceClass::Audio);
        assert_eq!(class(Request::get("/manifest.json", Destination::Fetch)), ResourceClass::Other);
        assert_eq!(class(Request::new(Method::Post, "/api/sessions")), ResourceClass::ApiMutation);
        assert_eq!(class(Request::new(Method::Post, "/contact")), ResourceClass::Other);
        assert_eq!(
            class(Request::new(Method::Post, "https://other.example/api/x")),
            ResourceClass::Other
        );
    }

    #[test]
    fn test_normalize_same_origin_urls() {
        let f = fixture();
        assert_eq!(f.router.normalize_url("https://pomo.example/index.html"), "/index.html");
        assert_eq!(f.router.normalize_url("/stats?week=2"), "/stats?week=2");
        assert_eq!(
            f.router.normalize_url("https://cdn.example/font.woff2"),
            "https://cdn.example/font.woff2"
        );
    }

    #[tokio::test]
    async fn test_cache_first_second_request_skips_network() {
        let f = fixture();
        f.network.serve("/tomato.png", Response::ok("png"));
        let lifetime = EventLifetime::new();

        let first = f.router.handle(Request::get("/tomato.png", Destination::Image), &lifetime).await;
        let second = f.router.handle(Request::get("/tomato.png", Destination::Image), &lifetime).await;

        assert_eq!(first.body, second.body);
        assert_eq!(f.network.calls("/tomato.png"), 1);
        assert_eq!(f.storage.len(&f.names.images), 1);
    }

    #[tokio::test]
    async fn test_cache_first_refetches_expired_audio() {
        let f = fixture();
        f.network.serve("/musics/rain.mp3", Response::ok("v1"));
        let lifetime = EventLifetime::new();
        let request = || Request::get("/musics/rain.mp3", Destination::Audio);

        f.router.handle(request(), &lifetime).await;
        f.clock.advance(chrono::Duration::days(91));
        f.network.serve("/musics/rain.mp3", Response::ok("v2"));
        let response = f.router.handle(request(), &lifetime).await;

        assert_eq!(response.text(), "v2");
        assert_eq!(f.network.calls("/musics/rain.mp3"), 2);
    }

    #[tokio::test]
    async fn test_images_partition_evicts_oldest_on_insert() {
        let f = fixture();
        let lifetime = EventLifetime::new();
        for n in 0..=50 {
            let url = format!("/img/{}.png", n);
            f.network.serve(&url, Response::ok(format!("png-{}", n)));
            f.router.handle(Request::get(url, Destination::Image), &lifetime).await;
            f.clock.advance(chrono::Duration::seconds(1));
        }

        assert_eq!(f.storage.len(&f.names.images), 50);
        assert!(f.storage.get(&f.names.images, "GET /img/0.png").is_none());
        assert!(f.storage.get(&f.names.images, "GET /img/1.png").is_some());
    }

    #[tokio::test]
    async fn test_non_cacheable_status_is_returned_not_stored() {
        let f = fixture();
        f.network.serve("/missing.png", Response::new(404, "nope"));
        let lifetime = EventLifetime::new();

        let response = f.router.handle(Request::get("/missing.png", Destination::Image), &lifetime).await;

        assert_eq!(response.status, 404);
        assert_eq!(f.storage.len(&f.names.images), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_while_revalidate_returns_cached_then_updates() {
        let f = fixture();
        let now = f.clock.now();
        f.storage
            .put(&f.names.assets, "GET /css/style.css", Response::ok("old"), now)
            .unwrap();
        f.network.serve("/css/style.css", Response::ok("new"));
        f.network.delay("/css/style.css", Duration::from_secs(10));
        let lifetime = EventLifetime::new();

        let started = tokio::time::Instant::now();
        let response = f.router.handle(Request::get("/css/style.css", Destination::Style), &lifetime).await;

        assert_eq!(response.text(), "old");
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(lifetime.settle().await, 1);
        let entry = f.storage.get(&f.names.assets, "GET /css/style.css").unwrap();
        assert_eq!(entry.response.text(), "new");
    }

    #[tokio::test]
    async fn test_stale_while_revalidate_waits_on_miss() {
        let f = fixture();
        f.network.serve("/js/app.js", Response::ok("js"));
        let lifetime = EventLifetime::new();

        let response = f.router.handle(Request::get("/js/app.js", Destination::Script), &lifetime).await;

        assert_eq!(response.text(), "js");
        assert_eq!(lifetime.pending(), 0);
        assert_eq!(f.storage.len(&f.names.assets), 1);
    }

    #[tokio::test]
    async fn test_stale_while_revalidate_serves_precached_asset() {
        let f = fixture();
        let now = f.clock.now();
        f.storage
            .put(&f.names.precache, "GET /js/app.js", Response::ok("shell"), now)
            .unwrap();
        f.network.set_offline(true);
        let lifetime = EventLifetime::new();

        let response = f.router.handle(Request::get("/js/app.js", Destination::Script), &lifetime).await;
        lifetime.settle().await;

        assert_eq!(response.text(), "shell");
    }

    #[tokio::test]
    async fn test_network_first_caches_and_falls_back() {
        let f = fixture();
        f.network.serve("/", Response::ok("online page"));
        let lifetime = EventLifetime::new();

        let online = f.router.handle(Request::navigate("/"), &lifetime).await;
        assert_eq!(online.text(), "online page");

        f.network.set_offline(true);
        let offline = f.router.handle(Request::navigate("https://pomo.example/"), &lifetime).await;
        assert_eq!(offline.text(), "online page");
    }

    #[tokio::test]
    async fn test_navigation_without_network_or_cache_gets_offline_document() {
        let f = fixture();
        let now = f.clock.now();
        f.storage
            .put(&f.names.precache, "GET /index.html", Response::ok("<offline shell>"), now)
            .unwrap();
        f.network.set_offline(true);
        let lifetime = EventLifetime::new();

        let response = f.router.handle(Request::navigate("/stats"), &lifetime).await;

        assert_eq!(response.status, 200);
        assert_eq!(response.text(), "<offline shell>");
    }

    #[tokio::test]
    async fn test_failed_asset_without_cache_gets_synthesized_404() {
        let f = fixture();
        f.network.set_offline(true);
        let lifetime = EventLifetime::new();

        let response = f.router.handle(Request::get("/tomato.png", Destination::Image), &lifetime).await;

        assert_eq!(response.status, 404);
        assert_eq!(response.header("content-type"), Some("text/plain"));
        assert_eq!(response.text(), NETWORK_ERROR_BODY);
    }

    #[tokio::test]
    async fn test_other_requests_are_never_cached() {
        let f = fixture();
        f.network.serve("/manifest.json", Response::ok("{}"));
        let lifetime = EventLifetime::new();

        f.router.handle(Request::get("/manifest.json", Destination::Fetch), &lifetime).await;
        f.router.handle(Request::get("/manifest.json", Destination::Fetch), &lifetime).await;

        assert_eq!(f.network.calls("/manifest.json"), 2);
        assert!(f.storage.keys().is_empty());
    }

    #[tokio::test]
    async fn test_offline_api_mutation_is_queued() {
        let f = fixture();
        f.network.set_offline(true);
        let lifetime = EventLifetime::new();
        let request = Request::new(Method::Post, "/api/sessions").with_body(r#"{"total":4}"#);

        let response = f.router.handle(request, &lifetime).await;

        assert_eq!(response.status, 202);
        assert_eq!(f.queue.len(), 1);
        assert_eq!(f.queue.entries()[0].request.url, "/api/sessions");
        assert!(f.storage.keys().is_empty());
    }

    #[tokio::test]
    async fn test_cache_write_failure_still_returns_network_response() {
        let dir = tempfile::tempdir().unwrap();
        let f = fixture_with(CacheStorage::open(dir.path()).unwrap());
        // Files squatting on the partition directories make every write fail.
        std::fs::write(dir.path().join(&f.names.images), b"").unwrap();
        std::fs::write(dir.path().join(&f.names.pages), b"").unwrap();
        f.network.serve("/tomato.png", Response::ok("png"));
        f.network.serve("/", Response::ok("page"));
        let lifetime = EventLifetime::new();

        let image = f.router.handle(Request::get("/tomato.png", Destination::Image), &lifetime).await;
        assert_eq!(image.status, 200);
        assert_eq!(image.text(), "png");
        assert_eq!(f.storage.len(&f.names.images), 0);

        let page = f.router.handle(Request::navigate("/"), &lifetime).await;
        assert_eq!(page.status, 200);
        assert_eq!(page.text(), "page");
        assert_eq!(f.storage.len(&f.names.pages), 0);
    }
}
