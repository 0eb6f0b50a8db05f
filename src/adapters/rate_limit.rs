use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Requests each client IP may make per day
    #[serde(default = "default_requests_per_day")]
    pub requests_per_day: u32,
}

fn default_enabled() -> bool {
    true
}

fn default_requests_per_day() -> u32 {
    100
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            requests_per_day: default_requests_per_day(),
        }
    }
}

/// Per-IP daily quota
pub struct DailyLimiter<C: Clock = DefaultClock> {
    limiter: RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, C, NoOpMiddleware<C::Instant>>,
    requests_per_day: u32,
}

pub type SharedRateLimiter = Arc<DailyLimiter>;

impl<C: Clock> DailyLimiter<C> {
    /// Allow `requests_per_day` in a burst, replenished evenly across the day
    pub fn with_clock(requests_per_day: u32, clock: C) -> Self {
        let burst = NonZeroU32::new(requests_per_day).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(DAY / burst.get())
            .unwrap_or_else(|| Quota::per_hour(burst))
            .allow_burst(burst);

        Self {
            limiter: RateLimiter::new(quota, DefaultKeyedStateStore::default(), clock),
            requests_per_day: burst.get(),
        }
    }

    /// Check and consume one request for `ip`
    pub fn check(&self, ip: IpAddr) -> bool {
        self.limiter.check_key(&ip).is_ok()
    }

    pub fn limit_message(&self) -> String {
        format!("Rate limit exceeded: {} per 1 day", self.requests_per_day)
    }

    /// Forget clients whose quota has fully replenished
    pub fn retain_recent(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Number of client IPs currently tracked
    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }
}

impl<C> DailyLimiter<C>
where
    C: Clock + Send + Sync + 'static,
{
    /// Periodically drop idle client state so the key map stays bounded
    pub fn spawn_pruner(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                limiter.retain_recent();
                debug!(tracked = limiter.tracked_clients(), "Pruned rate limit state");
            }
        })
    }
}

pub fn create_limiter(requests_per_day: u32) -> SharedRateLimiter {
    Arc::new(DailyLimiter::with_clock(
        requests_per_day,
        DefaultClock::default(),
    ))
}

fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

pub async fn rate_limit_middleware(
    State(limiter): State<SharedRateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(&request);

    if limiter.check(ip) {
        next.run(request).await
    } else {
        warn!(client = %ip, "Rate limit exceeded");
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "detail": limiter.limit_message() })),
        )
            .into_response()
    }
}
