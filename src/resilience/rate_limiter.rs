use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Read-only view of the limiter's accounting window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitStatus {
    pub request_count: u64,
    pub token_count: u64,
    pub requests_per_window: u64,
    pub tokens_per_window: u64,
    pub limited: bool,
    /// Calls admitted but not yet settled.
    pub in_flight_requests: u64,
    pub in_flight_tokens: u64,
    /// Time since the current window started (ms).
    pub window_elapsed_ms: u64,
    /// Time until the current window resets (ms).
    pub window_remaining_ms: u64,
}

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    pub requests_per_window: u64,
    pub tokens_per_window: u64,
    pub window: Duration,
}

impl RateLimiterConfig {
    pub fn new() -> Self {
        Self {
            requests_per_window: 60,
            tokens_per_window: 50_000,
            window: Duration::from_secs(60),
        }
    }

    pub fn with_requests_per_window(mut self, n: u64) -> Self {
        self.requests_per_window = n;
        self
    }

    pub fn with_tokens_per_window(mut self, n: u64) -> Self {
        self.tokens_per_window = n;
        self
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct State {
    request_count: u64,
    token_count: u64,
    window_start: Instant,
    limited: bool,
    // Reserved by `admit`, returned by `consume` or `release`. Survives window resets.
    in_flight_requests: u64,
    in_flight_tokens: u64,
}

/// Fixed-window request and token budget.
///
/// - `admit` reserves, `consume` charges; a call is charged only once it succeeded
/// - Reservations count against both ceilings, so concurrent calls cannot
///   overrun the window while they are still running
/// - The window resets lazily on the next check, or from the background tick
/// - Every state change happens inside one short critical section
pub struct RateLimiter {
    cfg: RateLimiterConfig,
    state: Mutex<State>,
}

impl RateLimiter {
    pub fn new(cfg: RateLimiterConfig) -> Self {
        Self {
            cfg,
            state: Mutex::new(State {
                request_count: 0,
                token_count: 0,
                window_start: Instant::now(),
                limited: false,
                in_flight_requests: 0,
                in_flight_tokens: 0,
            }),
        }
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.cfg
    }

    // Counters are plain integers, so a poisoned lock still holds usable state.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn reset_if_elapsed(cfg: &RateLimiterConfig, st: &mut State, now: Instant) -> bool {
        if now.duration_since(st.window_start) >= cfg.window {
            st.request_count = 0;
            st.token_count = 0;
            st.window_start = now;
            st.limited = false;
            true
        } else {
            false
        }
    }

    /// Whether a call estimated at `cost` tokens may run now.
    ///
    /// Admission reserves one request and `cost` tokens until the call is settled
    /// with [`consume`](Self::consume) or [`release`](Self::release). A refusal
    /// sets the `limited` flag and changes nothing else.
    pub fn admit(&self, cost: u64) -> bool {
        let mut st = self.lock();
        Self::reset_if_elapsed(&self.cfg, &mut st, Instant::now());
        let requests = st.request_count.saturating_add(st.in_flight_requests);
        let tokens = st
            .token_count
            .saturating_add(st.in_flight_tokens)
            .saturating_add(cost);
        if requests >= self.cfg.requests_per_window || tokens >= self.cfg.tokens_per_window {
            st.limited = true;
            return false;
        }
        st.in_flight_requests += 1;
        st.in_flight_tokens = st.in_flight_tokens.saturating_add(cost);
        true
    }

    /// Charge a completed call against the current window and drop its reservation.
    pub fn consume(&self, tokens: u64) {
        let mut st = self.lock();
        Self::settle(&mut st, tokens);
        st.request_count = st.request_count.saturating_add(1);
        st.token_count = st.token_count.saturating_add(tokens);
    }

    /// Drop the reservation of an admitted call that failed or was abandoned.
    pub fn release(&self, cost: u64) {
        Self::settle(&mut self.lock(), cost);
    }

    fn settle(st: &mut State, cost: u64) {
        st.in_flight_requests = st.in_flight_requests.saturating_sub(1);
        st.in_flight_tokens = st.in_flight_tokens.saturating_sub(cost);
    }

    /// Re-evaluate the window without admitting anything. Returns true if it reset.
    pub fn refresh(&self) -> bool {
        let mut st = self.lock();
        Self::reset_if_elapsed(&self.cfg, &mut st, Instant::now())
    }

    pub fn is_limited(&self) -> bool {
        self.lock().limited
    }

    /// Whether `cost` could ever be admitted, even into an empty window.
    pub fn fits_window(&self, cost: u64) -> bool {
        cost < self.cfg.tokens_per_window
    }

    pub fn snapshot(&self) -> RateLimitStatus {
        let st = self.lock();
        let elapsed = Instant::now().duration_since(st.window_start);
        RateLimitStatus {
            request_count: st.request_count,
            token_count: st.token_count,
            requests_per_window: self.cfg.requests_per_window,
            tokens_per_window: self.cfg.tokens_per_window,
            limited: st.limited,
            in_flight_requests: st.in_flight_requests,
            in_flight_tokens: st.in_flight_tokens,
            window_elapsed_ms: elapsed.as_millis() as u64,
            window_remaining_ms: self.cfg.window.saturating_sub(elapsed).as_millis() as u64,
        }
    }
}
