//! Retry policy and the retrying request loop.
//!
//! A call moves through a small state machine:
//!
//! ```text
//! Attempting ──ok──────────────────────────────▶ Success
//!     │
//!     └─failure─▶ next_step ──Backoff(delay)──▶ sleep ─▶ Attempting
//!                     │
//!                     └──GiveUp(error)────────▶ FatalFailure
//! ```
//!
//! A failure is either a transport error or a response whose status is in
//! the policy's retry set. After the `k`-th failure the loop sleeps for
//! `backoff_unit * 2^k`, so with the default one-second unit the sleeps are
//! 2s, 4s, 8s, … The call gives up once the number of failures exceeds
//! [`RetryPolicy::retries`], returning the last failure unchanged.

use crate::response::HttpResponse;
use crate::session::{HttpRequest, HttpSession};
use crate::{Error, Result};
use http::StatusCode;
use std::collections::HashSet;
use std::time::Duration;

/// The default backoff unit.
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);

/// When and how long to retry a failed request.
///
/// # Examples
///
/// ```
/// use kirjava::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(3).with_retry_statuses([502, 503]);
///
/// assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
/// assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
/// assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(8));
/// assert!(policy.retries_status(http::StatusCode::BAD_GATEWAY));
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// How many times to retry after the first attempt.
    pub retries: usize,
    /// Status codes that count as failures even though the exchange completed.
    pub retry_statuses: Option<HashSet<u16>>,
    /// The unit of the exponential backoff.
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 0,
            retry_statuses: None,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug)]
pub enum RetryStep {
    /// Sleep for `delay`, then try again.
    Backoff {
        /// The number of failed attempts so far.
        attempt: usize,
        /// How long to wait before the next attempt.
        delay: Duration,
        /// The failure being retried.
        error: Error,
    },
    /// Stop and report `error` to the caller.
    GiveUp(Error),
}

impl RetryPolicy {
    /// Creates a policy that retries up to `retries` times on transport errors.
    pub fn new(retries: usize) -> Self {
        Self {
            retries,
            ..Self::default()
        }
    }

    /// Also retries on the given status codes.
    pub fn with_retry_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.retry_statuses = Some(statuses.into_iter().collect());
        self
    }

    /// Sets the unit of the exponential backoff.
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Returns the sleep after the `attempt`-th failure (1-indexed):
    /// `backoff_unit * 2^attempt`, saturating.
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let exponent = u32::try_from(attempt).unwrap_or(u32::MAX);
        self.backoff_unit
            .saturating_mul(2u32.saturating_pow(exponent))
    }

    /// Returns `true` if a response with `status` must be retried.
    pub fn retries_status(&self, status: StatusCode) -> bool {
        self.retry_statuses
            .as_ref()
            .is_some_and(|statuses| statuses.contains(&status.as_u16()))
    }

    /// Decides what follows the `attempt`-th failure (1-indexed).
    ///
    /// Errors that are not [retryable](Error::is_retryable) end the call at
    /// once; the rest are retried until `attempt` exceeds `retries`.
    ///
    /// # Examples
    ///
    /// ```
    /// use kirjava::{Error, RetryPolicy, RetryStep};
    /// use http::StatusCode;
    ///
    /// let policy = RetryPolicy::new(1);
    /// let failure = || Error::RetryableStatus { status: StatusCode::BAD_GATEWAY };
    ///
    /// assert!(matches!(policy.next_step(1, failure()), RetryStep::Backoff { .. }));
    /// assert!(matches!(policy.next_step(2, failure()), RetryStep::GiveUp(_)));
    /// ```
    pub fn next_step(&self, attempt: usize, error: Error) -> RetryStep {
        if !error.is_retryable() || attempt > self.retries {
            return RetryStep::GiveUp(error);
        }
        RetryStep::Backoff {
            attempt,
            delay: self.delay_for_attempt(attempt),
            error,
        }
    }
}

/// Sends one request through a session, retrying according to a policy.
pub struct RetryingRequester<'a> {
    session: &'a dyn HttpSession,
    policy: &'a RetryPolicy,
}

impl<'a> RetryingRequester<'a> {
    /// Creates a requester sending through `session` under `policy`.
    pub fn new(session: &'a dyn HttpSession, policy: &'a RetryPolicy) -> Self {
        Self { session, policy }
    }

    /// Sends `request` until it succeeds or the policy gives up.
    ///
    /// A returned response never has a status in the policy's retry set.
    pub async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut attempt = 0;

        loop {
            tracing::debug!(
                method = %request.method,
                url = %request.url,
                attempt = attempt + 1,
                multipart = request.is_multipart(),
                "Sending GraphQL request"
            );

            let result = match self.session.send(request.clone()).await {
                Ok(response) if self.policy.retries_status(response.status) => {
                    Err(Error::RetryableStatus {
                        status: response.status,
                    })
                }
                other => other,
            };

            let error = match result {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            attempt += 1;
            tracing::warn!(
                error = %error,
                attempt = attempt,
                method = %request.method,
                url = %request.url,
                "Request failed"
            );

            match self.policy.next_step(attempt, error) {
                RetryStep::Backoff { delay, .. } => {
                    tracing::info!(
                        delay_ms = delay.as_millis(),
                        attempt = attempt,
                        "Retrying request after delay"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryStep::GiveUp(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::RequestBody;
    use async_trait::async_trait;
    use http::{HeaderMap, Method};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays scripted results, then answers with `fallback`.
    struct ScriptedSession {
        script: Mutex<VecDeque<Result<HttpResponse>>>,
        fallback: fn() -> Result<HttpResponse>,
        calls: AtomicUsize,
        sent_at: Mutex<Vec<tokio::time::Instant>>,
    }

    impl ScriptedSession {
        fn new(script: Vec<Result<HttpResponse>>, fallback: fn() -> Result<HttpResponse>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback,
                calls: AtomicUsize::new(0),
                sent_at: Mutex::new(Vec::new()),
            }
        }

        fn gaps(&self) -> Vec<Duration> {
            let sent_at = self.sent_at.lock().unwrap();
            sent_at.windows(2).map(|pair| pair[1] - pair[0]).collect()
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HttpSession for ScriptedSession {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.sent_at.lock().unwrap().push(tokio::time::Instant::now());
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(self.fallback)
        }
    }

    fn ok() -> Result<HttpResponse> {
        Ok(HttpResponse::new(StatusCode::OK, "{}"))
    }

    fn bad_gateway() -> Result<HttpResponse> {
        Ok(HttpResponse::new(StatusCode::BAD_GATEWAY, "upstream down"))
    }

    fn refused() -> Result<HttpResponse> {
        Err(Error::transport("connection refused"))
    }

    fn request() -> HttpRequest {
        HttpRequest {
            method: Method::POST,
            url: "http://localhost/graphql".parse().unwrap(),
            headers: HeaderMap::new(),
            body: RequestBody::Json("{}".to_string()),
        }
    }

    #[test]
    fn test_exponential_delays() {
        let policy = RetryPolicy::new(5);
        let delays: Vec<_> = (1..=5).map(|n| policy.delay_for_attempt(n)).collect();
        assert_eq!(
            delays,
            [2, 4, 8, 16, 32].map(Duration::from_secs).to_vec()
        );
    }

    #[test]
    fn test_delay_scales_with_unit() {
        let policy = RetryPolicy::new(2).with_backoff_unit(Duration::from_millis(10));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(20));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(40));
    }

    #[test]
    fn test_delay_saturates() {
        let policy = RetryPolicy::new(usize::MAX);
        assert_eq!(policy.delay_for_attempt(500), Duration::from_secs(u64::from(u32::MAX)));
    }

    #[test]
    fn test_no_retries_gives_up_on_first_failure() {
        let policy = RetryPolicy::default();
        let step = policy.next_step(1, Error::transport("boom"));
        assert!(matches!(step, RetryStep::GiveUp(Error::Transport(_))));
    }

    #[test]
    fn test_non_retryable_error_gives_up() {
        let policy = RetryPolicy::new(3);
        let step = policy.next_step(1, Error::ConfigurationError("bad".to_string()));
        assert!(matches!(step, RetryStep::GiveUp(Error::ConfigurationError(_))));
    }

    #[test]
    fn test_retry_statuses_membership() {
        let policy = RetryPolicy::new(1).with_retry_statuses([502]);
        assert!(policy.retries_status(StatusCode::BAD_GATEWAY));
        assert!(!policy.retries_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!RetryPolicy::new(1).retries_status(StatusCode::BAD_GATEWAY));
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let session = ScriptedSession::new(vec![], ok);
        let policy = RetryPolicy::new(3);

        let response = RetryingRequester::new(&session, &policy)
            .send(&request())
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(session.calls(), 1);
    }

    #[tokio::test]
    async fn test_zero_retries_sends_once() {
        let session = ScriptedSession::new(vec![], refused);
        let policy = RetryPolicy::default();

        let result = RetryingRequester::new(&session, &policy).send(&request()).await;

        match result {
            Err(Error::Transport(source)) => assert_eq!(source.to_string(), "connection refused"),
            other => panic!("Expected Transport, got {:?}", other),
        }
        assert_eq!(session.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_sends_retries_plus_one() {
        let session = ScriptedSession::new(vec![], refused);
        let policy = RetryPolicy::new(3);
        let start = tokio::time::Instant::now();

        let result = RetryingRequester::new(&session, &policy).send(&request()).await;

        assert!(matches!(result, Err(Error::Transport(_))));
        assert_eq!(session.calls(), 4);
        // 2s + 4s + 8s of backoff
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(14), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(15), "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_follow_powers_of_two() {
        let session = ScriptedSession::new(vec![bad_gateway(), refused(), bad_gateway()], ok);
        let policy = RetryPolicy::new(3).with_retry_statuses([502]);

        RetryingRequester::new(&session, &policy)
            .send(&request())
            .await
            .unwrap();

        assert_eq!(session.gaps(), [2, 4, 8].map(Duration::from_secs).to_vec());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_status_then_success() {
        let session = ScriptedSession::new(vec![bad_gateway(), bad_gateway()], ok);
        let policy = RetryPolicy::new(2).with_retry_statuses([502]);

        let response = RetryingRequester::new(&session, &policy)
            .send(&request())
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(session.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_status_exhausted() {
        let session = ScriptedSession::new(vec![], bad_gateway);
        let policy = RetryPolicy::new(1).with_retry_statuses([502, 503]);

        let result = RetryingRequester::new(&session, &policy).send(&request()).await;

        match result {
            Err(Error::RetryableStatus { status }) => assert_eq!(status, StatusCode::BAD_GATEWAY),
            other => panic!("Expected RetryableStatus, got {:?}", other),
        }
        assert_eq!(session.calls(), 2);
    }

    #[tokio::test]
    async fn test_status_outside_retry_set_is_returned() {
        let session = ScriptedSession::new(vec![], bad_gateway);
        let policy = RetryPolicy::new(3).with_retry_statuses([503]);

        let response = RetryingRequester::new(&session, &policy)
            .send(&request())
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::BAD_GATEWAY);
        assert_eq!(session.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_then_success() {
        let session = ScriptedSession::new(vec![refused()], ok);
        let policy = RetryPolicy::new(1);

        let response = RetryingRequester::new(&session, &policy)
            .send(&request())
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(session.calls(), 2);
    }
}
