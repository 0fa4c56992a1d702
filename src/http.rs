use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};

use crate::config::MAX_HTTP_TIMEOUT_SECS;
use crate::error::FetchError;

/// Point in time after which no network call is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn at(instant: Instant) -> Self {
        Self(instant)
    }

    /// `timeout` from now. A timeout too large to represent falls back to
    /// the maximum network timeout.
    pub fn after(timeout: Duration) -> Self {
        let now = Instant::now();
        let at = now
            .checked_add(timeout)
            .or_else(|| now.checked_add(Duration::from_secs(MAX_HTTP_TIMEOUT_SECS)))
            .unwrap_or(now);
        Self(at)
    }

    /// Time left, or `None` once the deadline has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.0.checked_duration_since(Instant::now()).filter(|d| !d.is_zero())
    }
}

/// Blocking GET returning a decoded JSON body. Only status 200 is success.
pub(crate) fn get_json<T: DeserializeOwned>(
    agent: &ureq::Agent,
    url: &str,
    query: &[(&str, &str)],
    deadline: Deadline,
) -> Result<T, FetchError> {
    let remaining = deadline.remaining().ok_or_else(|| FetchError::DeadlineExceeded(url.to_string()))?;
    let mut req = agent.get(url).timeout(remaining);
    for (k, v) in query {
        req = req.query(k, v);
    }
    let resp = req.call().map_err(|e| match e {
        ureq::Error::Status(status, _) => FetchError::Status { url: url.to_string(), status },
        ureq::Error::Transport(t) => FetchError::Transport(t.to_string()),
    })?;
    if resp.status() != 200 {
        return Err(FetchError::Status { url: url.to_string(), status: resp.status() });
    }
    resp.into_json::<T>().map_err(|e| FetchError::Body(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_deadline_has_no_time_left() {
        let past = Deadline::at(Instant::now() - Duration::from_secs(1));
        assert_eq!(past.remaining(), None);
        assert!(Deadline::after(Duration::from_secs(30)).remaining().is_some());
    }

    #[test]
    fn unrepresentable_timeout_falls_back_to_the_cap() {
        let deadline = Deadline::after(Duration::MAX);
        let left = deadline.remaining().unwrap();
        assert!(left <= Duration::from_secs(MAX_HTTP_TIMEOUT_SECS));
        assert!(left > Duration::from_secs(MAX_HTTP_TIMEOUT_SECS - 5));
    }

    #[test]
    fn expired_deadline_never_reaches_the_network() {
        let agent = ureq::AgentBuilder::new().build();
        let past = Deadline::at(Instant::now() - Duration::from_secs(1));
        let err = get_json::<serde_json::Value>(&agent, "http://192.0.2.1/keys", &[], past).unwrap_err();
        assert_eq!(err, FetchError::DeadlineExceeded("http://192.0.2.1/keys".into()));
    }
}
