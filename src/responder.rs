//! Ping responder: answers `<prefix>/ping/<number>` Interests with a signed
//! acknowledgement.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::{
    face::{InterestDisposition, InterestHandler, Producer},
    name::{Component, Name},
    packets::Interest,
    session::PING_COMPONENT,
    stats::{OutputFormat, ResponderStats},
};

/// Content of every ping answer.
pub const PING_ACK: &[u8] = b"ping ack";

/// Aggregate counters for the responder.
pub struct ResponderCounters {
    pub interests_received: AtomicU64,
    pub interests_answered: AtomicU64,
}

impl ResponderCounters {
    pub fn new() -> Self {
        ResponderCounters {
            interests_received: AtomicU64::new(0),
            interests_answered: AtomicU64::new(0),
        }
    }
}

impl Default for ResponderCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds and prints the responder shutdown statistics.
pub fn print_responder_stats(
    prefix: &str,
    counters: &ResponderCounters,
    start_time: Instant,
    output_format: OutputFormat,
) {
    let stats = ResponderStats {
        prefix: prefix.to_string(),
        interests_received: counters.interests_received.load(Ordering::Relaxed),
        interests_answered: counters.interests_answered.load(Ordering::Relaxed),
        uptime_seconds: start_time.elapsed().as_secs_f64(),
    };
    stats.print(output_format);
}

/// True when `component` is a non-empty run of ASCII digits, of any length.
fn is_probe_number(component: &Component) -> bool {
    let bytes = component.as_bytes();
    !bytes.is_empty() && bytes.iter().all(u8::is_ascii_digit)
}

/// A request is valid iff it has exactly one component more than the filter
/// prefix and that component is a probe number.
pub fn is_valid_probe_name(request: &Name, prefix_components: usize) -> bool {
    request.len() == prefix_components + 1 && request.last().is_some_and(is_probe_number)
}

/// Interest handler answering ping probes under one prefix.
pub struct Responder {
    filter_prefix: Name,
    prefix_components: usize,
    freshness: Option<u32>,
    counters: Arc<ResponderCounters>,
}

impl Responder {
    /// Serves `<prefix>/ping`; answers carry the freshness hint (seconds), if any.
    pub fn new(prefix: &Name, freshness: Option<u32>) -> Self {
        let filter_prefix = prefix.append(PING_COMPONENT);
        Responder {
            prefix_components: filter_prefix.len(),
            filter_prefix,
            freshness,
            counters: Arc::new(ResponderCounters::new()),
        }
    }

    /// Prefix to register this responder under.
    pub fn filter_prefix(&self) -> &Name {
        &self.filter_prefix
    }

    /// Shared handle on the counters, still valid after the responder is
    /// moved into a face.
    pub fn counters(&self) -> Arc<ResponderCounters> {
        Arc::clone(&self.counters)
    }

    pub fn responded_count(&self) -> u64 {
        self.counters.interests_answered.load(Ordering::Relaxed)
    }
}

impl InterestHandler for Responder {
    fn on_interest(&mut self, interest: &Interest, face: &mut dyn Producer) -> InterestDisposition {
        self.counters
            .interests_received
            .fetch_add(1, Ordering::Relaxed);

        if !is_valid_probe_name(&interest.name, self.prefix_components) {
            log::debug!("Ignoring malformed ping Interest {}", interest.name);
            return InterestDisposition::NotHandled;
        }

        let data = match face.sign(interest.name.clone(), PING_ACK.to_vec(), self.freshness) {
            Ok(data) => data,
            Err(e) => {
                log::error!("Failed to sign answer to {}: {}", interest.name, e);
                return InterestDisposition::NotHandled;
            }
        };

        match face.put(data) {
            Ok(()) => {
                self.counters
                    .interests_answered
                    .fetch_add(1, Ordering::Relaxed);
                log::debug!("Answered {}", interest.name);
                InterestDisposition::Consumed
            }
            Err(e) => {
                log::warn!("Failed to send answer to {}: {}", interest.name, e);
                InterestDisposition::NotHandled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        face::FaceError,
        packets::{Data, Signer, DEFAULT_INTEREST_LIFETIME},
    };

    #[derive(Default)]
    struct Collect {
        sent: Vec<Data>,
        fail_put: bool,
    }

    impl Producer for Collect {
        fn sign(
            &self,
            name: Name,
            content: Vec<u8>,
            freshness: Option<u32>,
        ) -> Result<Data, FaceError> {
            Ok(Signer::Digest.sign(name, content, freshness)?)
        }

        fn put(&mut self, data: Data) -> Result<(), FaceError> {
            if self.fail_put {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "closed").into());
            }
            self.sent.push(data);
            Ok(())
        }
    }

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    fn interest(uri: &str) -> Interest {
        Interest::new(name(uri), DEFAULT_INTEREST_LIFETIME)
    }

    #[test]
    fn test_valid_probe_names() {
        let prefix = name("/a/b/ping");
        let n = prefix.len();
        assert!(is_valid_probe_name(&name("/a/b/ping/42"), n));
        assert!(is_valid_probe_name(&name("/a/b/ping/0"), n));
        assert!(is_valid_probe_name(&name("/a/b/ping/007"), n));
        assert!(is_valid_probe_name(&name("/a/b/ping/99999999999999999999999"), n));
    }

    #[test]
    fn test_invalid_probe_names() {
        let n = name("/a/b/ping").len();
        for uri in [
            "/a/b/ping",
            "/a/b/ping/42abc",
            "/a/b/ping/-1",
            "/a/b/ping/+1",
            "/a/b/ping/abc",
            "/a/b/ping/id/42",
            "/a/b/ping/42/43",
        ] {
            assert!(!is_valid_probe_name(&name(uri), n), "{} should be rejected", uri);
        }
        let mut empty_last = name("/a/b/ping");
        empty_last.push(Component::new(Vec::new()));
        assert!(!is_valid_probe_name(&empty_last, n));
    }

    #[test]
    fn test_answers_valid_interest() {
        let mut responder = Responder::new(&name("/a"), Some(1));
        let counters = responder.counters();
        let mut face = Collect::default();

        let result = responder.on_interest(&interest("/a/ping/5"), &mut face);

        assert_eq!(result, InterestDisposition::Consumed);
        assert_eq!(face.sent.len(), 1);
        let data = &face.sent[0];
        assert_eq!(data.name, name("/a/ping/5"));
        assert_eq!(data.content, PING_ACK);
        assert_eq!(data.freshness, Some(1));
        assert_eq!(responder.responded_count(), 1);
        assert_eq!(counters.interests_received.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_ignores_invalid_interest() {
        let mut responder = Responder::new(&name("/a"), Some(1));
        let mut face = Collect::default();

        for uri in ["/a/ping/x", "/a/ping", "/a/ping/id/3"] {
            assert_eq!(
                responder.on_interest(&interest(uri), &mut face),
                InterestDisposition::NotHandled
            );
        }
        assert!(face.sent.is_empty());
        assert_eq!(responder.responded_count(), 0);
        assert_eq!(
            responder.counters().interests_received.load(Ordering::Relaxed),
            3
        );
    }

    #[test]
    fn test_failed_put_not_counted() {
        let mut responder = Responder::new(&name("/a"), None);
        let mut face = Collect {
            fail_put: true,
            ..Default::default()
        };

        assert_eq!(
            responder.on_interest(&interest("/a/ping/1"), &mut face),
            InterestDisposition::NotHandled
        );
        assert_eq!(responder.responded_count(), 0);
    }

    #[test]
    fn test_filter_prefix() {
        let responder = Responder::new(&name("ccnx:/x/y"), None);
        assert_eq!(responder.filter_prefix(), &name("/x/y/ping"));
    }
}
