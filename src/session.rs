//! Probe session: emits numbered ping Interests on a schedule and matches
//! every one of them to its Data or timeout.
//!
//! Probe names have the shape `<prefix>/ping[/<identifier>]/<number>`. Each
//! emitted probe is recorded in the pending table before it reaches the face,
//! and leaves the table exactly once, when the face reports its outcome.

use std::{collections::HashMap, future::Future, time::Duration};

use rand::{rngs::StdRng, Rng, SeedableRng};
use thiserror::Error;
use tokio::time::{Instant, MissedTickBehavior};

use crate::{
    face::{Consumer, FaceError, FaceEvent},
    name::Name,
    packets::{Interest, DEFAULT_INTEREST_LIFETIME},
    stats::Statistics,
    time::Printer,
};

/// Name component inserted between the prefix and the probe number.
pub const PING_COMPONENT: &str = "ping";

/// Largest number drawn in random numbering mode.
pub const MAX_RANDOM_NUMBER: u64 = i32::MAX as u64;

#[derive(Error, Debug)]
pub enum SessionError {
    /// The face resolved an Interest this session never issued or already resolved.
    #[error("outcome for {0} matches no pending probe")]
    UnknownProbe(Name),

    #[error("face error: {0}")]
    Face(#[from] FaceError),
}

/// How probe numbers are chosen.
#[derive(Debug, Clone)]
pub enum Numbering {
    /// Counts up from the given start value.
    Sequential(u64),
    /// Draws uniformly from `0..=MAX_RANDOM_NUMBER`.
    Random(StdRng),
}

impl Numbering {
    /// Random numbering seeded from OS entropy.
    pub fn random() -> Self {
        Numbering::Random(StdRng::from_entropy())
    }

    /// Random numbering with a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Numbering::Random(StdRng::seed_from_u64(seed))
    }

    /// Sequential from `start`, or random when `start` is `None`.
    pub fn from_start(start: Option<u64>) -> Self {
        match start {
            Some(start) => Numbering::Sequential(start),
            None => Numbering::random(),
        }
    }

    fn next_number(&mut self) -> u64 {
        match self {
            Numbering::Sequential(next) => {
                let number = *next;
                *next = next.wrapping_add(1);
                number
            }
            Numbering::Random(rng) => rng.gen_range(0..=MAX_RANDOM_NUMBER),
        }
    }
}

/// Settings of one session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Prefix being pinged.
    pub prefix: Name,
    /// Prefix as the operator typed it, used in output lines.
    pub display_prefix: String,
    pub identifier: Option<String>,
    pub interval: Duration,
    /// Number of probes to send; `None` sends until interrupted.
    pub limit: Option<u64>,
    pub numbering: Numbering,
    pub lifetime: Duration,
    pub allow_caching: bool,
    pub printer: Printer,
}

impl SessionOptions {
    /// Defaults: one probe per second, no limit, random numbering.
    pub fn new(prefix: Name) -> Self {
        SessionOptions {
            display_prefix: prefix.to_string(),
            prefix,
            identifier: None,
            interval: Duration::from_secs(1),
            limit: None,
            numbering: Numbering::random(),
            lifetime: DEFAULT_INTEREST_LIFETIME,
            allow_caching: false,
            printer: Printer::default(),
        }
    }
}

/// An issued probe awaiting its outcome.
#[derive(Debug, Clone, Copy)]
struct PendingProbe {
    number: u64,
    sent_at: Instant,
}

/// How `PingSession::run` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Every probe was sent and resolved.
    Completed,
    /// The shutdown future fired first.
    Interrupted,
}

enum Step {
    Emit,
    Event(Result<FaceEvent, FaceError>),
    Interrupted,
}

pub struct PingSession {
    target: Name,
    display_prefix: String,
    interval: Duration,
    limit: Option<u64>,
    numbering: Numbering,
    lifetime: Duration,
    allow_caching: bool,
    sent: u64,
    received: u64,
    pending: HashMap<Name, PendingProbe>,
    stats: Statistics,
    printer: Printer,
}

impl PingSession {
    pub fn new(options: SessionOptions) -> Self {
        let mut target = options.prefix.append(PING_COMPONENT);
        if let Some(identifier) = options.identifier {
            target.push(identifier);
        }

        PingSession {
            target,
            stats: Statistics::new(options.display_prefix.clone()),
            display_prefix: options.display_prefix,
            interval: options.interval,
            limit: options.limit,
            numbering: options.numbering,
            lifetime: options.lifetime,
            allow_caching: options.allow_caching,
            sent: 0,
            received: 0,
            pending: HashMap::new(),
            printer: options.printer,
        }
    }

    /// Name every probe of this session extends: `<prefix>/ping[/<identifier>]`.
    pub fn target(&self) -> &Name {
        &self.target
    }

    pub fn sent_count(&self) -> u64 {
        self.sent
    }

    pub fn received_count(&self) -> u64 {
        self.received
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    /// True while the limit (if any) has not been reached.
    pub fn wants_more(&self) -> bool {
        self.limit.map_or(true, |limit| self.sent < limit)
    }

    /// True once the limit is reached and every probe has resolved.
    ///
    /// A session without a limit never completes.
    pub fn is_complete(&self) -> bool {
        !self.wants_more() && self.pending.is_empty()
    }

    fn probe_name(&self, number: u64) -> Name {
        self.target.append(number.to_string())
    }

    /// Picks the next number whose probe name is not already pending.
    fn next_probe(&mut self) -> (u64, Name) {
        loop {
            let number = self.numbering.next_number();
            let name = self.probe_name(number);
            if !self.pending.contains_key(&name) {
                return (number, name);
            }
            log::debug!("Probe {} still pending, drawing another number", name);
        }
    }

    /// Issues one probe through `face`.
    ///
    /// A failed send is reported and the probe stays pending; the face will
    /// still time it out.
    pub fn emit_probe<C: Consumer>(&mut self, face: &mut C) -> Result<(), SessionError> {
        let (number, name) = self.next_probe();
        let interest =
            Interest::new(name.clone(), self.lifetime).with_must_be_fresh(!self.allow_caching);

        self.pending.insert(
            name.clone(),
            PendingProbe {
                number,
                sent_at: Instant::now(),
            },
        );
        self.sent += 1;
        self.stats.record_sent();

        match face.express_interest(interest) {
            Ok(()) => {
                log::debug!("Expressed Interest {}", name);
                Ok(())
            }
            Err(e @ FaceError::DuplicateInterest(_)) => {
                // The face holds no entry for it, so nothing would ever resolve it.
                self.pending.remove(&name);
                Err(e.into())
            }
            Err(e) => {
                log::warn!("Sending Interest {} failed: {}", name, e);
                self.printer.println(&format!(
                    "failed to express Interest to {}: number = {}",
                    self.display_prefix, number
                ));
                Ok(())
            }
        }
    }

    /// Applies one face outcome to the pending table and statistics.
    pub fn handle_event(&mut self, event: FaceEvent) -> Result<(), SessionError> {
        match event {
            FaceEvent::Data { interest, data } => {
                let probe = self.take_pending(interest)?;
                let rtt_ms = probe.sent_at.elapsed().as_secs_f64() * 1000.0;
                log::debug!("Data {} ({} bytes content)", data.name, data.content.len());

                self.received += 1;
                self.stats.record_rtt(rtt_ms);
                self.printer.println(&format!(
                    "content from {}: number = {}  rtt = {:.3} ms",
                    self.display_prefix, probe.number, rtt_ms
                ));
            }
            FaceEvent::Timeout(name) => {
                let probe = self.take_pending(name)?;
                self.printer.println(&format!(
                    "timeout from {}: number = {}",
                    self.display_prefix, probe.number
                ));
            }
        }
        Ok(())
    }

    fn take_pending(&mut self, name: Name) -> Result<PendingProbe, SessionError> {
        match self.pending.remove(&name) {
            Some(probe) => Ok(probe),
            None => Err(SessionError::UnknownProbe(name)),
        }
    }

    /// Drives emission and outcome handling until the session completes or
    /// `shutdown` resolves.
    ///
    /// The first probe goes out immediately, the rest every `interval`. After
    /// the last probe is sent the loop keeps servicing the face until the
    /// pending table drains.
    pub async fn run<C, S>(&mut self, face: &mut C, shutdown: S) -> Result<SessionEnd, SessionError>
    where
        C: Consumer,
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.printer
            .println(&format!("CCNPING {}", self.display_prefix));

        loop {
            if self.is_complete() {
                return Ok(SessionEnd::Completed);
            }

            let emitting = self.wants_more();
            let waiting = !self.pending.is_empty();

            let step = tokio::select! {
                _ = &mut shutdown => Step::Interrupted,
                _ = ticker.tick(), if emitting => Step::Emit,
                event = face.next_event(), if waiting => Step::Event(event),
            };

            match step {
                Step::Interrupted => {
                    log::info!(
                        "Interrupted with {} probe(s) outstanding",
                        self.pending.len()
                    );
                    return Ok(SessionEnd::Interrupted);
                }
                Step::Emit => self.emit_probe(face)?,
                Step::Event(event) => self.handle_event(event?)?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::memory::MemoryFace;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    fn options(numbering: Numbering) -> SessionOptions {
        let mut options = SessionOptions::new(name("/a"));
        options.numbering = numbering;
        options.lifetime = Duration::from_millis(200);
        options.printer = Printer::capturing(false);
        options
    }

    #[test]
    fn test_sequential_numbering() {
        let mut numbering = Numbering::Sequential(5);
        let drawn: Vec<u64> = (0..3).map(|_| numbering.next_number()).collect();
        assert_eq!(drawn, vec![5, 6, 7]);
    }

    #[test]
    fn test_random_numbering_range_and_seed() {
        let mut a = Numbering::seeded(7);
        let mut b = Numbering::seeded(7);
        for _ in 0..100 {
            let number = a.next_number();
            assert!(number <= MAX_RANDOM_NUMBER);
            assert_eq!(number, b.next_number());
        }
    }

    #[test]
    fn test_target_name_with_identifier() {
        let mut opts = options(Numbering::Sequential(0));
        opts.identifier = Some("xyz".to_string());
        let session = PingSession::new(opts);
        assert_eq!(session.target(), &name("/a/ping/xyz"));
        assert_eq!(session.probe_name(3), name("/a/ping/xyz/3"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_emit_probe_records_pending() {
        let mut face = MemoryFace::new(Duration::from_millis(10));
        let mut session = PingSession::new(options(Numbering::Sequential(0)));

        session.emit_probe(&mut face).unwrap();
        session.emit_probe(&mut face).unwrap();

        assert_eq!(session.sent_count(), 2);
        assert_eq!(session.statistics().sent(), 2);
        assert_eq!(session.pending_count(), 2);
        let names: Vec<_> = face.expressed().iter().map(|i| i.name.clone()).collect();
        assert_eq!(names, vec![name("/a/ping/0"), name("/a/ping/1")]);
        assert!(face.expressed().iter().all(|i| i.must_be_fresh));
    }

    #[tokio::test(start_paused = true)]
    async fn test_allow_caching_clears_must_be_fresh() {
        let mut face = MemoryFace::new(Duration::from_millis(10));
        let mut opts = options(Numbering::Sequential(0));
        opts.allow_caching = true;
        let mut session = PingSession::new(opts);

        session.emit_probe(&mut face).unwrap();
        assert!(!face.expressed()[0].must_be_fresh);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_send_stays_pending() {
        let mut face = MemoryFace::new(Duration::ZERO).with_failing_sends();
        let opts = options(Numbering::Sequential(4));
        let printer = opts.printer.clone();
        let mut session = PingSession::new(opts);

        session.emit_probe(&mut face).unwrap();
        assert_eq!(session.sent_count(), 1);
        assert_eq!(session.pending_count(), 1);
        assert_eq!(
            printer.captured(),
            vec!["failed to express Interest to ccnx:/a: number = 4"]
        );

        let event = face.next_event().await.unwrap();
        session.handle_event(event).unwrap();
        assert_eq!(session.pending_count(), 0);
        assert_eq!(session.received_count(), 0);
        assert_eq!(
            printer.captured().last().map(String::as_str),
            Some("timeout from ccnx:/a: number = 4")
        );
    }

    #[test]
    fn test_unknown_probe_is_an_error() {
        let mut session = PingSession::new(options(Numbering::Sequential(0)));
        let result = session.handle_event(FaceEvent::Timeout(name("/a/ping/9")));
        assert!(matches!(result, Err(SessionError::UnknownProbe(n)) if n == name("/a/ping/9")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_session_runs_until_shutdown() {
        let mut face = MemoryFace::new(Duration::ZERO);
        let mut opts = options(Numbering::Sequential(0));
        opts.interval = Duration::from_millis(100);
        let mut session = PingSession::new(opts);

        let shutdown = tokio::time::sleep(Duration::from_millis(450));
        let end = session.run(&mut face, shutdown).await.unwrap();

        assert_eq!(end, SessionEnd::Interrupted);
        // Probes at 0, 100, 200, 300 and 400 ms.
        assert_eq!(session.sent_count(), 5);
        assert!(!session.is_complete());
    }
}
