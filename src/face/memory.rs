//! In-process face.
//!
//! Interests expressed on a `MemoryFace` are handed straight to the prefix
//! filters registered on the same face. Data they put is delivered after a
//! configurable delay measured on the tokio clock, so tests running with a
//! paused clock see fully deterministic round-trip times and timeouts.

use std::{collections::VecDeque, io, time::Duration};

use tokio::time::Instant;

use super::{
    pit::sleep_until_deadline, Consumer, FaceError, FaceEvent, FilterTable, InterestHandler,
    PendingInterestTable, Producer,
};
use crate::{
    name::Name,
    packets::{Data, Interest, Signer},
};

/// Consumer and producer joined back to back.
pub struct MemoryFace {
    pit: PendingInterestTable,
    filters: FilterTable,
    signer: Signer,
    delay: Duration,
    fail_sends: bool,
    in_flight: Vec<(Instant, Data)>,
    ready: VecDeque<FaceEvent>,
    expressed: Vec<Interest>,
}

/// Collects Data put by handlers while an Interest is dispatched.
struct Outbox<'a> {
    signer: &'a Signer,
    sent: Vec<Data>,
}

impl Producer for Outbox<'_> {
    fn sign(
        &self,
        name: Name,
        content: Vec<u8>,
        freshness: Option<u32>,
    ) -> Result<Data, FaceError> {
        Ok(self.signer.sign(name, content, freshness)?)
    }

    fn put(&mut self, data: Data) -> Result<(), FaceError> {
        self.sent.push(data);
        Ok(())
    }
}

impl MemoryFace {
    /// Creates a face that delivers Data `delay` after the Interest is expressed.
    pub fn new(delay: Duration) -> Self {
        MemoryFace {
            pit: PendingInterestTable::new(),
            filters: FilterTable::default(),
            signer: Signer::Digest,
            delay,
            fail_sends: false,
            in_flight: Vec::new(),
            ready: VecDeque::new(),
            expressed: Vec::new(),
        }
    }

    /// Makes every `express_interest` report a send failure. The Interests
    /// are still tracked and will time out.
    #[must_use]
    pub fn with_failing_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    pub fn register_prefix(&mut self, prefix: Name, handler: Box<dyn InterestHandler>) {
        self.filters.register(prefix, handler);
    }

    /// Every Interest expressed so far, in order.
    pub fn expressed(&self) -> &[Interest] {
        &self.expressed
    }

    fn next_wakeup(&self) -> Option<Instant> {
        let next_delivery = self.in_flight.iter().map(|(due, _)| *due).min();
        match (next_delivery, self.pit.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn deliver_due(&mut self, now: Instant) {
        let (due, later): (Vec<_>, Vec<_>) =
            self.in_flight.drain(..).partition(|(at, _)| *at <= now);
        self.in_flight = later;

        for (_, data) in due {
            match self.pit.satisfy(&data.name) {
                Some(interest) => self.ready.push_back(FaceEvent::Data { interest, data }),
                None => log::debug!("Dropping unsolicited Data {}", data.name),
            }
        }

        for name in self.pit.expire(now) {
            self.ready.push_back(FaceEvent::Timeout(name));
        }
    }
}

impl Consumer for MemoryFace {
    fn express_interest(&mut self, interest: Interest) -> Result<(), FaceError> {
        let now = Instant::now();
        if !self.pit.insert(interest.name.clone(), now + interest.lifetime()) {
            return Err(FaceError::DuplicateInterest(interest.name));
        }
        self.expressed.push(interest.clone());

        if self.fail_sends {
            return Err(io::Error::new(io::ErrorKind::Other, "simulated send failure").into());
        }

        let mut outbox = Outbox {
            signer: &self.signer,
            sent: Vec::new(),
        };
        self.filters.dispatch(&interest, &mut outbox);

        let due = now + self.delay;
        self.in_flight
            .extend(outbox.sent.into_iter().map(|data| (due, data)));
        Ok(())
    }

    async fn next_event(&mut self) -> Result<FaceEvent, FaceError> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Ok(event);
            }

            sleep_until_deadline(self.next_wakeup()).await;
            self.deliver_due(Instant::now());
        }
    }

    fn pending_interests(&self) -> usize {
        self.pit.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::InterestDisposition;

    struct Echo;

    impl InterestHandler for Echo {
        fn on_interest(
            &mut self,
            interest: &Interest,
            face: &mut dyn Producer,
        ) -> InterestDisposition {
            match face
                .sign(interest.name.clone(), b"echo".to_vec(), None)
                .and_then(|data| face.put(data))
            {
                Ok(()) => InterestDisposition::Consumed,
                Err(_) => InterestDisposition::NotHandled,
            }
        }
    }

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_data_delivered_after_delay() {
        let mut face = MemoryFace::new(Duration::from_millis(20));
        face.register_prefix(name("/a"), Box::new(Echo));

        let start = Instant::now();
        face.express_interest(Interest::new(name("/a/1"), Duration::from_secs(1)))
            .unwrap();
        assert_eq!(face.pending_interests(), 1);

        let event = face.next_event().await.unwrap();
        assert!(matches!(&event, FaceEvent::Data { interest, data }
            if *interest == name("/a/1") && data.content == b"echo"));
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert!(start.elapsed() < Duration::from_millis(25));
        assert_eq!(face.pending_interests(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_without_handler() {
        let mut face = MemoryFace::new(Duration::from_millis(20));

        let start = Instant::now();
        face.express_interest(Interest::new(name("/a/1"), Duration::from_millis(500)))
            .unwrap();

        let event = face.next_event().await.unwrap();
        assert_eq!(event, FaceEvent::Timeout(name("/a/1")));
        assert!(start.elapsed() >= Duration::from_millis(500));
        assert!(start.elapsed() < Duration::from_millis(505));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_send_still_times_out() {
        let mut face = MemoryFace::new(Duration::ZERO).with_failing_sends();
        face.register_prefix(name("/a"), Box::new(Echo));

        assert!(face
            .express_interest(Interest::new(name("/a/1"), Duration::from_millis(100)))
            .is_err());
        assert_eq!(face.pending_interests(), 1);
        assert_eq!(
            face.next_event().await.unwrap(),
            FaceEvent::Timeout(name("/a/1"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_interest_rejected() {
        let mut face = MemoryFace::new(Duration::ZERO);
        face.express_interest(Interest::new(name("/a/1"), Duration::from_secs(1)))
            .unwrap();
        assert!(matches!(
            face.express_interest(Interest::new(name("/a/1"), Duration::from_secs(1))),
            Err(FaceError::DuplicateInterest(_))
        ));
        assert_eq!(face.expressed().len(), 1);
    }
}
