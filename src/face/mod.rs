//! Transport faces.
//!
//! A face moves Interests and Data between this process and the network.
//! Consumers express Interests and later receive exactly one terminal event
//! per Interest name: the matching Data, or a timeout once the Interest
//! lifetime has elapsed. Producers receive Interests through registered
//! prefix filters and answer them with signed Data.
//!
//! Two implementations are provided:
//! - `udp`: real datagram transport, one packet per datagram.
//! - `memory`: in-process transport driven by the tokio clock, used for tests.

pub mod memory;
mod pit;
pub mod udp;

use thiserror::Error;

use crate::{
    name::Name,
    packets::{Data, Interest, PacketError},
};

pub use pit::PendingInterestTable;

/// Errors reported by faces.
#[derive(Error, Debug)]
pub enum FaceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Packet(#[from] PacketError),

    #[error("Interest {0} is already pending")]
    DuplicateInterest(Name),
}

/// Terminal outcome of an expressed Interest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaceEvent {
    /// Data satisfied the pending Interest named `interest`.
    Data { interest: Name, data: Data },
    /// The Interest lifetime elapsed without matching Data.
    Timeout(Name),
}

/// Requesting side of a face.
#[allow(async_fn_in_trait)]
pub trait Consumer {
    /// Hands an Interest to the transport.
    ///
    /// The Interest is tracked before the send is attempted, so even when this
    /// returns an error the Interest still resolves through `next_event`.
    /// Only `FaceError::DuplicateInterest` leaves nothing pending.
    fn express_interest(&mut self, interest: Interest) -> Result<(), FaceError>;

    /// Waits for the next Data or timeout.
    async fn next_event(&mut self) -> Result<FaceEvent, FaceError>;

    /// Number of Interests still awaiting an outcome.
    fn pending_interests(&self) -> usize;
}

/// Answering side of a face, handed to interest handlers.
pub trait Producer {
    /// Builds a signed Data packet.
    fn sign(&self, name: Name, content: Vec<u8>, freshness: Option<u32>)
        -> Result<Data, FaceError>;

    /// Sends Data towards whoever asked for it.
    fn put(&mut self, data: Data) -> Result<(), FaceError>;
}

/// What an interest handler did with an Interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterestDisposition {
    /// Answered; later filters must not see this Interest.
    Consumed,
    /// Ignored; later filters may still answer it.
    NotHandled,
}

/// Callback installed under a prefix with `register_prefix`.
pub trait InterestHandler {
    fn on_interest(&mut self, interest: &Interest, face: &mut dyn Producer)
        -> InterestDisposition;
}

/// Prefix filters in registration order.
#[derive(Default)]
pub(crate) struct FilterTable {
    filters: Vec<(Name, Box<dyn InterestHandler>)>,
}

impl FilterTable {
    pub(crate) fn register(&mut self, prefix: Name, handler: Box<dyn InterestHandler>) {
        log::debug!("Interest filter registered for {}", prefix);
        self.filters.push((prefix, handler));
    }

    /// Offers `interest` to every matching filter until one consumes it.
    pub(crate) fn dispatch(
        &mut self,
        interest: &Interest,
        face: &mut dyn Producer,
    ) -> InterestDisposition {
        for (prefix, handler) in self.filters.iter_mut() {
            if !prefix.is_prefix_of(&interest.name) {
                continue;
            }
            if handler.on_interest(interest, face) == InterestDisposition::Consumed {
                return InterestDisposition::Consumed;
            }
        }
        InterestDisposition::NotHandled
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.filters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packets::{Signer, DEFAULT_INTEREST_LIFETIME};

    struct Recorder {
        seen: std::rc::Rc<std::cell::RefCell<Vec<&'static str>>>,
        label: &'static str,
        consume: bool,
    }

    impl InterestHandler for Recorder {
        fn on_interest(
            &mut self,
            _interest: &Interest,
            _face: &mut dyn Producer,
        ) -> InterestDisposition {
            self.seen.borrow_mut().push(self.label);
            if self.consume {
                InterestDisposition::Consumed
            } else {
                InterestDisposition::NotHandled
            }
        }
    }

    struct NullProducer;

    impl Producer for NullProducer {
        fn sign(
            &self,
            name: Name,
            content: Vec<u8>,
            freshness: Option<u32>,
        ) -> Result<Data, FaceError> {
            Ok(Signer::Digest.sign(name, content, freshness)?)
        }

        fn put(&mut self, _data: Data) -> Result<(), FaceError> {
            Ok(())
        }
    }

    #[test]
    fn test_dispatch_stops_at_first_consumer() {
        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut table = FilterTable::default();
        let prefix = Name::from_uri("/a").unwrap();

        for (label, consume) in [("first", false), ("second", true), ("third", true)] {
            table.register(
                prefix.clone(),
                Box::new(Recorder {
                    seen: seen.clone(),
                    label,
                    consume,
                }),
            );
        }

        let interest = Interest::new(Name::from_uri("/a/b").unwrap(), DEFAULT_INTEREST_LIFETIME);
        let result = table.dispatch(&interest, &mut NullProducer);

        assert_eq!(result, InterestDisposition::Consumed);
        assert_eq!(*seen.borrow(), vec!["first", "second"]);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_dispatch_skips_other_prefixes() {
        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut table = FilterTable::default();
        table.register(
            Name::from_uri("/other").unwrap(),
            Box::new(Recorder {
                seen: seen.clone(),
                label: "other",
                consume: true,
            }),
        );

        let interest = Interest::new(Name::from_uri("/a/b").unwrap(), DEFAULT_INTEREST_LIFETIME);
        assert_eq!(
            table.dispatch(&interest, &mut NullProducer),
            InterestDisposition::NotHandled
        );
        assert!(seen.borrow().is_empty());
    }
}
