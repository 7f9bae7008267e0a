//! Queue events and the decoding interface.
//!
//! Turning raw market and event-queue bytes into structured values is the
//! job of a [`QueueCodec`] supplied by the embedding application.

use solana_sdk::pubkey::Pubkey;

/// A pending settlement event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueEvent {
    /// A fill; the maker's open-orders account must be settled.
    Fill {
        /// Maker's open-orders account.
        maker: Pubkey,
    },

    /// An order removal; the owner's open-orders account must be settled.
    Out {
        /// Owner's open-orders account.
        owner: Pubkey,
    },
}

impl QueueEvent {
    /// Returns the account the event must settle against.
    #[must_use]
    pub const fn account(&self) -> &Pubkey {
        match self {
            Self::Fill { maker } => maker,
            Self::Out { owner } => owner,
        }
    }

    /// Returns true for fill events.
    #[must_use]
    pub const fn is_fill(&self) -> bool {
        matches!(self, Self::Fill { .. })
    }
}

/// Codec errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Account data is shorter than the layout requires.
    #[error("account data truncated: expected at least {expected} bytes, got {actual}")]
    Truncated {
        /// Minimum length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// An event carries an unknown type tag.
    #[error("unknown event type {0}")]
    UnknownEventType(u8),

    /// The account does not have the expected discriminator.
    #[error("unexpected account discriminator")]
    InvalidDiscriminator,

    /// Any other malformed content.
    #[error("malformed account: {0}")]
    Malformed(String),
}

/// Decodes market and event-queue accounts.
pub trait QueueCodec: Send + Sync {
    /// Decodes the ordered pending events of an event-queue account.
    ///
    /// # Errors
    ///
    /// Returns an error if any event cannot be decoded.
    fn decode_events(&self, raw: &[u8]) -> Result<Vec<QueueEvent>, DecodeError>;

    /// Reads the number of pending events from the queue header.
    ///
    /// Does not decode the events themselves, so it succeeds on queues whose
    /// entries are malformed.
    ///
    /// # Errors
    ///
    /// Returns an error if the header itself cannot be read.
    fn queue_depth(&self, raw: &[u8]) -> Result<usize, DecodeError>;

    /// Decodes the event-queue address from a market account.
    ///
    /// # Errors
    ///
    /// Returns an error if the market account is malformed.
    fn decode_event_queue(&self, raw_market: &[u8]) -> Result<Pubkey, DecodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_account() {
        let a = Pubkey::new_from_array([1u8; 32]);
        let b = Pubkey::new_from_array([2u8; 32]);

        assert_eq!(QueueEvent::Fill { maker: a }.account(), &a);
        assert_eq!(QueueEvent::Out { owner: b }.account(), &b);
    }

    #[test]
    fn test_event_is_fill() {
        let a = Pubkey::new_from_array([1u8; 32]);
        assert!(QueueEvent::Fill { maker: a }.is_fill());
        assert!(!QueueEvent::Out { owner: a }.is_fill());
    }

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::Truncated {
            expected: 16,
            actual: 4,
        };
        assert_eq!(
            err.to_string(),
            "account data truncated: expected at least 16 bytes, got 4"
        );
    }
}
