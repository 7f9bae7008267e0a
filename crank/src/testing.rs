//! In-memory ledger and codec doubles for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use solana_sdk::hash::Hash;
use solana_sdk::message::VersionedMessage;
use solana_sdk::pubkey::Pubkey;

use crate::codec::{DecodeError, QueueCodec, QueueEvent};
use crate::fee::FeeContext;
use crate::ledger::{FetchedAccount, LedgerClient, LedgerError};
use crate::telemetry::{QueueDepthPoint, TelemetrySink};

const ADDRESS_LEN: usize = 32;

const FILL_TAG: u8 = 0;
const OUT_TAG: u8 = 1;
const PANIC_TAG: u8 = 0xff;

/// Returns a deterministic test address.
pub fn addr(n: u8) -> Pubkey {
    let mut bytes = [0u8; ADDRESS_LEN];
    bytes[0] = n;
    bytes[ADDRESS_LEN - 1] = 1;
    Pubkey::new_from_array(bytes)
}

/// Returns a deterministic test blockhash.
pub fn blockhash(n: u8) -> Hash {
    Hash::new_from_array([n; 32])
}

/// Fee payer used by [`MockLedger`].
pub fn payer() -> Pubkey {
    Pubkey::new_from_array([0xaa; ADDRESS_LEN])
}

/// Encodes events in the layout [`MockCodec`] understands.
pub fn encode_events(events: &[QueueEvent]) -> Vec<u8> {
    let mut out = Vec::with_capacity(events.len() * (ADDRESS_LEN + 1));
    for event in events {
        let tag = if event.is_fill() { FILL_TAG } else { OUT_TAG };
        out.push(tag);
        out.extend_from_slice(event.account().as_ref());
    }
    out
}

/// Queue bytes the codec refuses to decode.
pub fn corrupt_queue() -> Vec<u8> {
    let mut out = vec![7u8];
    out.extend_from_slice(&[0u8; ADDRESS_LEN]);
    out
}

/// Queue bytes that make the codec panic.
pub fn panicking_queue() -> Vec<u8> {
    vec![PANIC_TAG]
}

/// Tag-plus-address codec.
#[derive(Debug, Default)]
pub struct MockCodec;

impl QueueCodec for MockCodec {
    fn decode_events(&self, raw: &[u8]) -> Result<Vec<QueueEvent>, DecodeError> {
        if raw.first() == Some(&PANIC_TAG) {
            panic!("codec invariant violated");
        }

        raw.chunks(ADDRESS_LEN + 1)
            .map(|chunk| {
                let (tag, key) = chunk.split_first().ok_or(DecodeError::Truncated {
                    expected: ADDRESS_LEN + 1,
                    actual: 0,
                })?;
                let account = Pubkey::try_from(key).map_err(|_| DecodeError::Truncated {
                    expected: ADDRESS_LEN + 1,
                    actual: chunk.len(),
                })?;
                match *tag {
                    FILL_TAG => Ok(QueueEvent::Fill { maker: account }),
                    OUT_TAG => Ok(QueueEvent::Out { owner: account }),
                    other => Err(DecodeError::UnknownEventType(other)),
                }
            })
            .collect()
    }

    fn queue_depth(&self, raw: &[u8]) -> Result<usize, DecodeError> {
        Ok(raw.len() / (ADDRESS_LEN + 1))
    }

    fn decode_event_queue(&self, raw_market: &[u8]) -> Result<Pubkey, DecodeError> {
        let key = raw_market.get(..ADDRESS_LEN).ok_or(DecodeError::Truncated {
            expected: ADDRESS_LEN,
            actual: raw_market.len(),
        })?;
        let queue =
            Pubkey::try_from(key).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        if queue == Pubkey::default() {
            return Err(DecodeError::Malformed("event queue not set".to_string()));
        }
        Ok(queue)
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    accounts: HashMap<Pubkey, Vec<u8>>,
    slot: u64,
    fetch_failures: VecDeque<LedgerError>,
    slot_overrides: VecDeque<u64>,
    checkpoint_failures: VecDeque<LedgerError>,
    checkpoints: u64,
    submit_failures: VecDeque<LedgerError>,
    signed: Vec<VersionedMessage>,
    submitted: Vec<VersionedMessage>,
}

/// Scriptable in-memory ledger.
#[derive(Debug, Default)]
pub struct MockLedger {
    state: Mutex<LedgerState>,
}

impl MockLedger {
    /// Creates an empty ledger at slot 100.
    pub fn new() -> Self {
        let ledger = Self::default();
        ledger.state().slot = 100;
        ledger
    }

    fn state(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.state.lock().expect("ledger state")
    }

    /// Stores account data.
    pub fn set_account(&self, address: Pubkey, data: Vec<u8>) {
        self.state().accounts.insert(address, data);
    }

    /// Stores an event queue holding `events`.
    pub fn set_queue(&self, address: Pubkey, events: &[QueueEvent]) {
        self.set_account(address, encode_events(events));
    }

    /// Removes an account.
    pub fn remove_account(&self, address: &Pubkey) {
        self.state().accounts.remove(address);
    }

    /// Sets the slot served by subsequent reads.
    pub fn set_slot(&self, slot: u64) {
        self.state().slot = slot;
    }

    /// Serves the next read at `slot` without changing the current slot.
    pub fn serve_next_read_at(&self, slot: u64) {
        self.state().slot_overrides.push_back(slot);
    }

    /// Fails the next account read.
    pub fn fail_next_fetch(&self, error: LedgerError) {
        self.state().fetch_failures.push_back(error);
    }

    /// Fails the next checkpoint read.
    pub fn fail_next_checkpoint(&self, error: LedgerError) {
        self.state().checkpoint_failures.push_back(error);
    }

    /// Rejects the next submission.
    pub fn fail_next_submit(&self, error: LedgerError) {
        self.state().submit_failures.push_back(error);
    }

    /// Returns messages accepted by `submit_raw`.
    pub fn submitted(&self) -> Vec<VersionedMessage> {
        self.state().submitted.clone()
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn fetch_accounts(
        &self,
        addresses: &[Pubkey],
    ) -> Result<Vec<FetchedAccount>, LedgerError> {
        let mut state = self.state();
        if let Some(error) = state.fetch_failures.pop_front() {
            return Err(error);
        }

        let slot = state.slot_overrides.pop_front().unwrap_or(state.slot);
        Ok(addresses
            .iter()
            .map(|a| FetchedAccount {
                data: state.accounts.get(a).cloned(),
                context_slot: slot,
            })
            .collect())
    }

    async fn fetch_latest_checkpoint(&self) -> Result<FeeContext, LedgerError> {
        let mut state = self.state();
        if let Some(error) = state.checkpoint_failures.pop_front() {
            return Err(error);
        }

        state.checkpoints += 1;
        let n = u8::try_from(state.checkpoints).unwrap_or(u8::MAX);
        Ok(FeeContext::new(blockhash(n), state.checkpoints + 150))
    }

    fn payer(&self) -> Pubkey {
        payer()
    }

    fn sign(&self, message: &VersionedMessage) -> Result<Vec<u8>, LedgerError> {
        let mut state = self.state();
        state.signed.push(message.clone());
        Ok(((state.signed.len() - 1) as u64).to_le_bytes().to_vec())
    }

    async fn submit_raw(&self, signed: &[u8]) -> Result<String, LedgerError> {
        let mut state = self.state();
        if let Some(error) = state.submit_failures.pop_front() {
            return Err(error);
        }

        let bytes: [u8; 8] = signed
            .try_into()
            .map_err(|_| LedgerError::Rejected("malformed".to_string()))?;
        let index = u64::from_le_bytes(bytes) as usize;
        let tx = state
            .signed
            .get(index)
            .cloned()
            .ok_or_else(|| LedgerError::Rejected("unknown transaction".to_string()))?;
        state.submitted.push(tx);

        Ok(format!("sig-{index}"))
    }
}

/// Telemetry sink that records everything it receives.
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    depths: Mutex<Vec<QueueDepthPoint>>,
    submissions: Mutex<Vec<(usize, String)>>,
    errors: Mutex<Vec<(String, String)>>,
    panicked: AtomicBool,
}

impl RecordingTelemetry {
    /// Recorded queue depth points.
    pub fn depths(&self) -> Vec<QueueDepthPoint> {
        self.depths.lock().expect("depths").clone()
    }

    /// Recorded submissions as `(market_count, submission_id)`.
    pub fn submissions(&self) -> Vec<(usize, String)> {
        self.submissions.lock().expect("submissions").clone()
    }

    /// Recorded error stages.
    pub fn error_stages(&self) -> Vec<String> {
        self.errors
            .lock()
            .expect("errors")
            .iter()
            .map(|(stage, _)| stage.clone())
            .collect()
    }

    /// Returns true if a panic was reported.
    pub fn saw_panic(&self) -> bool {
        self.panicked.load(Ordering::Relaxed)
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn record_queue_depth(&self, point: &QueueDepthPoint) {
        self.depths.lock().expect("depths").push(point.clone());
    }

    fn record_submission(&self, market_count: usize, submission_id: &str) {
        self.submissions
            .lock()
            .expect("submissions")
            .push((market_count, submission_id.to_string()));
    }

    fn record_error(&self, stage: &str, message: &str) {
        if stage == "panic" {
            self.panicked.store(true, Ordering::Relaxed);
        }
        self.errors
            .lock()
            .expect("errors")
            .push((stage.to_string(), message.to_string()));
    }
}
