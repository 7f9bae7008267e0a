//! Batch planning.
//!
//! Turns per-market queue contents into settlement instructions and packs
//! them into transactions that respect the ledger's per-transaction account
//! ceiling and the configured instruction ceiling. Each batch gets a fee
//! tier: priority if any market in it is congested or allow-listed.

use std::collections::{HashSet, VecDeque};

use solana_sdk::{instruction::Instruction, pubkey::Pubkey};
use tracing::debug;

use crate::builder::InstructionBuilder;
use crate::codec::QueueEvent;
use crate::config::{ConfigError, CrankConfig};
use crate::dedup::settlement_targets;
use crate::error::CrankError;
use crate::market::Market;

/// Fee tier of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeTier {
    /// Base compute unit price.
    Normal,
    /// Elevated compute unit price.
    Priority,
}

/// A settlement instruction for one market, built fresh every tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrankInstruction {
    /// Market being settled.
    pub market: Pubkey,

    /// The settlement instruction.
    pub instruction: Instruction,

    /// Queue depth when the instruction was built.
    pub event_count: usize,

    /// Whether the market qualifies for the priority fee this tick.
    pub priority: bool,
}

impl CrankInstruction {
    /// Returns the number of distinct accounts the instruction references.
    #[must_use]
    pub fn distinct_accounts(&self) -> usize {
        account_keys(&self.instruction).collect::<HashSet<_>>().len()
    }

    /// Returns the number of settlement targets (accounts past market and queue).
    #[must_use]
    pub fn target_count(&self) -> usize {
        self.instruction.accounts.len().saturating_sub(2)
    }
}

/// Instructions assigned to one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Instructions in submission order.
    pub instructions: Vec<CrankInstruction>,

    /// Fee tier.
    pub fee_tier: FeeTier,

    /// Compute unit limit for the transaction.
    pub compute_unit_limit: u32,

    /// Compute unit price in micro-lamports.
    pub compute_unit_price: u64,
}

impl Batch {
    /// Returns the number of instructions (one per market).
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns true if the batch carries no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Returns true for priority batches.
    #[must_use]
    pub fn is_priority(&self) -> bool {
        self.fee_tier == FeeTier::Priority
    }

    /// Returns the markets in the batch.
    #[must_use]
    pub fn markets(&self) -> Vec<Pubkey> {
        self.instructions.iter().map(|ix| ix.market).collect()
    }

    /// Returns the number of distinct accounts across all instructions.
    #[must_use]
    pub fn distinct_accounts(&self) -> usize {
        self.instructions
            .iter()
            .flat_map(|ix| account_keys(&ix.instruction))
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Output of packing.
#[derive(Debug, Default)]
pub struct PackResult {
    /// Packed batches in submission order.
    pub batches: Vec<Batch>,

    /// Instructions that fit no transaction, as `PackingOverflow` errors.
    pub dropped: Vec<CrankError>,
}

/// Builds settlement instructions and packs them into batches.
#[derive(Debug, Clone)]
pub struct CrankBatchPlanner {
    builder: InstructionBuilder,
    min_events: usize,
    priority_queue_limit: usize,
    priority_markets: HashSet<Pubkey>,
    max_tx_instructions: usize,
    max_tx_accounts: usize,
    cu_price: u64,
    priority_cu_price: u64,
    cu_limit_per_instruction: u32,
}

impl CrankBatchPlanner {
    /// Creates a planner from the crank configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the program id or priority markets are invalid.
    pub fn from_config(config: &CrankConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            builder: InstructionBuilder::new(
                config.parse_program_id()?,
                config.consume_events_limit,
            ),
            min_events: config.min_events,
            priority_queue_limit: config.priority_queue_limit,
            priority_markets: config.parse_priority_markets()?.into_iter().collect(),
            max_tx_instructions: config.max_tx_instructions,
            max_tx_accounts: config.max_tx_accounts,
            cu_price: config.cu_price,
            priority_cu_price: config.priority_cu_price,
            cu_limit_per_instruction: config.cu_limit_per_instruction,
        })
    }

    /// Returns true if a market at `depth` qualifies for the priority fee.
    #[must_use]
    pub fn is_priority(&self, market: &Pubkey, depth: usize) -> bool {
        depth > self.priority_queue_limit || self.priority_markets.contains(market)
    }

    /// Builds the settlement instruction for one market.
    ///
    /// Returns `None` if the queue is empty or below the minimum depth.
    ///
    /// # Errors
    ///
    /// Returns `CrankError::Encode` if the instruction cannot be encoded.
    pub fn plan_instruction(
        &self,
        market: &Market,
        events: &[QueueEvent],
    ) -> Result<Option<CrankInstruction>, CrankError> {
        let depth = events.len();
        if depth == 0 || depth < self.min_events {
            return Ok(None);
        }

        let targets = settlement_targets(events);
        Ok(Some(CrankInstruction {
            market: market.address,
            instruction: self.builder.build_consume_events(market, &targets)?,
            event_count: depth,
            priority: self.is_priority(&market.address, depth),
        }))
    }

    /// Packs instructions into batches, first fit in input order.
    ///
    /// A batch is closed at the first instruction that would push it past
    /// either ceiling; that instruction opens the next batch. Concatenating
    /// the batches yields the input minus dropped instructions, in order. An
    /// instruction that does not fit even an empty batch is dropped.
    #[must_use]
    pub fn pack(&self, instructions: Vec<CrankInstruction>) -> PackResult {
        let mut result = PackResult::default();
        let mut pending: VecDeque<CrankInstruction> = instructions.into();

        while let Some(head) = pending.pop_front() {
            let head_accounts = head.distinct_accounts();
            if head_accounts > self.max_tx_accounts {
                result.dropped.push(CrankError::PackingOverflow {
                    market: head.market,
                    accounts: head_accounts,
                    ceiling: self.max_tx_accounts,
                });
                continue;
            }

            let mut accounts: HashSet<Pubkey> = account_keys(&head.instruction).copied().collect();
            let mut batch = vec![head];

            while batch.len() < self.max_tx_instructions {
                let Some(candidate) = pending.front() else {
                    break;
                };

                let added = account_keys(&candidate.instruction)
                    .filter(|key| !accounts.contains(*key))
                    .collect::<HashSet<_>>()
                    .len();
                if accounts.len() + added > self.max_tx_accounts {
                    debug!(
                        market = %candidate.market,
                        "Adding the instruction would exceed limit for number of accounts"
                    );
                    break;
                }

                accounts.extend(account_keys(&candidate.instruction).copied());
                if let Some(next) = pending.pop_front() {
                    batch.push(next);
                }
            }

            result.batches.push(self.close_batch(batch));
        }

        result
    }

    fn close_batch(&self, instructions: Vec<CrankInstruction>) -> Batch {
        let priority = instructions.iter().any(|ix| ix.priority);
        let count = u32::try_from(instructions.len()).unwrap_or(u32::MAX);

        Batch {
            fee_tier: if priority {
                FeeTier::Priority
            } else {
                FeeTier::Normal
            },
            compute_unit_limit: self.cu_limit_per_instruction.saturating_mul(count),
            compute_unit_price: if priority {
                self.priority_cu_price
            } else {
                self.cu_price
            },
            instructions,
        }
    }
}

/// Iterates the addresses an instruction references.
fn account_keys(instruction: &Instruction) -> impl Iterator<Item = &Pubkey> {
    instruction.accounts.iter().map(|meta| &meta.pubkey)
}
