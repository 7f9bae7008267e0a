//! Settlement instruction building.
//!
//! Builds ConsumeEvents instructions for the settlement program.

use borsh::BorshSerialize;
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};

use crate::error::CrankError;
use crate::market::Market;

/// Instruction discriminator for ConsumeEvents.
pub const CONSUME_EVENTS_DISCRIMINATOR: [u8; 8] = [221, 145, 177, 52, 31, 47, 63, 201];

/// ConsumeEvents arguments (on-chain format).
#[derive(Debug, Clone, BorshSerialize)]
struct ConsumeEventsInstructionData {
    /// Maximum events to process.
    limit: u64,
}

/// Builder for settlement instructions.
#[derive(Debug, Clone)]
pub struct InstructionBuilder {
    /// Settlement program.
    program_id: Pubkey,

    /// Maximum events consumed per instruction.
    consume_events_limit: u64,
}

impl InstructionBuilder {
    /// Creates a new instruction builder.
    #[must_use]
    pub const fn new(program_id: Pubkey, consume_events_limit: u64) -> Self {
        Self {
            program_id,
            consume_events_limit,
        }
    }

    /// Returns the program ID.
    #[must_use]
    pub const fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    /// Builds a ConsumeEvents instruction.
    ///
    /// Accounts are the market (read-only), its event queue, then every
    /// settlement target, all writable.
    ///
    /// # Errors
    ///
    /// Returns `CrankError::Encode` if the instruction data cannot be serialized.
    pub fn build_consume_events(
        &self,
        market: &Market,
        targets: &[Pubkey],
    ) -> Result<Instruction, CrankError> {
        let mut accounts = Vec::with_capacity(targets.len() + 2);
        accounts.push(AccountMeta::new_readonly(market.address, false));
        accounts.push(AccountMeta::new(market.event_queue, false));
        accounts.extend(targets.iter().map(|target| AccountMeta::new(*target, false)));

        let args = ConsumeEventsInstructionData {
            limit: self.consume_events_limit,
        };
        let mut data = CONSUME_EVENTS_DISCRIMINATOR.to_vec();
        data.extend(borsh::to_vec(&args).map_err(|e| CrankError::Encode(e.to_string()))?);

        Ok(Instruction {
            program_id: self.program_id,
            accounts,
            data,
        })
    }
}
