//! Transaction submission for the crank service.
//!
//! Compiles a batch into a v0 message behind a compute-budget prefix, signs
//! it and sends it without waiting for confirmation. The ledger's own
//! consensus decides finality; settlement is idempotent, so a transaction
//! that never lands is simply redone on a later tick.

use std::sync::Arc;

use solana_compute_budget_interface::ComputeBudgetInstruction;
use solana_sdk::{
    message::{v0, VersionedMessage},
    pubkey::Pubkey,
};
use tracing::{debug, info};

use crate::error::CrankError;
use crate::fee::{FeeContext, FeeContextReader};
use crate::ledger::LedgerClient;
use crate::metrics::CrankMetrics;
use crate::planner::{Batch, FeeTier};

/// A batch the ledger accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Submission identifier (transaction signature).
    pub signature: String,

    /// Number of markets cranked.
    pub market_count: usize,

    /// Fee tier the batch paid.
    pub fee_tier: FeeTier,
}

/// Transaction submitter for the crank service.
pub struct TransactionSubmitter {
    ledger: Arc<dyn LedgerClient>,
    fees: FeeContextReader,
    metrics: Option<Arc<CrankMetrics>>,
}

impl TransactionSubmitter {
    /// Creates a new transaction submitter.
    #[must_use]
    pub fn new(ledger: Arc<dyn LedgerClient>, fees: FeeContextReader) -> Self {
        Self {
            ledger,
            fees,
            metrics: None,
        }
    }

    /// Creates a submitter with metrics.
    #[must_use]
    pub fn with_metrics(
        ledger: Arc<dyn LedgerClient>,
        fees: FeeContextReader,
        metrics: Arc<CrankMetrics>,
    ) -> Self {
        Self {
            ledger,
            fees,
            metrics: Some(metrics),
        }
    }

    /// Compiles the message for a batch.
    ///
    /// Instruction order is: compute unit limit, compute unit price, then
    /// the batch's settlement instructions. The message is bound to the
    /// cached blockhash and paid for by `payer`.
    ///
    /// # Errors
    ///
    /// Returns `CrankError::Encode` if the message cannot be compiled.
    pub fn assemble(
        batch: &Batch,
        fees: &FeeContext,
        payer: &Pubkey,
    ) -> Result<VersionedMessage, CrankError> {
        let mut instructions = Vec::with_capacity(batch.len() + 2);
        instructions.push(ComputeBudgetInstruction::set_compute_unit_limit(
            batch.compute_unit_limit,
        ));
        instructions.push(ComputeBudgetInstruction::set_compute_unit_price(
            batch.compute_unit_price,
        ));
        instructions.extend(batch.instructions.iter().map(|ix| ix.instruction.clone()));

        let message = v0::Message::try_compile(payer, &instructions, &[], fees.blockhash)
            .map_err(|e| CrankError::Encode(e.to_string()))?;

        Ok(VersionedMessage::V0(message))
    }

    /// Signs and submits a batch.
    ///
    /// # Errors
    ///
    /// Returns `CrankError::Encode` if the message cannot be compiled, and
    /// `CrankError::Submission` if signing fails or the ledger rejects the
    /// transaction.
    pub async fn submit(&self, batch: &Batch) -> Result<Submission, CrankError> {
        let fees = self.fees.current();
        let message = Self::assemble(batch, &fees, &self.ledger.payer())?;

        debug!(
            blockhash = %fees.blockhash,
            cu_limit = batch.compute_unit_limit,
            cu_price = batch.compute_unit_price,
            "Submitting batch of {} instruction(s)",
            batch.len()
        );

        let result = match self.ledger.sign(&message) {
            Ok(signed) => self.ledger.submit_raw(&signed).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(signature) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_submission(batch.is_priority());
                }
                info!(
                    signature = %signature,
                    priority = batch.is_priority(),
                    "Cranked {} market(s)",
                    batch.len()
                );
                Ok(Submission {
                    signature,
                    market_count: batch.len(),
                    fee_tier: batch.fee_tier,
                })
            }
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_submission_failure();
                }
                Err(CrankError::Submission(e))
            }
        }
    }
}
