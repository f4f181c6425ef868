// Copyright 2019-2021 Parity Technologies (UK) Ltd.
// This file is part of Parity Bridges Common.

// Parity Bridges Common is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Parity Bridges Common is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Parity Bridges Common.  If not, see <http://www.gnu.org/licenses/>.

//! Errors of the header sync loop.

use bp_beacon::MerkleizationError;
use relay_utils::{FailedClient, MaybeConnectionError};
use thiserror::Error;

/// Outcome of a failed sync tick.
///
/// The loop dispatches over this enum exhaustively: recoverable conditions
/// are logged and retried on the next tick, everything else stops the loop
/// and is either mapped to a reconnect (connection errors) or propagated to
/// the supervisor.
#[derive(Debug, Error)]
pub enum Error<SourceError, TargetError> {
	/// The latest finalized header at the source is the one already synced.
	/// A no-op signal rather than a failure.
	#[error("finalized header is unchanged")]
	FinalizedHeaderUnchanged,
	/// The finalized header update was submitted, but the destination chain
	/// has not accepted it.
	#[error("finalized header at slot {0} was not imported by the target chain")]
	FinalizedHeaderNotImported(u64),
	/// The sync committee update was submitted, but the destination chain has
	/// not accepted it.
	#[error("sync committee update for period {0} was not imported by the target chain")]
	SyncCommitteeNotImported(u64),
	/// The destination chain is still behind the current sync committee
	/// period. Periods are accumulating faster than the relay closes them,
	/// so the execution header path gets priority on the next tick instead
	/// of an ever-growing period catch-up.
	#[error("target chain sync committee period {imported} is behind the required period {required}")]
	SyncCommitteeLatency {
		/// Period accepted by the destination chain.
		imported: u64,
		/// Period required to verify the latest finalized update.
		required: u64,
	},
	/// The source node does not serve a committee update for the period yet.
	#[error("sync committee update for period {0} is not available at the source node")]
	SyncCommitteeUpdateUnavailable(u64),
	/// The batched execution header updates were submitted, but the
	/// destination chain has not caught up within the confirmation budget.
	#[error("execution headers up to slot {0} were not imported by the target chain")]
	ExecutionHeaderNotImported(u64),
	/// The source node has pruned, or not yet computed, the beacon state
	/// needed for a block-roots accumulator. State availability lags
	/// finality, so the condition resolves itself with time.
	#[error("beacon state for slot {0} is not yet available at the source node")]
	BeaconStateUnavailable(u64),
	/// A checkpoint candidate is not an accepted finalized header on the
	/// destination chain. Checkpoints are never populated speculatively.
	#[error("checkpoint candidate at slot {0} is not an accepted finalized header on the target chain")]
	CheckpointUnconfirmed(u64),
	/// A hash tree root could not be computed from source chain data.
	#[error("failed to compute a hash tree root: {0:?}")]
	Merkleization(MerkleizationError),
	/// A source client request has failed.
	#[error("source client error: {0:?}")]
	Source(SourceError),
	/// A target client request has failed.
	#[error("target client error: {0:?}")]
	Target(TargetError),
}

impl<SourceError, TargetError> Error<SourceError, TargetError>
where
	SourceError: MaybeConnectionError,
	TargetError: MaybeConnectionError,
{
	/// Returns true when the tick may simply be retried unchanged: the cache
	/// is mutated only after on-chain confirmation and all submissions are
	/// verified by reading chain state back, so re-running the same
	/// reconciliation is always safe.
	pub fn is_recoverable(&self) -> bool {
		match self {
			Error::FinalizedHeaderUnchanged |
			Error::FinalizedHeaderNotImported(_) |
			Error::SyncCommitteeNotImported(_) |
			Error::SyncCommitteeLatency { .. } |
			Error::SyncCommitteeUpdateUnavailable(_) |
			Error::ExecutionHeaderNotImported(_) |
			Error::BeaconStateUnavailable(_) |
			Error::CheckpointUnconfirmed(_) => true,
			Error::Merkleization(_) | Error::Source(_) | Error::Target(_) => false,
		}
	}

	/// Returns the client we have lost connection to, if this is a
	/// connection error.
	pub fn fail_if_connection_error(&self) -> Result<(), FailedClient> {
		match self {
			Error::Source(error) if error.is_connection_error() => Err(FailedClient::Source),
			Error::Target(error) if error.is_connection_error() => Err(FailedClient::Target),
			_ => Ok(()),
		}
	}
}
