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

//! The header sync loop.
//!
//! Once per tick the loop runs a fixed, strictly sequential reconciliation:
//! backfill execution headers up to the finalized watermark, check whether
//! the source chain has finalized something new, close the sync committee
//! period gap, then submit the new finalized header. Every step reads
//! destination chain state back before the cache is advanced, so a failure
//! (or restart) at any point is recovered by simply running the same
//! reconciliation again.

use crate::{cache::BeaconCache, checkpoints, error::Error};

use async_trait::async_trait;
use bp_beacon::{
	compute_period, config, BeaconHeader, BlockRootsTree, CheckpointUpdate, ExecutionHeaderState,
	ExecutionHeaderUpdate, FinalizedHeaderState, FinalizedUpdate, SyncCommitteeUpdate,
};
use futures::{future::FutureExt, select_biased};
use relay_utils::{relay_loop::Client as RelayClient, LoopError};
use sp_core::H256;
use std::{cmp, future::Future, sync::Arc, time::Duration};

pub use crate::cache::FinalizedCheckpoint;

/// Availability of a block-roots accumulator at the source node.
///
/// State availability lags finality on typical beacon nodes, so "not yet
/// available" is an expected answer rather than a failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockRootsAvailability {
	/// The accumulator for the requested slot.
	Available(BlockRootsTree),
	/// The state needed to build the accumulator has been pruned, or has not
	/// been computed yet.
	NotYetAvailable,
}

/// Source chain client: the beacon node API the relay reads headers, updates
/// and proofs from. Stateless; all sync state lives in the cache.
#[async_trait]
pub trait SourceClient: RelayClient {
	/// Returns the header with the given block root.
	async fn header(&self, root: H256) -> Result<BeaconHeader, Self::Error>;

	/// Returns the header at the given slot, or `None` if the slot is empty.
	async fn header_at_slot(&self, slot: u64) -> Result<Option<BeaconHeader>, Self::Error>;

	/// Returns the block root of the latest finalized checkpoint.
	async fn finalized_checkpoint(&self) -> Result<H256, Self::Error>;

	/// Returns the latest finalized update.
	async fn latest_finalized_update(&self) -> Result<FinalizedUpdate, Self::Error>;

	/// Returns the committee update of the given period, or `None` if the
	/// source node does not serve it (yet).
	async fn sync_committee_update(
		&self,
		period: u64,
	) -> Result<Option<SyncCommitteeUpdate>, Self::Error>;

	/// Returns the block-roots accumulator of a finalized slot.
	async fn block_roots(&self, slot: u64) -> Result<BlockRootsAvailability, Self::Error>;

	/// Returns the bootstrap snapshot for a finalized block root.
	async fn bootstrap(&self, root: H256) -> Result<CheckpointUpdate, Self::Error>;

	/// Returns the execution header update for the block at `slot`, with an
	/// ancestry witness anchored in the given checkpoint.
	async fn execution_header_update(
		&self,
		slot: u64,
		checkpoint: &FinalizedCheckpoint,
	) -> Result<ExecutionHeaderUpdate, Self::Error>;
}

/// Destination chain client: reads light client state and submits updates.
///
/// Submissions are never trusted: acceptance is always confirmed through the
/// state getters afterwards.
#[async_trait]
pub trait TargetClient: RelayClient {
	/// Returns the latest finalized header state accepted by the chain.
	async fn finalized_header_state(&self) -> Result<FinalizedHeaderState, Self::Error>;

	/// Returns the latest execution header state accepted by the chain.
	async fn execution_header_state(&self) -> Result<ExecutionHeaderState, Self::Error>;

	/// Returns the slot of an accepted finalized header, or `None` when the
	/// root is unknown to the chain.
	async fn finalized_header_slot_by_root(&self, root: H256)
		-> Result<Option<u64>, Self::Error>;

	/// Returns the latest sync committee period known to the chain.
	async fn last_sync_committee_period(&self) -> Result<u64, Self::Error>;

	/// Submits the bootstrap snapshot and waits for inclusion.
	async fn submit_checkpoint(&self, update: CheckpointUpdate) -> Result<(), Self::Error>;

	/// Submits a finalized header update and waits for inclusion.
	async fn submit_finalized_update(&self, update: FinalizedUpdate) -> Result<(), Self::Error>;

	/// Submits a sync committee update and waits for inclusion.
	async fn submit_sync_committee_update(
		&self,
		period: u64,
		update: SyncCommitteeUpdate,
	) -> Result<(), Self::Error>;

	/// Submits a batch of execution header updates as one batched call.
	/// Fire-and-forget: acceptance is confirmed through
	/// `execution_header_state`.
	async fn submit_execution_updates(
		&self,
		updates: Vec<ExecutionHeaderUpdate>,
	) -> Result<(), Self::Error>;
}

/// Header sync parameters.
///
/// The reference values below are deployment-tunable, not protocol-mandated.
#[derive(Debug, Clone)]
pub struct SyncParams {
	/// Interval between sync ticks.
	pub tick: Duration,
	/// Interval between on-chain confirmation polls after a batch of
	/// execution headers has been submitted.
	pub confirmation_interval: Duration,
	/// Number of confirmation polls before the batch is considered not
	/// imported.
	pub confirmation_attempts: usize,
	/// Max number of execution header updates submitted in one batched call.
	pub max_batch_size: usize,
	/// Max number of finalized checkpoints kept in the cache.
	pub checkpoint_cache_limit: usize,
	/// Slots per epoch of the source chain.
	pub slots_per_epoch: u64,
	/// Epochs per sync committee period of the source chain.
	pub epochs_per_sync_committee_period: u64,
}

impl SyncParams {
	/// Parameters for a mainnet-preset source chain.
	pub fn mainnet() -> Self {
		SyncParams {
			tick: Duration::from_secs(10),
			confirmation_interval: Duration::from_secs(6),
			confirmation_attempts: 12,
			max_batch_size: 64,
			checkpoint_cache_limit: 50,
			slots_per_epoch: config::MAINNET_SLOTS_PER_EPOCH,
			epochs_per_sync_committee_period: config::MAINNET_EPOCHS_PER_SYNC_COMMITTEE_PERIOD,
		}
	}

	/// Parameters for a minimal-preset source chain.
	pub fn minimal() -> Self {
		SyncParams {
			slots_per_epoch: config::MINIMAL_SLOTS_PER_EPOCH,
			epochs_per_sync_committee_period: config::MINIMAL_EPOCHS_PER_SYNC_COMMITTEE_PERIOD,
			..Self::mainnet()
		}
	}
}

impl Default for SyncParams {
	fn default() -> Self {
		Self::mainnet()
	}
}

/// Run the header sync loop until it is cancelled through `exit_signal` or
/// fails with an unrecoverable error. Lost connections are re-established and
/// the loop restarted from a fresh reconciliation.
pub async fn run<SC: SourceClient, TC: TargetClient>(
	source_client: SC,
	target_client: TC,
	params: SyncParams,
	exit_signal: impl Future<Output = ()> + 'static + Send,
) -> Result<(), Error<SC::Error, TC::Error>> {
	let exit_signal = exit_signal.shared();
	relay_utils::relay_loop::relay_loop(source_client, target_client)
		.run("beacon header sync", move |source_client, target_client| {
			HeaderSyncLoop::new(source_client, target_client, params.clone())
				.run_until_connection_lost(exit_signal.clone())
		})
		.await
}

/// The header sync state machine. Exclusively owns the checkpoint cache.
pub struct HeaderSyncLoop<SC, TC> {
	source_client: SC,
	target_client: TC,
	params: SyncParams,
	cache: Arc<BeaconCache>,
}

impl<SC: SourceClient, TC: TargetClient> HeaderSyncLoop<SC, TC> {
	/// Creates a sync loop with an empty cache. The cache is seeded from
	/// destination chain state when the loop starts.
	pub fn new(source_client: SC, target_client: TC, params: SyncParams) -> Self {
		let cache = Arc::new(BeaconCache::new(
			params.slots_per_epoch,
			params.epochs_per_sync_committee_period,
			params.checkpoint_cache_limit,
		));
		HeaderSyncLoop { source_client, target_client, params, cache }
	}

	/// Handle to the progress cache, for status queries outside the loop.
	pub fn cache(&self) -> Arc<BeaconCache> {
		self.cache.clone()
	}

	fn period(&self, slot: u64) -> u64 {
		compute_period(slot, self.params.slots_per_epoch, self.params.epochs_per_sync_committee_period)
	}

	/// Run the loop until the exit signal fires or a client connection is
	/// lost.
	pub async fn run_until_connection_lost(
		self,
		exit_signal: impl Future<Output = ()>,
	) -> Result<(), LoopError<Error<SC::Error, TC::Error>>> {
		if let Err(error) = self.reconcile().await {
			return Err(self.classify(error))
		}

		let exit_signal = exit_signal.fuse();
		futures::pin_mut!(exit_signal);

		loop {
			if let Err(error) = self.run_tick().await {
				self.on_tick_error(error)?;
			}

			select_biased! {
				_ = exit_signal => return Ok(()),
				_ = async_std::task::sleep(self.params.tick).fuse() => {},
			}
		}
	}

	/// Exhaustive dispatch over the tick outcome: recoverable conditions are
	/// logged and the loop carries on; everything else stops it.
	fn on_tick_error(
		&self,
		error: Error<SC::Error, TC::Error>,
	) -> Result<(), LoopError<Error<SC::Error, TC::Error>>> {
		match &error {
			Error::FinalizedHeaderUnchanged => {
				log::info!(target: "bridge", "No new finalized header at the source chain");
			},
			Error::FinalizedHeaderNotImported(slot) => {
				log::warn!(
					target: "bridge",
					"Finalized header at slot {} was not imported by the target chain, retrying next tick",
					slot,
				);
			},
			Error::SyncCommitteeNotImported(period) => {
				log::warn!(
					target: "bridge",
					"Sync committee update for period {} was not imported by the target chain, retrying next tick",
					period,
				);
			},
			Error::SyncCommitteeLatency { imported, required } => {
				log::warn!(
					target: "bridge",
					"Sync committee periods are accumulating: target chain is at period {}, period {} is required",
					imported,
					required,
				);
			},
			Error::SyncCommitteeUpdateUnavailable(period) => {
				log::warn!(
					target: "bridge",
					"Sync committee update for period {} is not available at the source node yet",
					period,
				);
			},
			Error::ExecutionHeaderNotImported(slot) => {
				log::warn!(
					target: "bridge",
					"Execution headers up to slot {} were not imported by the target chain, retrying next tick",
					slot,
				);
			},
			Error::BeaconStateUnavailable(slot) => {
				log::warn!(
					target: "bridge",
					"Beacon state for slot {} is not available at the source node yet, retrying later",
					slot,
				);
			},
			Error::CheckpointUnconfirmed(slot) => {
				log::warn!(
					target: "bridge",
					"Checkpoint at slot {} is not accepted by the target chain yet, retrying later",
					slot,
				);
			},
			Error::Merkleization(_) | Error::Source(_) | Error::Target(_) =>
				return Err(self.classify(error)),
		}

		Ok(())
	}

	fn classify(
		&self,
		error: Error<SC::Error, TC::Error>,
	) -> LoopError<Error<SC::Error, TC::Error>> {
		if let Err(failed_client) = error.fail_if_connection_error() {
			return LoopError::Reconnect(failed_client)
		}
		log::error!(
			target: "bridge",
			"Header sync has failed with an unrecoverable error: {}",
			error,
		);
		LoopError::Fatal(error)
	}

	/// Seed the cache from what the destination chain has actually accepted.
	/// An empty destination chain is first bootstrapped from the latest
	/// finalized checkpoint of the source chain.
	async fn reconcile(&self) -> Result<(), Error<SC::Error, TC::Error>> {
		let mut state = self.target_client.finalized_header_state().await.map_err(Error::Target)?;
		if state.beacon_block_root == H256::zero() {
			state = self.bootstrap().await?;
		}

		// A source node following a different fork than the target chain can
		// never produce acceptable proofs; make that loud.
		let header_at_source =
			self.source_client.header(state.beacon_block_root).await.map_err(Error::Source)?;
		if header_at_source.slot != state.beacon_slot {
			log::error!(
				target: "bridge",
				"Source node and target chain disagree about finalized header {:?}: slot {} at source vs slot {} at target",
				state.beacon_block_root,
				header_at_source.slot,
				state.beacon_slot,
			);
		}

		let committee_period =
			self.target_client.last_sync_committee_period().await.map_err(Error::Target)?;
		let execution_state =
			self.target_client.execution_header_state().await.map_err(Error::Target)?;

		self.cache.set_last_synced_finalized(state.beacon_block_root, state.beacon_slot);
		self.cache.set_initial_checkpoint_slot(state.initial_checkpoint_slot);
		self.cache.set_last_synced_committee_period(committee_period);
		self.cache.set_last_synced_execution_slot(execution_state.beacon_slot);
		self.cache.add_checkpoint_slots(&[state.beacon_slot]);

		log::info!(
			target: "bridge",
			"Reconciled with target chain state: finalized slot {}, committee period {}, execution slot {}",
			state.beacon_slot,
			committee_period,
			execution_state.beacon_slot,
		);
		Ok(())
	}

	async fn bootstrap(&self) -> Result<FinalizedHeaderState, Error<SC::Error, TC::Error>> {
		let checkpoint_root =
			self.source_client.finalized_checkpoint().await.map_err(Error::Source)?;
		let bootstrap = self.source_client.bootstrap(checkpoint_root).await.map_err(Error::Source)?;
		let slot = bootstrap.header.slot;
		log::info!(
			target: "bridge",
			"Bootstrapping target chain light client from checkpoint {:?} at slot {}",
			checkpoint_root,
			slot,
		);

		self.target_client.submit_checkpoint(bootstrap).await.map_err(Error::Target)?;
		let state = self.target_client.finalized_header_state().await.map_err(Error::Target)?;
		if state.beacon_block_root != checkpoint_root {
			return Err(Error::FinalizedHeaderNotImported(slot))
		}
		Ok(state)
	}

	/// One pass of the sync state machine.
	async fn run_tick(&self) -> Result<(), Error<SC::Error, TC::Error>> {
		self.sync_execution_headers().await?;
		self.sync_finalized_header().await
	}

	/// Backfill execution headers from the execution watermark up to the
	/// finalized watermark, in batched calls.
	async fn sync_execution_headers(&self) -> Result<(), Error<SC::Error, TC::Error>> {
		let last_finalized = match self.cache.last_synced_finalized() {
			Some(last_finalized) => last_finalized,
			None => return Ok(()),
		};
		let from = cmp::max(
			self.cache.last_synced_execution_slot(),
			self.cache.initial_checkpoint_slot(),
		);
		let to = last_finalized.0;
		if from >= to {
			log::trace!(
				target: "bridge",
				"Execution headers are up to date with the finalized header at slot {}",
				to,
			);
			return Ok(())
		}

		log::info!(target: "bridge", "Syncing execution headers ({}; {}]", from, to);

		let mut batch = Vec::new();
		for slot in from + 1..=to {
			// beacon chains permit empty slots
			if self
				.source_client
				.header_at_slot(slot)
				.await
				.map_err(Error::Source)?
				.is_none()
			{
				log::trace!(target: "bridge", "Slot {} is empty", slot);
				continue
			}

			let update = checkpoints::execution_header_update(
				&self.cache,
				&self.source_client,
				&self.target_client,
				slot,
			)
			.await?;
			batch.push(update);

			if batch.len() >= self.params.max_batch_size {
				self.submit_execution_batch(&mut batch).await?;
			}
		}
		if !batch.is_empty() {
			self.submit_execution_batch(&mut batch).await?;
		}

		self.wait_until_execution_imported(to).await?;
		self.cache.set_last_synced_execution_slot(to);
		log::info!(target: "bridge", "Execution headers synced up to slot {}", to);
		Ok(())
	}

	async fn submit_execution_batch(
		&self,
		batch: &mut Vec<ExecutionHeaderUpdate>,
	) -> Result<(), Error<SC::Error, TC::Error>> {
		let updates = std::mem::take(batch);
		log::debug!(
			target: "bridge",
			"Submitting a batch of {} execution header update(s) ending at slot {}",
			updates.len(),
			updates.last().map(|update| update.header.slot).unwrap_or_default(),
		);
		self.target_client.submit_execution_updates(updates).await.map_err(Error::Target)
	}

	/// Poll the destination chain until its execution watermark reaches `to`,
	/// within the confirmation budget.
	async fn wait_until_execution_imported(
		&self,
		to: u64,
	) -> Result<(), Error<SC::Error, TC::Error>> {
		for attempt in 1..=self.params.confirmation_attempts {
			let state =
				self.target_client.execution_header_state().await.map_err(Error::Target)?;
			if state.beacon_slot >= to {
				return Ok(())
			}
			log::debug!(
				target: "bridge",
				"Waiting for the target chain to import execution headers ({}/{}): at slot {} of {}",
				attempt,
				self.params.confirmation_attempts,
				state.beacon_slot,
				to,
			);
			async_std::task::sleep(self.params.confirmation_interval).await;
		}
		Err(Error::ExecutionHeaderNotImported(to))
	}

	/// Advance the finalized watermark: close the committee period gap, then
	/// submit the latest finalized update.
	async fn sync_finalized_header(&self) -> Result<(), Error<SC::Error, TC::Error>> {
		let last_finalized = match self.cache.last_synced_finalized() {
			Some(last_finalized) => last_finalized,
			None => return Ok(()),
		};

		let latest_root =
			self.source_client.finalized_checkpoint().await.map_err(Error::Source)?;
		if latest_root == last_finalized.1 {
			return Err(Error::FinalizedHeaderUnchanged)
		}

		let update =
			self.source_client.latest_finalized_update().await.map_err(Error::Source)?;
		if update.finalized_block_root == last_finalized.1 {
			return Err(Error::FinalizedHeaderUnchanged)
		}

		// The update is only verifiable once the target chain trusts the
		// committee of the attested slot's period.
		let required_period = self.period(update.attested_header.slot);
		let last_synced_period = self.cache.last_synced_committee_period();
		if last_synced_period < required_period {
			self.sync_committee_periods(last_synced_period, required_period).await?;
		}

		self.submit_finalized_update(update).await
	}

	/// Close the sync committee period gap towards `required_period`.
	///
	/// Only the next unsynced period is submitted per tick, so a large gap is
	/// closed incrementally and the execution header path keeps getting its
	/// share of every tick. The one exception is the very first sync: a
	/// bootstrap snapshot carries no next sync committee, so the initial
	/// period itself must be closed before anything in the following period
	/// can be verified.
	async fn sync_committee_periods(
		&self,
		last_synced_period: u64,
		required_period: u64,
	) -> Result<(), Error<SC::Error, TC::Error>> {
		let mut periods = vec![last_synced_period + 1];
		if self.cache.is_initial_sync_period() {
			periods.insert(0, last_synced_period);
		}

		for period in periods {
			self.sync_committee_period(period).await?;
		}

		let imported =
			self.target_client.last_sync_committee_period().await.map_err(Error::Target)?;
		if imported < required_period {
			return Err(Error::SyncCommitteeLatency { imported, required: required_period })
		}
		Ok(())
	}

	/// Submit one committee update and require the destination chain
	/// watermark to reach it before anything later is sent.
	async fn sync_committee_period(
		&self,
		period: u64,
	) -> Result<(), Error<SC::Error, TC::Error>> {
		let update = self
			.source_client
			.sync_committee_update(period)
			.await
			.map_err(Error::Source)?
			.ok_or(Error::SyncCommitteeUpdateUnavailable(period))?;

		let attested_period = self.period(update.attested_header.slot);
		if attested_period != period {
			log::warn!(
				target: "bridge",
				"Source node returned a sync committee update attested in period {} instead of period {}",
				attested_period,
				period,
			);
			return Err(Error::SyncCommitteeUpdateUnavailable(period))
		}

		log::info!(target: "bridge", "Submitting sync committee update for period {}", period);
		self.target_client
			.submit_sync_committee_update(period, update)
			.await
			.map_err(Error::Target)?;

		let imported =
			self.target_client.last_sync_committee_period().await.map_err(Error::Target)?;
		if imported < period {
			return Err(Error::SyncCommitteeNotImported(period))
		}
		self.cache.set_last_synced_committee_period(imported);
		Ok(())
	}

	/// Submit the finalized update, confirm it on-chain, then advance the
	/// watermark and remember the new checkpoint. Its accumulator comes with
	/// the update payload, so no extra fetch is needed.
	async fn submit_finalized_update(
		&self,
		update: FinalizedUpdate,
	) -> Result<(), Error<SC::Error, TC::Error>> {
		let slot = update.finalized_header.slot;
		let root = update.finalized_block_root;
		log::info!(
			target: "bridge",
			"Submitting finalized header {:?} at slot {}",
			root,
			slot,
		);

		self.target_client
			.submit_finalized_update(update.clone())
			.await
			.map_err(Error::Target)?;

		let state = self.target_client.finalized_header_state().await.map_err(Error::Target)?;
		if state.beacon_block_root != root {
			return Err(Error::FinalizedHeaderNotImported(slot))
		}

		self.cache.set_last_synced_finalized(root, slot);
		self.cache.add_checkpoint(root, update.block_roots_tree, slot);
		log::info!(target: "bridge", "Finalized header synced at slot {}", slot);
		Ok(())
	}
}
