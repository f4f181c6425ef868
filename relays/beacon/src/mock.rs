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

//! Mock source and target clients of the header sync loop.

use crate::{
	cache::FinalizedCheckpoint,
	sync_loop::{BlockRootsAvailability, SourceClient, TargetClient},
};

use async_trait::async_trait;
use bp_beacon::{
	AncestryProof, BeaconHeader, BlockRootsTree, CheckpointUpdate, ExecutionHeaderState,
	ExecutionHeaderUpdate, ExecutionPayloadHeader, FinalizedHeaderState, FinalizedUpdate,
	SyncCommitteeUpdate,
};
use parking_lot::Mutex;
use relay_utils::{relay_loop::Client as RelayClient, MaybeConnectionError};
use sp_core::H256;
use std::{collections::HashMap, sync::Arc};

/// Test client error.
#[derive(Clone, Debug)]
pub enum TestError {
	/// A non-connection error: the request was understood and rejected.
	Generic,
	/// Lost connection to the node.
	Connection,
}

impl MaybeConnectionError for TestError {
	fn is_connection_error(&self) -> bool {
		matches!(self, TestError::Connection)
	}
}

/// Hook invoked on every client method call, with the clients data locked.
pub type OnMethodCall = Arc<dyn Fn(&mut ClientsData) + Send + Sync>;

/// Shared state behind both test clients.
#[derive(Clone, Debug, Default)]
pub struct ClientsData {
	pub source_headers_by_slot: HashMap<u64, BeaconHeader>,
	pub source_headers_by_root: HashMap<H256, BeaconHeader>,
	pub source_finalized_root: H256,
	pub source_finalized_update: FinalizedUpdate,
	pub source_committee_updates: HashMap<u64, SyncCommitteeUpdate>,
	pub source_block_roots: HashMap<u64, BlockRootsTree>,
	pub source_bootstrap: Option<CheckpointUpdate>,

	pub target_finalized_state: FinalizedHeaderState,
	pub target_execution_state: ExecutionHeaderState,
	pub target_finalized_slots_by_root: HashMap<H256, u64>,
	pub target_committee_period: u64,

	/// When false, the corresponding submissions are accepted by the client
	/// but never show up in target chain state.
	pub target_imports_finalized: bool,
	pub target_imports_committee: bool,
	pub target_imports_execution: bool,

	pub submitted_checkpoints: Vec<CheckpointUpdate>,
	pub submitted_finalized: Vec<FinalizedUpdate>,
	pub submitted_committee_periods: Vec<u64>,
	pub submitted_execution_batches: Vec<Vec<ExecutionHeaderUpdate>>,
}

impl ClientsData {
	/// Empty clients data with a target chain that imports everything it is
	/// given.
	pub fn new() -> Self {
		ClientsData {
			target_imports_finalized: true,
			target_imports_committee: true,
			target_imports_execution: true,
			..Default::default()
		}
	}

	/// Slots of every execution header update submitted so far, in
	/// submission order.
	pub fn submitted_execution_slots(&self) -> Vec<u64> {
		self.submitted_execution_batches
			.iter()
			.flatten()
			.map(|update| update.header.slot)
			.collect()
	}
}

/// Deterministic test header at `slot`.
pub fn header(slot: u64) -> BeaconHeader {
	BeaconHeader {
		slot,
		proposer_index: 1,
		parent_root: H256::from_low_u64_be(slot.wrapping_sub(1)),
		state_root: H256::from_low_u64_be(slot + 1_000),
		body_root: H256::from_low_u64_be(slot + 2_000),
	}
}

/// Block root of the test header at `slot`.
pub fn block_root(slot: u64) -> H256 {
	header(slot).hash_tree_root().expect("static test header merkleizes")
}

/// Distinct block-roots accumulator per slot.
pub fn tree(slot: u64) -> BlockRootsTree {
	BlockRootsTree {
		block_roots_root: H256::from_low_u64_be(slot + 3_000),
		block_roots_branch: vec![H256::from_low_u64_be(slot + 4_000)],
	}
}

/// Finalized update claiming the test header at `finalized_slot` final,
/// attested at `attested_slot`.
pub fn finalized_update(attested_slot: u64, finalized_slot: u64) -> FinalizedUpdate {
	FinalizedUpdate {
		attested_header: header(attested_slot),
		finalized_header: header(finalized_slot),
		finality_branch: vec![H256::from_low_u64_be(finalized_slot + 5_000)],
		sync_aggregate: Default::default(),
		signature_slot: attested_slot + 1,
		finalized_block_root: block_root(finalized_slot),
		block_roots_tree: tree(finalized_slot),
	}
}

/// Committee update attested at `attested_slot`, finalizing `finalized_slot`.
pub fn committee_update(attested_slot: u64, finalized_slot: u64) -> SyncCommitteeUpdate {
	SyncCommitteeUpdate {
		attested_header: header(attested_slot),
		next_sync_committee: Default::default(),
		next_sync_committee_branch: vec![H256::from_low_u64_be(attested_slot + 6_000)],
		finalized_header: header(finalized_slot),
		finality_branch: vec![H256::from_low_u64_be(finalized_slot + 5_000)],
		sync_aggregate: Default::default(),
		signature_slot: attested_slot + 1,
	}
}

/// Builds a connected pair of test clients over shared data, with a no-op
/// method hook.
pub fn test_clients(data: ClientsData) -> (TestSourceClient, TestTargetClient, Arc<Mutex<ClientsData>>) {
	test_clients_with_hook(data, Arc::new(|_| {}))
}

/// Builds a connected pair of test clients over shared data.
pub fn test_clients_with_hook(
	data: ClientsData,
	on_method_call: OnMethodCall,
) -> (TestSourceClient, TestTargetClient, Arc<Mutex<ClientsData>>) {
	let data = Arc::new(Mutex::new(data));
	(
		TestSourceClient { data: data.clone(), on_method_call: on_method_call.clone() },
		TestTargetClient { data: data.clone(), on_method_call },
		data,
	)
}

/// Source client over shared test data.
#[derive(Clone)]
pub struct TestSourceClient {
	pub data: Arc<Mutex<ClientsData>>,
	pub on_method_call: OnMethodCall,
}

#[async_trait]
impl RelayClient for TestSourceClient {
	type Error = TestError;

	async fn reconnect(&mut self) -> Result<(), TestError> {
		Ok(())
	}
}

#[async_trait]
impl SourceClient for TestSourceClient {
	async fn header(&self, root: H256) -> Result<BeaconHeader, TestError> {
		let mut data = self.data.lock();
		(self.on_method_call)(&mut data);
		data.source_headers_by_root.get(&root).copied().ok_or(TestError::Generic)
	}

	async fn header_at_slot(&self, slot: u64) -> Result<Option<BeaconHeader>, TestError> {
		let mut data = self.data.lock();
		(self.on_method_call)(&mut data);
		Ok(data.source_headers_by_slot.get(&slot).copied())
	}

	async fn finalized_checkpoint(&self) -> Result<H256, TestError> {
		let mut data = self.data.lock();
		(self.on_method_call)(&mut data);
		Ok(data.source_finalized_root)
	}

	async fn latest_finalized_update(&self) -> Result<FinalizedUpdate, TestError> {
		let mut data = self.data.lock();
		(self.on_method_call)(&mut data);
		Ok(data.source_finalized_update.clone())
	}

	async fn sync_committee_update(
		&self,
		period: u64,
	) -> Result<Option<SyncCommitteeUpdate>, TestError> {
		let mut data = self.data.lock();
		(self.on_method_call)(&mut data);
		Ok(data.source_committee_updates.get(&period).cloned())
	}

	async fn block_roots(&self, slot: u64) -> Result<BlockRootsAvailability, TestError> {
		let mut data = self.data.lock();
		(self.on_method_call)(&mut data);
		Ok(data
			.source_block_roots
			.get(&slot)
			.cloned()
			.map(BlockRootsAvailability::Available)
			.unwrap_or(BlockRootsAvailability::NotYetAvailable))
	}

	async fn bootstrap(&self, _root: H256) -> Result<CheckpointUpdate, TestError> {
		let mut data = self.data.lock();
		(self.on_method_call)(&mut data);
		data.source_bootstrap.clone().ok_or(TestError::Generic)
	}

	async fn execution_header_update(
		&self,
		slot: u64,
		checkpoint: &FinalizedCheckpoint,
	) -> Result<ExecutionHeaderUpdate, TestError> {
		let mut data = self.data.lock();
		(self.on_method_call)(&mut data);
		let header = data.source_headers_by_slot.get(&slot).copied().ok_or(TestError::Generic)?;
		let ancestry_proof = (checkpoint.slot != slot).then(|| AncestryProof {
			header_branch: vec![checkpoint.block_roots_tree.block_roots_root],
			finalized_block_root: checkpoint.block_root,
		});
		Ok(ExecutionHeaderUpdate {
			header,
			ancestry_proof,
			execution_header: ExecutionPayloadHeader {
				block_number: slot,
				..Default::default()
			},
			execution_branch: vec![],
		})
	}
}

/// Target client over shared test data.
#[derive(Clone)]
pub struct TestTargetClient {
	pub data: Arc<Mutex<ClientsData>>,
	pub on_method_call: OnMethodCall,
}

#[async_trait]
impl RelayClient for TestTargetClient {
	type Error = TestError;

	async fn reconnect(&mut self) -> Result<(), TestError> {
		Ok(())
	}
}

#[async_trait]
impl TargetClient for TestTargetClient {
	async fn finalized_header_state(&self) -> Result<FinalizedHeaderState, TestError> {
		let mut data = self.data.lock();
		(self.on_method_call)(&mut data);
		Ok(data.target_finalized_state)
	}

	async fn execution_header_state(&self) -> Result<ExecutionHeaderState, TestError> {
		let mut data = self.data.lock();
		(self.on_method_call)(&mut data);
		Ok(data.target_execution_state)
	}

	async fn finalized_header_slot_by_root(&self, root: H256) -> Result<Option<u64>, TestError> {
		let mut data = self.data.lock();
		(self.on_method_call)(&mut data);
		Ok(data.target_finalized_slots_by_root.get(&root).copied())
	}

	async fn last_sync_committee_period(&self) -> Result<u64, TestError> {
		let mut data = self.data.lock();
		(self.on_method_call)(&mut data);
		Ok(data.target_committee_period)
	}

	async fn submit_checkpoint(&self, update: CheckpointUpdate) -> Result<(), TestError> {
		let mut data = self.data.lock();
		(self.on_method_call)(&mut data);
		if data.target_imports_finalized {
			let root = update.header.hash_tree_root().expect("test header merkleizes");
			data.target_finalized_state = FinalizedHeaderState {
				beacon_block_root: root,
				beacon_slot: update.header.slot,
				initial_checkpoint_slot: update.header.slot,
			};
			data.target_finalized_slots_by_root.insert(root, update.header.slot);
		}
		data.submitted_checkpoints.push(update);
		Ok(())
	}

	async fn submit_finalized_update(&self, update: FinalizedUpdate) -> Result<(), TestError> {
		let mut data = self.data.lock();
		(self.on_method_call)(&mut data);
		if data.target_imports_finalized {
			data.target_finalized_state.beacon_block_root = update.finalized_block_root;
			data.target_finalized_state.beacon_slot = update.finalized_header.slot;
			data.target_finalized_slots_by_root
				.insert(update.finalized_block_root, update.finalized_header.slot);
		}
		data.submitted_finalized.push(update);
		Ok(())
	}

	async fn submit_sync_committee_update(
		&self,
		period: u64,
		update: SyncCommitteeUpdate,
	) -> Result<(), TestError> {
		let mut data = self.data.lock();
		(self.on_method_call)(&mut data);
		if data.target_imports_committee {
			data.target_committee_period = data.target_committee_period.max(period);
			let root = update.finalized_header.hash_tree_root().expect("test header merkleizes");
			data.target_finalized_slots_by_root.insert(root, update.finalized_header.slot);
		}
		data.submitted_committee_periods.push(period);
		Ok(())
	}

	async fn submit_execution_updates(
		&self,
		updates: Vec<ExecutionHeaderUpdate>,
	) -> Result<(), TestError> {
		let mut data = self.data.lock();
		(self.on_method_call)(&mut data);
		if data.target_imports_execution {
			if let Some(last) = updates.last() {
				data.target_execution_state = ExecutionHeaderState {
					beacon_slot: last.header.slot,
					block_number: last.execution_header.block_number,
				};
			}
		}
		data.submitted_execution_batches.push(updates);
		Ok(())
	}
}
