// SPDX-License-Identifier: Apache-2.0
// SPDX-FileCopyrightText: 2023 Snowfork <hello@snowfork.com>
//! Primitives of the beacon chain finality relay.
//!
//! The types in this crate describe the beacon chain data the relay moves
//! between the source chain and the light client on the destination chain:
//! headers, sync committee material, finality updates and the ancestry
//! proofs that bind execution headers to finalized checkpoints.
#![cfg_attr(not(feature = "std"), no_std)]

pub mod config;
pub mod functions;
pub mod ssz;
pub mod types;
pub mod updates;

#[cfg(feature = "std")]
mod serde_utils;

pub use functions::{compute_epoch, compute_period};
pub use types::{
	BeaconHeader, BlockRootsTree, ExecutionHeaderState, ExecutionPayloadHeader,
	FinalizedHeaderState, PublicKey, Signature, SyncAggregate, SyncCommittee,
};
pub use updates::{
	AncestryProof, CheckpointUpdate, ExecutionHeaderUpdate, FinalizedUpdate, SyncCommitteeUpdate,
};

pub use ssz::{hash_tree_root, MerkleizationError};
