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

//! Beacon chain header relay.
//!
//! The relay tracks the finality of a beacon-style source chain and feeds it,
//! with proofs, to a light client on the destination chain: sync committee
//! handoffs first, then the finalized header itself, then the execution
//! headers between the previous and the new finalized slot. The loop never
//! trusts its own submissions; every advancement of local state happens only
//! after the corresponding data has been read back from the destination
//! chain.

#![warn(missing_docs)]

pub mod cache;
pub mod checkpoints;
pub mod error;
pub mod sync_loop;

#[cfg(test)]
mod mock;

pub use cache::{BeaconCache, CacheError, FinalizedCheckpoint};
pub use error::Error;
pub use sync_loop::{
	run, BlockRootsAvailability, HeaderSyncLoop, SourceClient, SyncParams, TargetClient,
};
