// SPDX-License-Identifier: Apache-2.0
// SPDX-FileCopyrightText: 2023 Snowfork <hello@snowfork.com>
//! Beacon chain spec presets.
//!
//! The relay is parameterized over these values; the constants here are the
//! two published presets. The coverage window of a block-roots accumulator is
//! `slots_per_epoch * epochs_per_sync_committee_period` slots.

/// Slots per epoch under the mainnet spec.
pub const MAINNET_SLOTS_PER_EPOCH: u64 = 32;
/// Epochs per sync committee period under the mainnet spec.
pub const MAINNET_EPOCHS_PER_SYNC_COMMITTEE_PERIOD: u64 = 256;

/// Slots per epoch under the minimal (testing) spec.
pub const MINIMAL_SLOTS_PER_EPOCH: u64 = 8;
/// Epochs per sync committee period under the minimal (testing) spec.
pub const MINIMAL_EPOCHS_PER_SYNC_COMMITTEE_PERIOD: u64 = 8;

/// Size of a BLS public key, in bytes.
pub const PUBKEY_SIZE: usize = 48;
/// Size of a BLS aggregate signature, in bytes.
pub const SIGNATURE_SIZE: usize = 96;
