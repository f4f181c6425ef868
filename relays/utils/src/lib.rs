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

//! Utilities used by different relays.

pub mod relay_loop;

/// Header id: the (number, hash) pair a chain uses to identify one of its
/// headers. For beacon chains the number is a slot.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeaderId<Hash, Number>(pub Number, pub Hash);

/// Error type that may signal connection errors.
///
/// If the error is a connection error, the relay reconnects the failed client
/// and restarts the loop instead of retrying the request.
pub trait MaybeConnectionError {
	/// Returns true if the error (likely) means that the client has lost its
	/// connection to the node.
	fn is_connection_error(&self) -> bool;
}

/// Client the relay has lost connection to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedClient {
	/// The source client.
	Source,
	/// The target client.
	Target,
	/// Both clients.
	Both,
}

/// Reason a relay loop run has stopped.
#[derive(Debug)]
pub enum LoopError<E> {
	/// Connection to one of the nodes has been lost. The clients must be
	/// reconnected and the loop restarted.
	Reconnect(FailedClient),
	/// Unrecoverable error. It is propagated to the process supervisor.
	Fatal(E),
}
