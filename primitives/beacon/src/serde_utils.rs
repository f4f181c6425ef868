// SPDX-License-Identifier: Apache-2.0
// SPDX-FileCopyrightText: 2023 Snowfork <hello@snowfork.com>
//! Hex (de)serialization for the fixed-size BLS types, which are longer than
//! what serde derives for arrays.

use core::fmt;

use serde::{de::Visitor, Deserializer, Serializer};

use crate::types::{PublicKey, Signature};

struct HexVisitor<const LENGTH: usize>;

impl<'de, const LENGTH: usize> Visitor<'de> for HexVisitor<LENGTH> {
	type Value = [u8; LENGTH];

	fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
		write!(formatter, "a hex string with an '0x' prefix and {} bytes", LENGTH)
	}

	fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
		let stripped = v.strip_prefix("0x").unwrap_or(v);
		let decoded = hex::decode(stripped).map_err(serde::de::Error::custom)?;
		decoded
			.try_into()
			.map_err(|_| serde::de::Error::custom("hex string has unexpected length"))
	}
}

fn serialize_hex<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
	serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
}

impl serde::Serialize for PublicKey {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serialize_hex(&self.0, serializer)
	}
}

impl<'de> serde::Deserialize<'de> for PublicKey {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		deserializer.deserialize_str(HexVisitor::<{ crate::config::PUBKEY_SIZE }>).map(PublicKey)
	}
}

impl serde::Serialize for Signature {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serialize_hex(&self.0, serializer)
	}
}

impl<'de> serde::Deserialize<'de> for Signature {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		deserializer.deserialize_str(HexVisitor::<{ crate::config::SIGNATURE_SIZE }>).map(Signature)
	}
}
