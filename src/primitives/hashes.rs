use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

macro_rules! hash_type {
	($(#[$meta:meta])* $name:ident) => {
		$(#[$meta])*
		#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
		pub struct $name(pub [u8; 32]);

		impl $name {
			pub fn to_hex(&self) -> String {
				hex::encode(self.0)
			}

			pub fn from_hex(value: &str) -> Result<Self, hex::FromHexError> {
				let mut bytes = [0u8; 32];
				hex::decode_to_slice(value, &mut bytes)?;
				Ok(Self(bytes))
			}

			pub fn as_bytes(&self) -> &[u8; 32] {
				&self.0
			}
		}

		impl From<[u8; 32]> for $name {
			fn from(bytes: [u8; 32]) -> Self {
				Self(bytes)
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str(&self.to_hex())
			}
		}

		impl fmt::Debug for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}({})", stringify!($name), self.to_hex())
			}
		}

		impl Serialize for $name {
			fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
				serializer.serialize_str(&self.to_hex())
			}
		}

		impl<'de> Deserialize<'de> for $name {
			fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
				let value = String::deserialize(deserializer)?;
				Self::from_hex(&value).map_err(serde::de::Error::custom)
			}
		}
	};
}

hash_type!(
	/// Identity of a note commitment (the leaf hash in the note tree).
	NoteHash
);
hash_type!(
	/// Value revealed when a note is spent.
	Nullifier
);
hash_type!(
	/// Identity of a transaction.
	TransactionHash
);
hash_type!(BlockHash);
hash_type!(
	/// Public address a note is paid to.
	PublicAddress
);
