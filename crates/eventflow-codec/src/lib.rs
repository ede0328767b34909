//! Eventflow Codec — polymorphic value serialization.
//!
//! Converts an in-memory value graph into a self-describing tagged JSON
//! representation and back, preserving type identity for dates, error
//! values, and ordered map/set containers. Event payloads and log error
//! objects pass through this codec before hitting storage.
//!
//! The encodable variants form a closed union ([`Payload`]); dispatch is
//! a `match` on that union rather than runtime type probing, and each
//! [`Codec`] instance carries its tag/value attribute names fixed at
//! construction — there is no global registry.

mod codec;
mod value;

pub use codec::{Codec, CodecError};
pub use value::{ErrorValue, Payload};
