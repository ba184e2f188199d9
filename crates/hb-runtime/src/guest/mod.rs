//! Guest-side values: handle types the script can construct, the facts we
//! read off them, and the clone that carries them to the host.

pub(crate) mod crossing;
pub(crate) mod expectation;
pub(crate) mod legacy;
pub(crate) mod reflect;
pub(crate) mod types;

pub(crate) use crossing::{from_guest_value, from_json, to_guest_value, to_json};
pub(crate) use expectation::{record, register_expectation, Expectation};
pub(crate) use legacy::{register_legacy, LegacyExpectation};
pub(crate) use types::{register_types, GuestNull, HandleArena, ReleaseHandles};
