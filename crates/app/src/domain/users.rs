//! Users
//!
//! Users are owned by the external authentication system; the ledger only
//! ever refers to them by id.

use crate::uuids::TypedUuid;

/// External user marker.
#[derive(Debug)]
pub struct User;

/// User UUID
pub type UserUuid = TypedUuid<User>;
