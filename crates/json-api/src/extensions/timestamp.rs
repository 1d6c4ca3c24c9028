//! Optional timestamp inputs that fall back to the current instant.

use jiff::Timestamp;
use salvo::prelude::StatusError;

use crate::extensions::*;

pub(crate) trait OptionalTimestampExt {
    /// Parse an RFC 3339 timestamp named `field`, or take now when absent.
    fn timestamp_or_now(self, field: &str) -> Result<Timestamp, StatusError>;
}

impl OptionalTimestampExt for Option<String> {
    fn timestamp_or_now(self, field: &str) -> Result<Timestamp, StatusError> {
        let Some(value) = self else {
            return Ok(Timestamp::now());
        };

        value
            .parse::<Timestamp>()
            .or_400(&format!("could not parse \"{field}\""))
    }
}
