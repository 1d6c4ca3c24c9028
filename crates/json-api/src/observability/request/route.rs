//! Low-cardinality route labels for spans and metrics.

use uuid::Uuid;

/// Path segments whose successor is caller-supplied free text.
const FREE_TEXT_PARENTS: &[&str] = &["referral-codes"];

/// Replace identifiers in a request path with placeholders.
///
/// `/affiliates/0190.../payouts` becomes `/affiliates/{uuid}/payouts` and
/// `/referral-codes/PRO4X7K2` becomes `/referral-codes/{code}`.
pub(super) fn route_label(path: &str) -> String {
    let mut previous: Option<&str> = None;

    let segments: Vec<&str> = path
        .trim_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let label = if Uuid::parse_str(segment).is_ok() {
                "{uuid}"
            } else if previous.is_some_and(|parent| FREE_TEXT_PARENTS.contains(&parent)) {
                "{code}"
            } else {
                segment
            };

            previous = Some(segment);

            label
        })
        .collect();

    format!("/{}", segments.join("/"))
}
