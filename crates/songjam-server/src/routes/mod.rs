//! One module per upstream. Handlers validate, then hand off to the client.

pub mod daily;
pub mod empire;
pub mod health;
pub mod hms;
pub mod neynar;
pub mod spaces;
pub mod stream;

use songjam_core::host::non_empty;

/// Trimmed, non-empty owned value of an optional field.
pub(crate) fn required(value: &Option<String>) -> Option<&str> {
    non_empty(value.as_deref())
}
