//! Base trait for actions dispatched to the store.

use std::any::Any;
use std::fmt::Debug;

/// Marker trait for action messages.
///
/// An action type is a tag space: every variant of an action enum is one
/// tag carrying its own statically typed payload. Segments declare handlers
/// per action type and match on the variants they care about.
///
/// Actions are:
/// - Dispatched synchronously, in call order
/// - Never queued or coalesced
/// - Seen by every segment that handles their type
pub trait Action: Any + Debug + Send + Sync {
    /// Short tag used in logs and error messages.
    fn tag(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
