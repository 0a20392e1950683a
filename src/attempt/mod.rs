//! Lifecycle tracking for asynchronous server calls.
//!
//! Every asynchronous operation is identified by a caller-chosen operation
//! id. The tracker keeps one [`AsyncAttempt`] per id in a dedicated segment:
//!
//! ```text
//!              start               success
//! NotStarted ───────→ InProgress ─────────→ Succeeded
//!                         │
//!                         │ fail
//!                         ↓
//!                       Failed
//! ```
//!
//! `start` from any state re-arms to `InProgress`; `clear` from any state
//! resets to `NotStarted`. No state is terminal. Pages render spinners and
//! error banners from the attempt's status and message.

mod action;
mod reducer;
mod state;
mod tracker;

pub use action::AttemptAction;
pub use reducer::AttemptReducer;
pub use state::{AsyncAttempt, AttemptStatus, AttemptTable};
pub use tracker::{attempt_getter, segment, AttemptTracker, ATTEMPTS_SEGMENT};
