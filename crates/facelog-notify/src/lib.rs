//! facelog-notify — From a recognized label to a recorded attendance event.
//!
//! The [`Notifier`] resolves a gallery label to a subject id through the
//! [`SubjectDirectory`], consults the caller's [`CooldownGate`], and delivers a
//! [`NotificationEvent`] over a [`Transport`]. The gate only advances after a
//! successful delivery.

pub mod cooldown;
pub mod event;
pub mod notifier;
pub mod subjects;
pub mod transport;

pub use cooldown::{CooldownGate, DEFAULT_COOLDOWN};
pub use event::{EventType, NotificationEvent};
pub use notifier::{Notifier, NotifyOutcome};
pub use subjects::{DirectoryError, SubjectDirectory};
pub use transport::{HttpTransport, SendError, SendErrorKind, Transport};
