pub mod notification;

pub use notification::{build_notifier, EventType, NotificationEmitter, NotificationEvent};
