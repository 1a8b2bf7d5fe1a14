pub mod bus;
pub mod watcher;

pub use bus::{BusEvent, EventBus};
pub use watcher::PermissionWatcher;
