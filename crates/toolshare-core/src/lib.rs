// Core synchronization layer shared by every toolshare instance

pub mod bus;
pub mod error;
pub mod message;
pub mod notify;
pub mod preferences;
pub mod store;
pub mod test_utils;
pub mod utils;

pub use bus::{Bus, BusListener, Delivery, InstanceId, Origin};
pub use error::{Error, Result};
pub use message::{MalformedMessage, Message, ToolId};
pub use notify::{NotificationGateway, NotificationOptions, PermissionState};
pub use store::{DurableStore, DurableStoreExt, InMemoryStore, JsonFileStore, StoreError};
