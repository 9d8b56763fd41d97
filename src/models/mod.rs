pub mod message;
pub mod notification;
pub mod user;

pub use message::{ChatMessage, FrameError, InboundFrame, MessageType, StoredMessage};
pub use notification::{Notification, NotificationEvent};
pub use user::{OnlineUser, UserIdentity};
