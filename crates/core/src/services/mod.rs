//! Notification pipeline services.

#![allow(missing_docs)]

pub mod directory;
pub mod dispatcher;
pub mod events;
pub mod friendship;
pub mod gateway;
pub mod locale;
pub mod message;
pub mod receipts;
pub mod recipients;
pub mod router;

pub use directory::{UserDirectory, UserDirectoryService, UserRecord};
pub use dispatcher::{DispatchReport, PushDispatcher};
pub use events::{ChangeEvent, ChangeKind, TriggerEvent};
pub use friendship::{FriendshipService, FriendshipStore, FriendshipStoreService};
pub use gateway::{
    DeliveryFailure, DeliveryReceipt, DeliveryStatus, DeliveryTicket, ExpoPushGateway,
    PushGateway, PushGatewayService,
};
pub use locale::Locale;
pub use message::{
    DeepLinks, MessageBuilder, NotificationKind, PushData, PushMessage, PushSound,
    is_valid_push_token,
};
pub use receipts::{ReceiptReconciler, ReceiptSummary};
pub use recipients::{NotificationRecipient, RecipientResolver, Resolution, new_likers};
pub use router::{RouteOutcome, TriggerRouter};
