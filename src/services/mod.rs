pub mod events;
pub mod image_store;
pub mod matching;
pub mod notifications;

pub use events::{EventHub, RealtimeEvent};
pub use image_store::ImageStoreClient;
