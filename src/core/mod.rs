pub mod events;
pub mod explorer;
pub mod locks;
pub mod memory;
pub mod node;
pub mod paste;
pub mod session;
pub mod store;

pub use events::{EventHub, ObserverHandle, StoreEvent, StoreObserver};
pub use explorer::{Explorer, Listing};
pub use locks::KeyedLocks;
pub use memory::{generate_local_id, MemoryCache, PutOptions};
pub use node::{NewNode, Node, NodeId};
pub use paste::{PasteEngine, PasteOutcome};
pub use session::{decode_paths, encode_paths, SessionState};
pub use store::CachingStore;
