pub mod board;
pub mod config;
pub mod dnd;
pub mod favorites;
pub mod id;
pub mod search;
pub mod session;
pub mod storage;
pub mod types;

pub use board::BoardStore;
pub use config::KrelloConfig;
pub use dnd::{DragController, DragSubject, DropTarget};
pub use favorites::{FavoriteKey, FavoriteScope, FavoritesIndex};
pub use search::CardFilter;
pub use session::Session;
pub use storage::{PersistenceGateway, StorageError};
pub use types::{Card, Column, Desk, RootState, UserIdentity};
