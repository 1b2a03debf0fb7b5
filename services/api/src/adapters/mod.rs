pub mod db;
pub mod memory;
pub mod reply;

pub use db::DbAdapter;
pub use memory::MemoryStore;
pub use reply::PlaceholderReplyAdapter;
