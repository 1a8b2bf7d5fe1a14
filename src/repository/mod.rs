pub mod inventory;
pub mod profile;
pub mod session;

pub use inventory::{InventoryGateway, MySqlInventoryGateway};
pub use profile::{MySqlProfileStore, ProfileStore};
pub use session::{MySqlSessionRevoker, SessionRevoker};
