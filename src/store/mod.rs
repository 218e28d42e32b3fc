pub mod local;
pub mod remote;
pub mod unified;

pub use local::LocalStore;
pub use remote::{PgRemoteStore, RemoteItemStore};
pub use unified::UnifiedStore;

/// Scope that owns items saved while signed out. Promoted to a user scope by
/// the one-shot migration.
pub const ANONYMOUS_SCOPE: &str = "anonymous";
