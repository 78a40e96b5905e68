pub mod auth;
pub mod db;
pub mod storage;
pub mod supabase;

pub use auth::SupabaseAuthAdapter;
pub use db::DbAdapter;
pub use storage::StorageAdapter;
pub use supabase::SupabaseClient;
