pub mod supabase;

pub use supabase::{StorageError, SupabaseClient};
