pub mod config;
pub mod record;
pub mod results;
pub mod text;
pub mod types;

// Keep the public surface small and intentional.
pub use config::*;
pub use record::*;
pub use results::*;
pub use text::*;
pub use types::*;
