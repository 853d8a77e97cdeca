// Module declarations
pub mod check;
pub mod copy;
pub mod list;
pub mod serve;

// Re-export commonly used items for convenience
pub use check::handle_check;
pub use copy::handle_copy;
pub use list::handle_list;
pub use serve::handle_serve;
