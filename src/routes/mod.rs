// Route modules organization

pub mod session_routes;

// Re-export all routes for convenience
pub use session_routes::*;
