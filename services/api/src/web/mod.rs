pub mod auth;
pub mod docs;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod tax;

// Re-export the desk routers to make them easily accessible
// to the binaries that build the web servers.
pub use docs::router as docs_router;
pub use middleware::require_auth;
pub use tax::router as tax_router;
