//! IPC surface of the capture service.

mod handlers;
mod server;

pub use handlers::handle_request;
#[cfg(unix)]
pub use server::run_server;
pub use server::serve_client;
