mod output;
mod server;

pub use server::MockServer;
