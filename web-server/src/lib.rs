pub mod controller;
pub mod err;
pub mod frontend;
mod handlers;
pub mod response;
pub mod spec;

pub mod server;

// This is the redirect URL used if not provided by CLI
const BASE_URL: &str = "http://localhost";

// Two images plus form fields
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;
