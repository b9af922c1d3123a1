pub mod hidden_paths;
pub mod request_id;
pub mod security;
