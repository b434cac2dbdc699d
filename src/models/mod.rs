pub mod bulk;
pub mod scroll_response;
pub mod server_info;
