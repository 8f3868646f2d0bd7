pub mod channel_publisher;
pub mod http_transport;
pub mod log_transport;
pub mod transport;
