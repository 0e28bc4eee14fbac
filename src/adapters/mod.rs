pub mod http;
pub mod ws;

pub use http::HttpBackendApi;
pub use ws::EventSourceClient;
