pub mod chat_responder;
pub mod config_store;
pub mod fs_storage;
pub mod http_transport;

pub use chat_responder::ChatCompletionResponder;
pub use config_store::TomlConfigStore;
pub use fs_storage::FsModelStorage;
pub use http_transport::HttpTransport;
