pub mod config;
pub mod engine;
pub mod http;
pub mod simulator;
pub mod storage;
pub mod voice;

pub use config::ConfigStore;
pub use engine::RecognitionEngine;
pub use http::{ByteStream, ChunkStream, HttpClient};
pub use simulator::SimulatorLink;
pub use storage::{ModelStorage, StagedArtifact};
pub use voice::{AtcResponder, VoiceBackend};
