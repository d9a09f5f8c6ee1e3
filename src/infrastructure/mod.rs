pub mod checkpoint_store;
pub mod child_process;
pub mod http_client;
pub mod shutdown;

pub use checkpoint_store::CheckpointStore;
pub use child_process::ChildCommand;
pub use http_client::{PageClient, PageFetcher};
pub use shutdown::Shutdown;
