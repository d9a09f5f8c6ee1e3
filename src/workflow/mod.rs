pub mod fetch_worker;
pub mod page_ctx;

pub use fetch_worker::{FetchWorker, WorkerReport};
pub use page_ctx::PageCtx;
