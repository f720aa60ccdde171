pub mod poller;
pub mod stream;

pub use poller::PollWorker;
pub use stream::{StreamError, StreamListener};
