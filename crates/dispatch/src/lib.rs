//! Orchestration of the video-relay pipeline: inbound events in, matched
//! URLs through retrieval, replies and attachments back out.

mod pipeline;
mod traits;

pub use {
    pipeline::Dispatcher,
    traits::{Relay, Retriever},
};
