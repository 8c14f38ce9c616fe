mod error;
mod pipeline;

pub use error::{Result, SearchError};
pub use pipeline::{
    Idle, QueryEmbedded, Resolved, RetrievalPipeline, Searched, DEFAULT_TOP_N,
};
