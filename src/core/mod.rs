pub mod alnmap;
pub mod archive;
pub mod cache;
pub mod error;
pub mod lookup;
pub mod metrics;
pub mod model;
pub mod resolve;
pub mod source;
pub mod writer;
