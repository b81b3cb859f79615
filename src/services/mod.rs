//! External service integrations

pub mod distributor;
pub mod forum;
pub mod json_fields;
pub mod metadata;
pub mod notify;
pub mod poster_store;
pub mod rate_limiter;
pub mod remote_fetch;
pub mod selection;

pub use distributor::{DistributedLinks, Distributor, HostKind, HttpUploadHost, UploadHost};
pub use forum::{ForumClient, ForumTopic};
pub use metadata::{MetadataClient, MovieMetadata};
pub use notify::Notifier;
pub use poster_store::PosterStore;
pub use remote_fetch::{HttpRemoteFetch, RemoteFetchApi, RemoteFetcher};
pub use selection::{Candidate, SelectionPolicy, select};
