//! Model registry
//!
//! Versioned storage of trained models and their pipeline state, with at most
//! one active model per family and a retention sweep for stale artifacts.

mod artifact;
mod model_registry;
mod store;
mod versioning;

pub use artifact::{ArtifactFilter, ModelArtifact, NewArtifact};
pub use model_registry::{
    ActivationTicket, ActiveModel, LoadedModel, ModelRegistry, RetentionPolicy, RetirementReport,
};
pub use store::{
    ArtifactStore, FsArtifactStore, InMemoryArtifactStore, LocalMetadataStore, MetadataStore,
};
pub use versioning::ModelVersion;
