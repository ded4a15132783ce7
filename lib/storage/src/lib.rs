pub mod artifact;

pub use artifact::{inspect_artifact, load_artifact, save_artifact, Artifact, ArtifactHeader};
