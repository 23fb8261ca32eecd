//! Build artifacts handed to the post-processor.

use std::fmt;
use std::path::{Path, PathBuf};

/// The output of an upstream build step.
pub trait Artifact: fmt::Debug {
    /// Identifier of the builder that produced the artifact.
    fn builder_id(&self) -> &str;

    /// Files that make up the artifact, in builder order.
    fn files(&self) -> &[PathBuf];

    /// Human-readable summary for operator output.
    fn describe(&self) -> String {
        format!(
            "{} artifact with {} file(s)",
            self.builder_id(),
            self.files().len()
        )
    }
}

/// An artifact described by a builder id and a list of files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    builder_id: String,
    files: Vec<PathBuf>,
}

impl BuildArtifact {
    pub fn new<I, P>(builder_id: impl Into<String>, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            builder_id: builder_id.into(),
            files: files.into_iter().map(Into::into).collect(),
        }
    }
}

impl Artifact for BuildArtifact {
    fn builder_id(&self) -> &str {
        &self.builder_id
    }

    fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

/// Find the first file with a `.vmx` extension.
pub fn find_vmx<A: Artifact + ?Sized>(artifact: &A) -> Option<&Path> {
    artifact
        .files()
        .iter()
        .map(PathBuf::as_path)
        .find(|p| p.extension().is_some_and(|ext| ext == "vmx"))
}
