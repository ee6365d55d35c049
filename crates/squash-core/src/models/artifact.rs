use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;

/// Which staging area an artifact lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Upload,
    Output,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 2] = [ArtifactKind::Upload, ArtifactKind::Output];

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Upload => "upload",
            ArtifactKind::Output => "output",
        }
    }
}

impl Display for ArtifactKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Opaque artifact identifier.
///
/// The identifier doubles as the on-disk file name: a random 128-bit token in
/// simple hex form, optionally followed by `.` and a file extension. Only ASCII
/// alphanumerics, `.`, `-` and `_` are accepted, and `..` never is, so an id can
/// be joined onto a staging directory without escaping it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactId(String);

impl ArtifactId {
    const MAX_LEN: usize = 128;

    /// Generate a fresh identifier, keeping `extension` when it is usable.
    pub fn generate(extension: Option<&str>) -> Self {
        let token = Uuid::new_v4().simple().to_string();
        match extension.map(sanitize_extension) {
            Some(ext) if !ext.is_empty() => ArtifactId(format!("{}.{}", token, ext)),
            _ => ArtifactId(token),
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        if value.is_empty() || value.len() > Self::MAX_LEN {
            return Err(AppError::InvalidInput(format!(
                "Artifact id must be 1..={} characters",
                Self::MAX_LEN
            )));
        }
        if value.contains("..")
            || value.starts_with('.')
            || !value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        {
            return Err(AppError::InvalidInput(format!(
                "Artifact id contains invalid characters: {}",
                value
            )));
        }
        Ok(ArtifactId(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extension part of the id, if any.
    pub fn extension(&self) -> Option<&str> {
        self.0.split_once('.').map(|(_, ext)| ext)
    }
}

fn sanitize_extension(ext: &str) -> String {
    ext.trim_start_matches('.')
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(10)
        .collect::<String>()
        .to_lowercase()
}

impl Display for ArtifactId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ArtifactId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ArtifactId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArtifactId::parse(s)
    }
}

impl TryFrom<String> for ArtifactId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ArtifactId::parse(&value)
    }
}

impl From<ArtifactId> for String {
    fn from(id: ArtifactId) -> Self {
        id.0
    }
}

/// An artifact as seen by a directory scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEntry {
    /// File name inside the staging directory. Usually an [`ArtifactId`], but
    /// may be an in-flight temporary or claim file.
    pub name: String,
    pub kind: ArtifactKind,
    pub created_at: DateTime<Utc>,
}

/// Artifact statistics read fresh from storage. Sizes are never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactStat {
    pub id: ArtifactId,
    pub kind: ArtifactKind,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
}
