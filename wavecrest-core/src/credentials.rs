use crate::constants::BENCH_USER_PREFIX;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Unable to read credential file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Credential file {0} contains no tokens")]
    Empty(PathBuf),

    #[error("Credential pool is empty")]
    EmptyPool,
}

/// A single pre-provisioned authentication token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    index: usize,
    token: String,
}

impl Credential {
    pub fn new(index: usize, token: impl Into<String>) -> Self {
        Self {
            index,
            token: token.into(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// User id the provisioning tool assigned to the account owning this token.
    pub fn provisioned_user_id(&self) -> String {
        format!("{BENCH_USER_PREFIX}{:04}", self.index)
    }
}

/// Ordered pool of tokens, read once and consumed front to back.
#[derive(Debug, Clone, Default)]
pub struct CredentialPool {
    credentials: Vec<Credential>,
}

impl CredentialPool {
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let credentials = tokens
            .into_iter()
            .enumerate()
            .map(|(index, token)| Credential::new(index, token))
            .collect();
        Self { credentials }
    }

    /// One token per line. Lines are trimmed and blank lines skipped.
    pub fn parse(contents: &str) -> Self {
        Self::from_tokens(
            contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty()),
        )
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CredentialError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| CredentialError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let pool = Self::parse(&contents);
        if pool.is_empty() {
            return Err(CredentialError::Empty(path.to_path_buf()));
        }

        tracing::debug!("Loaded {} credentials from {}", pool.len(), path.display());
        Ok(pool)
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn first(&self) -> Result<&Credential, CredentialError> {
        self.credentials.first().ok_or(CredentialError::EmptyPool)
    }

    /// The first `count` credentials, or the whole pool if it is smaller.
    pub fn take(&self, count: usize) -> &[Credential] {
        &self.credentials[..count.min(self.credentials.len())]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Credential> {
        self.credentials.iter()
    }
}
