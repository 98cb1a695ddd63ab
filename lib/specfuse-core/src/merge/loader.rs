//! Fetching, parsing, and gating of source documents.
//!
//! Every source is fetched concurrently; the results are handed back in the
//! original source-list order, never completion order. The downstream fold
//! depends on that ordering for deterministic conflict resolution.

use std::time::Duration;

use openapiv3::OpenAPI;
use serde_json::Value;
use tracing::debug;

use crate::config::{SourceConfig, SourceLocation};

/// Why one source produced no document.
#[derive(Debug, derive_more::Error, derive_more::Display, derive_more::From)]
pub enum LoadError {
    /// Network-level failure (connection, TLS, non-success HTTP status).
    Http(reqwest::Error),

    /// Filesystem failure for file sources.
    Io(std::io::Error),

    /// The fetch did not complete within the configured timeout.
    #[display("fetch timed out after {timeout:?}")]
    #[from(skip)]
    Timeout {
        /// The configured per-source timeout.
        timeout: Duration,
    },

    /// The bytes could not be parsed into a specification document.
    #[display("unparseable document: {message}")]
    #[from(skip)]
    Parse {
        /// Parser diagnostic, including the path of the offending node.
        message: String,
    },

    /// The document declares a specification version this engine does not
    /// support. Handled exactly like an unparseable document.
    #[display("unsupported OpenAPI version '{version}'")]
    #[from(skip)]
    UnsupportedVersion {
        /// The declared version, empty when the field is missing.
        version: String,
    },

    /// The document parses but declares no paths.
    #[display("document contains no paths")]
    EmptyPaths,

    /// The load task itself failed.
    #[display("load task failed: {message}")]
    #[from(skip)]
    TaskFailed {
        /// Failure description from the runtime.
        message: String,
    },
}

/// One source together with its load outcome.
///
/// Failed sources carry the error so lenient merges can itemize what was
/// skipped; there is no partial use of a failed source.
#[derive(Debug)]
pub struct LoadedSource {
    /// The configuration the document was loaded for.
    pub config: SourceConfig,
    /// The parsed document, or why there is none.
    pub outcome: Result<OpenAPI, LoadError>,
}

/// Fetches every source concurrently and returns the outcomes in the original
/// source-list order.
pub(crate) async fn load_all(
    client: &reqwest::Client,
    sources: &[SourceConfig],
    timeout: Duration,
) -> Vec<LoadedSource> {
    let mut handles = Vec::with_capacity(sources.len());
    for source in sources {
        let client = client.clone();
        let source = source.clone();
        handles.push(tokio::spawn(async move {
            load_source(&client, &source, timeout).await
        }));
    }

    let mut loaded = Vec::with_capacity(sources.len());
    for (source, handle) in sources.iter().cloned().zip(handles) {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(join_error) => Err(LoadError::TaskFailed {
                message: join_error.to_string(),
            }),
        };
        loaded.push(LoadedSource {
            config: source,
            outcome,
        });
    }
    loaded
}

async fn load_source(
    client: &reqwest::Client,
    source: &SourceConfig,
    timeout: Duration,
) -> Result<OpenAPI, LoadError> {
    let text = tokio::time::timeout(timeout, fetch_text(client, &source.location))
        .await
        .map_err(|_| LoadError::Timeout { timeout })??;
    let document = parse_document(&text)?;
    debug!(
        api = %source.name,
        paths = document.paths.paths.len(),
        "loaded source document"
    );
    Ok(document)
}

async fn fetch_text(
    client: &reqwest::Client,
    location: &SourceLocation,
) -> Result<String, LoadError> {
    match location {
        SourceLocation::Url(url) => {
            let response = client.get(url.clone()).send().await?.error_for_status()?;
            Ok(response.text().await?)
        }
        SourceLocation::File(path) => Ok(tokio::fs::read_to_string(path).await?),
    }
}

/// Parses bytes into a document and gates it: supported version, at least one
/// path. Bodies starting with `{` are JSON, everything else is YAML.
fn parse_document(text: &str) -> Result<OpenAPI, LoadError> {
    let value = parse_value(text)?;

    let version = value
        .get("openapi")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if !version.starts_with("3.") {
        return Err(LoadError::UnsupportedVersion {
            version: version.to_string(),
        });
    }

    let has_paths = value
        .get("paths")
        .and_then(Value::as_object)
        .is_some_and(|paths| !paths.is_empty());
    if !has_paths {
        return Err(LoadError::EmptyPaths);
    }

    serde_path_to_error::deserialize(value).map_err(|error| LoadError::Parse {
        message: error.to_string(),
    })
}

fn parse_value(text: &str) -> Result<Value, LoadError> {
    if text.trim_start().starts_with('{') {
        let mut deserializer = serde_json::Deserializer::from_str(text);
        serde_path_to_error::deserialize(&mut deserializer).map_err(|error| LoadError::Parse {
            message: error.to_string(),
        })
    } else {
        serde_yaml_ng::from_str(text).map_err(|error| LoadError::Parse {
            message: error.to_string(),
        })
    }
}
