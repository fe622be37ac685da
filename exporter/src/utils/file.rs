//! Path expansion and batch input sources

use std::path::PathBuf;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

/// Expand `~` and make relative paths absolute against the working directory.
pub fn expand_path(path: &str) -> PathBuf {
    let path = path.trim();

    let expanded = match path {
        "~" => dirs::home_dir().unwrap_or_else(|| PathBuf::from(path)),
        _ => match (path.strip_prefix("~/"), dirs::home_dir()) {
            (Some(rest), Some(home)) => home.join(rest),
            _ => PathBuf::from(path),
        },
    };

    if expanded.is_relative() {
        std::env::current_dir()
            .map(|cwd| cwd.join(&expanded))
            .unwrap_or(expanded)
    } else {
        expanded
    }
}

/// Where the binary reads JSON-lines metric batches from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Stdin,
    File(PathBuf),
}

impl InputSource {
    /// `-` or nothing selects stdin
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") | Some("-") => Self::Stdin,
            Some(path) => Self::File(expand_path(path)),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Stdin => "stdin".to_string(),
            Self::File(path) => path.display().to_string(),
        }
    }

    pub async fn lines(&self) -> std::io::Result<Lines<Box<dyn AsyncBufRead + Unpin + Send>>> {
        let reader: Box<dyn AsyncBufRead + Unpin + Send> = match self {
            Self::Stdin => Box::new(BufReader::new(tokio::io::stdin())),
            Self::File(path) => Box::new(BufReader::new(tokio::fs::File::open(path).await?)),
        };
        Ok(reader.lines())
    }
}
