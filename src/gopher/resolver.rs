use std::path::PathBuf;

use crate::confine::ServedRoot;
use crate::gopher::selector::Selector;

/// Menu file served for a directory selector.
pub const INDEX_FILE: &str = ".gopher";

/// What a selector refers to. Computed fresh for every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    RootIndex,
    /// Canonical path of the directory; its index may still be missing.
    DirectoryIndex(PathBuf),
    File(PathBuf),
    NotFound,
}

impl Resolution {
    /// File the response body is read from, if any.
    pub fn target(&self, root: &ServedRoot) -> Option<PathBuf> {
        match self {
            Resolution::RootIndex => Some(root.base().join(INDEX_FILE)),
            Resolution::DirectoryIndex(dir) => Some(dir.join(INDEX_FILE)),
            Resolution::File(path) => Some(path.clone()),
            Resolution::NotFound => None,
        }
    }
}

/// Maps a selector to a [`Resolution`] using real filesystem metadata.
///
/// A directory wins over a file. Anything that is neither, or that cannot be
/// located inside the root, is [`Resolution::NotFound`].
pub async fn resolve(root: &ServedRoot, selector: &Selector) -> Resolution {
    if *selector == Selector::Empty {
        return Resolution::RootIndex;
    }

    let Some(path) = root.locate(selector.relative_path()).await else {
        return Resolution::NotFound;
    };

    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_dir() => {
            tracing::info!(path = %path.display(), "serving directory");
            Resolution::DirectoryIndex(path)
        }
        Ok(meta) if meta.is_file() => {
            tracing::info!(path = %path.display(), "serving file");
            Resolution::File(path)
        }
        _ => Resolution::NotFound,
    }
}
