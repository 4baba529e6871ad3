//! Plain data passed between the editor host and the extension.

use std::path::{Path, PathBuf};

/// Language identifiers the extension cares about.
pub const C_LANGUAGE: &str = "c";
pub const CPP_LANGUAGE: &str = "cpp";

/// A text document as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    pub uri: String,
    pub file_name: PathBuf,
    pub language_id: String,
}

impl TextDocument {
    /// Build a document for a local file, deriving a `file://` URI from the path.
    ///
    /// Relative paths cannot be expressed as file URIs; for those the path
    /// itself is used as the URI.
    pub fn from_path(path: impl Into<PathBuf>, language_id: impl Into<String>) -> Self {
        let file_name = path.into();
        let uri = url::Url::from_file_path(&file_name)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| file_name.display().to_string());
        Self {
            uri,
            file_name,
            language_id: language_id.into(),
        }
    }
}

/// Zero-based cursor position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// Editor column an editor is shown in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewColumn {
    /// Let the host pick (its default column).
    Default,
    Column(u8),
}

/// A visible text editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEditor {
    pub document: TextDocument,
    pub view_column: Option<ViewColumn>,
    /// Active (primary) selection end, i.e. the cursor.
    pub cursor: Position,
}

impl TextEditor {
    pub fn new(document: TextDocument) -> Self {
        Self {
            document,
            view_column: Some(ViewColumn::Column(1)),
            cursor: Position::default(),
        }
    }

    pub fn with_column(mut self, column: ViewColumn) -> Self {
        self.view_column = Some(column);
        self
    }

    pub fn with_cursor(mut self, cursor: Position) -> Self {
        self.cursor = cursor;
        self
    }
}

/// A root folder opened in the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceFolder {
    pub name: String,
    pub path: PathBuf,
}

impl WorkspaceFolder {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Whether `file` lives under this folder.
    pub fn contains(&self, file: &Path) -> bool {
        file.starts_with(&self.path)
    }
}

/// One entry of the navigation list returned by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationItem {
    pub label: String,
    pub position: Position,
}

/// A registered custom configuration provider (e.g. a build-system extension).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigurationProvider {
    pub extension_id: String,
    pub name: String,
}
