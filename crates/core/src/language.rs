//! Languages, service flavors, and the file-extension lookup table.
//!
//! The execution service is deployed as two instances ("flavors"): the
//! standard compiler set and an extra set (e.g. Python for ML, C#).
//! A language is identified by the pair `(flavor, id)`.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::LanguageId;

/* --------------------------------------------------------------------------
   Well-known language IDs
   -------------------------------------------------------------------------- */

/// Plain Text, the fallback for unknown file extensions.
pub const PLAIN_TEXT_LANGUAGE_ID: LanguageId = 43;

/// Executable. Source is already a binary-safe blob and is sent as-is.
pub const PASS_THROUGH_LANGUAGE_ID: LanguageId = 44;

/// Python 3.8.1, selected when nothing else is requested.
pub const DEFAULT_LANGUAGE_ID: LanguageId = 71;

/// SQL (SQLite). Needs the bundled sample database attached.
pub const BUNDLED_DEPENDENCY_LANGUAGE_ID: LanguageId = 82;

/// Multi-file program. Not selectable from a single source file.
pub const MULTI_FILE_PROGRAM_LANGUAGE_ID: LanguageId = 89;

/* --------------------------------------------------------------------------
   Flavor
   -------------------------------------------------------------------------- */

/// Which execution-service instance handles a language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Flavor {
    /// Standard compilers and interpreters.
    #[default]
    Ce,
    /// Extra compilers (ML-ready Python, .NET, ...).
    ExtraCe,
}

impl Flavor {
    /// Both flavors, in catalog merge order.
    pub const ALL: [Flavor; 2] = [Flavor::Ce, Flavor::ExtraCe];

    pub fn as_str(self) -> &'static str {
        match self {
            Flavor::Ce => "CE",
            Flavor::ExtraCe => "EXTRA_CE",
        }
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/* --------------------------------------------------------------------------
   Language
   -------------------------------------------------------------------------- */

/// A language as described by the service's `/languages` endpoints.
///
/// The list endpoint only returns `id` and `name`; the detail endpoint
/// also returns the conventional `source_file` name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub id: LanguageId,
    pub name: String,
    #[serde(default)]
    pub source_file: Option<String>,
}

/// A selectable language: a catalog entry bound to its flavor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageOption {
    pub flavor: Flavor,
    pub id: LanguageId,
    pub name: String,
}

/// A `(flavor, id)` pair without the catalog metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LanguageRef {
    pub flavor: Flavor,
    pub language_id: LanguageId,
}

impl LanguageRef {
    pub const fn new(flavor: Flavor, language_id: LanguageId) -> Self {
        Self {
            flavor,
            language_id,
        }
    }
}

/* --------------------------------------------------------------------------
   Extension table
   -------------------------------------------------------------------------- */

const EXTENSIONS: &[(&str, LanguageRef)] = &[
    ("asm", LanguageRef::new(Flavor::Ce, 45)),
    ("c", LanguageRef::new(Flavor::Ce, 103)),
    ("cpp", LanguageRef::new(Flavor::Ce, 105)),
    ("cs", LanguageRef::new(Flavor::ExtraCe, 29)),
    ("go", LanguageRef::new(Flavor::Ce, 95)),
    ("java", LanguageRef::new(Flavor::Ce, 91)),
    ("js", LanguageRef::new(Flavor::Ce, 102)),
    ("lua", LanguageRef::new(Flavor::Ce, 64)),
    ("pas", LanguageRef::new(Flavor::Ce, 67)),
    ("php", LanguageRef::new(Flavor::Ce, 98)),
    ("py", LanguageRef::new(Flavor::ExtraCe, 25)),
    ("r", LanguageRef::new(Flavor::Ce, 99)),
    ("rb", LanguageRef::new(Flavor::Ce, 72)),
    ("rs", LanguageRef::new(Flavor::Ce, 73)),
    ("scala", LanguageRef::new(Flavor::Ce, 81)),
    ("sh", LanguageRef::new(Flavor::Ce, 46)),
    ("sql", LanguageRef::new(Flavor::Ce, BUNDLED_DEPENDENCY_LANGUAGE_ID)),
    ("swift", LanguageRef::new(Flavor::Ce, 83)),
    ("ts", LanguageRef::new(Flavor::Ce, 101)),
    ("txt", LanguageRef::new(Flavor::Ce, PLAIN_TEXT_LANGUAGE_ID)),
];

/// Look up the language for a file extension (without the dot).
///
/// Unknown extensions fall back to Plain Text on the standard flavor.
pub fn language_for_extension(extension: &str) -> LanguageRef {
    let extension = extension.to_ascii_lowercase();
    EXTENSIONS
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, lang)| *lang)
        .unwrap_or(LanguageRef::new(Flavor::Ce, PLAIN_TEXT_LANGUAGE_ID))
}

/// Look up the language for a source file path by its extension.
pub fn language_for_path(path: &Path) -> LanguageRef {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    language_for_extension(extension)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
