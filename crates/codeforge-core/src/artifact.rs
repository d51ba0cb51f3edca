//! Artifact types and extension-based classification.
//!
//! An artifact is one named text file reconstructed from the generation
//! stream. Classification is a closed mapping from file extension to
//! [`ArtifactKind`] and lives here, outside the validator, so new kinds can
//! be added without touching pipeline logic.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Grammar used to syntax-check a script artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptGrammar {
    JavaScript,
    TypeScript,
    Tsx,
}

/// Closed classification of an artifact by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "grammar")]
pub enum ArtifactKind {
    /// Executable script with a known grammar
    Script(ScriptGrammar),
    /// Markup document (HTML)
    Markup,
    /// Anything the validator does not inspect
    Other,
}

impl ArtifactKind {
    /// Classify a file extension (without the leading dot).
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "js" | "jsx" | "mjs" | "cjs" => ArtifactKind::Script(ScriptGrammar::JavaScript),
            "ts" | "mts" | "cts" => ArtifactKind::Script(ScriptGrammar::TypeScript),
            "tsx" => ArtifactKind::Script(ScriptGrammar::Tsx),
            "html" | "htm" => ArtifactKind::Markup,
            _ => ArtifactKind::Other,
        }
    }

    /// Classify an artifact name.
    pub fn from_name(name: &str) -> Self {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(ArtifactKind::Other)
    }

    /// Whether an artifact of this kind can serve as the application entry point.
    pub fn is_entry_capable(&self) -> bool {
        matches!(self, ArtifactKind::Markup)
    }
}

/// The kind recorded alongside committed content: the raw file extension.
///
/// `app.js` → `js`, `Dockerfile` → `Dockerfile` (no extension keeps the name).
pub fn inferred_kind(name: &str) -> String {
    let base = basename(name);
    match base.rsplit_once('.') {
        Some((_, ext)) => ext.to_string(),
        None => base.to_string(),
    }
}

/// Last path segment of an artifact name.
pub fn basename(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Normalise a path as declared in a file-start marker.
///
/// Backslashes become `/`, and empty, `.` and `..` segments are dropped so
/// the name stays relative to the project root.
pub fn normalize_name(raw: &str) -> String {
    raw.replace('\\', "/")
        .split('/')
        .map(str::trim)
        .filter(|seg| !seg.is_empty() && *seg != "." && *seg != "..")
        .collect::<Vec<_>>()
        .join("/")
}

/// An artifact under construction, or sealed once its end was observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDraft {
    /// Relative path
    pub name: String,
    /// Accumulated text
    pub content: String,
    /// Occurrence of this name within the session, starting at 0
    pub revision: u32,
    /// Set by the fallback stage for artifacts it created
    #[serde(default)]
    pub synthesized: bool,
    sealed: bool,
}

impl ArtifactDraft {
    /// Open a new draft.
    pub fn open(name: impl Into<String>, revision: u32) -> Self {
        Self {
            name: name.into(),
            content: String::new(),
            revision,
            synthesized: false,
            sealed: false,
        }
    }

    /// Create an already sealed artifact produced outside the stream.
    pub fn synthesized(name: impl Into<String>, content: impl Into<String>, revision: u32) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            revision,
            synthesized: true,
            sealed: true,
        }
    }

    /// Append one line plus its terminator.
    ///
    /// Ignored once the draft is sealed.
    pub fn push_line(&mut self, line: &str) {
        if self.sealed {
            return;
        }
        self.content.push_str(line);
        self.content.push('\n');
    }

    /// Seal the draft. Leading blank lines and trailing whitespace are
    /// removed; indentation of the first content line is kept.
    pub fn seal(&mut self) {
        if self.sealed {
            return;
        }
        let trimmed = self.content.trim_end();
        let start = trimmed
            .split_inclusive('\n')
            .take_while(|line| line.trim().is_empty())
            .map(str::len)
            .sum::<usize>();
        self.content = trimmed[start..].to_string();
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn kind(&self) -> ArtifactKind {
        ArtifactKind::from_name(&self.name)
    }

    pub fn byte_len(&self) -> usize {
        self.content.len()
    }
}

/// Ordered collection of sealed drafts for one session.
///
/// Every draft is kept, including earlier revisions of a re-declared name;
/// name lookups resolve to the latest revision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSet {
    drafts: Vec<ArtifactDraft>,
}

impl ArtifactSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sealed draft, sealing it first if needed.
    pub fn push(&mut self, mut draft: ArtifactDraft) {
        draft.seal();
        self.drafts.push(draft);
    }

    /// Number of drafts with the given name already in the set.
    pub fn revisions_of(&self, name: &str) -> u32 {
        self.drafts.iter().filter(|d| d.name == name).count() as u32
    }

    /// All drafts in the order they were sealed.
    pub fn drafts(&self) -> &[ArtifactDraft] {
        &self.drafts
    }

    /// Latest revision of every name, in seal order.
    pub fn latest(&self) -> impl Iterator<Item = &ArtifactDraft> + '_ {
        self.drafts
            .iter()
            .enumerate()
            .filter(move |(idx, d)| !self.drafts[idx + 1..].iter().any(|later| later.name == d.name))
            .map(|(_, d)| d)
    }

    /// Latest revision with this exact name.
    pub fn get(&self, name: &str) -> Option<&ArtifactDraft> {
        self.drafts.iter().rev().find(|d| d.name == name)
    }

    /// Every draft, mutably, for in-place repairs.
    pub fn drafts_mut(&mut self) -> &mut [ArtifactDraft] {
        &mut self.drafts
    }

    /// Whether a draft is an earlier revision of a later draft.
    pub fn is_superseded(&self, draft: &ArtifactDraft) -> bool {
        self.drafts
            .iter()
            .any(|d| d.name == draft.name && d.revision > draft.revision)
    }

    /// Distinct names of the latest revisions.
    pub fn names(&self) -> Vec<&str> {
        self.latest().map(|d| d.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    /// Total content bytes across all drafts.
    pub fn total_bytes(&self) -> usize {
        self.drafts.iter().map(ArtifactDraft::byte_len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(ArtifactKind::from_name("src/app.js"), ArtifactKind::Script(ScriptGrammar::JavaScript));
        assert_eq!(ArtifactKind::from_name("main.TSX"), ArtifactKind::Script(ScriptGrammar::Tsx));
        assert_eq!(ArtifactKind::from_name("index.htm"), ArtifactKind::Markup);
        assert_eq!(ArtifactKind::from_name("styles.css"), ArtifactKind::Other);
        assert_eq!(ArtifactKind::from_name("Dockerfile"), ArtifactKind::Other);
        assert!(ArtifactKind::Markup.is_entry_capable());
        assert!(!ArtifactKind::Other.is_entry_capable());
    }

    #[test]
    fn test_inferred_kind() {
        assert_eq!(inferred_kind("src/app.js"), "js");
        assert_eq!(inferred_kind("archive.tar.gz"), "gz");
        assert_eq!(inferred_kind("Dockerfile"), "Dockerfile");
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("./src/app.js"), "src/app.js");
        assert_eq!(normalize_name("/public//index.html"), "public/index.html");
        assert_eq!(normalize_name("..\\..\\etc\\passwd"), "etc/passwd");
    }

    #[test]
    fn test_seal_trims_blank_edges() {
        let mut draft = ArtifactDraft::open("a.py", 0);
        draft.push_line("");
        draft.push_line("    indented = True");
        draft.push_line("");
        draft.seal();
        assert_eq!(draft.content, "    indented = True");

        // Sealed drafts ignore further lines
        draft.push_line("late");
        assert_eq!(draft.content, "    indented = True");
    }

    #[test]
    fn test_latest_revision_wins_for_lookup() {
        let mut set = ArtifactSet::new();
        let mut first = ArtifactDraft::open("a.js", 0);
        first.push_line("one");
        set.push(first);
        set.push(ArtifactDraft::open("b.js", 0));
        let mut second = ArtifactDraft::open("a.js", set.revisions_of("a.js"));
        second.push_line("two");
        set.push(second);

        assert_eq!(set.len(), 3);
        assert_eq!(set.get("a.js").map(|d| d.content.as_str()), Some("two"));
        assert_eq!(set.names(), vec!["b.js", "a.js"]);
        assert!(set.is_superseded(&set.drafts()[0]));
        assert!(!set.is_superseded(&set.drafts()[2]));
    }
}
