//! Boundary state machine.
//!
//! Consumes complete lines and splits them into artifacts using the
//! sentinel markers:
//!
//! ```text
//! === FILENAME: path/to/file.ext ===
//! file content
//! === END FILE ===
//! ```
//!
//! Every line produces exactly one [`Transition`], including lines that are
//! discarded while no artifact is open.

use codeforge_core::artifact::normalize_name;
use codeforge_core::{ArtifactDraft, ArtifactSet};
use tracing::{debug, warn};

const START_PREFIX: &str = "=== FILENAME:";
const END_MARKER: &str = "=== END FILE ===";
const MARKER_FENCE: &str = "===";

/// Whether an artifact is currently open.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BoundaryState {
    #[default]
    Idle,
    Collecting(String),
}

/// Classification of a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass {
    /// File-start marker with its normalised path
    Start(String),
    /// File-end marker
    End,
    /// Anything else
    Content,
}

impl LineClass {
    /// Classify a line against the marker grammar.
    ///
    /// Markers must start at column 0; an indented marker is content, so
    /// files that document the format keep their text. A start marker whose
    /// path is empty after normalisation is content too.
    pub fn of(line: &str) -> Self {
        let trimmed = line.trim_end();

        if trimmed.starts_with(END_MARKER) {
            return LineClass::End;
        }

        let Some(rest) = trimmed.strip_prefix(START_PREFIX) else {
            return LineClass::Content;
        };

        let mut path = rest.trim();
        while let Some(stripped) = path.strip_suffix(MARKER_FENCE) {
            path = stripped.trim_end();
        }

        let name = normalize_name(path);
        if name.is_empty() {
            warn!(line = trimmed, "File-start marker without a path; treating as content");
            return LineClass::Content;
        }

        LineClass::Start(name)
    }
}

/// What processing one line did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// A new artifact was opened.
    ///
    /// `sealed_previous` names an artifact that was still open and got
    /// sealed because no end marker preceded this start marker.
    Opened {
        name: String,
        revision: u32,
        sealed_previous: Option<String>,
    },
    /// The open artifact was sealed by an end marker.
    Sealed { name: String },
    /// The line was appended to the open artifact.
    Appended,
    /// The line arrived while idle and was dropped.
    Discarded,
}

/// Line-driven artifact splitter.
#[derive(Debug, Default)]
pub struct BoundaryMachine {
    current: Option<ArtifactDraft>,
    sealed: ArtifactSet,
}

impl BoundaryMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BoundaryState {
        match &self.current {
            Some(draft) => BoundaryState::Collecting(draft.name.clone()),
            None => BoundaryState::Idle,
        }
    }

    /// Artifacts sealed so far.
    pub fn sealed(&self) -> &ArtifactSet {
        &self.sealed
    }

    /// Process one complete line (without its terminator).
    pub fn process_line(&mut self, line: &str) -> Transition {
        match LineClass::of(line) {
            LineClass::Start(name) => {
                let sealed_previous = self.seal_current();
                if let Some(prev) = &sealed_previous {
                    warn!(previous = %prev, next = %name, "Start marker before end marker; sealing previous artifact");
                }

                let revision = self.sealed.revisions_of(&name);
                if revision > 0 {
                    warn!(name = %name, revision, "Artifact name declared again; opening a new revision");
                }

                debug!(name = %name, "Opening artifact");
                self.current = Some(ArtifactDraft::open(name.clone(), revision));

                Transition::Opened {
                    name,
                    revision,
                    sealed_previous,
                }
            }
            LineClass::End => match self.seal_current() {
                Some(name) => {
                    debug!(name = %name, "Sealed artifact");
                    Transition::Sealed { name }
                }
                None => {
                    debug!("End marker while idle; discarding");
                    Transition::Discarded
                }
            },
            LineClass::Content => match self.current.as_mut() {
                Some(draft) => {
                    draft.push_line(line);
                    Transition::Appended
                }
                None => Transition::Discarded,
            },
        }
    }

    /// Seal any open artifact and return everything collected.
    pub fn finish(&mut self) -> ArtifactSet {
        if let Some(name) = self.seal_current() {
            debug!(name = %name, "Stream ended while collecting; sealed artifact");
        }
        std::mem::take(&mut self.sealed)
    }

    fn seal_current(&mut self) -> Option<String> {
        let draft = self.current.take()?;
        let name = draft.name.clone();
        self.sealed.push(draft);
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(lines: &[&str]) -> (Vec<Transition>, ArtifactSet) {
        let mut machine = BoundaryMachine::new();
        let transitions = lines.iter().map(|l| machine.process_line(l)).collect();
        (transitions, machine.finish())
    }

    #[test]
    fn test_classify_markers() {
        assert_eq!(LineClass::of("=== FILENAME: src/app.js ==="), LineClass::Start("src/app.js".into()));
        assert_eq!(LineClass::of("=== FILENAME: a.js"), LineClass::Start("a.js".into()));
        assert_eq!(LineClass::of("=== FILENAME: a.js === ==="), LineClass::Start("a.js".into()));
        assert_eq!(LineClass::of("=== FILENAME: ./web\\main.css ==="), LineClass::Start("web/main.css".into()));
        assert_eq!(LineClass::of("=== END FILE ==="), LineClass::End);
        assert_eq!(LineClass::of("=== END FILE ===\r"), LineClass::End);
        assert_eq!(LineClass::of("=== FILENAME: ==="), LineClass::Content);
        assert_eq!(LineClass::of("const x = 1;"), LineClass::Content);
    }

    #[test]
    fn test_indented_markers_are_content() {
        assert_eq!(LineClass::of("    === END FILE ==="), LineClass::Content);
        assert_eq!(LineClass::of("  === FILENAME: a.js ==="), LineClass::Content);

        let (transitions, set) = run(&[
            "=== FILENAME: README.md ===",
            "Wrap each file like this:",
            "    === FILENAME: app.js ===",
            "    === END FILE ===",
            "=== END FILE ===",
        ]);

        assert_eq!(transitions[2], Transition::Appended);
        assert_eq!(transitions[3], Transition::Appended);
        assert_eq!(set.len(), 1);
        assert_eq!(
            set.drafts()[0].content,
            "Wrap each file like this:\n    === FILENAME: app.js ===\n    === END FILE ==="
        );
    }

    #[test]
    fn test_single_artifact() {
        let (transitions, set) = run(&[
            "Here is your app:",
            "=== FILENAME: index.html ===",
            "<!doctype html><html></html>",
            "=== END FILE ===",
        ]);

        assert_eq!(transitions[0], Transition::Discarded);
        assert!(matches!(&transitions[1], Transition::Opened { name, revision: 0, sealed_previous: None } if name == "index.html"));
        assert_eq!(transitions[2], Transition::Appended);
        assert_eq!(transitions[3], Transition::Sealed { name: "index.html".into() });
        assert_eq!(set.len(), 1);
        assert_eq!(set.drafts()[0].content, "<!doctype html><html></html>");
    }

    #[test]
    fn test_idle_lines_are_discarded() {
        let (transitions, set) = run(&["prose", "", "=== END FILE ===", "more prose"]);
        assert!(transitions.iter().all(|t| *t == Transition::Discarded));
        assert!(set.is_empty());
    }

    #[test]
    fn test_state_tracks_open_artifact() {
        let mut machine = BoundaryMachine::new();
        assert_eq!(machine.state(), BoundaryState::Idle);
        machine.process_line("=== FILENAME: a.js ===");
        assert_eq!(machine.state(), BoundaryState::Collecting("a.js".into()));
        machine.process_line("=== END FILE ===");
        assert_eq!(machine.state(), BoundaryState::Idle);
    }

    #[test]
    fn test_start_while_collecting_seals_previous() {
        let (transitions, set) = run(&[
            "=== FILENAME: a.js ===",
            "one();",
            "=== FILENAME: b.js ===",
            "two();",
        ]);

        assert!(matches!(
            &transitions[2],
            Transition::Opened { name, sealed_previous: Some(prev), .. } if name == "b.js" && prev == "a.js"
        ));
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("a.js").unwrap().content, "one();");
        assert_eq!(set.get("b.js").unwrap().content, "two();");
    }

    #[test]
    fn test_redeclared_name_opens_new_revision() {
        let (transitions, set) = run(&[
            "=== FILENAME: a.js ===",
            "first();",
            "=== FILENAME: a.js ===",
            "second();",
            "=== END FILE ===",
        ]);

        assert!(matches!(&transitions[2], Transition::Opened { revision: 1, .. }));
        assert_eq!(set.len(), 2);
        assert_eq!(set.drafts()[0].content, "first();");
        assert_eq!(set.drafts()[1].content, "second();");
        assert!(set.is_superseded(&set.drafts()[0]));
        assert_eq!(set.get("a.js").unwrap().content, "second();");
    }

    #[test]
    fn test_content_keeps_inner_blank_lines() {
        let (_, set) = run(&[
            "=== FILENAME: notes.md ===",
            "",
            "# Title",
            "",
            "body",
            "",
            "=== END FILE ===",
        ]);
        assert_eq!(set.drafts()[0].content, "# Title\n\nbody");
    }
}
