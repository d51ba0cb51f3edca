//! Post-extraction validation.
//!
//! A fixed pipeline run against the latest revision of every artifact:
//!
//! 1. entry presence
//! 2. syntax of script artifacts (tree-sitter, no execution)
//! 3. structure of markup artifacts, plus the artifact size limit
//! 4. same-origin script/stylesheet references in markup
//!
//! The first violation stops the pipeline. Repairs (code fence unwrapping,
//! doctype insertion) run before the stage they serve and are listed in the
//! returned [`ValidationReport`].

use std::collections::HashMap;
use std::fmt;

use regex::Regex;
use tree_sitter::{Language, Node, Parser};

use codeforge_core::config::ExtractionConfig;
use codeforge_core::{ArtifactDraft, ArtifactKind, ArtifactSet, ScriptGrammar, ValidationFinding};
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::fallback::find_entry;

/// A change the validator made to an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Repair {
    /// A markdown code fence around the whole artifact was removed
    UnwrappedFence { artifact: String },
    /// `<!DOCTYPE html>` was prepended to a markup document
    AddedDoctype { artifact: String },
}

impl fmt::Display for Repair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Repair::UnwrappedFence { artifact } => write!(f, "unwrapped code fence in {}", artifact),
            Repair::AddedDoctype { artifact } => write!(f, "added doctype to {}", artifact),
        }
    }
}

/// Summary of a passing validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub entry: String,
    pub repairs: Vec<Repair>,
    pub scripts_checked: usize,
    pub markup_checked: usize,
    pub references_checked: usize,
}

/// Runs the validation pipeline. One instance per session.
pub struct Validator {
    entry_name: String,
    strip_code_fences: bool,
    max_artifact_bytes: usize,
    parsers: HashMap<ScriptGrammar, Parser>,
    references: ReferenceScanner,
}

impl Validator {
    pub fn new(config: &ExtractionConfig) -> EngineResult<Self> {
        let mut parsers = HashMap::new();
        parsers.insert(
            ScriptGrammar::JavaScript,
            create_parser(tree_sitter_javascript::LANGUAGE.into())?,
        );
        parsers.insert(
            ScriptGrammar::TypeScript,
            create_parser(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())?,
        );
        parsers.insert(
            ScriptGrammar::Tsx,
            create_parser(tree_sitter_typescript::LANGUAGE_TSX.into())?,
        );

        Ok(Self {
            entry_name: config.entry_name.clone(),
            strip_code_fences: config.strip_code_fences,
            max_artifact_bytes: config.max_artifact_bytes,
            parsers,
            references: ReferenceScanner::new()?,
        })
    }

    /// Validate and repair `set` in place.
    ///
    /// Superseded revisions are committed alongside the latest ones, so every
    /// draft goes through every stage. References resolve against the latest
    /// revision of each name.
    pub fn validate(&mut self, set: &mut ArtifactSet) -> Result<ValidationReport, ValidationFinding> {
        let mut report = ValidationReport::default();

        report.entry = find_entry(set, &self.entry_name)
            .map(|d| d.name.clone())
            .ok_or_else(|| ValidationFinding::missing_entry(&self.entry_name))?;

        if self.strip_code_fences {
            for draft in set.drafts_mut() {
                if let Some(inner) = unwrap_code_fence(&draft.content) {
                    draft.content = inner;
                    report.repairs.push(Repair::UnwrappedFence {
                        artifact: draft.name.clone(),
                    });
                }
            }
        }

        self.check_syntax(set, &mut report)?;
        self.check_structure(set, &mut report)?;
        self.check_references(set, &mut report)?;

        info!(
            entry = %report.entry,
            scripts = report.scripts_checked,
            markup = report.markup_checked,
            references = report.references_checked,
            repairs = report.repairs.len(),
            "Validation passed"
        );

        Ok(report)
    }

    fn check_syntax(
        &mut self,
        set: &ArtifactSet,
        report: &mut ValidationReport,
    ) -> Result<(), ValidationFinding> {
        for draft in set.drafts() {
            let ArtifactKind::Script(grammar) = draft.kind() else {
                continue;
            };
            let Some(parser) = self.parsers.get_mut(&grammar) else {
                continue;
            };

            debug!(artifact = %draft.name, revision = draft.revision, ?grammar, "Checking syntax");
            if let Some(detail) = syntax_issue(parser, &draft.content) {
                return Err(ValidationFinding::syntax_error(
                    &draft.name,
                    with_revision(set, draft, detail),
                ));
            }
            report.scripts_checked += 1;
        }
        Ok(())
    }

    fn check_structure(
        &self,
        set: &mut ArtifactSet,
        report: &mut ValidationReport,
    ) -> Result<(), ValidationFinding> {
        for draft in set.drafts() {
            if draft.byte_len() > self.max_artifact_bytes {
                let detail = format!(
                    "{} bytes exceeds the limit of {} bytes",
                    draft.byte_len(),
                    self.max_artifact_bytes
                );
                return Err(ValidationFinding::structural_error(
                    &draft.name,
                    with_revision(set, draft, detail),
                ));
            }
        }

        for draft in set.drafts_mut() {
            if draft.kind() != ArtifactKind::Markup {
                continue;
            }
            if let Some(fixed) = add_doctype(&draft.content) {
                draft.content = fixed;
                report.repairs.push(Repair::AddedDoctype {
                    artifact: draft.name.clone(),
                });
            }
        }

        for draft in set.drafts().iter().filter(|d| d.kind() == ArtifactKind::Markup) {
            if !has_document_root(&draft.content) {
                return Err(ValidationFinding::structural_error(
                    &draft.name,
                    with_revision(set, draft, "no <!DOCTYPE html> or <html> document root".to_string()),
                ));
            }
            report.markup_checked += 1;
        }
        Ok(())
    }

    fn check_references(
        &self,
        set: &ArtifactSet,
        report: &mut ValidationReport,
    ) -> Result<(), ValidationFinding> {
        let names = set.names();

        for draft in set.drafts().iter().filter(|d| d.kind() == ArtifactKind::Markup) {
            for reference in self.references.scan(&draft.content) {
                if !resolves(&names, &draft.name, &reference) {
                    return Err(ValidationFinding::missing_reference(&draft.name, &reference));
                }
                report.references_checked += 1;
            }
        }
        Ok(())
    }
}

/// Name the revision in a finding about an earlier declaration.
fn with_revision(set: &ArtifactSet, draft: &ArtifactDraft, detail: String) -> String {
    if set.is_superseded(draft) {
        format!("{} (superseded revision {})", detail, draft.revision)
    } else {
        detail
    }
}

fn create_parser(language: Language) -> EngineResult<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&language)
        .map_err(|e| EngineError::Grammar(e.to_string()))?;
    Ok(parser)
}

/// Describe the first parse problem in `content`, if any.
pub fn syntax_issue(parser: &mut Parser, content: &str) -> Option<String> {
    let Some(tree) = parser.parse(content, None) else {
        return Some("parser gave up".to_string());
    };

    let root = tree.root_node();
    if !root.has_error() {
        return None;
    }

    let Some(node) = first_error(root) else {
        return Some("invalid syntax".to_string());
    };
    let pos = node.start_position();

    if node.is_missing() {
        return Some(format!(
            "expected '{}' at line {}, column {}",
            node.kind(),
            pos.row + 1,
            pos.column + 1
        ));
    }

    let snippet: String = node
        .utf8_text(content.as_bytes())
        .unwrap_or("")
        .lines()
        .next()
        .unwrap_or("")
        .chars()
        .take(40)
        .collect();

    Some(format!(
        "unexpected '{}' at line {}, column {}",
        snippet.trim(),
        pos.row + 1,
        pos.column + 1
    ))
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }

    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

/// Content inside a markdown fence that wraps the whole artifact.
pub fn unwrap_code_fence(content: &str) -> Option<String> {
    let lines: Vec<&str> = content.trim().lines().collect();
    if lines.len() < 2 {
        return None;
    }

    let opening = lines[0].trim();
    let closing = lines[lines.len() - 1].trim();
    if !opening.starts_with("```") || closing != "```" {
        return None;
    }
    // The info string may name a language but never contain another fence
    if opening[3..].contains('`') {
        return None;
    }

    Some(lines[1..lines.len() - 1].join("\n"))
}

fn add_doctype(content: &str) -> Option<String> {
    let lower = content.to_ascii_lowercase();
    if lower.contains("<!doctype") || !lower.contains("<html") {
        return None;
    }
    Some(format!("<!DOCTYPE html>\n{}", content))
}

fn has_document_root(content: &str) -> bool {
    let lower = content.to_ascii_lowercase();
    lower.contains("<!doctype html") || lower.contains("<html")
}

/// Extracts same-origin script and stylesheet references from markup.
pub struct ReferenceScanner {
    script_tag: Regex,
    link_tag: Regex,
    src: Regex,
    href: Regex,
    stylesheet: Regex,
}

impl ReferenceScanner {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            script_tag: Regex::new(r"(?is)<script\b[^>]*>")?,
            link_tag: Regex::new(r"(?is)<link\b[^>]*>")?,
            src: Regex::new(r#"(?is)\ssrc\s*=\s*["']([^"']*)["']"#)?,
            href: Regex::new(r#"(?is)\shref\s*=\s*["']([^"']*)["']"#)?,
            stylesheet: Regex::new(r#"(?is)\srel\s*=\s*["']?[^"'>]*\bstylesheet\b"#)?,
        })
    }

    /// References in document order, cleaned of query and fragment.
    pub fn scan(&self, markup: &str) -> Vec<String> {
        let scripts = self
            .script_tag
            .find_iter(markup)
            .filter_map(|tag| Some((tag.start(), self.attribute(&self.src, tag.as_str())?)));

        let styles = self
            .link_tag
            .find_iter(markup)
            .filter(|tag| self.stylesheet.is_match(tag.as_str()))
            .filter_map(|tag| Some((tag.start(), self.attribute(&self.href, tag.as_str())?)));

        let mut found: Vec<(usize, String)> = scripts.chain(styles).collect();
        found.sort_by_key(|(offset, _)| *offset);
        found
            .into_iter()
            .filter_map(|(_, value)| clean_reference(&value))
            .collect()
    }

    fn attribute(&self, pattern: &Regex, tag: &str) -> Option<String> {
        pattern
            .captures(tag)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    }
}

/// Strip query and fragment; `None` for references that are not local files.
fn clean_reference(raw: &str) -> Option<String> {
    let lower = raw.to_ascii_lowercase();
    let external = ["http:", "https:", "//", "data:", "blob:", "javascript:"];
    if raw.is_empty() || lower.contains("://") || external.iter().any(|p| lower.starts_with(p)) {
        return None;
    }

    let path = raw.split(['?', '#']).next().unwrap_or("");
    if path.is_empty() {
        return None;
    }
    Some(path.to_string())
}

/// Whether `reference`, declared in `markup_name`, names an artifact.
///
/// Matches the path resolved against the markup file's directory, the
/// root-relative path, or a path suffix in either direction.
fn resolves(names: &[&str], markup_name: &str, reference: &str) -> bool {
    let base_dir = markup_name.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    let relative = resolve_path(base_dir, reference);
    let rooted = resolve_path("", reference);

    names.iter().any(|name| {
        *name == relative
            || *name == rooted
            || name.ends_with(&format!("/{}", rooted))
            || rooted.ends_with(&format!("/{}", name))
    })
}

fn resolve_path(base_dir: &str, reference: &str) -> String {
    let mut segments: Vec<&str> = if reference.starts_with('/') {
        Vec::new()
    } else {
        base_dir.split('/').filter(|s| !s.is_empty()).collect()
    };

    for segment in reference.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    segments.join("/")
}
