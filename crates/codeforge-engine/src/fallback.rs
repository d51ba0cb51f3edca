//! Entry artifact fallback.
//!
//! Runs once after the stream ends and guarantees the set contains an
//! artifact whose basename is the canonical entry name.

use codeforge_core::artifact::basename;
use codeforge_core::{ArtifactDraft, ArtifactSet};
use tracing::{info, warn};

/// Which step of the fallback policy applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackOutcome {
    /// An entry artifact was produced by the stream
    Present { name: String },
    /// An entry-capable artifact was duplicated under the entry name
    Promoted { from: String, to: String },
    /// A listing page was generated
    Synthesized { name: String, listed: usize },
}

impl FallbackOutcome {
    /// Name of the entry artifact after the fallback ran.
    pub fn entry(&self) -> &str {
        match self {
            FallbackOutcome::Present { name } => name,
            FallbackOutcome::Promoted { to, .. } => to,
            FallbackOutcome::Synthesized { name, .. } => name,
        }
    }
}

/// Latest artifact whose basename matches `entry_name`, ignoring ASCII case.
pub fn find_entry<'a>(set: &'a ArtifactSet, entry_name: &str) -> Option<&'a ArtifactDraft> {
    set.latest()
        .find(|d| basename(&d.name).eq_ignore_ascii_case(entry_name))
}

/// Make sure an entry artifact exists. Never fails.
pub fn ensure_entry(set: &mut ArtifactSet, entry_name: &str) -> FallbackOutcome {
    if let Some(entry) = find_entry(set, entry_name) {
        return FallbackOutcome::Present {
            name: entry.name.clone(),
        };
    }

    let candidate = set
        .latest()
        .find(|d| d.kind().is_entry_capable())
        .map(|d| (d.name.clone(), d.content.clone()));

    if let Some((from, content)) = candidate {
        // Keep the copy beside its source so relative references still resolve
        let to = match from.rsplit_once('/') {
            Some((dir, _)) => format!("{}/{}", dir, entry_name),
            None => entry_name.to_string(),
        };
        info!(from = %from, to = %to, "No entry artifact; promoting first markup artifact");
        let revision = set.revisions_of(&to);
        set.push(ArtifactDraft::synthesized(to.clone(), content, revision));
        return FallbackOutcome::Promoted { from, to };
    }

    let names: Vec<String> = set.names().into_iter().map(str::to_string).collect();
    warn!(artifacts = names.len(), "No entry-capable artifact; synthesizing a listing page");

    let revision = set.revisions_of(entry_name);
    set.push(ArtifactDraft::synthesized(entry_name, listing_page(&names), revision));

    FallbackOutcome::Synthesized {
        name: entry_name.to_string(),
        listed: names.len(),
    }
}

/// Minimal HTML page linking every artifact name.
fn listing_page(names: &[String]) -> String {
    let mut page = String::from(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>Generated files</title>\n</head>\n<body>\n<h1>Generated files</h1>\n<ul>\n",
    );
    for name in names {
        let escaped = escape_html(name);
        page.push_str(&format!("<li><a href=\"{0}\">{0}</a></li>\n", escaped));
    }
    page.push_str("</ul>\n</body>\n</html>");
    page
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
