//! Production package export.
//!
//! Writes the numbered text files a crew works from, a README listing them
//! and the full final state as `state.json`. Files are only written for the
//! parts the run actually produced.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::agents::value_text;
use crate::error::ExportError;
use crate::extraction::markers::truncate_chars;
use crate::state::PipelineState;

/// Research characters copied into the citations file.
pub const RESEARCH_EXCERPT_CHARS: usize = 5000;

/// Width of the `=` rule under each file title.
const RULE_WIDTH: usize = 70;

pub const SCRIPT_FILE: &str = "01_SCRIPT.txt";
pub const VISUAL_FILE: &str = "02_VISUAL_ARCHITECTURE.txt";
pub const PRODUCTION_NOTES_FILE: &str = "03_PRODUCTION_NOTES.txt";
pub const RESEARCH_FILE: &str = "04_RESEARCH_CITATIONS.txt";
pub const README_FILE: &str = "README.md";
pub const STATE_FILE: &str = "state.json";

/// What [`export_package`] wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportedPackage {
    pub dir: PathBuf,
    /// File names in write order, README and state last.
    pub files: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl ExportedPackage {
    pub fn contains(&self, file: &str) -> bool {
        self.files.iter().any(|f| f == file)
    }

    pub fn paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.files.iter().map(|f| self.dir.join(f))
    }
}

/// One text file: title, optional subtitle, rule, body.
fn render_text_file(title: &str, subtitle: Option<&str>, body: &str) -> String {
    let mut out = String::with_capacity(body.len() + 128);
    out.push_str(title);
    out.push('\n');
    if let Some(subtitle) = subtitle {
        out.push_str(subtitle);
        out.push('\n');
    }
    out.push_str(&"=".repeat(RULE_WIDTH));
    out.push_str("\n\n");
    out.push_str(body);
    out
}

/// Research text for the citations file: the report if there is one.
fn research_text(state: &PipelineState) -> Option<String> {
    if let Some(report) = state.get_str("research_report").filter(|r| !r.trim().is_empty()) {
        return Some(report.to_string());
    }
    state.get("research_findings").map(value_text)
}

fn non_empty<'a>(state: &'a PipelineState, key: &str) -> Option<&'a str> {
    state.get_str(key).filter(|text| !text.trim().is_empty())
}

fn render_readme(state: &PipelineState, files: &[String], generated_at: DateTime<Utc>) -> String {
    let topic = state.text_or("topic", "Documentary");
    let duration = state
        .get("duration_minutes")
        .map(value_text)
        .unwrap_or_else(|| "Unknown".to_string());

    let mut readme = format!(
        "# Documentary Production Package\n\n## {}\n\n**Duration:** {} minutes\n\n**Generated:** {}\n\n",
        topic,
        duration,
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(ready) = state.get_bool("production_ready") {
        readme.push_str(&format!(
            "**Production ready:** {} (confidence {:.2})\n\n",
            if ready { "yes" } else { "no" },
            state.confidence("synthesis")
        ));
    }
    readme.push_str("**Files Included:**\n\n");
    for file in files {
        readme.push_str(&format!("- `{}`\n", file));
    }
    readme
}

fn write_file(dir: &Path, name: &str, contents: &str, files: &mut Vec<String>) -> Result<(), ExportError> {
    std::fs::write(dir.join(name), contents)?;
    files.push(name.to_string());
    Ok(())
}

/// Writes the production package for `state` into `dir`.
///
/// # Errors
///
/// `NotADirectory` if `dir` exists as a file, otherwise IO and JSON errors.
pub fn export_package(state: &PipelineState, dir: impl AsRef<Path>) -> Result<ExportedPackage, ExportError> {
    let dir = dir.as_ref();
    if dir.exists() && !dir.is_dir() {
        return Err(ExportError::NotADirectory(dir.display().to_string()));
    }
    std::fs::create_dir_all(dir)?;

    let generated_at = Utc::now();
    let mut files = Vec::new();

    if let Some(script) = non_empty(state, "script_text") {
        let subtitle = format!("Topic: {}", state.text_or("topic", "Unknown"));
        let contents = render_text_file("DOCUMENTARY SCRIPT", Some(&subtitle), script);
        write_file(dir, SCRIPT_FILE, &contents, &mut files)?;
    }

    if let Some(visual) = non_empty(state, "visual_architecture") {
        let contents = render_text_file("VISUAL SCENE ARCHITECTURE", None, visual);
        write_file(dir, VISUAL_FILE, &contents, &mut files)?;
    }

    if let Some(notes) = non_empty(state, "production_notes_text") {
        let contents = render_text_file("PRODUCTION NOTES", None, notes);
        write_file(dir, PRODUCTION_NOTES_FILE, &contents, &mut files)?;
    }

    if let Some(research) = research_text(state) {
        let excerpt = truncate_chars(&research, RESEARCH_EXCERPT_CHARS);
        let contents = render_text_file("RESEARCH CITATIONS", None, excerpt);
        write_file(dir, RESEARCH_FILE, &contents, &mut files)?;
    }

    let readme = render_readme(state, &files, generated_at);
    write_file(dir, README_FILE, &readme, &mut files)?;

    let json = state.to_json_pretty()?;
    write_file(dir, STATE_FILE, &json, &mut files)?;

    tracing::info!(dir = %dir.display(), files = files.len(), "Exported production package");
    Ok(ExportedPackage {
        dir: dir.to_path_buf(),
        files,
        generated_at,
    })
}
