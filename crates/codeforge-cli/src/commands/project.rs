//! Project management commands.

use chrono::{DateTime, Local, Utc};

use codeforge_core::Error;
use codeforge_store::{ArtifactStore, FileSummary, Project};

use super::open_store;
use crate::{AppContext, ProjectAction};

/// Format a datetime for display.
fn format_time(dt: &DateTime<Utc>) -> String {
    let local: DateTime<Local> = dt.with_timezone(&Local);
    local.format("%Y-%m-%d %H:%M").to_string()
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn format_project(p: &Project) -> String {
    format!(
        "{} {} [{}] {}",
        short_id(&p.id),
        p.name,
        p.status,
        format_time(&p.updated_at)
    )
}

fn format_file(f: &FileSummary) -> String {
    let mut line = format!("{:>4} {:<40} {:<6} {:>8} B", f.id, f.filename, f.file_type, f.byte_length);
    if f.superseded {
        line.push_str(&format!("  (revision {}, superseded)", f.revision));
    }
    line
}

pub async fn handle(action: ProjectAction, ctx: &AppContext) -> anyhow::Result<()> {
    let store = open_store(ctx)?;

    match action {
        ProjectAction::Create { name, description } => {
            let project = store
                .create_project(&name, description.as_deref())
                .await
                .map_err(Error::from)?;
            println!("{}", project.id);
        }
        ProjectAction::List { limit } => {
            let projects = store.list_projects(limit).await.map_err(Error::from)?;
            if projects.is_empty() {
                println!("No projects yet. Create one with 'codeforge project create <name>'.");
            }
            for project in &projects {
                println!("{}", format_project(project));
            }
        }
        ProjectAction::Show { id } => {
            let project = store.get_project(&id).await.map_err(Error::from)?;
            println!("ID:          {}", project.id);
            println!("Name:        {}", project.name);
            if let Some(description) = &project.description {
                println!("Description: {}", description);
            }
            println!("Status:      {}", project.status);
            if let Some(reason) = &project.failure_reason {
                println!("Failure:     {}", reason);
            }
            if let Some(session) = &project.last_session_id {
                println!("Session:     {}", session);
            }
            println!("Created:     {}", format_time(&project.created_at));
            println!("Updated:     {}", format_time(&project.updated_at));
        }
        ProjectAction::Files { id, content } => {
            if content {
                let files = store.get_files(&id).await.map_err(Error::from)?;
                for file in files.iter().filter(|f| !f.superseded) {
                    println!("=== {} ===", file.file_path);
                    println!("{}", file.content);
                    println!();
                }
            } else {
                let files = store.list_files(&id).await.map_err(Error::from)?;
                if files.is_empty() {
                    println!("No generated files.");
                }
                for file in &files {
                    println!("{}", format_file(file));
                }
            }
        }
    }
    Ok(())
}
