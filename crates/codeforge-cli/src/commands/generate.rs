//! Generation and transcript replay.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use codeforge_core::Error;
use codeforge_engine::{GenerationContext, GenerationEngine, RequirementDocument};
use codeforge_providers::{AnthropicProvider, CompletionRequest, Provider, ScriptedProvider};
use codeforge_store::{ArtifactStore, SqliteArtifactStore};

use super::open_store;
use crate::output::EventPrinter;
use crate::{AppContext, GenerateArgs, OutputArgs, ReplayArgs};

pub async fn run(args: GenerateArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let context = load_context(&args.documents, args.context.as_deref()).await?;

    let mut generation = ctx.config.generation.clone();
    if let Some(model) = args.model {
        generation.model = model;
    }

    let provider = AnthropicProvider::from_config(ctx.config.providers.anthropic.as_ref())
        .ok_or_else(|| Error::provider_not_configured(&generation.provider))?
        .with_default_model(generation.model.clone());

    let store = open_store(ctx)?;
    let name = args
        .name
        .unwrap_or_else(|| default_project_name(&args.documents));
    let project_id = resolve_project(&store, args.project, &name).await?;

    info!(
        project_id = %project_id,
        documents = context.documents.len(),
        model = %generation.model,
        "Sending requirements for code generation"
    );

    let request = context.to_request(&generation);
    run_session(ctx, store, project_id, Arc::new(provider), request, args.output).await
}

pub async fn replay(args: ReplayArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let transcript = tokio::fs::read_to_string(&args.transcript)
        .await
        .with_context(|| format!("reading transcript {}", args.transcript.display()))?;

    if args.chunk_size == 0 {
        return Err(Error::InvalidInput("--chunk-size must be greater than 0".to_string()).into());
    }

    let provider = ScriptedProvider::from_transcript(&transcript, args.chunk_size);
    info!(chunks = provider.chunks().len(), "Replaying transcript");

    let store = open_store(ctx)?;
    let name = format!("replay of {}", file_name(&args.transcript));
    let project_id = resolve_project(&store, args.project, &name).await?;

    let request = GenerationContext::default().to_request(&ctx.config.generation);
    run_session(ctx, store, project_id, Arc::new(provider), request, args.output).await
}

/// Run one engine session and print its events as they arrive.
async fn run_session(
    ctx: &AppContext,
    store: Arc<SqliteArtifactStore>,
    project_id: String,
    provider: Arc<dyn Provider>,
    request: CompletionRequest,
    output: OutputArgs,
) -> anyhow::Result<()> {
    let engine = GenerationEngine::new(store, ctx.config.extraction.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; validating what was received so far");
            interrupt.cancel();
        }
    });

    let session = tokio::spawn(async move {
        engine
            .generate(&project_id, provider.as_ref(), request, Arc::new(tx), cancel)
            .await
    });

    let mut printer = EventPrinter::new(output.sse);
    while let Some(event) = rx.recv().await {
        printer.print(&event)?;
    }

    let outcome = session.await??;
    printer.finish();

    if let Some(report) = &outcome.report {
        for repair in &report.repairs {
            info!("Repaired: {}", repair);
        }
    }

    match outcome.failure {
        Some(failure) => anyhow::bail!("session {} failed ({:?})", outcome.session_id, failure.category()),
        None => Ok(()),
    }
}

/// Use the given project, or create one called `name`.
async fn resolve_project(
    store: &SqliteArtifactStore,
    project: Option<String>,
    name: &str,
) -> anyhow::Result<String> {
    match project {
        Some(id) => Ok(store.get_project(&id).await.map_err(Error::from)?.id),
        None => {
            let project = store.create_project(name, None).await.map_err(Error::from)?;
            info!(project_id = %project.id, name, "Created project");
            Ok(project.id)
        }
    }
}

/// Read requirement documents and the optional JSON context file.
async fn load_context(documents: &[PathBuf], extra: Option<&Path>) -> anyhow::Result<GenerationContext> {
    let mut context = match extra {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading context {}", path.display()))?;
            serde_json::from_str::<GenerationContext>(&text).map_err(Error::from)?
        }
        None => GenerationContext::default(),
    };

    for path in documents {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading requirements {}", path.display()))?;
        context
            .documents
            .push(RequirementDocument::new(file_name(path), content));
    }

    if context.documents.is_empty() {
        return Err(Error::InvalidInput("at least one requirements document is needed".to_string()).into());
    }

    Ok(context)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn default_project_name(documents: &[PathBuf]) -> String {
    documents
        .first()
        .and_then(|p| p.file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "untitled".to_string())
}
