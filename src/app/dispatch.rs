use crate::app::status::{render_injections, render_status};
use crate::cli::commands::{Cli, Commands};
use anyhow::{Context, Result};
use dynadub::{
    ApplyOutcome, Config, Dom, ElementDescriptor, EventLoop, HtmlDocument, InstructionEngine,
    RawInstruction,
};
use serde::Serialize;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn dispatch(cli: Cli, mut config: Config) -> Result<()> {
    match cli.command {
        Commands::Run {
            page,
            location,
            endpoint,
            dubbing,
            force_apply_all,
        } => {
            apply_injection_flags(&mut config, dubbing, force_apply_all);
            let doc = load_page(&page).await?.with_location(location);
            run(doc, &config, endpoint).await
        }
        Commands::Apply {
            page,
            instructions,
            dubbing,
            force_apply_all,
        } => {
            apply_injection_flags(&mut config, dubbing, force_apply_all);
            let mut doc = load_page(&page).await?;
            let source = tokio::fs::read_to_string(&instructions)
                .await
                .with_context(|| format!("Failed to read {}", instructions.display()))?;
            let instructions = parse_instructions(&source)?;
            let report = apply_offline(&mut doc, &config, &instructions);
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::Path {
            page,
            selector,
            location,
        } => {
            let doc = load_page(&page).await?.with_location(location);
            let descriptor = ElementDescriptor::describe_selector(
                &doc,
                &selector,
                config.tracking.max_text_chars,
            )?;
            println!("{}", descriptor.path);
            println!("{}", serde_json::to_string_pretty(&descriptor)?);
            Ok(())
        }
        Commands::Status => {
            println!("{}", render_status(&config));
            Ok(())
        }
    }
}

fn apply_injection_flags(config: &mut Config, dubbing: bool, force_apply_all: bool) {
    config.injection.dyna_dubbing |= dubbing;
    config.injection.force_apply_all |= force_apply_all;
}

async fn load_page(path: &Path) -> Result<HtmlDocument> {
    let source = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read page {}", path.display()))?;
    Ok(HtmlDocument::parse(&source))
}

/// Accepts either a JSON array or one JSON object per line.
fn parse_instructions(source: &str) -> Result<Vec<RawInstruction>> {
    if source.trim_start().starts_with('[') {
        return serde_json::from_str(source).context("Failed to parse instruction array");
    }

    source
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("Failed to parse instruction on line {}", index + 1))
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct Rejection {
    id: Option<String>,
    error: String,
}

#[derive(Debug, Serialize)]
struct ApplyReport {
    html: String,
    injections: Vec<dynadub::ReversionRecord>,
    rejected: Vec<Rejection>,
}

fn apply_offline(
    doc: &mut HtmlDocument,
    config: &Config,
    instructions: &[RawInstruction],
) -> ApplyReport {
    let mut engine = InstructionEngine::new(
        config.injection.dyna_dubbing,
        config.injection.force_apply_all,
    );
    let rejected = instructions
        .iter()
        .filter_map(|raw| match engine.apply(&mut *doc, raw) {
            ApplyOutcome::Applied { .. } => None,
            ApplyOutcome::Rejected(e) => Some(Rejection {
                id: raw.id.clone(),
                error: e.to_string(),
            }),
        })
        .collect();

    ApplyReport {
        html: doc.to_html(),
        injections: engine.injections(),
        rejected,
    }
}

async fn run(doc: HtmlDocument, config: &Config, endpoint: Option<String>) -> Result<()> {
    let (event_loop, handle) = EventLoop::new(doc, config)?;

    let driver = async move {
        handle
            .on_element_click(Box::new(|descriptor: &ElementDescriptor| {
                tracing::info!(path = %descriptor.path, "click echoed by server");
            }))
            .await?;
        handle
            .on_instruction(Box::new(|raw: &RawInstruction, outcome: &ApplyOutcome| match outcome {
                ApplyOutcome::Applied { id } => tracing::info!(instruction_id = %id, "applied"),
                ApplyOutcome::Rejected(e) => tracing::info!(
                    instruction_id = raw.id.as_deref().unwrap_or("?"),
                    reason = %e,
                    "not applied"
                ),
            }))
            .await?;
        handle.connect(endpoint).await?;

        let mut stdin = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;
        loop {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    signal.context("Failed to listen for Ctrl-C")?;
                    break;
                }
                line = stdin.next_line(), if stdin_open => match line? {
                    Some(selector) if !selector.trim().is_empty() => {
                        handle.click(selector.trim()).await?;
                    }
                    Some(_) => {}
                    None => stdin_open = false,
                },
            }
        }

        let html = handle.document_html().await?;
        let injections = handle.injections().await?;
        handle.shutdown();
        anyhow::Ok((html, injections))
    };

    // The document is not `Send`, so the loop runs on this task beside the driver.
    let (outcome, _client) = tokio::join!(driver, event_loop.run());
    let (html, injections) = outcome?;

    println!("{html}");
    eprintln!("{}", render_injections(&injections));
    Ok(())
}
