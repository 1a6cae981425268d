//! scopegen - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::{Path, PathBuf};

use scopegen::{
    cli::{Args, Commands},
    config::{Backend, Config},
    doctor::Doctor,
    embedding::{load_embedder, BertEmbedder},
    extract::DocumentFormat,
    generation::{build_generator, OllamaHttpGenerator},
    pipeline::{self, PipelineReport, ScopePipeline},
    prompt::PromptTemplate,
    telemetry::{TelemetryCollector, TelemetryDisplay},
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match &args.command {
        Commands::Run {
            file,
            query,
            template,
            backend,
            model,
        } => {
            let overrides = RunOverrides {
                template: *template,
                backend: *backend,
                model: model.clone(),
            };
            run_pipeline(&args, file, query.as_deref(), overrides).await?;
        }
        Commands::Sample { name, json_file } => {
            store_sample(&args, name, json_file)?;
        }
        Commands::Search { query, top_k } => {
            search_chunks(&args, query, *top_k)?;
        }
        Commands::Models => {
            list_models(&args).await?;
        }
        Commands::Config => {
            show_config(&args)?;
        }
        Commands::Doctor => {
            run_doctor(&args).await?;
        }
    }

    Ok(())
}

/// Per-run settings given on the command line
struct RunOverrides {
    template: Option<PromptTemplate>,
    backend: Option<Backend>,
    model: Option<String>,
}

fn load_config(args: &Args) -> Result<Config> {
    Config::load(args.config.as_deref()).context("Failed to load configuration")
}

fn resolve_config(args: &Args) -> Result<Config> {
    Config::resolve(args.config.as_deref()).context("Failed to load configuration")
}

async fn run_pipeline(
    args: &Args,
    file: &Path,
    query: Option<&str>,
    overrides: RunOverrides,
) -> Result<()> {
    // unsupported input fails before any model is loaded
    DocumentFormat::from_path(file)
        .with_context(|| format!("Cannot process {}", file.display()))?;

    let mut config = resolve_config(args)?;
    if let Some(template) = overrides.template {
        config.prompt.template = template;
    }
    if let Some(backend) = overrides.backend {
        config.generation.backend = backend;
    }
    if let Some(model) = overrides.model {
        config.generation.model = model;
    }
    config.validate().context("Invalid configuration")?;

    let verbosity = args.verbosity();
    let display = TelemetryDisplay::new(TelemetryCollector::new(), verbosity);

    let generator = build_generator(&config).context("Failed to set up generation backend")?;

    let spinner = display.spinner(&format!(
        "Loading embedding model {}...",
        config.embedding.model_id
    ));
    // a missing model degrades the embed and index stages, it does not abort
    let embedder = load_embedder(&config.embedding);
    spinner.finish_and_clear();

    let query = query
        .map(str::to_string)
        .unwrap_or_else(|| config.prompt.default_query.clone());

    let pipeline =
        ScopePipeline::new(config, embedder, generator).with_display(display);

    match pipeline.process(file, &query).await {
        Ok(report) => {
            pipeline.display().display_summary();
            print_report(&report, verbosity.show_progress());
            Ok(())
        }
        Err(e) => {
            pipeline.display().display_summary();
            Err(anyhow::Error::new(e).context(format!("Failed to process {}", file.display())))
        }
    }
}

fn print_report(report: &PipelineReport, show_progress: bool) {
    if !show_progress {
        // quiet mode prints only the written files
        for path in &report.outputs {
            println!("{}", path.display());
        }
        return;
    }

    println!("{}", "Scope of Work".bold());
    println!("─────────────────────────────────────");
    println!("Run:        {}", report.run_id);
    println!("Document:   {}", report.file_name);
    println!("Chunks:     {}", report.chunk_count);
    println!("Modules:    {}", report.modules);
    println!("Table rows: {}", report.table_rows);
    for path in &report.outputs {
        println!("  {} {}", "✓".green(), path.display());
    }

    if report.is_degraded() {
        println!(
            "\n{} completed with {} degraded stage(s)",
            "Warning:".yellow(),
            report.degraded.len()
        );
    }
    println!();
}

fn store_sample(args: &Args, name: &str, json_file: &Path) -> Result<()> {
    let config = load_config(args)?;
    let id = pipeline::store_sample(&config, name, json_file)
        .with_context(|| format!("Failed to store sample from {}", json_file.display()))?;

    if args.verbosity().show_progress() {
        println!(
            "{} stored sample '{}' (id {}) in {}",
            "✓".green(),
            name,
            id,
            config.database_path().display()
        );
    }
    Ok(())
}

fn search_chunks(args: &Args, query: &str, top_k: usize) -> Result<()> {
    let config = resolve_config(args)?;
    let embedder = BertEmbedder::new(&config.embedding)
        .with_context(|| format!("Failed to load embedding model {}", config.embedding.model_id))?;

    let hits = pipeline::search_index(&config, &embedder, query, top_k)
        .context("Search failed; run `scopegen run <FILE>` first to build the index")?;

    if hits.is_empty() {
        println!("No indexed chunks.");
        return Ok(());
    }
    for hit in hits {
        let preview: String = hit.text.chars().take(120).collect();
        println!(
            "{} {} {}",
            format!("#{}", hit.row).bold(),
            format!("({:.4})", hit.distance).dimmed(),
            preview.replace('\n', " ")
        );
    }
    Ok(())
}

async fn list_models(args: &Args) -> Result<()> {
    let config = resolve_config(args)?;
    let client = OllamaHttpGenerator::with_config(&config.ollama_url(), &config.generation)?;

    println!("\nChecking Ollama models at {}...\n", client.base_url());

    match client.list_models().await {
        Ok(models) => {
            if models.is_empty() {
                println!("No models installed.");
                println!("\nPull a model with:");
                println!("  ollama pull {}", config.generation.model);
            } else {
                println!("Available models:");
                for model in models {
                    let marker = if model.starts_with(&config.generation.model) {
                        " (configured)".green().to_string()
                    } else {
                        String::new()
                    };
                    println!("  • {}{}", model, marker);
                }
            }
            println!();
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("\nIs Ollama running? Start with: ollama serve");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn show_config(args: &Args) -> Result<()> {
    let config = resolve_config(args)?;

    let source = match &args.config {
        Some(path) => path.display().to_string(),
        None => match Config::default_path() {
            Some(path) if path.exists() => path.display().to_string(),
            _ => "built-in defaults".to_string(),
        },
    };

    let mut shown = config.clone();
    if shown.generation.api_key.is_some() {
        shown.generation.api_key = Some("********".to_string());
    }

    println!("\n{} ({})\n", "scopegen Configuration".bold(), source.dimmed());
    println!("{}", toml::to_string_pretty(&shown).context("Failed to render configuration")?);
    println!("Verbosity: {}", args.verbosity().as_str());
    if let Err(e) = config.validate() {
        println!("{} {}", "Invalid:".red(), e);
    }
    println!();

    Ok(())
}

async fn run_doctor(args: &Args) -> Result<()> {
    let config = resolve_config(args)?;
    let working_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let doctor = Doctor::new(config, working_dir);
    let checks = doctor.run_diagnostics().await;
    Doctor::display_results(&checks);

    std::process::exit(if Doctor::overall_status(&checks) { 0 } else { 1 });
}
