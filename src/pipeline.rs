//! End-to-end scope generation
//!
//! extract → chunk → embed → relational store → vector store → prompt →
//! generate → parse → JSON/CSV/XLSX export, each stage awaited in turn.
//!
//! Only an unsupported or unreadable input aborts a run (plus relational
//! failures under the strict storage policy). Every other stage failure is
//! reported as a degraded stage and the run continues with an empty result
//! for that stage.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::chunking::{Chunk, TextSplitter};
use crate::config::{Config, StoragePolicy};
use crate::embedding::Embedder;
use crate::errors::{Result, ScopeError};
use crate::export;
use crate::extract::{self, Document};
use crate::generation::Generator;
use crate::parser;
use crate::prompt::PromptBuilder;
use crate::scope::ScopeOfWork;
use crate::store::{ChunkStore, FlatL2Index, RetrievedChunk, VectorStore};
use crate::telemetry::{self, Stage, StageTimer, TelemetryDisplay};

/// Outcome of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub file_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub chunk_count: usize,
    pub vectors_stored: usize,
    pub rows_stored: usize,
    pub modules: usize,
    pub table_rows: usize,
    pub outputs: Vec<PathBuf>,
    /// Stages that failed without aborting the run
    pub degraded: Vec<String>,
    /// Model reply as received, kept for diagnosing parse failures
    pub raw_response: Option<String>,
    pub scope: ScopeOfWork,
}

impl PipelineReport {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

/// Owns the collaborators for a run; nothing here is global
pub struct ScopePipeline {
    config: Config,
    embedder: Box<dyn Embedder>,
    generator: Box<dyn Generator>,
    display: TelemetryDisplay,
}

impl ScopePipeline {
    pub fn new(config: Config, embedder: Box<dyn Embedder>, generator: Box<dyn Generator>) -> Self {
        Self {
            config,
            embedder,
            generator,
            display: telemetry::silent(),
        }
    }

    /// Report progress through `display` instead of running silently
    pub fn with_display(mut self, display: TelemetryDisplay) -> Self {
        self.display = display;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn display(&self) -> &TelemetryDisplay {
        &self.display
    }

    /// Run every stage for the document at `path`
    pub async fn process(&self, path: &Path, query: &str) -> Result<PipelineReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let degraded_before = self.display.collector().degraded_stages().len();

        self.display
            .detail(Stage::Extract, &format!("run {} for {}", run_id, path.display()));

        let document = self.extract(path)?;
        let chunks = self.chunk(&document)?;
        let vectors = self.embed(&chunks);
        let rows_stored = self.store_rows(&document, &chunks)?;
        let vectors_stored = self.store_vectors(&chunks, vectors);

        let prompt = self.build_prompt(query, &chunks);
        let raw = self.generate(&prompt).await;
        let value = self.parse(raw.as_deref());

        let scope = ScopeOfWork::from_value(&value);
        let (outputs, table_rows) = self.export(&value, &scope);

        let degraded = self
            .display
            .collector()
            .degraded_stages()
            .into_iter()
            .skip(degraded_before)
            .map(|(stage, error)| format!("{}: {}", stage, error))
            .collect();

        Ok(PipelineReport {
            run_id,
            file_name: document.file_name,
            started_at,
            finished_at: Utc::now(),
            chunk_count: chunks.len(),
            vectors_stored,
            rows_stored,
            modules: scope.module_count(),
            table_rows,
            outputs,
            degraded,
            raw_response: raw,
            scope,
        })
    }

    fn extract(&self, path: &Path) -> Result<Document> {
        let timer = StageTimer::start(&self.display, Stage::Extract);
        let document = extract::extract_text(path)?;

        if document.is_blank() {
            timer.degrade(format!("no text extracted from {}", document.file_name));
        } else {
            timer.complete(format!(
                "{} ({}, {} chars)",
                document.file_name,
                document.format.as_str(),
                document.char_count()
            ));
        }
        Ok(document)
    }

    fn chunk(&self, document: &Document) -> Result<Vec<Chunk>> {
        let timer = StageTimer::start(&self.display, Stage::Chunk);
        let splitter = TextSplitter::from_config(&self.config.chunking)?;
        let chunks = splitter.chunk_document(document);
        timer.complete(format!(
            "{} chunks (size {}, overlap {})",
            chunks.len(),
            splitter.chunk_size(),
            splitter.chunk_overlap()
        ));
        Ok(chunks)
    }

    fn embed(&self, chunks: &[Chunk]) -> Option<Vec<Vec<f32>>> {
        let timer = StageTimer::start(&self.display, Stage::Embed);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();

        match self.embedder.embed_batch(&texts) {
            Ok(vectors) if vectors.len() == chunks.len() => {
                timer.complete(format!(
                    "{} vectors ({} dims, {})",
                    vectors.len(),
                    self.embedder.dimension(),
                    self.embedder.model_id()
                ));
                Some(vectors)
            }
            Ok(vectors) => {
                timer.degrade(ScopeError::Embedding(format!(
                    "{} vectors for {} chunks",
                    vectors.len(),
                    chunks.len()
                )));
                None
            }
            Err(e) => {
                timer.degrade(e);
                None
            }
        }
    }

    fn store_rows(&self, document: &Document, chunks: &[Chunk]) -> Result<usize> {
        let timer = StageTimer::start(&self.display, Stage::Store);
        if !self.config.storage.enabled {
            timer.complete("relational storage disabled");
            return Ok(0);
        }

        let db_path = self.config.database_path();
        let stored = ChunkStore::open(&db_path)
            .and_then(|mut store| store.store_chunks(&document.file_name, chunks));

        match stored {
            Ok(rows) => {
                timer.complete(format!("{} rows into {}", rows, db_path.display()));
                Ok(rows)
            }
            Err(e) if self.config.storage.policy == StoragePolicy::Strict => {
                self.display.warn(Stage::Store, &e.to_string());
                Err(e)
            }
            Err(e) => {
                timer.degrade(e);
                Ok(0)
            }
        }
    }

    fn store_vectors(&self, chunks: &[Chunk], vectors: Option<Vec<Vec<f32>>>) -> usize {
        let timer = StageTimer::start(&self.display, Stage::Index);
        let Some(vectors) = vectors else {
            timer.degrade("no embeddings to index");
            return 0;
        };

        let dimension = vectors
            .first()
            .map(Vec::len)
            .unwrap_or_else(|| self.embedder.dimension());
        let mut index = FlatL2Index::new(dimension);
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let store = VectorStore::from_config(&self.config);

        match index.add(&vectors).and_then(|_| store.save(&index, &texts)) {
            Ok(()) => {
                timer.complete(format!(
                    "{} vectors into {}",
                    index.len(),
                    store.index_path().display()
                ));
                index.len()
            }
            Err(e) => {
                timer.degrade(e);
                0
            }
        }
    }

    fn build_prompt(&self, query: &str, chunks: &[Chunk]) -> String {
        let timer = StageTimer::start(&self.display, Stage::Prompt);
        let builder = PromptBuilder::from_config(&self.config.prompt);
        let prompt = builder.build(query, chunks);
        timer.complete(format!(
            "{} template, {} chars",
            builder.template(),
            prompt.chars().count()
        ));
        self.display.trace(Stage::Prompt, "prompt", &prompt);
        prompt
    }

    async fn generate(&self, prompt: &str) -> Option<String> {
        let timer = StageTimer::start(&self.display, Stage::Generate);
        let spinner = self
            .display
            .spinner(&format!("Waiting for {}...", self.generator.name()));

        let result = self.generator.generate(prompt).await;
        spinner.finish_and_clear();

        match result {
            Ok(raw) => {
                timer.complete(format!(
                    "{} returned {} chars",
                    self.generator.name(),
                    raw.chars().count()
                ));
                self.display.trace(Stage::Generate, "raw output", &raw);
                Some(raw)
            }
            Err(e) => {
                timer.degrade(e);
                None
            }
        }
    }

    fn parse(&self, raw: Option<&str>) -> Value {
        let timer = StageTimer::start(&self.display, Stage::Parse);
        let Some(raw) = raw else {
            timer.degrade("no model output to parse");
            return parser::empty_scope();
        };

        match parser::try_parse_response(raw) {
            Ok(value) => {
                let modules = value
                    .get(parser::SCOPE_KEY)
                    .and_then(Value::as_array)
                    .map(Vec::len)
                    .unwrap_or(0);
                timer.complete(format!("{} modules", modules));
                value
            }
            Err(e) => {
                timer.degrade(e);
                self.display.raw_output(raw);
                parser::empty_scope()
            }
        }
    }

    /// Write the JSON document and the tables; returns written paths and row count
    fn export(&self, value: &Value, scope: &ScopeOfWork) -> (Vec<PathBuf>, usize) {
        let timer = StageTimer::start(&self.display, Stage::Export);
        let paths = &self.config.paths;
        let json_path = PathBuf::from(&paths.output_json);
        let csv_path = PathBuf::from(&paths.output_csv);
        let xlsx_path = PathBuf::from(&paths.output_xlsx);

        let mut outputs = Vec::new();
        let mut failures = Vec::new();

        match write_json(value, &json_path) {
            Ok(()) => outputs.push(json_path),
            Err(e) => failures.push(e.to_string()),
        }

        let tables = export::tables_for(scope);
        let table_rows = tables.first().map(export::ScopeTable::len).unwrap_or(0);

        if let Some(main) = tables.first() {
            match export::write_csv(main, &csv_path) {
                Ok(()) => outputs.push(csv_path),
                Err(e) => failures.push(e.to_string()),
            }
        }
        match export::write_xlsx(&tables, &xlsx_path) {
            Ok(()) => outputs.push(xlsx_path),
            Err(e) => failures.push(e.to_string()),
        }

        if failures.is_empty() {
            timer.complete(format!("{} rows, {} files", table_rows, outputs.len()));
            for path in &outputs {
                self.display
                    .detail(Stage::Export, &format!("wrote {}", path.display()));
            }
        } else {
            timer.degrade(failures.join("; "));
        }

        (outputs, table_rows)
    }
}

fn write_json(value: &Value, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)
        .map_err(|e| ScopeError::Export(format!("Failed to write {}: {}", path.display(), e)))
}

/// Validate a reference scope JSON file and store it in the relational sink
pub fn store_sample(config: &Config, example_name: &str, json_path: &Path) -> Result<i64> {
    let contents = std::fs::read_to_string(json_path)?;
    let value = parser::coerce_scope(serde_json::from_str(&contents)?);
    let store = ChunkStore::open(&config.database_path())?;
    store.store_sample_scope(example_name, &serde_json::to_string(&value)?)
}

/// Nearest stored chunks to `query` in the index written by the last run
pub fn search_index(
    config: &Config,
    embedder: &dyn Embedder,
    query: &str,
    top_k: usize,
) -> Result<Vec<RetrievedChunk>> {
    let vector = embedder.embed(query)?;
    VectorStore::from_config(config).query(&vector, top_k)
}
