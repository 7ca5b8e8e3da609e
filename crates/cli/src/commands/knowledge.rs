//! `cbtsim knowledge` — Knowledge base management commands.

use cbtsim_config::AppConfig;
use cbtsim_core::knowledge::KnowledgeStore;
use cbtsim_core::retrieval::Retriever;
use cbtsim_knowledge::dataset::load_jsonl;
use cbtsim_knowledge::{Embedder, IngestReport, Ingestor, StoreRetriever, TextChunker, open_store, seed_entries};
use std::path::Path;
use std::sync::Arc;

use super::load_config;

fn store(config: &AppConfig) -> Result<Arc<dyn KnowledgeStore>, Box<dyn std::error::Error>> {
    match config.retrieval.backend.as_str() {
        "none" => Err("Retrieval backend is 'none'; set [retrieval] backend = \"file\" to use a knowledge base".into()),
        "memory" => {
            println!("⚠️  Backend 'memory' does not persist; entries vanish when this command exits.");
            Ok(open_store("memory", config.retrieval.knowledge_path()))
        }
        backend => Ok(open_store(backend, config.retrieval.knowledge_path())),
    }
}

fn embedder(config: &AppConfig) -> Option<Embedder> {
    if !config.retrieval.use_embeddings {
        return None;
    }
    let provider = cbtsim_providers::build_from_config(config).default()?;
    Some(Embedder::new(provider, &config.retrieval.embedding_model))
}

fn ingestor(config: &AppConfig, store: Arc<dyn KnowledgeStore>) -> Ingestor {
    let chunker = TextChunker::new(config.retrieval.chunk_size, config.retrieval.chunk_overlap);
    let ingestor = Ingestor::new(store, chunker);
    match embedder(config) {
        Some(embedder) => ingestor.with_embedder(embedder),
        None => ingestor,
    }
}

fn print_report(report: IngestReport) {
    println!("   Documents: {}", report.documents);
    println!("   Chunks:    {}", report.chunks);
    if report.embedded > 0 {
        println!("   Embedded:  {}", report.embedded);
    }
}

pub async fn seed() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let store = store(&config)?;

    println!("🌱 Seeding CBT knowledge base");
    let report = ingestor(&config, store).ingest(seed_entries()).await?;
    print_report(report);
    println!("✅ Done. Stored at {}", config.retrieval.knowledge_path().display());

    Ok(())
}

pub async fn load(file: &Path, limit: Option<usize>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let store = store(&config)?;

    println!("📥 Loading {}", file.display());
    let entries = load_jsonl(file, limit).await?;
    if entries.is_empty() {
        println!("   No usable rows found (expected Context/Response fields).");
        return Ok(());
    }

    let report = ingestor(&config, store).ingest(entries).await?;
    print_report(report);
    println!("✅ Done.");

    Ok(())
}

pub async fn search(query: &str, k: usize) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let store = store(&config)?;

    let mut retriever = StoreRetriever::new(store).with_min_score(config.retrieval.min_score);
    if let Some(embedder) = embedder(&config) {
        retriever = retriever.with_embedder(embedder);
    }

    println!("🔍 Searching knowledge for: \"{query}\"");
    println!();

    let snippets = retriever.retrieve(query, k).await?;
    if snippets.is_empty() {
        println!("   No matches. Run `cbtsim knowledge seed` to load the built-in material.");
        return Ok(());
    }

    for (i, snippet) in snippets.iter().enumerate() {
        let label = if snippet.is_conversation_exemplar() {
            "exemplar"
        } else {
            "knowledge"
        };
        let preview: String = snippet.text.chars().take(100).collect();
        println!(
            "  {:>2}. [{label}, score: {:.2}] {}",
            i + 1,
            snippet.score,
            preview.replace('\n', " ")
        );
    }

    Ok(())
}

pub async fn stats() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;

    println!("📚 Knowledge Base");
    println!("=================");
    println!("  Enabled:    {}", config.retrieval.enabled);
    println!("  Backend:    {}", config.retrieval.backend);
    println!("  Top-k:      {}", config.retrieval.top_k);
    println!("  Embeddings: {}", if config.retrieval.use_embeddings {
        config.retrieval.embedding_model.as_str()
    } else {
        "off (keyword search)"
    });

    if config.retrieval.backend == "file" {
        let path = config.retrieval.knowledge_path();
        if path.exists() {
            let size_kb = std::fs::metadata(&path)?.len() as f64 / 1024.0;
            println!("  File:       {} ({:.1} KB)", path.display(), size_kb);
        } else {
            println!("  File:       (not created yet)");
        }
        let count = store(&config)?.count().await?;
        println!("  Entries:    {count}");
    }

    Ok(())
}

pub async fn clear(confirm: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !confirm {
        println!("⚠️  This will delete ALL knowledge entries permanently.");
        println!("   Run with --confirm to proceed:");
        println!("   cbtsim knowledge clear --confirm");
        return Ok(());
    }

    let config = load_config()?;
    store(&config)?.clear().await?;
    println!("✅ Knowledge base cleared.");

    Ok(())
}
