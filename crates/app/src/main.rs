use chrono::Utc;
use clap::{Parser, Subcommand};
use rag_engine_core::{
    load_folder_chunks, ChunkingConfig, Distance, InMemoryChunkSource, ModelProvider,
    PromptCatalog, ProviderConfig, ProviderFactory, ProviderLimits, QdrantStore, RagCoordinator,
    RetrievalOutcome,
};
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "rag-engine", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Project the collection is scoped to.
    #[arg(long, env = "RAG_PROJECT_ID", default_value = "default")]
    project: String,

    /// Generation backend: openai, cohere, or google-genai.
    #[arg(long, env = "RAG_GENERATION_BACKEND", default_value = "openai")]
    generation_backend: String,

    /// Embedding backend: openai, cohere, or google-genai.
    #[arg(long, env = "RAG_EMBEDDING_BACKEND", default_value = "openai")]
    embedding_backend: String,

    #[arg(long, env = "RAG_GENERATION_MODEL", default_value = "gpt-4o-mini")]
    generation_model: String,

    #[arg(long, env = "RAG_EMBEDDING_MODEL", default_value = "text-embedding-3-small")]
    embedding_model: String,

    /// Dimensionality the embedding model is expected to produce.
    #[arg(long, env = "RAG_EMBEDDING_SIZE", default_value = "1536")]
    embedding_size: usize,

    #[arg(long, env = "OPENAI_API_KEY")]
    openai_api_key: Option<String>,

    /// Override for OpenAI-compatible endpoints (Azure, vLLM, LM Studio).
    #[arg(long, env = "OPENAI_API_URL")]
    openai_api_url: Option<String>,

    #[arg(long, env = "COHERE_API_KEY")]
    cohere_api_key: Option<String>,

    #[arg(long, env = "GOOGLE_GENAI_API_KEY")]
    google_genai_api_key: Option<String>,

    /// Character budget applied to provider inputs before embedding.
    #[arg(long, env = "RAG_INPUT_MAX_CHARACTERS", default_value = "1024")]
    input_max_characters: usize,

    #[arg(long, env = "RAG_GENERATION_MAX_TOKENS", default_value = "1000")]
    generation_max_tokens: u32,

    #[arg(long, env = "RAG_GENERATION_TEMPERATURE", default_value = "0.1")]
    generation_temperature: f32,

    /// Qdrant base URL.
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Distance metric for new collections: cosine or dot.
    #[arg(long, env = "QDRANT_DISTANCE", default_value = "cosine")]
    distance: String,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk a folder of .txt/.md files, embed, and upsert into the project collection.
    Index {
        /// Folder scanned recursively for text files.
        #[arg(long)]
        folder: String,
        /// Drop and recreate the collection before indexing.
        #[arg(long, default_value_t = false)]
        reset: bool,
        /// Chunks pulled per page while indexing.
        #[arg(long, default_value = "50")]
        page_size: usize,
    },
    /// Similarity-search the project collection.
    Search {
        #[arg(long)]
        query: String,
        #[arg(long, default_value = "5")]
        limit: usize,
    },
    /// Retrieve context and generate a grounded answer.
    Ask {
        #[arg(long)]
        query: String,
        #[arg(long, default_value = "5")]
        limit: usize,
        /// Also print the full prompt and chat history used.
        #[arg(long, default_value_t = false)]
        show_prompt: bool,
    },
    /// Show point count and configuration of the project collection.
    Info,
    /// Drop and recreate the project collection.
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let factory = ProviderFactory::new(ProviderConfig {
        openai_api_key: cli.openai_api_key.clone(),
        openai_api_url: cli.openai_api_url.clone(),
        cohere_api_key: cli.cohere_api_key.clone(),
        cohere_api_url: None,
        google_genai_api_key: cli.google_genai_api_key.clone(),
        google_genai_api_url: None,
        limits: ProviderLimits {
            input_max_characters: cli.input_max_characters,
            generation_max_output_tokens: cli.generation_max_tokens,
            generation_temperature: cli.generation_temperature,
        },
    });

    let mut generation = factory
        .create(&cli.generation_backend)
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;
    generation.set_generation_model(&cli.generation_model);

    let mut embedding = factory
        .create(&cli.embedding_backend)
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;
    embedding.set_embedding_model(&cli.embedding_model, cli.embedding_size);

    let distance: Distance = cli
        .distance
        .parse()
        .map_err(|error: rag_engine_core::StoreError| anyhow::anyhow!(error.to_string()))?;
    let store = QdrantStore::new(&cli.qdrant_url, distance);

    let chunk_source = InMemoryChunkSource::new();
    if let Command::Index { folder, .. } = &cli.command {
        let report = load_folder_chunks(
            Path::new(folder),
            &cli.project,
            ChunkingConfig::default(),
        )
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;

        if !report.skipped_files.is_empty() {
            warn!(
                "skipped_files={} for folder={}",
                report.skipped_files.len(),
                folder
            );
            for skipped in &report.skipped_files {
                warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped file");
            }
        }
        chunk_source.load(&cli.project, report.chunks);
    }

    let coordinator = RagCoordinator::new(
        chunk_source,
        store,
        generation,
        embedding,
        Box::new(PromptCatalog::builtin()),
    );

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "rag-engine boot"
    );

    match cli.command {
        Command::Index {
            folder,
            reset,
            page_size,
        } => {
            info!(folder = %folder, project = %cli.project, reset, "indexing folder");
            let outcome = coordinator
                .index(&cli.project, reset, page_size)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!(
                "{} chunks indexed across {} pages at {}",
                outcome.inserted,
                outcome.pages,
                outcome.finished_at.to_rfc3339()
            );
        }
        Command::Search { query, limit } => {
            let outcome = coordinator
                .search(&cli.project, &query, limit)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            match outcome {
                RetrievalOutcome::NoResults => println!("no results"),
                RetrievalOutcome::Hits(hits) => {
                    for (index, hit) in hits.iter().enumerate() {
                        println!("[{}] score={:.4}", index + 1, hit.score);
                        println!("  text: {}", hit.text);
                        if !hit.metadata.is_null() {
                            println!("  metadata: {}", hit.metadata);
                        }
                    }
                }
            }
        }
        Command::Ask {
            query,
            limit,
            show_prompt,
        } => {
            let bundle = coordinator
                .answer(&cli.project, &query, limit)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            match &bundle.answer {
                None => println!("no relevant context found for this question"),
                Some(answer) => println!("{answer}"),
            }

            if show_prompt {
                if let Some(prompt) = &bundle.prompt {
                    println!("\n--- prompt ---\n{prompt}");
                }
                for message in &bundle.chat_history {
                    println!("--- history[{:?}] ---\n{}", message.role, message.content);
                }
            }
        }
        Command::Info => {
            let info = coordinator
                .collection_info(&cli.project)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!("status: {}", info.status);
            println!("points: {}", info.points_count);
            println!("vector size: {}", info.vectors_size);
            println!("distance: {}", info.distance);
        }
        Command::Reset => {
            let existed = coordinator
                .reset_collection(&cli.project)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            println!(
                "collection reset ({})",
                if existed { "existed" } else { "was absent" }
            );
        }
    }

    Ok(())
}
