//! Command implementations for the promo daemon.
//!
//! [`build_app`] is the composition root: every provider, repository and
//! service is constructed here exactly once and handed down explicitly.

use std::fs;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use promo_embeddings::{EmbeddingGateway, EmbeddingProvider, OpenAiEmbedder, OpenAiEmbedderConfig};
use promo_extractor::{
    ApiCompletionClient, ApiCompletionConfig, CompletionProvider, PromotionExtractor,
    TasteLabelEnhancer,
};
use promo_service::{
    GroupService, HealthService, HealthStatus, MessagePipeline, MessageSender,
    NotificationDispatcher, PipelineOutcome, TasteService, UserMatcher, UserService,
    WebhookMessageSender, WebhookSenderConfig,
};
use promo_storage::Storage;
use promo_types::{Attachment, InboundMessage, Settings};
use promo_vector::{QdrantConfig, QdrantStore, TasteVectorIndex, VectorStore};

use crate::cli::{GroupCommands, TasteCommands, UserCommands};

const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Load configuration and apply CLI overrides (highest precedence).
pub fn load_settings(
    config_path: Option<&str>,
    db_path_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;

    if let Some(db_path) = db_path_override {
        settings.db_path = db_path.to_string();
    }
    if let Some(log_level) = log_level_override {
        settings.log_level = log_level.to_string();
    }
    Ok(settings)
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `log_level`.
pub fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// External collaborators, one trait object each.
pub struct Providers {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub completion: Arc<dyn CompletionProvider>,
    pub vectors: Arc<dyn VectorStore>,
    pub sender: Arc<dyn MessageSender>,
}

impl Providers {
    /// HTTP clients for the configured endpoints.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let llm = &settings.llm;

        let mut embed_config = OpenAiEmbedderConfig::new(&llm.base_url, &llm.embedding_model);
        embed_config.timeout = Duration::from_secs(llm.timeout_secs);
        embed_config.max_retries = llm.max_retries;
        if let Some(key) = &llm.api_key {
            embed_config = embed_config.with_api_key(key);
        }

        let mut completion_config = ApiCompletionConfig::new(&llm.base_url);
        completion_config.timeout = Duration::from_secs(llm.timeout_secs);
        completion_config.max_retries = llm.max_retries;
        if let Some(key) = &llm.api_key {
            completion_config = completion_config.with_api_key(key);
        }

        let mut qdrant_config = QdrantConfig::new(&settings.vector.url, &settings.vector.collection);
        qdrant_config.timeout = Duration::from_secs(settings.vector.timeout_secs);
        if let Some(key) = &settings.vector.api_key {
            qdrant_config = qdrant_config.with_api_key(key);
        }

        let mut sender_config = WebhookSenderConfig::new(&settings.messaging.gateway_url);
        sender_config.timeout = Duration::from_secs(settings.messaging.send_timeout_secs);
        if let Some(key) = &settings.messaging.api_key {
            sender_config = sender_config.with_api_key(key);
        }

        Ok(Self {
            embedder: Arc::new(
                OpenAiEmbedder::new(embed_config).context("Failed to build embedding client")?,
            ),
            completion: Arc::new(
                ApiCompletionClient::new(completion_config)
                    .context("Failed to build completion client")?,
            ),
            vectors: Arc::new(
                QdrantStore::new(qdrant_config).context("Failed to build vector store client")?,
            ),
            sender: Arc::new(
                WebhookMessageSender::new(sender_config)
                    .context("Failed to build messaging client")?,
            ),
        })
    }
}

/// Whether boot verifies the vector collection layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionCheck {
    /// Create the collection if missing; fail on a layout mismatch
    Required,
    /// Skip the check, so diagnostics still run when the store is down
    Skip,
}

/// Fully wired application.
pub struct App {
    pub pipeline: Arc<MessagePipeline>,
    pub tastes: TasteService,
    pub users: UserService,
    pub groups: GroupService,
    pub health: HealthService,
}

/// Open storage, connect providers and wire every service.
pub async fn build_app(settings: &Settings, check: CollectionCheck) -> Result<App> {
    let db_path = settings.expanded_db_path();
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    info!(path = ?db_path, "Opening storage");
    let storage = Arc::new(Storage::open(&db_path).context("Failed to open storage")?);

    let providers = Providers::from_settings(settings)?;
    assemble(settings, storage, providers, check).await
}

/// Wire services over already-built providers.
///
/// A missing threshold stops the boot, and so does a collection with the
/// wrong layout unless the check is skipped.
pub async fn assemble(
    settings: &Settings,
    storage: Arc<Storage>,
    providers: Providers,
    check: CollectionCheck,
) -> Result<App> {
    let threshold = settings
        .matching
        .threshold()
        .context("Matching threshold not configured")?;

    let index = Arc::new(TasteVectorIndex::new(
        providers.vectors,
        settings.vector.dimension,
        settings.vector.distance,
    ));
    if check == CollectionCheck::Required {
        index
            .ensure_collection()
            .await
            .context("Vector collection check failed")?;
    }

    let gateway = EmbeddingGateway::new(providers.embedder);
    let extractor = Arc::new(PromotionExtractor::new(
        providers.completion.clone(),
        &settings.llm.promotion_model,
    ));
    let matcher = Arc::new(UserMatcher::new(gateway.clone(), index.clone(), threshold));
    let dispatcher = Arc::new(NotificationDispatcher::new(
        storage.clone(),
        providers.sender.clone(),
        Duration::from_secs(settings.messaging.send_timeout_secs),
    ));
    let pipeline = Arc::new(MessagePipeline::new(
        storage.clone(),
        extractor,
        matcher,
        dispatcher,
    ));

    let mut tastes = TasteService::new(
        storage.clone(),
        storage.clone(),
        gateway,
        index.clone(),
        threshold,
    )
    .with_limits(
        settings.matching.search_limit,
        settings.matching.max_search_limit,
    );
    if settings.tastes.enhance_labels {
        tastes = tastes.with_enhancer(Arc::new(TasteLabelEnhancer::new(
            providers.completion.clone(),
            &settings.llm.taste_label_model,
        )));
    }

    let health = HealthService::for_dependencies(
        storage.clone(),
        index.clone(),
        providers.completion,
        providers.sender,
        HEALTH_PROBE_TIMEOUT,
    );

    info!(
        threshold,
        dimension = settings.vector.dimension,
        enhance_labels = settings.tastes.enhance_labels,
        "Application assembled"
    );

    Ok(App {
        pipeline,
        users: UserService::new(storage.clone(), storage.clone(), index),
        groups: GroupService::new(storage),
        tastes,
        health,
    })
}

/// Parse one line of inbound JSON. Blank, non-UTF-8 and malformed lines
/// are skipped.
fn parse_inbound(raw: &[u8]) -> Option<InboundMessage> {
    let line = match std::str::from_utf8(raw) {
        Ok(line) => line.trim(),
        Err(e) => {
            warn!(error = %e, bytes = raw.len(), "Skipping non-UTF-8 inbound line");
            return None;
        }
    };
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(message) => Some(message),
        Err(e) => {
            warn!(error = %e, "Skipping malformed inbound line");
            None
        }
    }
}

async fn handle_in_background(pipeline: Arc<MessagePipeline>, message: InboundMessage) {
    match pipeline.handle(&message).await {
        Ok(outcome) => debug!(from = %message.from, ?outcome, "Message handled"),
        Err(e) => error!(from = %message.from, error = %e, "Message pipeline failed"),
    }
}

/// Feed inbound JSON lines from `reader` through the pipeline, one task per
/// message, until the input ends or `shutdown` completes. In-flight
/// messages are always finished. Returns the number of messages accepted.
///
/// Only an I/O failure on `reader` ends the loop with an error; a bad line
/// is logged and skipped.
pub async fn run_ingress<R, S>(
    pipeline: Arc<MessagePipeline>,
    mut reader: R,
    shutdown: S,
) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    // Survives cancelled reads so a partially read line is resumed.
    let mut buf = Vec::new();
    let mut tasks = JoinSet::new();
    let mut accepted = 0;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                info!("Shutdown requested, no longer reading input");
                break;
            }
            read = reader.read_until(b'\n', &mut buf) => {
                let read = read.context("Failed to read inbound message")?;
                if !buf.is_empty() {
                    if let Some(message) = parse_inbound(&buf) {
                        accepted += 1;
                        tasks.spawn(handle_in_background(pipeline.clone(), message));
                    }
                    buf.clear();
                }
                if read == 0 {
                    info!("Input closed");
                    break;
                }
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    error!(error = %e, "Message task panicked");
                }
            }
        }
    }

    if !tasks.is_empty() {
        info!(in_flight = tasks.len(), "Waiting for in-flight messages");
    }
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Message task panicked");
        }
    }
    Ok(accepted)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

/// Run the daemon over stdin until EOF or a shutdown signal.
pub async fn start_daemon(app: App) -> Result<()> {
    info!("Promo daemon starting, reading messages from stdin");
    let reader = BufReader::new(tokio::io::stdin());
    let accepted = run_ingress(app.pipeline.clone(), reader, shutdown_signal()).await?;
    info!(accepted, "Promo daemon stopped");
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_image(path: &str, mime_type: &str) -> Result<Attachment> {
    let data = fs::read(path).with_context(|| format!("Failed to read image {}", path))?;
    let file_name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    Ok(Attachment {
        file_name,
        mime_type: mime_type.to_string(),
        data,
    })
}

/// Run one message through the pipeline and print the outcome.
pub async fn handle_process(
    app: &App,
    from: String,
    message: String,
    image: Option<String>,
    mime_type: &str,
) -> Result<()> {
    let image = image
        .as_deref()
        .map(|path| load_image(path, mime_type))
        .transpose()?;
    let inbound = InboundMessage {
        from,
        message,
        image,
    };

    match app.pipeline.handle(&inbound).await? {
        PipelineOutcome::UnknownGroup => println!("Ignored: {} is not a registered group", inbound.from),
        PipelineOutcome::NoPromotion => println!("No promotion found"),
        PipelineOutcome::NoMatches => println!("Promotion found, no interested users"),
        PipelineOutcome::Dispatched(report) => print_json(&report)?,
    }
    Ok(())
}

pub async fn handle_user(app: &App, command: UserCommands) -> Result<()> {
    match command {
        UserCommands::Add { name, phone } => print_json(&app.users.create_user(&name, &phone).await?),
        UserCommands::Update { id, name, phone } => print_json(
            &app.users
                .update_user(&id, name.as_deref(), phone.as_deref())
                .await?,
        ),
        UserCommands::List => print_json(&app.users.list_users().await?),
        UserCommands::Delete { id } => {
            if app.users.delete_user(&id).await? {
                println!("Deleted user {}", id);
            } else {
                println!("User {} not found", id);
            }
            Ok(())
        }
    }
}

pub async fn handle_group(app: &App, command: GroupCommands) -> Result<()> {
    match command {
        GroupCommands::Add {
            external_id,
            description,
        } => print_json(
            &app.groups
                .create_group(&external_id, description.as_deref())
                .await?,
        ),
        GroupCommands::Update {
            id,
            external_id,
            description,
        } => print_json(
            &app.groups
                .update_group(&id, external_id.as_deref(), description.as_deref())
                .await?,
        ),
        GroupCommands::List => print_json(&app.groups.list_groups().await?),
        GroupCommands::Delete { id } => {
            if app.groups.delete_group(&id).await? {
                println!("Deleted group {}", id);
            } else {
                println!("Group {} not found", id);
            }
            Ok(())
        }
    }
}

pub async fn handle_taste(app: &App, command: TasteCommands) -> Result<()> {
    match command {
        TasteCommands::Add { user_id, label } => match app.tastes.add_taste(&user_id, &label).await? {
            Some(taste) => print_json(&taste),
            None => anyhow::bail!("Taste label must not be blank"),
        },
        TasteCommands::List { user_id } => print_json(&app.tastes.list_tastes(&user_id).await?),
        TasteCommands::Remove { user_id, taste_id } => {
            if app.tastes.remove_taste(&user_id, &taste_id).await? {
                println!("Removed taste {}", taste_id);
            } else {
                println!("Taste {} not found for user {}", taste_id, user_id);
            }
            Ok(())
        }
    }
}

pub async fn handle_search(
    app: &App,
    label: &str,
    limit: Option<usize>,
    threshold: Option<f32>,
) -> Result<()> {
    print_json(
        &app.tastes
            .search_users_by_taste(label, limit, threshold)
            .await?,
    )
}

/// Print the health report. Fails when any hard dependency is down.
pub async fn handle_health(app: &App) -> Result<()> {
    let report = app.health.check().await;
    print_json(&report)?;
    if report.status == HealthStatus::Down {
        anyhow::bail!("One or more dependencies are down");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use promo_embeddings::MockEmbedder;
    use promo_extractor::MockCompletion;
    use promo_service::RecordingSender;
    use promo_types::Distance;
    use promo_vector::InMemoryVectorStore;
    use tempfile::TempDir;

    fn test_settings(dir: &TempDir) -> Settings {
        let mut settings = Settings::default();
        settings.db_path = dir.path().join("db").to_string_lossy().to_string();
        settings.vector.dimension = 8;
        settings.matching.score_threshold = Some(0.5);
        settings.tastes.enhance_labels = false;
        settings
    }

    fn fake_providers(vectors: Arc<InMemoryVectorStore>, sender: Arc<RecordingSender>) -> Providers {
        Providers {
            embedder: Arc::new(MockEmbedder::new(8)),
            completion: Arc::new(MockCompletion::always(
                r#"{"name":"Mechanical keyboard","currentPrice":199.9,"type":"product","tags":["keyboard"]}"#,
            )),
            vectors,
            sender,
        }
    }

    async fn test_app(dir: &TempDir) -> (App, Arc<RecordingSender>) {
        let settings = test_settings(dir);
        let storage = Arc::new(Storage::open(&settings.expanded_db_path()).unwrap());
        let sender = Arc::new(RecordingSender::new());
        let vectors = Arc::new(InMemoryVectorStore::new());
        let app = assemble(
            &settings,
            storage,
            fake_providers(vectors, sender.clone()),
            CollectionCheck::Required,
        )
        .await
        .unwrap();
        (app, sender)
    }

    #[test]
    fn test_parse_inbound_lines() {
        assert!(parse_inbound(b"").is_none());
        assert!(parse_inbound(b"not json").is_none());
        assert!(parse_inbound(b"\xff\xfe\n").is_none());
        let message = parse_inbound(br#"{"from":"g1","message":"hi"}"#).unwrap();
        assert_eq!(message.from, "g1");
        assert!(message.image.is_none());
    }

    #[tokio::test]
    async fn test_assemble_rejects_missing_threshold() {
        let dir = TempDir::new().unwrap();
        let mut settings = test_settings(&dir);
        settings.matching.score_threshold = None;
        let storage = Arc::new(Storage::open(&settings.expanded_db_path()).unwrap());
        let result = assemble(
            &settings,
            storage,
            fake_providers(
                Arc::new(InMemoryVectorStore::new()),
                Arc::new(RecordingSender::new()),
            ),
            CollectionCheck::Required,
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_assemble_rejects_dimension_mismatch() {
        let dir = TempDir::new().unwrap();
        let settings = test_settings(&dir);
        let storage = Arc::new(Storage::open(&settings.expanded_db_path()).unwrap());
        let vectors = Arc::new(InMemoryVectorStore::with_collection(3, Distance::Cosine));
        let result = assemble(
            &settings,
            storage,
            fake_providers(vectors.clone(), Arc::new(RecordingSender::new())),
            CollectionCheck::Required,
        )
        .await;
        assert!(result.is_err());

        let storage = Arc::new(Storage::open(&dir.path().join("db2")).unwrap());
        let skipped = assemble(
            &settings,
            storage,
            fake_providers(vectors, Arc::new(RecordingSender::new())),
            CollectionCheck::Skip,
        )
        .await;
        assert!(skipped.is_ok());
    }

    #[tokio::test]
    async fn test_ingress_processes_every_line() {
        let dir = TempDir::new().unwrap();
        let (app, sender) = test_app(&dir).await;

        let user = app.users.create_user("Alice", "111").await.unwrap();
        app.groups.create_group("deals@g.us", None).await.unwrap();
        app.tastes
            .add_taste(&user.id, "Mechanical keyboard")
            .await
            .unwrap();

        let input = concat!(
            r#"{"from":"deals@g.us","message":"Mechanical keyboard 199.90"}"#,
            "\n",
            "garbage\n",
            "\n",
            r#"{"from":"other@g.us","message":"Mechanical keyboard 199.90"}"#,
            "\n",
        );
        let accepted = run_ingress(
            app.pipeline.clone(),
            input.as_bytes(),
            std::future::pending::<()>(),
        )
        .await
        .unwrap();

        assert_eq!(accepted, 2);
        assert_eq!(sender.recipients(), vec!["111".to_string()]);
    }

    #[tokio::test]
    async fn test_ingress_skips_invalid_utf8_line() {
        let dir = TempDir::new().unwrap();
        let (app, sender) = test_app(&dir).await;

        let user = app.users.create_user("Alice", "111").await.unwrap();
        app.groups.create_group("deals@g.us", None).await.unwrap();
        app.tastes
            .add_taste(&user.id, "Mechanical keyboard")
            .await
            .unwrap();

        // The last line has no trailing newline
        let mut input = b"\xff\xfe\n".to_vec();
        input.extend_from_slice(br#"{"from":"deals@g.us","message":"Mechanical keyboard 199.90"}"#);

        let accepted = run_ingress(
            app.pipeline.clone(),
            input.as_slice(),
            std::future::pending::<()>(),
        )
        .await
        .unwrap();

        assert_eq!(accepted, 1);
        assert_eq!(sender.recipients(), vec!["111".to_string()]);
    }

    #[tokio::test]
    async fn test_ingress_stops_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let (app, sender) = test_app(&dir).await;

        let input = r#"{"from":"deals@g.us","message":"x"}"#;
        let accepted = run_ingress(app.pipeline.clone(), input.as_bytes(), async {})
            .await
            .unwrap();

        // shutdown is polled first, so nothing is read
        assert_eq!(accepted, 0);
        assert!(sender.sent().is_empty());
    }
}
