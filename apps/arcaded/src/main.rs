use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use arcade_client::{
    ArcadeClient, ClientConfig, DEFAULT_BASE_URL, DEFAULT_USER, ReplaySource, SendOutcome,
};
use arcade_encounter::{CountdownSupervisor, Urgency, format_mmss};
use arcade_protocol::{BossId, Difficulty, SpawnNotice, StreamRequest};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "arcaded")]
#[command(about = "Live encounter stream client")]
struct Cli {
    #[arg(long, default_value = "info")]
    log: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Decode a captured stream file.
    Replay(ReplayArgs),
    /// Send one message to a backend and decode the streamed reply.
    Chat(ChatArgs),
}

#[derive(Debug, Args)]
struct ReplayArgs {
    file: PathBuf,
    #[arg(long, default_value_t = 64)]
    chunk_size: usize,
    #[arg(long, default_value = "replay")]
    message: String,
    #[command(flatten)]
    encounter: EncounterArgs,
}

#[derive(Debug, Args)]
struct ChatArgs {
    message: String,
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,
    #[arg(long, default_value = DEFAULT_USER)]
    user: String,
    /// Defaults to a fresh random session.
    #[arg(long)]
    session: Option<String>,
    #[arg(long, default_value = StreamRequest::DEFAULT_MODE)]
    mode: String,
    #[arg(long)]
    world: Option<String>,
    #[arg(long)]
    track: Option<String>,
    #[arg(long)]
    codex: Option<String>,
    #[arg(long, default_value_t = 100)]
    integrity_max: i32,
    #[command(flatten)]
    encounter: EncounterArgs,
}

#[derive(Debug, Args)]
struct EncounterArgs {
    /// Start a boss encounter before streaming.
    #[arg(long)]
    boss: bool,
    #[arg(long, requires = "boss")]
    boss_id: Option<String>,
    #[arg(long, requires = "boss")]
    boss_name: Option<String>,
    #[arg(long, requires = "boss")]
    duration_secs: Option<u64>,
    #[arg(long, requires = "boss")]
    hard: bool,
}

impl EncounterArgs {
    fn notice(&self) -> Option<SpawnNotice> {
        self.boss.then(|| SpawnNotice {
            boss_id: self.boss_id.clone().map(BossId::from_string),
            name: self.boss_name.clone(),
            difficulty: Some(if self.hard {
                Difficulty::Hard
            } else {
                Difficulty::Normal
            }),
            duration_seconds: self.duration_secs,
            ..Default::default()
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(cli.log.as_str())
        .compact()
        .init();

    match cli.command {
        Command::Replay(args) => replay(args).await,
        Command::Chat(args) => chat(args).await,
    }
}

async fn replay(args: ReplayArgs) -> Result<()> {
    let text = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("reading {}", args.file.display()))?;
    let source = ReplaySource::new(text).chunk_size(args.chunk_size);
    let client = ArcadeClient::builder(ClientConfig::default())
        .chunk_source(Arc::new(source))
        .without_progress_refresh()
        .build();

    run(client, StreamRequest::new(args.message), &args.encounter).await
}

async fn chat(args: ChatArgs) -> Result<()> {
    let mut config = ClientConfig::new(args.base_url)
        .user(args.user)
        .default_mode(args.mode.clone())
        .integrity_max(args.integrity_max);
    if let Some(session) = args.session {
        config = config.session_id(session);
    }
    info!(session_id = %config.session_id, url = %config.stream_url(), "chat session");

    let mut request = StreamRequest::new(args.message).mode(args.mode);
    if let Some(world) = args.world {
        request = request.world(world);
    }
    if let Some(track) = args.track {
        request = request.track(track);
    }
    if let Some(codex) = args.codex {
        request = request.codex(codex);
    }

    run(ArcadeClient::builder(config).build(), request, &args.encounter).await
}

async fn run(client: ArcadeClient, request: StreamRequest, encounter: &EncounterArgs) -> Result<()> {
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();
    let mut countdown: Option<CountdownSupervisor> = None;

    if let Some(notice) = encounter.notice() {
        let epoch = client.spawn_encounter(notice);
        info!(epoch, "encounter spawned");
        let supervisor = client.spawn_countdown();
        tasks.push(log_countdown(&client, &supervisor));
        countdown = Some(supervisor);
    }

    let mut events = client.subscribe_feed();
    tasks.push(tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!(event_type = %event.event_type(), "feed.event");
        }
    }));

    let stopper = client.clone();
    tasks.push(tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() && stopper.stop_stream() {
            warn!("stream stopped by user");
        }
    }));

    let outcome = client.send(request).await;

    drop(countdown);
    for task in tasks {
        task.abort();
    }

    let state = json!({
        "feed": client.feed().snapshot(),
        "encounter": client.encounter().snapshot(),
    });
    println!("{}", serde_json::to_string_pretty(&state)?);

    match outcome? {
        SendOutcome::Completed(summary) => {
            info!(
                dispatched = summary.frames_dispatched,
                dropped = summary.frames_dropped,
                "stream complete"
            );
        }
        SendOutcome::Aborted(summary) => {
            info!(dispatched = summary.frames_dispatched, "stream aborted");
        }
        SendOutcome::Busy | SendOutcome::EmptyMessage => warn!("nothing sent"),
    }
    Ok(())
}

fn log_countdown(client: &ArcadeClient, supervisor: &CountdownSupervisor) -> JoinHandle<()> {
    let encounter = client.encounter().clone();
    let mut remaining = supervisor.subscribe_remaining();
    tokio::spawn(async move {
        while remaining.changed().await.is_ok() {
            let left = *remaining.borrow_and_update();
            let status = encounter.snapshot().status();
            info!(
                remaining = %format_mmss(left),
                urgency = ?Urgency::for_remaining(status, left),
                "countdown"
            );
        }
    })
}
