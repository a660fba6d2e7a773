use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use umee_core::{
    AppAction, AppReconciler, AppUpdate, ChatApi, ChatMessage, ConversationKey, FfiApp,
    PeerSummary, SignUpForm, UserRecord,
};

#[derive(Debug, Parser)]
#[command(name = "umeechat")]
#[command(about = "Umee chat CLI for scripting and manual testing against a chat backend")]
struct Cli {
    /// State directory (signed-in user + config persist here between runs)
    #[arg(long, default_value = ".umeechat")]
    state_dir: PathBuf,

    /// Backend base URL; overrides the config file
    #[arg(long, env = "UMEE_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in and remember the user in the state dir
    SignIn {
        #[arg(long)]
        mobile: String,

        #[arg(long, env = "UMEE_PASSWORD")]
        password: String,
    },

    /// Register a new account
    SignUp {
        #[arg(long)]
        mobile: String,

        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        #[arg(long, env = "UMEE_PASSWORD")]
        password: String,

        /// JPEG profile picture
        #[arg(long)]
        avatar: Option<PathBuf>,
    },

    /// Forget the signed-in user
    SignOut,

    /// Show the signed-in user
    Whoami,

    /// List conversation threads
    Threads {
        /// Case-insensitive name filter
        #[arg(long, default_value = "")]
        query: String,
    },

    /// Fetch the full conversation with a peer
    Messages {
        #[arg(long)]
        peer: String,
    },

    /// Send one message to a peer
    Send {
        #[arg(long)]
        peer: String,

        #[arg(long)]
        text: String,
    },

    /// Follow a conversation; stdin lines are sent as messages
    Watch {
        #[arg(long)]
        peer: String,

        /// Timeout in seconds (0 = run forever)
        #[arg(long, default_value_t = 0)]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    std::fs::create_dir_all(&cli.state_dir)
        .with_context(|| format!("create state dir {}", cli.state_dir.display()))?;
    let api = ChatApi::new(&resolve_api_url(&cli.state_dir, cli.api_url.as_deref()));

    match &cli.cmd {
        Command::SignIn { mobile, password } => cmd_sign_in(&cli, &api, mobile, password).await,
        Command::SignUp {
            mobile,
            first_name,
            last_name,
            password,
            avatar,
        } => {
            let form = SignUpForm {
                mobile: mobile.clone(),
                first_name: first_name.clone(),
                last_name: last_name.clone(),
                password: password.clone(),
                avatar_jpeg: avatar
                    .as_ref()
                    .map(|p| std::fs::read(p).with_context(|| format!("read {}", p.display())))
                    .transpose()?,
            };
            cmd_sign_up(&api, form).await
        }
        Command::SignOut => cmd_sign_out(&cli),
        Command::Whoami => cmd_whoami(&cli),
        Command::Threads { query } => cmd_threads(&cli, &api, query).await,
        Command::Messages { peer } => cmd_messages(&cli, &api, peer).await,
        Command::Send { peer, text } => cmd_send(&cli, &api, peer, text).await,
        Command::Watch { peer, timeout } => cmd_watch(&cli, peer, *timeout).await,
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn state_dir_str(cli: &Cli) -> String {
    cli.state_dir.to_string_lossy().to_string()
}

/// Flag, then `api_base_url` from the state dir's config, then the built-in default.
fn resolve_api_url(state_dir: &Path, flag: Option<&str>) -> String {
    if let Some(url) = flag.map(str::trim).filter(|u| !u.is_empty()) {
        return url.to_string();
    }
    std::fs::read(state_dir.join(umee_core::CONFIG_FILE_NAME))
        .ok()
        .and_then(|bytes| serde_json::from_slice::<serde_json::Value>(&bytes).ok())
        .and_then(|v| v.get("api_base_url")?.as_str().map(str::to_string))
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| umee_core::DEFAULT_API_BASE_URL.to_string())
}

/// Makes sure the app core started over `state_dir` talks to `api_url`. Unrelated keys
/// in an existing config are preserved.
fn ensure_config(state_dir: &Path, api_url: &str) -> anyhow::Result<()> {
    let path = state_dir.join(umee_core::CONFIG_FILE_NAME);
    let existing = std::fs::read(&path)
        .ok()
        .and_then(|bytes| serde_json::from_slice::<serde_json::Value>(&bytes).ok())
        .filter(|v| v.is_object());
    let mut config = match existing {
        Some(v) => v,
        None => serde_json::from_str(&umee_core::default_config_json())
            .context("parse default config")?,
    };
    config["api_base_url"] = json!(api_url);
    std::fs::write(&path, serde_json::to_vec_pretty(&config)?)
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

fn require_user(cli: &Cli) -> anyhow::Result<UserRecord> {
    umee_core::load_saved_user(&state_dir_str(cli))
        .ok_or_else(|| anyhow!("not signed in; run `umeechat sign-in` first"))
}

fn user_json(user: &UserRecord) -> serde_json::Value {
    json!({
        "id": user.id,
        "first_name": user.first_name,
        "last_name": user.last_name,
        "mobile": user.mobile,
        "avatar_found": user.avatar_found,
    })
}

fn thread_json(t: &PeerSummary) -> serde_json::Value {
    let avatar = match &t.avatar {
        umee_core::AvatarView::Image { url } => json!({ "image": url }),
        umee_core::AvatarView::Initials { letters } => json!({ "initials": letters }),
    };
    json!({
        "peer_id": t.peer_id,
        "name": t.display_name,
        "presence": umee_core::presence_badge(t.presence).label,
        "avatar": avatar,
        "last_message": t.last_message,
        "last_activity": t.last_activity,
    })
}

fn message_json(m: &ChatMessage) -> serde_json::Value {
    let delivery = umee_core::delivery_indicator_for(m).map(|d| match d {
        umee_core::DeliveryIndicator::Pending => "pending",
        umee_core::DeliveryIndicator::Confirmed => "confirmed",
    });
    json!({
        "text": m.text,
        "mine": m.side == umee_core::MessageSide::Mine,
        "sent_at": m.sent_at,
        "delivery": delivery,
    })
}

/// Messages in `next` that were not in the previously printed snapshot. A snapshot that
/// doesn't extend the printed one is reprinted whole.
fn unseen<'a>(printed: &[ChatMessage], next: &'a [ChatMessage]) -> &'a [ChatMessage] {
    if next.len() >= printed.len() && next[..printed.len()] == *printed {
        &next[printed.len()..]
    } else {
        next
    }
}

fn print(v: serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(&v).expect("json encode"));
}

fn print_line(v: serde_json::Value) {
    println!("{v}");
}

// ── Commands ────────────────────────────────────────────────────────────────

async fn cmd_sign_in(cli: &Cli, api: &ChatApi, mobile: &str, password: &str) -> anyhow::Result<()> {
    let user = api
        .sign_in(mobile.trim(), password)
        .await
        .context("sign in")?;
    umee_core::save_user(&state_dir_str(cli), &user)?;
    print(json!({ "user": user_json(&user) }));
    Ok(())
}

async fn cmd_sign_up(api: &ChatApi, form: SignUpForm) -> anyhow::Result<()> {
    let message = api.sign_up(form).await.context("sign up")?;
    print(json!({ "message": message }));
    Ok(())
}

fn cmd_sign_out(cli: &Cli) -> anyhow::Result<()> {
    umee_core::clear_saved_user(&state_dir_str(cli))?;
    print(json!({ "signed_out": true }));
    Ok(())
}

fn cmd_whoami(cli: &Cli) -> anyhow::Result<()> {
    let user = require_user(cli)?;
    print(json!({ "user": user_json(&user) }));
    Ok(())
}

async fn cmd_threads(cli: &Cli, api: &ChatApi, query: &str) -> anyhow::Result<()> {
    let user = require_user(cli)?;
    let list = api.load_threads(&user.id).await.context("load threads")?;
    let threads = umee_core::filter_threads(&list.threads, query);
    print(json!({
        "available": list.available,
        "threads": threads.iter().map(thread_json).collect::<Vec<_>>(),
    }));
    Ok(())
}

async fn cmd_messages(cli: &Cli, api: &ChatApi, peer: &str) -> anyhow::Result<()> {
    let user = require_user(cli)?;
    let key = ConversationKey {
        self_id: user.id,
        peer_id: peer.to_string(),
    };
    let messages = api
        .load_conversation(&key)
        .await
        .context("load conversation")?;
    print(json!({
        "peer_id": key.peer_id,
        "messages": messages.iter().map(message_json).collect::<Vec<_>>(),
    }));
    Ok(())
}

async fn cmd_send(cli: &Cli, api: &ChatApi, peer: &str, text: &str) -> anyhow::Result<()> {
    let user = require_user(cli)?;
    let key = ConversationKey {
        self_id: user.id,
        peer_id: peer.to_string(),
    };
    api.send_message(&key, text).await.context("send message")?;
    print(json!({ "sent": true, "peer_id": key.peer_id }));
    Ok(())
}

struct ChannelReconciler {
    tx: tokio::sync::mpsc::UnboundedSender<AppUpdate>,
}

impl AppReconciler for ChannelReconciler {
    fn reconcile(&self, update: AppUpdate) {
        let _ = self.tx.send(update);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SendPhase {
    Dispatched,
    Sending,
}

/// Lines waiting to be sent. The core ignores a send while another is in flight, so a
/// line is only handed over once the previous send has gone through `busy.sending`.
#[derive(Debug, Default)]
struct Outbox {
    pending: VecDeque<String>,
    in_flight: Option<SendPhase>,
}

impl Outbox {
    fn push(&mut self, line: String) {
        // The core drops blank drafts without ever going busy.
        if !line.trim().is_empty() {
            self.pending.push_back(line);
        }
    }

    /// Feed the `busy.sending` flag of a state update.
    fn observe(&mut self, sending: bool) {
        self.in_flight = match (self.in_flight, sending) {
            (Some(SendPhase::Dispatched), true) => Some(SendPhase::Sending),
            (Some(SendPhase::Sending), false) => None,
            (phase, _) => phase,
        };
    }

    fn next(&mut self) -> Option<String> {
        if self.in_flight.is_some() {
            return None;
        }
        let line = self.pending.pop_front()?;
        self.in_flight = Some(SendPhase::Dispatched);
        Some(line)
    }

    fn dispatch_next(&mut self, app: &FfiApp) {
        if let Some(text) = self.next() {
            app.dispatch(AppAction::UpdateDraft { text });
            app.dispatch(AppAction::SendDraft);
        }
    }
}

/// Runs the full app core over the state dir, so polling, sending and scroll requests
/// behave exactly as they do on a device.
async fn cmd_watch(cli: &Cli, peer: &str, timeout_sec: u64) -> anyhow::Result<()> {
    require_user(cli)?;
    let api_url = resolve_api_url(&cli.state_dir, cli.api_url.as_deref());
    ensure_config(&cli.state_dir, &api_url)?;

    let app = FfiApp::new(state_dir_str(cli));
    let deadline = (timeout_sec > 0)
        .then(|| tokio::time::Instant::now() + Duration::from_secs(timeout_sec));
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    run_watch(&app, peer, stdin, deadline).await;
    Ok(())
}

async fn run_watch(
    app: &FfiApp,
    peer: &str,
    input: impl AsyncBufRead + Unpin,
    deadline: Option<tokio::time::Instant>,
) {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    app.listen_for_updates(Box::new(ChannelReconciler { tx }));
    app.dispatch(AppAction::OpenChat {
        peer_id: peer.to_string(),
    });
    // A terminal has no layout pass; treat the list as laid out immediately.
    app.dispatch(AppAction::ChatListLaidOut);

    let mut lines = input.lines();
    let mut input_open = true;
    let mut outbox = Outbox::default();
    let mut printed: Vec<ChatMessage> = vec![];

    loop {
        let sleep = async {
            match deadline {
                Some(dl) => tokio::time::sleep_until(dl).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            _ = sleep => break,
            line = lines.next_line(), if input_open => match line {
                Ok(Some(text)) => {
                    outbox.push(text);
                    outbox.dispatch_next(app);
                }
                Ok(None) | Err(_) => input_open = false,
            },
            update = rx.recv() => {
                let Some(update) = update else { break };
                let AppUpdate::FullState(state) = update else {
                    continue;
                };
                outbox.observe(state.busy.sending);
                outbox.dispatch_next(app);
                if let Some(toast) = state.toast.as_deref() {
                    print_line(json!({ "toast": toast }));
                    app.dispatch(AppAction::ClearToast);
                }
                let Some(chat) = state.current_chat else {
                    continue;
                };
                if !chat.has_loaded {
                    continue;
                }
                for m in unseen(&printed, &chat.messages) {
                    print_line(message_json(m));
                }
                printed = chat.messages;
            }
        }
    }

    app.dispatch(AppAction::CloseChat);
}
