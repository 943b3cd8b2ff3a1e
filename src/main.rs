use std::path::PathBuf;
use std::time::Duration;

use agent_console::forms::JsonDraft;
use agent_console::resources::ResourceKind;
use agent_console::{Console, ConsoleSettings, Fields, RecordId, logging};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use log::{debug, info};
use serde::Serialize;

/// 代理管理後端的命令列主控台。
#[derive(Debug, Parser)]
#[command(name = "agent-console", version, about)]
struct Cli {
    /// 工作區根目錄，設定檔位於其下的 `config/`。
    #[arg(long, global = true, default_value = ".")]
    workspace: PathBuf,

    /// 使用行程內的記憶體後端，不連線。
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 列出一種資源的所有紀錄
    List { resource: ResourceKind },
    /// 建立紀錄
    Create {
        resource: ResourceKind,
        /// 紀錄欄位，JSON 物件
        #[arg(long)]
        json: String,
    },
    /// 更新紀錄
    Update {
        resource: ResourceKind,
        id: String,
        #[arg(long)]
        json: String,
    },
    /// 刪除紀錄
    Delete { resource: ResourceKind, id: String },
    /// 上傳檔案（或整個目錄）成為檔案上下文
    Upload { path: PathBuf },
    /// 啟用代理
    Activate { agent: String },
    /// 啟動群組聊天
    Start { chat: String },
    /// 停止群組聊天
    Stop { chat: String },
    /// 顯示預設的模型供應商目錄
    Predefined,
    /// 在後端執行程式碼檔案
    Execute {
        file: PathBuf,
        #[arg(long, default_value = "python")]
        language: String,
    },
    /// 持續輪詢聊天訊息，直到 Ctrl-C 或時間到
    Watch {
        session: String,
        #[arg(long, default_value = "1")]
        agent: String,
        /// 開始輪詢前先送出的訊息
        #[arg(long)]
        say: Option<String>,
        #[arg(long)]
        seconds: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let workspace = cli.workspace.canonicalize().unwrap_or(cli.workspace);
    logging::init(&workspace)?;

    let mut settings = ConsoleSettings::load(&workspace)?;
    settings.offline |= cli.offline;
    let mut console = Console::new(settings)?;
    debug!("running {:?}", cli.command);

    match cli.command {
        Command::List { resource } => {
            let store = console.store(resource);
            store.list().await?;
            print_json(&store.records())
        }
        Command::Create { resource, json } => {
            let fields = parse_fields(&json)?;
            let record = console.store(resource).create(fields).await?;
            print_json(&record)
        }
        Command::Update { resource, id, json } => {
            let fields = parse_fields(&json)?;
            let record = console
                .store(resource)
                .update(RecordId::from(id), fields)
                .await?;
            print_json(&record)
        }
        Command::Delete { resource, id } => {
            console.store(resource).delete(RecordId::from(id.as_str())).await?;
            info!("deleted {resource} {id}");
            Ok(())
        }
        Command::Upload { path } => {
            if path.is_dir() {
                let report = console.file_contexts.upload_dir(&path).await;
                for (failed, reason) in &report.failed {
                    eprintln!("{}: {reason}", failed.display());
                }
                print_json(&report.uploaded)?;
                if !report.failed.is_empty() {
                    return Err(anyhow!("{} file(s) failed to upload", report.failed.len()));
                }
                Ok(())
            } else {
                let record = console.file_contexts.upload_file(&path).await?;
                print_json(&record)
            }
        }
        Command::Activate { agent } => {
            let id = RecordId::from(agent);
            // 先列出，啟用後才有本地紀錄可以更新狀態。
            console.agents.list().await?;
            console.agents.activate(id.clone()).await?;
            print_json(&console.agents.collection().state().find(&id))
        }
        Command::Start { chat } => toggle_group_chat(&mut console, chat, true).await,
        Command::Stop { chat } => toggle_group_chat(&mut console, chat, false).await,
        Command::Predefined => {
            let catalog = console.model_providers.fetch_predefined().await?;
            print_json(catalog)
        }
        Command::Execute { file, language } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("無法讀取 {}", file.display()))?;
            let output = console.code.execute(&content, &language).await?;
            println!("{output}");
            Ok(())
        }
        Command::Watch {
            session,
            agent,
            say,
            seconds,
        } => watch(&console, session, agent, say, seconds).await,
    }
}

async fn toggle_group_chat(console: &mut Console, chat: String, running: bool) -> Result<()> {
    let id = RecordId::from(chat);
    if running {
        console.group_chats.start(id.clone()).await?;
    } else {
        console.group_chats.stop(id.clone()).await?;
    }
    print_json(&serde_json::json!({
        "id": id,
        "active": console.group_chats.is_active(&id),
    }))
}

async fn watch(
    console: &Console,
    session: String,
    agent: String,
    say: Option<String>,
    seconds: Option<u64>,
) -> Result<()> {
    let mut chat = console.open_chat(RecordId::from(session), RecordId::from(agent));
    if let Some(message) = say {
        chat.send(&message).await?;
    }

    let poller = chat.start_polling(console.settings().poll_interval());
    let mut tick = tokio::time::interval(Duration::from_millis(250));
    let deadline = async {
        match seconds {
            Some(seconds) => tokio::time::sleep(Duration::from_secs(seconds)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    info!("watching session {}", chat.session_id());
    let mut printed = 0;
    loop {
        tokio::select! {
            _ = tick.tick() => {
                if chat.poll_events() == 0 {
                    continue;
                }
                let messages = chat.messages();
                // 列表被整個取代，訊息變少時從頭印起。
                if messages.len() < printed {
                    printed = 0;
                }
                for message in &messages[printed..] {
                    println!("{}", serde_json::to_string(message)?);
                }
                printed = messages.len();
                if let Some(error) = chat.collection().state().error() {
                    eprintln!("error: {error}");
                }
            }
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    poller.stop();
    Ok(())
}

fn parse_fields(text: &str) -> Result<Fields> {
    match JsonDraft::new("--json", text).parse()? {
        serde_json::Value::Object(fields) => Ok(fields),
        other => Err(anyhow!("--json must be an object, got {other}")),
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
