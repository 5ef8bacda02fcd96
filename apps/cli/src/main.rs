use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use folio_core_sdk::{
    config::AppSettings,
    llm::{ChatCompleter, CompletionClient},
    models::{ChatTurn, FALLBACK_REPLY},
    server, telemetry,
};

/**
 * \brief CLI 程序入口：启动聊天中转服务，或在终端里直接提问。
 */
#[derive(Parser, Debug)]
#[command(name = "folio", version, about = "Portfolio chat relay")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /**
     * \brief 启动 HTTP 服务。
     * \param host 覆盖 FOLIO_HOST
     * \param port 覆盖 PORT
     */
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },

    /**
     * \brief 发送一条用户消息并打印模型回复。
     */
    Ask {
        #[arg(long)]
        prompt: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = AppSettings::from_env().context("load configuration failed")?;
    telemetry::init(&settings.telemetry).context("init logging failed")?;
    if let Some(path) = &settings.dotenv_path {
        tracing::info!("loaded .env from {}", path.display());
    }

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                settings.gateway.host = host;
            }
            if let Some(port) = port {
                settings.gateway.port = port;
            }
            settings.log_summary();
            server::run(&settings).await?;
        }
        Commands::Ask { prompt } => {
            let client = CompletionClient::new(settings.completion.clone())
                .context("build completion client failed")?;
            tracing::debug!(prompt_len = prompt.len(), "cli ask");
            let reply = client
                .complete(&[ChatTurn::user(prompt)])
                .await
                .context("ask failed")?;
            println!("{}", reply.text().unwrap_or(FALLBACK_REPLY));
        }
    }

    Ok(())
}
