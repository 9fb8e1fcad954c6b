use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use soulsync_core_sdk::{
    config::{self, AppConfig},
    models::{ChatMessage, ChatRequest, Role},
    relay::Relay,
    server, telemetry,
};

/**
 * \brief CLI 程序入口：启动中继服务或在终端发起一次对话。
 */
#[derive(Parser, Debug)]
#[command(name = "soulsync", version, about = "SoulSync chat relay")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /**
     * \brief 启动本地 HTTP 服务并提供前端页面。
     */
    Serve {
        #[arg(long, default_value = "127.0.0.1:8000")]
        addr: String,
    },

    /**
     * \brief 发送一条用户消息并打印模型回复。
     * \param prompt 用户消息
     * \param system 可选的 system 提示
     * \param model  可选的模型覆盖
     */
    Chat {
        #[arg(long)]
        prompt: String,
        #[arg(long)]
        system: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    config::load_dotenv();
    let app_config = AppConfig::from_env();
    telemetry::init(app_config.telemetry_enabled, &app_config.log_dir);

    match cli.command {
        Commands::Serve { addr } => {
            server::run(&addr, app_config)
                .await
                .context("server exited with error")?;
        }
        Commands::Chat {
            prompt,
            system,
            model,
        } => {
            let mut messages = Vec::new();
            if let Some(system) = system {
                messages.push(ChatMessage::new(Role::System, system));
            }
            messages.push(ChatMessage::new(Role::User, prompt));

            let relay = Relay::from_config(app_config.provider);
            let reply = relay
                .handle(ChatRequest { messages, model })
                .await
                .context("chat failed")?;
            println!("{}", reply.content);
        }
    }

    Ok(())
}
