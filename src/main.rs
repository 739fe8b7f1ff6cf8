use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{info, warn};

use oxidized_analyst::{
    config::Config,
    llm::{LLMProviderConfig, LLM},
    plot::{render_svg, ChartKind},
    routes::create_router,
    stats::describe,
    utils::init_logger,
    AppState, Session,
};

#[derive(Parser)]
#[command(name = "oxidized-analyst", version, about = "Chat with your CSV data")]
struct Cli {
    /// Model credential; overrides the key found in the environment
    #[arg(long, global = true, env = "OXIDIZED_ANALYST_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Ask a single question about a CSV file
    Ask {
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        dictionary: Option<PathBuf>,
        /// Question to ask; omit to only print the preview and summary
        #[arg(long)]
        question: Option<String>,
        #[arg(long)]
        no_analysis: bool,
    },
    /// Ask the model which charts fit a CSV file
    Suggest {
        #[arg(long)]
        data: PathBuf,
    },
    /// Draw a chart for one column as SVG
    Plot {
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        column: String,
        #[arg(long, default_value = "Histogram")]
        chart_type: String,
        /// Output file; stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::from_env()?;
    if let Some(key) = cli.api_key.clone() {
        config.llm.api_key = Some(key);
    }

    let _guard = init_logger(&config.logging);
    info!(provider = %config.llm.provider, model = %config.llm.model, "Configuration loaded");

    let llm = build_llm(&config);

    match cli.command.unwrap_or(Command::Serve { host: None, port: None }) {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config, llm).await
        }
        Command::Ask {
            data,
            dictionary,
            question,
            no_analysis,
        } => {
            let mut session = Session::new(llm).with_sample_rows(config.session.sample_rows);
            let preview = session.load_primary_dataset(&read_file(&data)?)?;
            println!("{}\n", preview.text);
            println!("{}\n", describe(session.primary_dataset().context("dataset missing")?).to_text());
            if let Some(path) = dictionary {
                session.load_data_dictionary(&read_file(&path)?)?;
            }
            session.set_analysis_enabled(!no_analysis);

            if let Some(question) = question {
                let reply = session.submit_chat_message(&question).await?;
                println!("{}", reply.content);
            }
            Ok(())
        }
        Command::Suggest { data } => {
            let mut session = Session::new(llm).with_sample_rows(config.session.sample_rows);
            session.load_primary_dataset(&read_file(&data)?)?;
            println!("{}", session.chart_suggestions().await?);
            Ok(())
        }
        Command::Plot {
            data,
            column,
            chart_type,
            output,
        } => {
            let kind: ChartKind = chart_type.parse()?;
            let mut session = Session::new(None);
            session.load_primary_dataset(&read_file(&data)?)?;
            let spec = session.render_auto_plot(&column, kind)?;
            let svg = render_svg(&spec)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, svg)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!(path = %path.display(), "Chart written");
                }
                None => println!("{}", svg),
            }
            Ok(())
        }
    }
}

async fn serve(config: Config, llm: Option<Arc<LLM>>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let idle_timeout = config.session.idle_timeout();
    let state = AppState::new(config, llm);

    if let Some(idle) = idle_timeout {
        state.sessions.spawn_reaper(idle);
        info!(idle_secs = idle.as_secs(), "Idle session expiry enabled");
    }

    // Create router
    let app = create_router(state);

    // Start server
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}

/// The model is optional at startup; sessions can still supply a key later.
fn build_llm(config: &Config) -> Option<Arc<LLM>> {
    let Some(key) = config.llm.active_api_key() else {
        warn!("No API key configured; AI features stay unavailable until a key is provided");
        return None;
    };
    match LLM::new(LLMProviderConfig::from_config(&config.llm, key)) {
        Ok(llm) => Some(Arc::new(llm)),
        Err(e) => {
            warn!(error = %e, "Failed to configure the model");
            None
        }
    }
}

fn read_file(path: &PathBuf) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}
