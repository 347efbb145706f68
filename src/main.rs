use std::io::Write as _;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context as _;
use code_assist::config::AssistConfig;
use code_assist::error::ConfigError;
use code_assist::llm::{LlmConfig, MistralClient};
use code_assist::retrieval::{ContextIndex, FileIndex, NullContextIndex};
use code_assist::session::Session;
use code_assist::supervisor::{Supervisor, SupervisorDeps};
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Read API key from environment
    let api_key = std::env::var("MISTRAL_API_KEY").unwrap_or_else(|_| {
        eprintln!("Error: MISTRAL_API_KEY not set");
        eprintln!("  export MISTRAL_API_KEY=...");
        std::process::exit(1);
    });

    let model = std::env::var("CODE_ASSIST_MODEL")
        .unwrap_or_else(|_| "mistral-medium-latest".to_string());

    let timeout_secs: u64 = env_parse("CODE_ASSIST_TIMEOUT_SECS", 120)?;
    let top_k: usize = env_parse("CODE_ASSIST_TOP_K", 1)?;

    let use_context = std::env::var("CODE_ASSIST_NO_CONTEXT").is_err();

    // Optional source tree for the lexical context index
    let index: Arc<dyn ContextIndex> = match std::env::var("CODE_ASSIST_SOURCE") {
        Ok(root) => {
            eprintln!("   Context index: {}", root);
            Arc::new(FileIndex::new(root.into()))
        }
        Err(_) => {
            eprintln!("   Context index: none");
            Arc::new(NullContextIndex)
        }
    };

    eprintln!("🤖 code-assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", model);
    eprintln!("   Type a request and press Enter. /quit to exit.\n");

    let client = Arc::new(MistralClient::new(LlmConfig::new(
        secrecy::SecretString::from(api_key),
        model,
    )));

    let config = AssistConfig {
        use_context_augmentation: use_context,
        top_k,
        upstream_timeout: Duration::from_secs(timeout_secs),
        ..AssistConfig::default()
    };

    let supervisor = Supervisor::new(
        config,
        SupervisorDeps {
            chat: client.clone(),
            automation: client,
            index,
        },
    );

    let mut session = Session::new();
    let stdin = tokio::io::stdin();
    let reader = BufReader::new(stdin);
    let mut lines = reader.lines();

    eprint!("> ");
    while let Ok(Some(line)) = lines.next_line().await {
        let query = line.trim();
        if query.is_empty() {
            eprint!("> ");
            continue;
        }
        if query == "/quit" || query == "/exit" {
            break;
        }

        // Print only the unseen suffix of each partial update; a shrink
        // means a new phase (routing transcript vs. answer) started.
        let last = Mutex::new(String::new());
        let on_partial = |text: &str| {
            let mut prev = last.lock().unwrap();
            if !text.starts_with(prev.as_str()) {
                println!();
                prev.clear();
            }
            print!("{}", &text[prev.len()..]);
            std::io::stdout().flush().ok();
            *prev = text.to_string();
        };

        // Outermost boundary: display the error, then propagate it so the
        // surrounding process sees the failure.
        match supervisor.handle_query(&mut session, query, &on_partial).await {
            Ok(answer) => {
                let streamed = last.lock().unwrap().clone();
                if !streamed.is_empty() {
                    println!();
                }
                if streamed != answer {
                    println!("{}", answer);
                }
            }
            Err(e) => {
                tracing::error!("Unhandled failure while processing query: {}", e);
                eprintln!("Error: {}", e);
                return Err(e).context("query processing failed");
            }
        }
        eprint!("> ");
    }

    eprintln!("Bye.");
    Ok(())
}

/// Parse an optional numeric environment variable, rejecting malformed
/// values instead of silently substituting the default.
fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}
