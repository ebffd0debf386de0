pub mod cli;
pub mod config;
pub mod history;
pub mod llm;
pub mod models;
pub mod relay;
pub mod server;
pub mod widget;

use cli::{ Args, Command, ServeArgs };
use config::persona::resolve_persona;
use history::{ initialize_history_store, store_limits };
use llm::chat::new_client as new_chat_client;
use llm::{ LlmConfig, LlmType };
use log::{ info, warn };
use relay::{ ConversationRelay, RelayOptions };
use server::api::AppState;
use server::{ Server, TlsPaths };
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    match args.command {
        Command::Serve(serve) => run_server(serve).await,
        Command::Chat(chat) => widget::terminal::run(chat).await,
    }
}

pub fn build_relay(args: &ServeArgs) -> Result<Arc<ConversationRelay>, Box<dyn Error + Send + Sync>> {
    let persona = resolve_persona(args.persona_path.as_deref())?;
    let llm_type: LlmType = args.chat_llm_type.parse()?;
    let chat_config = LlmConfig {
        llm_type,
        api_key: Some(args.chat_api_key.clone()).filter(|k| !k.trim().is_empty()),
        completion_model: args.chat_model.clone(),
        base_url: args.chat_base_url.clone(),
        timeout: (args.chat_timeout_secs > 0).then(|| Duration::from_secs(args.chat_timeout_secs)),
    };
    let chat_client = new_chat_client(&chat_config)?;
    info!(
        "Chat client configured: Type={}, Model={}, BaseURL={}, NativeStreaming={}",
        chat_config.llm_type,
        chat_client.get_model(),
        chat_config.base_url.as_deref().unwrap_or("adapter default"),
        chat_client.supports_native_streaming()
    );

    let history = initialize_history_store(
        store_limits(args.history_ttl_secs, args.history_max_conversations)
    );
    let options = RelayOptions { max_message_chars: args.max_message_chars };

    Ok(Arc::new(ConversationRelay::new(chat_client, history, persona, options)))
}

fn tls_paths(args: &ServeArgs) -> Result<Option<TlsPaths>, Box<dyn Error + Send + Sync>> {
    if !args.enable_tls {
        info!("TLS not enabled. Running plain HTTP server.");
        return Ok(None);
    }
    match (&args.tls_cert_path, &args.tls_key_path) {
        (Some(cert_path), Some(key_path)) =>
            Ok(Some(TlsPaths { cert_path: cert_path.clone(), key_path: key_path.clone() })),
        (Some(_), None) | (None, Some(_)) =>
            Err("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.".into()),
        (None, None) => Err("--enable-tls was set but no certificate/key paths provided.".into()),
    }
}

pub async fn run_server(args: ServeArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Model: {}", args.chat_model.as_deref().unwrap_or("adapter default"));
    info!("Chat Timeout: {}s", args.chat_timeout_secs);
    info!("Persona Path: {}", args.persona_path.as_deref().unwrap_or("built-in"));
    info!("History TTL: {}s", args.history_ttl_secs);
    info!("History Max Conversations: {}", args.history_max_conversations);
    info!("Max Message Chars: {}", args.max_message_chars);
    info!("Expose Upstream Errors: {}", args.expose_upstream_errors);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    if args.expose_upstream_errors {
        warn!("Upstream error text is forwarded to clients.");
    }

    let tls = tls_paths(&args)?;
    let relay = build_relay(&args)?;
    let state = AppState {
        relay,
        expose_upstream_errors: args.expose_upstream_errors,
    };

    let server = Server::new(args.server_addr.clone(), state, tls);
    server.run().await
}
