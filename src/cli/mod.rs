use clap::{ ArgAction, Args as ClapArgs, Parser, Subcommand };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the conversation relay HTTP server.
    Serve(ServeArgs),
    /// Chat with a running relay from the terminal.
    Chat(ChatArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ServeArgs {
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:3000")]
    pub server_addr: String,

    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (gemini, openai)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "gemini")]
    pub chat_llm_type: String,

    /// API key for the chat LLM provider.
    #[arg(long, env = "GENAI_API_KEY", default_value = "", hide_env_values = true)]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., gemini-2.5-flash, gpt-4o-mini)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    /// Base URL for the chat LLM provider API.
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// Timeout in seconds for one model call. 0 disables the timeout.
    #[arg(long, env = "CHAT_TIMEOUT_SECS", default_value = "60")]
    pub chat_timeout_secs: u64,

    /// Path to a persona JSON file ({"system_instruction": ..., "greeting": ...}).
    #[arg(long, env = "PERSONA_PATH")]
    pub persona_path: Option<String>,

    // --- History Store Args ---
    /// Seconds of inactivity after which a conversation is forgotten. 0 keeps conversations forever.
    #[arg(long, env = "HISTORY_TTL_SECS", default_value = "3600")]
    pub history_ttl_secs: u64,

    /// Maximum number of conversations kept in memory. 0 means unbounded.
    #[arg(long, env = "HISTORY_MAX_CONVERSATIONS", default_value = "10000")]
    pub history_max_conversations: usize,

    /// Maximum accepted message length in characters.
    #[arg(long, env = "MAX_MESSAGE_CHARS", default_value = "8000")]
    pub max_message_chars: usize,

    /// Forward upstream error text to clients in 500 responses.
    #[arg(
        long,
        env = "EXPOSE_UPSTREAM_ERRORS",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub expose_upstream_errors: bool,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ChatArgs {
    /// Base URL of the relay server.
    #[arg(long, env = "RELAY_URL", default_value = "http://127.0.0.1:3000")]
    pub relay_url: String,

    /// Conversation id to use. Defaults to a fresh `conv_<millis>` id.
    #[arg(long)]
    pub conversation_id: Option<String>,
}
