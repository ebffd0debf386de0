use std::error::Error;
use log::info;
use tokio::io::{ AsyncBufReadExt, AsyncWriteExt, BufReader };

use super::{ new_conversation_id, ChatWidget, DisplayMessage, DisplayRole, HttpRelayTransport, RelayTransport };
use crate::cli::ChatArgs;
use crate::config::persona::DEFAULT_GREETING;

const QUIT_COMMAND: &str = "/quit";

pub fn render_line(message: &DisplayMessage) -> String {
    let who = match message.role {
        DisplayRole::User => "You",
        DisplayRole::Assistant => "Bot",
    };
    format!("[{}] {}: {}", message.formatted_time(), who, message.content)
}

fn is_quit(line: &str) -> bool {
    line.trim() == QUIT_COMMAND
}

/// Renders every message not yet shown and returns the new render position.
fn render_new<T: RelayTransport>(widget: &ChatWidget<T>, rendered: usize, out: &mut String) -> usize {
    for message in widget.messages().iter().skip(rendered) {
        out.push_str(&render_line(message));
        out.push('\n');
    }
    widget.messages().len()
}

/// Output after one submitted line. The user's own line is already on the
/// terminal, so rendering resumes after it.
fn render_exchange<T: RelayTransport>(widget: &ChatWidget<T>, rendered: usize) -> (String, usize) {
    let mut screen = String::new();
    let rendered = render_new(widget, rendered + 1, &mut screen);
    if let Some(err) = widget.error() {
        screen.push_str(&format!("(error: {})\n", err));
    }
    (screen, rendered)
}

pub async fn run(args: ChatArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    let transport = HttpRelayTransport::new(&args.relay_url);
    let conversation_id = args.conversation_id.unwrap_or_else(new_conversation_id);
    info!("Chatting with {} as {}", transport.endpoint(), conversation_id);

    let mut widget = ChatWidget::with_conversation_id(transport, DEFAULT_GREETING, conversation_id);
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let mut screen = String::new();
    let mut rendered = render_new(&widget, 0, &mut screen);
    let mut last_scroll = widget.scroll_generation();
    stdout.write_all(screen.as_bytes()).await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        if is_quit(&line) {
            break;
        }
        widget.set_input(line);
        if !widget.submit().await {
            continue;
        }
        if widget.scroll_generation() == last_scroll {
            continue;
        }
        last_scroll = widget.scroll_generation();

        let (screen, now_rendered) = render_exchange(&widget, rendered);
        rendered = now_rendered;
        stdout.write_all(screen.as_bytes()).await?;
        stdout.flush().await?;
    }

    Ok(())
}
