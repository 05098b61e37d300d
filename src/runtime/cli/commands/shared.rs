use std::io::Write;

use tokio::sync::mpsc;

use crate::core::dispatch::{DispatchError, Dispatcher};
use crate::core::ports::llm::{ChatRequest, StreamEvent};
use crate::runtime::cli::CliError;

const STREAM_BUFFER: usize = 64;
const VISIBLE_KEY_CHARS: usize = 4;

pub fn ensure_valid_provider_id(provider: &str) -> Result<(), String> {
    if provider.is_empty() {
        return Err("provider is required".to_string());
    }
    if !provider
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.')
    {
        return Err(format!(
            "Invalid provider '{}'. Use letters, numbers, '-', '_' or '.'.",
            provider
        ));
    }
    Ok(())
}

/// Shows the first and last four characters; short keys are hidden entirely.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= VISIBLE_KEY_CHARS * 2 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..VISIBLE_KEY_CHARS].iter().collect();
    let tail: String = chars[chars.len() - VISIBLE_KEY_CHARS..].iter().collect();
    format!(
        "{head}{}{tail}",
        "*".repeat(chars.len() - VISIBLE_KEY_CHARS * 2)
    )
}

/// Renders a dispatch failure with a hint about what the user can do next.
pub fn explain(error: DispatchError) -> CliError {
    let mut text = error.message.clone();
    if error.needs_configuration() && !error.provider.is_empty() {
        text.push_str(&format!(
            "\nhint: run `prdgen keys set {} <key>`",
            error.provider
        ));
    } else if error.retryable {
        text.push_str("\nhint: this is temporary, try again shortly");
    }
    text.into()
}

/// Streams a reply to stdout as it arrives and returns the full text.
/// Ctrl-C abandons the request.
pub async fn stream_to_stdout(
    dispatcher: &Dispatcher,
    request: &ChatRequest,
) -> Result<String, CliError> {
    let (tx, mut rx) = mpsc::channel(STREAM_BUFFER);

    let printer = async move {
        let mut content = String::new();
        let mut stdout = std::io::stdout();
        while let Some(event) = rx.recv().await {
            match event {
                StreamEvent::Text(text) => {
                    let _ = write!(stdout, "{text}");
                    let _ = stdout.flush();
                    content.push_str(&text);
                }
                StreamEvent::Done => break,
            }
        }
        content
    };

    let streamed = async { tokio::join!(dispatcher.dispatch_stream(request, tx), printer) };

    tokio::select! {
        (result, content) = streamed => {
            println!();
            result.map_err(explain)?;
            Ok(content)
        }
        _ = tokio::signal::ctrl_c() => {
            println!();
            Err("interrupted".into())
        }
    }
}
