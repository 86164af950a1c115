use std::path::Path;

use anyhow::{Context, Result};
use assistant_relay::{AssistantConfig, AssistantContext, ChatSession};
use tokio::io::{stdin, stdout, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = AssistantConfig::from_env()?;
    let ctx = AssistantContext::from_config(&config)?;
    let mut session = ChatSession::new();

    println!("How can I help you today? (/upload <path> attaches a file, Ctrl-D quits)");
    let mut lines = BufReader::new(stdin()).lines();
    loop {
        let mut out = stdout();
        out.write_all(b"User: ").await?;
        out.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(path) = line.strip_prefix("/upload ") {
            let path = Path::new(path.trim());
            let bytes = match tokio::fs::read(path)
                .await
                .with_context(|| format!("reading {}", path.display()))
            {
                Ok(bytes) => bytes,
                Err(err) => {
                    println!("{err:#}");
                    continue;
                }
            };
            let filename = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("upload");
            match session.attach_file(&ctx, filename, bytes).await {
                Some(file_id) => println!("Uploaded {filename} as {file_id}"),
                None => println!("Upload failed, see log."),
            }
            continue;
        }

        match session.send(&ctx, line).await {
            Some(outcome) => {
                let reply = outcome.message.as_deref().unwrap_or("No final message");
                println!("Assistant: {reply}");
                if !outcome.is_completed() {
                    println!("(run ended with status {})", outcome.status);
                }
            }
            None => println!("Something went wrong, see log."),
        }
    }

    Ok(())
}
