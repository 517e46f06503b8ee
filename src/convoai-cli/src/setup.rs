//! Interactive setup prompts.

use std::io::{self, Write};

use colored::Colorize;
use convoai_core::config::{SUGGESTED_TOPICS, suggested_topic};

/// Print `question` and read one trimmed line from stdin.
///
/// The read runs on the blocking pool so Ctrl-C is still noticed while waiting.
pub async fn prompt(question: &str) -> io::Result<String> {
    print!("{question}");
    io::stdout().flush()?;

    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        io::stdin().read_line(&mut line)?;
        Ok::<_, io::Error>(line.trim().to_string())
    })
    .await
    .map_err(io::Error::other)?
}

/// Ask a yes/no question; anything but `y`/`yes` is a no.
pub async fn confirm(question: &str) -> io::Result<bool> {
    let answer = prompt(question).await?.to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// Let the operator pick a suggested topic or type their own.
pub async fn choose_topic() -> io::Result<String> {
    println!();
    println!("{}", "Suggested topics:".bold());
    for (i, topic) in SUGGESTED_TOPICS.iter().enumerate() {
        println!("  {}. {}", i + 1, topic);
    }
    println!("  {}. Custom topic", SUGGESTED_TOPICS.len() + 1);

    let choice = prompt(&format!("\nChoose a topic (1-{}): ", SUGGESTED_TOPICS.len() + 1)).await?;
    let choice: usize = choice.parse().unwrap_or(1);

    if choice == SUGGESTED_TOPICS.len() + 1 {
        let custom = prompt("Enter your custom topic: ").await?;
        if !custom.is_empty() {
            return Ok(custom);
        }
    }

    Ok(suggested_topic(choice).to_string())
}
