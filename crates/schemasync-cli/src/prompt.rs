use std::io::{self, Write};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// Print `question` on stderr and read one answer line.
///
/// End of input and blank answers both yield `None`.
pub async fn ask<R>(reader: &mut R, question: &str) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut stderr = io::stderr();
    write!(stderr, "{question}")?;
    stderr.flush()?;

    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    let answer = line.trim();
    Ok((!answer.is_empty()).then(|| answer.to_string()))
}

pub async fn ask_stdin(question: &str) -> io::Result<Option<String>> {
    let mut reader = BufReader::new(tokio::io::stdin());
    ask(&mut reader, question).await
}

pub fn is_affirmative(answer: Option<&str>) -> bool {
    answer.is_some_and(|answer| matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
}
