//! Console transport
//!
//! Plays one network from a terminal. Each stdin line is one event:
//!
//! ```text
//! #ducks alice !bang        alice says "!bang" in #ducks
//! JOIN #ducks bob           bob joins #ducks
//! PART #ducks bob           bob leaves #ducks
//! ```
//!
//! Everyone typing on the console counts as authenticated. Output goes to
//! stdout.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};

use super::transport::{NetworkEvent, Transport, TransportError};
use crate::messaging::Outbound;

/// Parse one console line.
pub fn parse_console_line(line: &str) -> Option<NetworkEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (head, rest) = line.split_once(char::is_whitespace)?;
    match head {
        "JOIN" | "PART" => {
            let mut words = rest.split_whitespace();
            let channel = words.next()?.to_string();
            let nick = words.next()?.to_string();
            Some(if head == "JOIN" {
                NetworkEvent::Join { channel, nick }
            } else {
                NetworkEvent::Part { channel, nick }
            })
        }
        channel if channel.starts_with('#') => {
            let (nick, text) = rest.trim_start().split_once(char::is_whitespace)?;
            Some(NetworkEvent::Message {
                channel: channel.to_string(),
                nick: nick.to_string(),
                authenticated: true,
                text: text.trim().to_string(),
            })
        }
        _ => None,
    }
}

/// Render an outbound message for the terminal.
pub fn render(message: &Outbound) -> String {
    match message {
        Outbound::Announce { channel, text } => format!("[{}] {}", channel, text),
        Outbound::Notify { user, text } => format!("-> {}: {}", user, text),
    }
}

/// Terminal-backed transport.
pub struct ConsoleTransport {
    input: Option<Lines<BufReader<Stdin>>>,
    output: Stdout,
    welcomed: bool,
}

impl Default for ConsoleTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleTransport {
    /// Transport over this process's stdin and stdout.
    pub fn new() -> Self {
        Self {
            input: None,
            output: tokio::io::stdout(),
            welcomed: false,
        }
    }
}

impl Transport for ConsoleTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.input.is_none() {
            self.input = Some(BufReader::new(tokio::io::stdin()).lines());
        }
        self.welcomed = false;
        Ok(())
    }

    async fn next_event(&mut self) -> Result<Option<NetworkEvent>, TransportError> {
        if !self.welcomed {
            self.welcomed = true;
            return Ok(Some(NetworkEvent::Registered));
        }
        let input = self.input.as_mut().ok_or(TransportError::Closed)?;
        loop {
            let Some(line) = input.next_line().await? else {
                return Ok(None);
            };
            if let Some(event) = parse_console_line(&line) {
                return Ok(Some(event));
            }
        }
    }

    async fn join(&mut self, channel: &str) -> Result<(), TransportError> {
        let line = format!("*** joined {}\n", channel);
        self.output.write_all(line.as_bytes()).await?;
        self.output.flush().await?;
        Ok(())
    }

    async fn send(&mut self, message: Outbound) -> Result<(), TransportError> {
        let mut line = render(&message);
        line.push('\n');
        self.output.write_all(line.as_bytes()).await?;
        self.output.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_messages() {
        assert_eq!(
            parse_console_line("#ducks alice !shop 3 bob"),
            Some(NetworkEvent::Message {
                channel: "#ducks".into(),
                nick: "alice".into(),
                authenticated: true,
                text: "!shop 3 bob".into(),
            })
        );
        assert_eq!(parse_console_line("#ducks alice"), None);
        assert_eq!(parse_console_line("   "), None);
        assert_eq!(parse_console_line("hello there world"), None);
    }

    #[test]
    fn test_parse_membership() {
        assert_eq!(
            parse_console_line("JOIN #ducks bob"),
            Some(NetworkEvent::Join {
                channel: "#ducks".into(),
                nick: "bob".into()
            })
        );
        assert_eq!(
            parse_console_line("PART #ducks bob"),
            Some(NetworkEvent::Part {
                channel: "#ducks".into(),
                nick: "bob".into()
            })
        );
        assert_eq!(parse_console_line("JOIN #ducks"), None);
    }

    #[test]
    fn test_render() {
        assert_eq!(
            render(&Outbound::Announce {
                channel: "#ducks".into(),
                text: "QUACK".into()
            }),
            "[#ducks] QUACK"
        );
        assert_eq!(
            render(&Outbound::Notify {
                user: "bob".into(),
                text: "hi".into()
            }),
            "-> bob: hi"
        );
    }
}
