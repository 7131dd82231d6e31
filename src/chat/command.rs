//! Parsing of chat text into bot commands.
//!
//! Telegram slash syntax: `/name arg arg`, where the name may carry an
//! `@botname` suffix in group chats. Anything not starting with `/` is free
//! text for the completion provider.

use std::fmt;

pub const REGISTER_USAGE: &str = "Usage: /register <username> <password>";
pub const LOGIN_USAGE: &str = "Usage: /login <username> <password>";
pub const HISTORY_USAGE: &str = "Usage: /history [count]";

#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Register { username: String, password: String },
    Login { username: String, password: String },
    Logout,
    History { limit: Option<usize> },
    Search,
    Tips,
    /// Free text for the completion provider
    Chat(String),
    /// A known command with malformed arguments; carries the usage line
    Usage(&'static str),
    Unknown(String),
}

impl Command {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let Some(rest) = text.strip_prefix('/') else {
            return Command::Chat(text.to_string());
        };

        let mut parts = rest.split_whitespace();
        let head = parts.next().unwrap_or_default();
        let name = head.split('@').next().unwrap_or_default().to_ascii_lowercase();
        let args: Vec<&str> = parts.collect();

        match name.as_str() {
            "start" => Command::Start,
            "help" => Command::Help,
            "register" => match args.as_slice() {
                [username, password] => Command::Register {
                    username: username.to_string(),
                    password: password.to_string(),
                },
                _ => Command::Usage(REGISTER_USAGE),
            },
            "login" => match args.as_slice() {
                [username, password] => Command::Login {
                    username: username.to_string(),
                    password: password.to_string(),
                },
                _ => Command::Usage(LOGIN_USAGE),
            },
            "logout" => Command::Logout,
            "history" => match args.as_slice() {
                [] => Command::History { limit: None },
                [n] => match n.parse::<usize>() {
                    Ok(limit) if limit > 0 => Command::History { limit: Some(limit) },
                    _ => Command::Usage(HISTORY_USAGE),
                },
                _ => Command::Usage(HISTORY_USAGE),
            },
            "search" => Command::Search,
            "tips" => Command::Tips,
            _ => Command::Unknown(name),
        }
    }

    /// Whether the command needs a logged-in session
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            Command::Logout
                | Command::History { .. }
                | Command::Search
                | Command::Tips
                | Command::Chat(_)
        )
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Help => "help",
            Command::Register { .. } => "register",
            Command::Login { .. } => "login",
            Command::Logout => "logout",
            Command::History { .. } => "history",
            Command::Search => "search",
            Command::Tips => "tips",
            Command::Chat(_) => "chat",
            Command::Usage(_) => "usage",
            Command::Unknown(_) => "unknown",
        }
    }
}

// Passwords must never reach the logs
impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Register { username, .. } => f
                .debug_struct("Register")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Command::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Command::Start => write!(f, "Start"),
            Command::Help => write!(f, "Help"),
            Command::Logout => write!(f, "Logout"),
            Command::History { limit } => f.debug_struct("History").field("limit", limit).finish(),
            Command::Search => write!(f, "Search"),
            Command::Tips => write!(f, "Tips"),
            Command::Chat(text) => f
                .debug_tuple("Chat")
                .field(&format!("{} chars", text.chars().count()))
                .finish(),
            Command::Usage(usage) => f.debug_tuple("Usage").field(usage).finish(),
            Command::Unknown(name) => f.debug_tuple("Unknown").field(name).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_register_and_login() {
        assert_eq!(
            Command::parse("/register alice pw1"),
            Command::Register {
                username: "alice".to_string(),
                password: "pw1".to_string()
            }
        );
        assert_eq!(
            Command::parse("  /login   alice   pw1 "),
            Command::Login {
                username: "alice".to_string(),
                password: "pw1".to_string()
            }
        );
    }

    #[test]
    fn test_wrong_arity_gives_usage() {
        assert_eq!(Command::parse("/register alice"), Command::Usage(REGISTER_USAGE));
        assert_eq!(Command::parse("/register a b c"), Command::Usage(REGISTER_USAGE));
        assert_eq!(Command::parse("/login"), Command::Usage(LOGIN_USAGE));
    }

    #[test]
    fn test_bot_suffix_and_case_ignored() {
        assert_eq!(Command::parse("/Tips@ScamWatchBot"), Command::Tips);
        assert_eq!(Command::parse("/search@bot extra"), Command::Search);
        assert_eq!(Command::parse("/logout"), Command::Logout);
    }

    #[test]
    fn test_history_limit() {
        assert_eq!(Command::parse("/history"), Command::History { limit: None });
        assert_eq!(
            Command::parse("/history 3"),
            Command::History { limit: Some(3) }
        );
        assert_eq!(Command::parse("/history 0"), Command::Usage(HISTORY_USAGE));
        assert_eq!(Command::parse("/history many"), Command::Usage(HISTORY_USAGE));
    }

    #[test]
    fn test_free_text_and_unknown() {
        assert_eq!(
            Command::parse("Is this SMS a scam?"),
            Command::Chat("Is this SMS a scam?".to_string())
        );
        assert_eq!(Command::parse("/foo bar"), Command::Unknown("foo".to_string()));
        assert_eq!(Command::parse("/"), Command::Unknown(String::new()));
    }

    #[test]
    fn test_requires_login() {
        assert!(Command::parse("hello").requires_login());
        assert!(Command::parse("/tips").requires_login());
        assert!(Command::parse("/history").requires_login());
        assert!(!Command::parse("/login a b").requires_login());
        assert!(!Command::parse("/help").requires_login());
        assert!(!Command::parse("/nope").requires_login());
    }

    #[test]
    fn test_debug_redacts_password() {
        let debug = format!("{:?}", Command::parse("/login alice hunter2"));
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));

        let debug = format!("{:?}", Command::parse("my card number is 1234"));
        assert!(!debug.contains("1234"));
    }
}
