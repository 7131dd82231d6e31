//! Fixed reply texts.

use crate::history::Interaction;

pub const NOT_LOGGED_IN: &str =
    "Welcome to the Suspected Scam / Cyber Pitfall chatbot! Please /register or /login to continue.";

pub const REGISTER_ALREADY_LOGGED_IN: &str =
    "You are already logged in. If you want to register a new account, please log out first.";
pub const REGISTER_SUCCESS: &str = "Registration successful! You are now logged in.";

pub const LOGIN_ALREADY_LOGGED_IN: &str = "You are already logged in. No need to log in again.";

pub const LOGOUT_SUCCESS: &str = "You have been successfully logged out. Stay safe online!";
pub const LOGOUT_NOT_LOGGED_IN: &str = "You are not logged in. Please log in first using /login.";

pub const COMPLETION_FAILED: &str =
    "An error occurred while processing your request. Please try again later.";

pub const HISTORY_EMPTY: &str = "You have no saved conversations yet.";

pub const SCAMETER_URL: &str = "https://cyberdefender.hk/en-us/scameter/";

const SAFETY_TIPS: [&str; 8] = [
    "Be cautious when sharing personal information online.",
    "Verify the authenticity of links before clicking on them.",
    "Never provide sensitive information, such as passwords, to untrusted sources.",
    "Use strong and unique passwords for different accounts.",
    "Enable two-factor authentication (2FA) whenever possible.",
    "Be wary of unsolicited messages or calls requesting personal or financial information.",
    "Keep your devices and software updated to avoid vulnerabilities.",
    "Avoid using public Wi-Fi networks for sensitive transactions.",
];

const RESOURCES: &str = "Additional resources:\n\
- Join our WhatsApp group: [Click here](https://www.whatsapp.com/channel/0029VaB5r1v2v1Ik0zC6xF3m)\n\
- Download the Apple app: [Click here](https://apps.apple.com/hk/app/%E9%98%B2%E9%A8%99%E8%A6%96%E4%BC%8Fapp/id1663109821)\n\
- Download the Android app: [Click here](https://play.google.com/store/apps/details?id=scameter.hk.cyberdefender&pli=1)";

const COMMAND_LIST: &str = "\
- /search: Investigate suspected scams or cyber pitfalls and assess the risk levels of phone numbers, emails, or websites.\n\
- /tips: Get practical advice on staying safe online.\n\
- /history: Review your recent conversations with the bot.\n\
- /logout: Securely log out of your account.\n\
- Free text: Chat with the bot and explore topics using ChatGPT.";

pub fn login_success(username: &str) -> String {
    format!(
        "Login successful! Welcome back, {username}.\n\n\
         You can make the most of this chatbot by using the following commands:\n\
         {COMMAND_LIST}\n\n\
         Feel free to explore and stay alert online!"
    )
}

pub fn help() -> String {
    format!(
        "Welcome to the Suspected Scam / Cyber Pitfall chatbot!\n\n\
         - /register <username> <password>: Create an account and log in.\n\
         - /login <username> <password>: Log in to your account.\n\
         {COMMAND_LIST}"
    )
}

pub fn search() -> String {
    format!(
        "You can check the Scameter for risk levels here:\n{SCAMETER_URL}\n\n\
         Enter the relevant details (e.g., Phone, Email, or URL) on the site to perform your search."
    )
}

pub fn tips() -> String {
    let tips = SAFETY_TIPS
        .iter()
        .map(|tip| format!("- {tip}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Here are some safety tips to protect yourself online:\n\n{tips}\n\n{RESOURCES}")
}

pub fn unknown_command(name: &str) -> String {
    format!("Unknown command /{name}. Send /help to see what I can do.")
}

/// Renders interactions oldest first.
pub fn history(interactions: &[Interaction]) -> String {
    if interactions.is_empty() {
        return HISTORY_EMPTY.to_string();
    }

    let mut out = format!("Your last {} conversation(s):", interactions.len());
    for (i, item) in interactions.iter().enumerate() {
        out.push_str(&format!(
            "\n\n{}. [{}]\nYou: {}\nBot: {}",
            i + 1,
            item.created_at.format("%Y-%m-%d %H:%M"),
            item.request_text,
            item.response_text
        ));
    }
    out
}
