//! Every user-facing message the bot sends.
//!
//! Keeping the copy in one module means wording changes never touch the
//! state machine, and tests can assert on the exact text the controller
//! produced. All messages are HTML; user-supplied values go through
//! [`escape`] before interpolation.

use crate::session::{Session, Step};
use crate::transport::{Button, CallbackAction, Keyboard, Reply};
use chrono::{DateTime, Utc};
use teloxide::utils::html::escape;

const PASSWORD_FORMAT: &str = "<code>password: your_password</code>";

/// Longest slice of a user's message quoted back in a reply. Telegram
/// rejects messages over 4096 characters.
const MAX_ECHO_CHARS: usize = 200;

fn help_about_keyboard() -> Keyboard {
    vec![vec![
        Button::new("📖 Help", CallbackAction::Help),
        Button::new("ℹ️ About", CallbackAction::About),
    ]]
}

fn retry_keyboard(help_label: &str) -> Keyboard {
    vec![vec![
        Button::new(help_label, CallbackAction::Help),
        Button::new("❌ Cancel", CallbackAction::Cancel),
    ]]
}

pub fn welcome(first_name: &str) -> Reply {
    let name = if first_name.trim().is_empty() {
        "there".to_string()
    } else {
        escape(first_name)
    };
    Reply::text(format!(
        "🎉 Welcome {name}!\n\n\
I'm your PDF Unlock Assistant. I can remove the password from protected PDF files.\n\n\
📋 <b>How it works:</b>\n\
1️⃣ Send me your PDF file\n\
2️⃣ Provide the password when prompted\n\
3️⃣ Get your unlocked PDF back!\n\n\
🔐 <b>Security:</b> Your files are processed locally and deleted after processing.\n\n\
Ready? Just send me a PDF file! 📄"
    ))
    .with_keyboard(help_about_keyboard())
}

pub fn help(max_file_size: u64) -> Reply {
    Reply::text(format!(
        "🆘 <b>Help &amp; Instructions</b>\n\n\
<b>Commands:</b>\n\
• /start - Start the bot\n\
• /help - Show this help message\n\
• /status - Check your current session\n\
• /cancel - Cancel current operation\n\n\
<b>Method 1: Send PDF first</b>\n\
1. Send your PDF file\n\
2. Wait for confirmation\n\
3. Send the password as {PASSWORD_FORMAT}\n\n\
<b>Method 2: Password in caption</b>\n\
1. Send your PDF with the caption {PASSWORD_FORMAT}\n\
2. The file is processed straight away\n\n\
<b>Tips:</b>\n\
✅ Use the exact password format\n\
✅ Files are deleted after processing\n\
✅ Maximum file size: {}",
        format_mb(max_file_size)
    ))
}

pub fn quick_help() -> Reply {
    Reply::text(format!(
        "🆘 <b>Quick Help</b>\n\n\
<b>Steps to unlock a PDF:</b>\n\
1. Send your PDF file 📄\n\
2. Send the password: {PASSWORD_FORMAT} 🔐\n\
3. Get the unlocked file! ✅\n\n\
<b>Alternative:</b> put the password in the PDF's caption.\n\n\
Type /help for detailed instructions."
    ))
}

pub fn about() -> Reply {
    Reply::text(
        "ℹ️ <b>About PDF Unlock Bot</b>\n\n\
🔐 <b>Purpose:</b> Remove passwords from PDF files\n\
🛡️ <b>Security:</b> Files are processed locally and deleted after use\n\
⚡ <b>Speed:</b> Fast processing with live status updates",
    )
}

pub fn start_prompt() -> Reply {
    Reply::text("🚀 <b>Starting new session...</b>\n\nPlease send me a PDF file to unlock!")
}

fn step_label(step: Step) -> (&'static str, &'static str) {
    match step {
        Step::AwaitingFile => ("⏳", "Waiting for PDF file"),
        Step::AwaitingPassword => ("🔐", "Waiting for password"),
        Step::Processing => ("⚙️", "Processing your file"),
    }
}

pub fn no_session() -> Reply {
    Reply::text("📊 <b>Status:</b> No active session\n\nSend /start to begin!")
}

pub fn status(session: &Session, now: DateTime<Utc>) -> Reply {
    let (emoji, label) = step_label(session.step());
    let file = session
        .pending()
        .map(|f| escape(&f.name))
        .unwrap_or_else(|| "None".to_string());
    let mut text = format!(
        "📊 <b>Current Status</b>\n\n\
{emoji} <b>Step:</b> {label}\n\
📄 <b>File:</b> {file}\n\
⏱️ <b>Time:</b> {}s ago\n\
🔄 <b>Attempts:</b> {}",
        session.elapsed_secs(now),
        session.attempts
    );
    if session.step() == Step::AwaitingPassword {
        text.push_str(&format!("\n\n💡 Send your password as {PASSWORD_FORMAT}"));
    }
    Reply::text(text)
}

pub fn cancelled() -> Reply {
    Reply::text(
        "❌ <b>Operation cancelled</b>\n\nYour session has been reset. Send /start to begin again!",
    )
}

pub fn identify_error() -> Reply {
    Reply::text("❌ Could not identify your user ID. Please restart the bot with /start")
}

pub fn invalid_file_type() -> Reply {
    Reply::text(
        "❌ <b>Invalid file type</b>\n\n📄 Please send a valid PDF file only.\n\n\
💡 <b>Tip:</b> Make sure your file has a .pdf extension!",
    )
}

pub fn file_too_large(size: u64, max_file_size: u64) -> Reply {
    Reply::text(format!(
        "❌ <b>File too large</b>\n\n📏 Maximum file size: {}\n📄 Your file: {}\n\n\
💡 <b>Tip:</b> Try compressing your PDF first!",
        format_mb(max_file_size),
        format_mb(size)
    ))
}

pub fn downloading(name: &str, size: Option<u64>) -> Reply {
    Reply::text(format!(
        "📥 <b>Downloading PDF</b>\n\n📄 <b>File:</b> {}{}\n⏳ <b>Status:</b> Downloading...",
        escape(name),
        format_kb_suffix(size)
    ))
}

pub fn download_complete(name: &str, size: Option<u64>) -> Reply {
    Reply::text(format!(
        "✅ <b>Download Complete</b>\n\n📄 <b>File:</b> {}{}\n✅ <b>Status:</b> Ready for password",
        escape(name),
        format_kb_suffix(size)
    ))
}

pub fn download_failed() -> Reply {
    Reply::text(
        "❌ <b>Download Failed</b>\n\n🔧 An error occurred while downloading your file.\n\n\
💡 <b>Try:</b>\n• Resend the file\n• Contact support if the issue persists",
    )
}

pub fn password_required(name: &str) -> Reply {
    Reply::text(format!(
        "🔐 <b>Password Required</b>\n\n📄 <b>File:</b> {}\n\
💡 <b>Next Step:</b> Send the password in this format:\n\n{PASSWORD_FORMAT}\n\n\
🔒 <b>Example:</b> <code>password: mypassword123</code>",
        escape(name)
    ))
    .with_keyboard(retry_keyboard("❓ Help with Password"))
}

pub fn password_in_caption() -> Reply {
    Reply::text("🔐 <b>Password found in caption</b>\n\n⚙️ Processing your PDF...")
}

pub fn processing(name: &str, password_chars: usize) -> Reply {
    Reply::text(format!(
        "🔐 <b>Processing PDF</b>\n\n📄 <b>File:</b> {}\n🔑 <b>Password:</b> {}\n\
⚙️ <b>Status:</b> Unlocking...",
        escape(name),
        "*".repeat(password_chars)
    ))
}

pub fn unlocked(name: &str) -> Reply {
    Reply::text(format!(
        "✅ <b>Success!</b>\n\n📄 <b>File:</b> {}\n✅ <b>Status:</b> Unlocked and sent!\n\n\
🎉 Your PDF is ready above!",
        escape(name)
    ))
}

pub fn unlock_failed(name: &str, attempts: u32) -> Reply {
    Reply::text(format!(
        "❌ <b>Unlock Failed</b>\n\n📄 <b>File:</b> {}\n🔐 <b>Attempt:</b> {attempts}\n\n\
💡 <b>Possible issues:</b>\n• Incorrect password\n• File is corrupted\n• Unsupported encryption\n\n\
🔄 <b>Try again with the correct password:</b>\n{PASSWORD_FORMAT}",
        escape(name)
    ))
    .with_keyboard(retry_keyboard("🔄 Try Again"))
}

pub fn processing_error(name: &str) -> Reply {
    Reply::text(format!(
        "❌ <b>Processing Error</b>\n\n📄 <b>File:</b> {}\n\
🔧 <b>Error:</b> Technical issue occurred\n\n\
💡 <b>Try:</b>\n• Send the file again\n• Contact support if the issue persists",
        escape(name)
    ))
}

pub fn no_pdf() -> Reply {
    Reply::text(
        "📄 <b>No PDF file found</b>\n\n\
💡 Please send me a PDF file first, then provide the password.\n\n\
Use /start to begin!",
    )
    .with_keyboard(vec![vec![Button::new(
        "🚀 Start New Session",
        CallbackAction::Start,
    )]])
}

pub fn still_processing() -> Reply {
    Reply::text("⚙️ <b>Still working</b>\n\nYour PDF is being unlocked. Please wait a moment.")
}

pub fn invalid_format(text: &str) -> Reply {
    Reply::text(format!(
        "❌ <b>Invalid Password Format</b>\n\n🔐 <b>Correct format:</b>\n{PASSWORD_FORMAT}\n\n\
📝 <b>Examples:</b>\n<code>password: abc123</code>\n<code>password: my secret password</code>\n\n\
💡 <b>Your message:</b> \"{}\"",
        escape(&shorten(text, MAX_ECHO_CHARS))
    ))
}

pub fn empty_password() -> Reply {
    Reply::text(format!(
        "❌ <b>Empty Password</b>\n\n🔐 Please provide a valid password:\n\n{PASSWORD_FORMAT}"
    ))
}

/// Cut `text` to `max` characters, marking the cut with an ellipsis.
fn shorten(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => format!("{}…", &text[..end]),
        None => text.to_string(),
    }
}

fn format_mb(bytes: u64) -> String {
    format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
}

fn format_kb_suffix(size: Option<u64>) -> String {
    size.map(|s| format!(" ({:.1}KB)", s as f64 / 1024.0))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::PendingFile;
    use std::path::PathBuf;

    #[test]
    fn welcome_escapes_name() {
        let r = welcome("<b>Eve</b>");
        assert!(r.text.contains("&lt;b&gt;Eve&lt;/b&gt;"), "got: {}", r.text);
        assert!(r.keyboard.is_some());
        assert!(welcome("  ").text.contains("Welcome there!"));
    }

    #[test]
    fn file_too_large_shows_sizes() {
        let r = file_too_large(25 * 1024 * 1024, 20 * 1024 * 1024);
        assert!(r.text.contains("25.0MB"), "got: {}", r.text);
        assert!(r.text.contains("20.0MB"), "got: {}", r.text);
    }

    #[test]
    fn processing_masks_password() {
        let r = processing("a.pdf", 6);
        assert!(r.text.contains("******"));
        assert!(!r.text.contains("*******"));
    }

    #[test]
    fn status_lists_step_file_and_attempts() {
        let session = Session::awaiting_password(PendingFile {
            path: PathBuf::from("/tmp/x.pdf"),
            name: "tax & co.pdf".into(),
        });
        let r = status(&session, session.created_at + chrono::Duration::seconds(12));
        assert!(r.text.contains("Waiting for password"));
        assert!(r.text.contains("tax &amp; co.pdf"));
        assert!(r.text.contains("12s ago"));
        assert!(r.text.contains("<b>Attempts:</b> 0"));
        assert!(r.text.contains("password: your_password"));

        let idle = Session::awaiting_file();
        let r = status(&idle, idle.created_at);
        assert!(r.text.contains("<b>File:</b> None"));
        assert!(!r.text.contains("💡"));
    }

    #[test]
    fn invalid_format_escapes_echo() {
        let r = invalid_format("<script>");
        assert!(r.text.contains("&lt;script&gt;"));
    }

    #[test]
    fn invalid_format_caps_long_echo() {
        let r = invalid_format(&"<".repeat(4000));
        assert!(r.text.chars().count() <= 4096, "{} chars", r.text.chars().count());
        assert!(r.text.contains(&format!("{}…", "&lt;".repeat(MAX_ECHO_CHARS))));
        assert!(!r.text.contains(&"&lt;".repeat(MAX_ECHO_CHARS + 1)));

        let short = "é".repeat(MAX_ECHO_CHARS);
        assert!(invalid_format(&short).text.contains(&format!("\"{short}\"")));
    }

    #[test]
    fn unlock_failed_offers_retry_and_cancel() {
        let r = unlock_failed("a.pdf", 3);
        assert!(r.text.contains("<b>Attempt:</b> 3"));
        let actions: Vec<_> = r.keyboard.unwrap()[0].iter().map(|b| b.action).collect();
        assert_eq!(actions, vec![CallbackAction::Help, CallbackAction::Cancel]);
    }

    #[test]
    fn download_messages_show_kb() {
        assert!(downloading("a.pdf", Some(2048)).text.contains("a.pdf (2.0KB)"));
        assert!(download_complete("a.pdf", None).text.contains("a.pdf\n"));
    }
}
