use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{
    self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEventKind, KeyModifiers,
};
use crossterm::execute;
use tracing::debug;

use crate::error::ChatError;
use crate::i18n::{Language, MessageKey, t};
use crate::llm::{ChatMessage, Role};
use crate::session::ChatSession;

const CURSOR: &str = "▌";

struct BracketedPasteGuard;

impl BracketedPasteGuard {
    fn enable() -> Result<Self> {
        let mut stdout = io::stdout();
        execute!(stdout, EnableBracketedPaste)?;
        Ok(Self)
    }
}

impl Drop for BracketedPasteGuard {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        let _ = execute!(stdout, DisableBracketedPaste);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UiOptions {
    pub animate: bool,
    pub typing_delay: Duration,
}

#[derive(Debug, PartialEq)]
enum SlashCommand<'a> {
    Reset,
    History,
    Info,
    Help,
    Quit,
    Unknown(&'a str),
}

fn parse_command(line: &str) -> Option<SlashCommand<'_>> {
    let cmd = line.trim().strip_prefix('/')?;
    let cmd = cmd.split_whitespace().next().unwrap_or("");
    Some(match cmd {
        "reset" | "clear" => SlashCommand::Reset,
        "history" | "memory" => SlashCommand::History,
        "info" => SlashCommand::Info,
        "help" => SlashCommand::Help,
        "quit" | "exit" => SlashCommand::Quit,
        other => SlashCommand::Unknown(other),
    })
}

/// Raw mode needs explicit carriage returns.
fn crlf(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\n', "\r\n")
}

/// Word-sized pieces of a finished reply, each keeping its trailing
/// whitespace so concatenation yields the original text.
fn typing_chunks(message: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut in_space = false;
    for (idx, c) in message.char_indices() {
        if c.is_whitespace() {
            in_space = true;
        } else if in_space {
            chunks.push(&message[start..idx]);
            start = idx;
            in_space = false;
        }
    }
    if start < message.len() {
        chunks.push(&message[start..]);
    }
    chunks
}

fn prompt(buf: &str, lang: &Language) {
    let prompt_text = t(lang, MessageKey::PromptUser);
    print!("\r\x1b[2K{prompt_text}{buf}");
    io::stdout().flush().ok();
}

fn label(role: Role, lang: &Language) -> &'static str {
    match role {
        Role::System => t(lang, MessageKey::PromptSystem),
        Role::User => t(lang, MessageKey::PromptUser),
        Role::Assistant => t(lang, MessageKey::PromptAssistant),
    }
}

/// Replays the visible transcript. The persona prompt is configuration,
/// not conversation, so it is skipped.
fn replay(history: &[ChatMessage], lang: &Language) {
    for msg in history.iter().filter(|m| m.role != Role::System) {
        print!("{}{}\r\n", label(msg.role, lang), crlf(msg.content.trim()));
    }
}

fn render_assistant(message: &str, ui: &UiOptions, lang: &Language) {
    let mut stdout = io::stdout();
    print!("{}", t(lang, MessageKey::PromptAssistant));
    if !ui.animate {
        print!("{}\r\n", crlf(message.trim()));
        stdout.flush().ok();
        return;
    }

    // Simulated typing: the reply is already complete.
    for chunk in typing_chunks(message.trim()) {
        print!("{}{CURSOR}\x1b[1D", crlf(chunk));
        stdout.flush().ok();
        thread::sleep(ui.typing_delay);
    }
    print!("\x1b[K\r\n");
    stdout.flush().ok();
}

fn render_memory(session: &ChatSession, lang: &Language) {
    print!("\x1b[90m{}\r\n", t(lang, MessageKey::MemoryHeader));
    if session.history().is_empty() {
        print!("{}\r\n", t(lang, MessageKey::MemoryEmpty));
    }
    for msg in session.history() {
        let content = serde_json::to_string(msg).unwrap_or_else(|_| msg.content.clone());
        print!("{}\r\n", content);
    }
    print!("\x1b[0m");
}

fn render_info(session: &ChatSession, lang: &Language) {
    let summary = session.config_summary();
    print!(
        "\x1b[90m{}{}\r\n{}{}\x1b[0m\r\n",
        t(lang, MessageKey::ModelInUse),
        summary.model,
        t(lang, MessageKey::KeyLoaded),
        summary.key_prefix_masked
    );
}

fn render_error(err: &ChatError, lang: &Language) {
    if let ChatError::Validation(_) = err {
        print!("\x1b[90m{}\x1b[0m\r\n", t(lang, MessageKey::EmptyInput));
        return;
    }
    let notice = if err.is_recoverable() {
        t(lang, MessageKey::AssistantFailed)
    } else {
        t(lang, MessageKey::ConfigurationFailed)
    };
    print!("\x1b[31m{notice}{err}\x1b[0m\r\n");
}

fn submit(session: &mut ChatSession, line: &str, ui: &UiOptions, lang: &Language) {
    print!("\x1b[90m{}\x1b[0m", t(lang, MessageKey::Thinking));
    io::stdout().flush().ok();

    let result = session.submit_user_message(line);
    print!("\r\x1b[2K");

    match result {
        Ok(reply) => render_assistant(&reply.content, ui, lang),
        Err(err) => render_error(&err, lang),
    }
}

/// Runs the chat loop until Ctrl+C or `/quit`.
pub fn chat_mode(session: &mut ChatSession, ui: &UiOptions, lang: &Language) -> Result<()> {
    let welcome = t(lang, MessageKey::WelcomeMessage);
    let bot = t(lang, MessageKey::BotInUse);
    print!(
        "\r\n\x1b[2K{welcome}\r\n{bot}\x1b[36m{}\x1b[0m\r\n",
        session.persona_name()
    );
    replay(session.history(), lang);

    let _paste_guard = BracketedPasteGuard::enable()?;
    let mut buf = String::new();

    prompt(&buf, lang);

    loop {
        let evt = event::read()?;
        match evt {
            Event::Key(key) => {
                if !matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
                    continue;
                }
                match key.code {
                    KeyCode::Enter => {
                        print!("\r\n");
                        io::stdout().flush().ok();

                        let line = buf.trim_end().to_string();
                        buf.clear();

                        match parse_command(&line) {
                            Some(SlashCommand::Quit) => return Ok(()),
                            Some(SlashCommand::Reset) => {
                                session.reset();
                                print!("\x1b[90m{}\x1b[0m\r\n", t(lang, MessageKey::ConversationReset));
                            }
                            Some(SlashCommand::History) => render_memory(session, lang),
                            Some(SlashCommand::Info) => render_info(session, lang),
                            Some(SlashCommand::Help) => {
                                print!("\x1b[90m{}\x1b[0m\r\n", t(lang, MessageKey::Help));
                            }
                            Some(SlashCommand::Unknown(cmd)) => {
                                print!("{}/{cmd}\r\n", t(lang, MessageKey::UnknownCommand));
                            }
                            None => {
                                debug!(chars = line.len(), "user submitted message");
                                submit(session, &line, ui, lang);
                            }
                        }

                        prompt(&buf, lang);
                    }
                    KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        session.reset();
                        print!(
                            "\r\x1b[2K\x1b[90m{}\x1b[0m\r\n",
                            t(lang, MessageKey::ConversationReset)
                        );
                        prompt(&buf, lang);
                    }
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        print!("\r\n");
                        return Ok(());
                    }
                    KeyCode::Backspace => {
                        if !buf.is_empty() {
                            buf.pop();
                            prompt(&buf, lang);
                        }
                    }
                    KeyCode::Char(c) => {
                        buf.push(c);
                        prompt(&buf, lang);
                    }
                    _ => {}
                }
            }
            Event::Paste(pasted) => {
                let normalized = pasted.replace(['\r', '\n'], " ");
                buf.push_str(&normalized);
                prompt(&buf, lang);
            }
            _ => {}
        }
    }
}
