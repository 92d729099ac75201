#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum Language {
    #[default]
    En,
    Zh,
}

impl Language {
    pub fn detect(s: &str) -> Self {
        let s = s.to_lowercase();
        if s.starts_with("zh") {
            Language::Zh
        } else {
            Language::En
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum MessageKey {
    WelcomeMessage,
    BotInUse,
    PromptUser,
    PromptAssistant,
    PromptSystem,
    Thinking,
    AssistantFailed,
    ConfigurationFailed,
    EmptyInput,
    ConversationReset,
    MemoryHeader,
    MemoryEmpty,
    ModelInUse,
    KeyLoaded,
    Help,
    UnknownCommand,
}

pub fn t(lang: &Language, key: MessageKey) -> &'static str {
    match (lang, key) {
        // Welcome message
        (Language::En, MessageKey::WelcomeMessage) => {
            "[chat] Type your request. /help lists commands. Ctrl+R resets. Ctrl+C exits."
        }
        (Language::Zh, MessageKey::WelcomeMessage) => {
            "[chat] 输入您的请求。/help 查看命令，Ctrl+R 重置对话，Ctrl+C 退出。"
        }

        (Language::En, MessageKey::BotInUse) => "ChatBot in use: ",
        (Language::Zh, MessageKey::BotInUse) => "当前机器人: ",

        // Transcript role labels
        (Language::En, MessageKey::PromptUser) => "you> ",
        (Language::Zh, MessageKey::PromptUser) => "你> ",
        (Language::En, MessageKey::PromptAssistant) => "assistant> ",
        (Language::Zh, MessageKey::PromptAssistant) => "助手> ",
        (Language::En, MessageKey::PromptSystem) => "system> ",
        (Language::Zh, MessageKey::PromptSystem) => "系统> ",

        (Language::En, MessageKey::Thinking) => "[Waiting for the assistant...]",
        (Language::Zh, MessageKey::Thinking) => "[等待助手回复...]",

        // Failure notices
        (Language::En, MessageKey::AssistantFailed) => {
            "The assistant did not respond. Your message was kept; press Enter on it again to retry: "
        }
        (Language::Zh, MessageKey::AssistantFailed) => "助手未能回复。您的消息已保留，可重新发送: ",
        (Language::En, MessageKey::ConfigurationFailed) => "Configuration problem: ",
        (Language::Zh, MessageKey::ConfigurationFailed) => "配置错误: ",
        (Language::En, MessageKey::EmptyInput) => "(empty message ignored)",
        (Language::Zh, MessageKey::EmptyInput) => "（已忽略空消息）",

        (Language::En, MessageKey::ConversationReset) => "--- conversation reset ---",
        (Language::Zh, MessageKey::ConversationReset) => "--- 对话已重置 ---",

        // Memory dump
        (Language::En, MessageKey::MemoryHeader) => "--- MEMORY ---",
        (Language::Zh, MessageKey::MemoryHeader) => "--- 记忆 ---",
        (Language::En, MessageKey::MemoryEmpty) => "(no messages)",
        (Language::Zh, MessageKey::MemoryEmpty) => "（暂无消息）",

        // Diagnostics
        (Language::En, MessageKey::ModelInUse) => "Model: ",
        (Language::Zh, MessageKey::ModelInUse) => "模型: ",
        (Language::En, MessageKey::KeyLoaded) => "Key loaded: ",
        (Language::Zh, MessageKey::KeyLoaded) => "已加载密钥: ",

        (Language::En, MessageKey::Help) => {
            "/reset  start over\r\n/history  show memory\r\n/info  model and key\r\n/quit  exit"
        }
        (Language::Zh, MessageKey::Help) => {
            "/reset  重新开始\r\n/history  查看记忆\r\n/info  模型与密钥\r\n/quit  退出"
        }
        (Language::En, MessageKey::UnknownCommand) => "Unknown command: ",
        (Language::Zh, MessageKey::UnknownCommand) => "未知命令: ",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_detect() {
        assert_eq!(Language::detect("zh-CN"), Language::Zh);
        assert_eq!(Language::detect("zh_CN"), Language::Zh);
        assert_eq!(Language::detect("ZH-CN"), Language::Zh);
        assert_eq!(Language::detect("en-US"), Language::En);
        assert_eq!(Language::detect("pt-BR"), Language::En);
        assert_eq!(Language::detect("unknown"), Language::En);
    }

    #[test]
    fn test_translation() {
        assert_eq!(t(&Language::En, MessageKey::PromptUser), "you> ");
        assert_eq!(t(&Language::Zh, MessageKey::PromptUser), "你> ");
        assert_eq!(t(&Language::En, MessageKey::BotInUse), "ChatBot in use: ");
    }
}
