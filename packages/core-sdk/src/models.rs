use serde::{Deserialize, Serialize};

/**
 * \brief 消息角色，仅允许 system/user/assistant 三种取值。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/**
 * \brief 消息结构，与 OpenAI Chat 消息格式对齐。
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /** \brief 角色 */
    pub role: Role,
    /** \brief 内容（允许为空字符串） */
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/**
 * \brief POST /api/chat 请求体。
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /** \brief 按会话顺序排列的消息 */
    pub messages: Vec<ChatMessage>,
    /** \brief 模型覆盖，缺省时使用进程默认模型 */
    #[serde(default)]
    pub model: Option<String>,
}

/**
 * \brief POST /api/chat 成功响应体。
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
}

/**
 * \brief 失败响应体，所有错误统一为 { "detail": ... }。
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub detail: String,
}
