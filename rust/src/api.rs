// HTTP client for the chat backend plus ingestion of its payloads.
//
// Everything the server sends is normalized here: ids become strings, the two
// online-status encodings become `Presence`, delivery flags become `DeliveryStatus`.
// Nothing downstream ever sees a raw wire value.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::render::avatar_view;
use crate::state::{
    ChatMessage, ConversationKey, DeliveryStatus, MessageSide, PeerSummary, Presence, UserRecord,
};

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8080/Umee_Chat_App";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// No usable response: connect/read failure or a non-success HTTP status.
    #[error("transport error: {0}")]
    Transport(String),
    /// A response arrived but its shape is not what the endpoint promises.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// Well-formed response reporting a business failure (bad credentials, rejected send).
    #[error("{message}")]
    Application { message: String },
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Transport(_) => "transport",
            ApiError::Protocol(_) => "protocol",
            ApiError::Application { .. } => "application",
        }
    }

    fn application(message: Option<String>, fallback: &str) -> Self {
        ApiError::Application {
            message: message
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| fallback.to_string()),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Transport(e.to_string())
    }
}

/// Result of `LoadHomeData`. `available == false` means the server had nothing to
/// show and the caller should keep whatever list it already has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadList {
    pub available: bool,
    pub threads: Vec<PeerSummary>,
}

#[derive(Debug, Clone)]
pub struct SignUpForm {
    pub mobile: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    /// JPEG bytes for the optional profile picture.
    pub avatar_jpeg: Option<Vec<u8>>,
}

#[derive(Clone, Debug)]
pub struct ChatApi {
    client: reqwest::Client,
    base_url: String,
}

impl ChatApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// One full-state retrieval of a conversation.
    pub async fn load_conversation(
        &self,
        key: &ConversationKey,
    ) -> Result<Vec<ChatMessage>, ApiError> {
        let resp = self
            .client
            .get(self.endpoint("LoadChat"))
            .query(&[
                ("logged_user_id", key.self_id.as_str()),
                ("other_user_id", key.peer_id.as_str()),
            ])
            .send()
            .await?;
        parse_conversation(&read_body(resp).await?)
    }

    /// Sends `text` to the peer. Whitespace-only text is rejected without touching
    /// the network.
    pub async fn send_message(&self, key: &ConversationKey, text: &str) -> Result<(), ApiError> {
        if text.trim().is_empty() {
            return Err(ApiError::Application {
                message: "Message is empty".to_string(),
            });
        }
        let resp = self
            .client
            .get(self.endpoint("SendChat"))
            .query(&[
                ("logged_user_id", key.self_id.as_str()),
                ("other_user_id", key.peer_id.as_str()),
                ("message", text),
            ])
            .send()
            .await?;
        parse_send_result(&read_body(resp).await?)
    }

    pub async fn load_threads(&self, self_id: &str) -> Result<ThreadList, ApiError> {
        let resp = self
            .client
            .get(self.endpoint("LoadHomeData"))
            .query(&[("id", self_id)])
            .send()
            .await?;
        parse_threads(&read_body(resp).await?, &self.base_url)
    }

    pub async fn sign_in(&self, mobile: &str, password: &str) -> Result<UserRecord, ApiError> {
        let body = SignInRequest { mobile, password };
        let resp = self
            .client
            .post(self.endpoint("SignIn"))
            .json(&body)
            .send()
            .await?;
        parse_sign_in(&read_body(resp).await?)
    }

    /// Registers a new account. Returns the server's confirmation message.
    pub async fn sign_up(&self, form: SignUpForm) -> Result<String, ApiError> {
        let mut multipart = reqwest::multipart::Form::new()
            .text("mobile", form.mobile)
            .text("firstName", form.first_name)
            .text("lastName", form.last_name)
            .text("password", form.password);
        if let Some(jpeg) = form.avatar_jpeg {
            let part = reqwest::multipart::Part::bytes(jpeg)
                .file_name("profile.jpg")
                .mime_str("image/jpg")?;
            multipart = multipart.part("profileImage", part);
        }
        let resp = self
            .client
            .post(self.endpoint("SignUp"))
            .multipart(multipart)
            .send()
            .await?;
        parse_sign_up(&read_body(resp).await?)
    }

    /// Avatar initials registered for `mobile`, shown on the sign-in screen.
    pub async fn lookup_initials(&self, mobile: &str) -> Result<String, ApiError> {
        let resp = self
            .client
            .get(self.endpoint("GetLetters"))
            .query(&[("mobile", mobile)])
            .send()
            .await?;
        let body: LettersResponse = decode(&read_body(resp).await?)?;
        Ok(body.letters)
    }
}

async fn read_body(resp: reqwest::Response) -> Result<Vec<u8>, ApiError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(ApiError::Transport(format!("http status {status}")));
    }
    Ok(resp.bytes().await?.to_vec())
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(bytes).map_err(|e| ApiError::Protocol(e.to_string()))
}

// ── Wire shapes ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct SignInRequest<'a> {
    mobile: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct WireChatMessage {
    message: String,
    side: String,
    #[serde(default)]
    datetime: String,
    #[serde(default)]
    status: Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ConversationPayload {
    Bare(Vec<WireChatMessage>),
    Wrapped { messages: Vec<WireChatMessage> },
}

#[derive(Debug, Deserialize)]
struct WireHomeData {
    #[serde(default, deserialize_with = "de_flag")]
    message: bool,
    #[serde(default, rename = "jsonChatArray")]
    json_chat_array: Vec<WireThread>,
}

#[derive(Debug, Deserialize)]
struct WireThread {
    #[serde(deserialize_with = "de_id")]
    other_user_id: String,
    #[serde(default)]
    other_user_name: String,
    #[serde(default)]
    other_user_mobile: String,
    #[serde(default)]
    other_user_status: Value,
    #[serde(default)]
    other_user_avatar_letters: String,
    #[serde(default, deserialize_with = "de_flag")]
    avatar_image_found: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    time: String,
}

#[derive(Debug, Deserialize)]
struct WireSendResult {
    #[serde(default, deserialize_with = "de_flag")]
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireSignIn {
    #[serde(default, deserialize_with = "de_flag")]
    success: bool,
    #[serde(default)]
    user: Option<UserRecord>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireSignUp {
    #[serde(default, alias = "Success", deserialize_with = "de_flag")]
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LettersResponse {
    #[serde(default)]
    letters: String,
}

// ── Ingestion ───────────────────────────────────────────────────────────────

pub(crate) fn parse_conversation(bytes: &[u8]) -> Result<Vec<ChatMessage>, ApiError> {
    let messages = match decode::<ConversationPayload>(bytes)? {
        ConversationPayload::Bare(m) => m,
        ConversationPayload::Wrapped { messages } => messages,
    };
    Ok(messages.into_iter().map(ingest_message).collect())
}

fn ingest_message(wire: WireChatMessage) -> ChatMessage {
    let side = side_from_wire(&wire.side);
    let delivery = match side {
        MessageSide::Mine => Some(delivery_from_wire(&wire.status)),
        MessageSide::Theirs => None,
    };
    ChatMessage {
        text: wire.message,
        side,
        sent_at: wire.datetime,
        delivery,
    }
}

pub(crate) fn parse_threads(bytes: &[u8], base_url: &str) -> Result<ThreadList, ApiError> {
    let home: WireHomeData = decode(bytes)?;
    let threads = home
        .json_chat_array
        .into_iter()
        .map(|t| PeerSummary {
            avatar: avatar_view(
                t.avatar_image_found,
                &t.other_user_mobile,
                &t.other_user_avatar_letters,
                base_url,
            ),
            presence: presence_from_wire(&t.other_user_status),
            peer_id: t.other_user_id,
            display_name: t.other_user_name,
            initials: t.other_user_avatar_letters,
            mobile: t.other_user_mobile,
            last_message: t.message,
            last_activity: t.time,
        })
        .collect();
    Ok(ThreadList {
        available: home.message,
        threads,
    })
}

pub(crate) fn parse_send_result(bytes: &[u8]) -> Result<(), ApiError> {
    let result: WireSendResult = decode(bytes)?;
    if result.success {
        Ok(())
    } else {
        Err(ApiError::application(result.message, "Message was not sent"))
    }
}

pub(crate) fn parse_sign_in(bytes: &[u8]) -> Result<UserRecord, ApiError> {
    let result: WireSignIn = decode(bytes)?;
    match (result.success, result.user) {
        (true, Some(user)) => Ok(user),
        (true, None) => Err(ApiError::Protocol(
            "sign in succeeded without a user record".to_string(),
        )),
        (false, _) => Err(ApiError::application(result.message, "Sign in failed")),
    }
}

pub(crate) fn parse_sign_up(bytes: &[u8]) -> Result<String, ApiError> {
    let result: WireSignUp = decode(bytes)?;
    if result.success {
        Ok(result.message.unwrap_or_default())
    } else {
        Err(ApiError::application(result.message, "Sign up failed"))
    }
}

fn side_from_wire(raw: &str) -> MessageSide {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("right") || raw.eq_ignore_ascii_case("mine") {
        MessageSide::Mine
    } else {
        MessageSide::Theirs
    }
}

/// `"1"` and `1` both mean "on". The chat wire sends strings, the thread list numbers.
fn flag_is_on(raw: &Value) -> bool {
    match raw {
        Value::String(s) => s.trim() == "1",
        Value::Number(n) => n.as_i64() == Some(1),
        Value::Bool(b) => *b,
        _ => false,
    }
}

pub(crate) fn presence_from_wire(raw: &Value) -> Presence {
    if flag_is_on(raw) {
        Presence::Online
    } else {
        Presence::Offline
    }
}

pub(crate) fn delivery_from_wire(raw: &Value) -> DeliveryStatus {
    if flag_is_on(raw) {
        DeliveryStatus::Delivered
    } else {
        DeliveryStatus::Sent
    }
}

/// Accepts ids sent as JSON numbers or strings.
pub(crate) fn de_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

/// Accepts booleans, `"true"`/`"false"`, and `1`/`"1"` style flags.
pub(crate) fn de_flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    let raw = Value::deserialize(d)?;
    Ok(match &raw {
        Value::String(s) => s.trim().eq_ignore_ascii_case("true") || flag_is_on(&raw),
        _ => flag_is_on(&raw),
    })
}
