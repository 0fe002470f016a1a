/// 알림 발행
/// 메일 발송은 외부 메일러 서비스가 담당한다. 본 서비스는 커밋 이후
/// "notifications" 토픽에 메시지를 올리기만 하고, 실패해도 업무 흐름을 막지 않는다.
// region:    --- Imports
use crate::message_broker::KafkaProducer;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::error;

// endregion: --- Imports

// region:    --- Notification Message
pub const NOTIFICATIONS_TOPIC: &str = "notifications";

/// 메일러가 쓰는 템플릿 키. 토픽을 공유하는 서비스 전체의 계약이라
/// 본 서비스가 보내지 않는 키(newQuestion, newAnswer)도 함께 정의한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TemplateKey {
    AuctionWon,
    ProductSold,
    AuctionExpired,
    BannedNotification,
    ProductUpdate,
    NewQuestion,
    NewAnswer,
}

/// 알림 메시지 wire 형식
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub to_user_id: i64,
    pub template: TemplateKey,
    pub subject: String,
    pub payload: Value,
}
// endregion: --- Notification Message

// region:    --- Notifier
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: NotificationMessage) -> Result<(), String>;
}

/// Kafka 토픽으로 알림을 올리는 기본 구현
pub struct KafkaNotifier {
    producer: Arc<KafkaProducer>,
}

impl KafkaNotifier {
    pub fn new(producer: Arc<KafkaProducer>) -> Self {
        Self { producer }
    }
}

#[async_trait]
impl Notifier for KafkaNotifier {
    async fn notify(&self, message: NotificationMessage) -> Result<(), String> {
        let value = serde_json::to_string(&message).map_err(|e| e.to_string())?;
        self.producer
            .send_message(NOTIFICATIONS_TOPIC, &message.to_user_id.to_string(), &value)
            .await
    }
}

/// 커밋 이후 알림 발행. 실패는 기록만 하고 업무 흐름을 막지 않는다.
pub async fn notify_best_effort(notifier: &dyn Notifier, message: NotificationMessage) {
    let to_user_id = message.to_user_id;
    let template = message.template;
    if let Err(e) = notifier.notify(message).await {
        error!(
            "{:<12} --> 알림 발행 실패: user={}, template={:?}, {}",
            "Notifier", to_user_id, template, e
        );
    }
}
// endregion: --- Notifier
