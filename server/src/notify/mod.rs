use crate::config::Config;
use ::agora_protocol::model::ids::UserId;
use ::anyhow::Result;

pub mod noop;
pub mod recording;
pub mod webhook;

#[derive(::serde::Serialize, ::serde::Deserialize, PartialEq, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub event_kind: String,
    pub category: String,
    pub recipients: Vec<UserId>,
    pub title_template: String,
    pub actor_name: String,
    pub payload: ::serde_json::Value,
}

/// Fire and forget delivery. Implementations never report failure to the
/// caller.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: NotificationEvent);
}

pub fn make_provider(config: &Config) -> Result<::std::sync::Arc<dyn Notifier>> {
    match config.notification_interface.as_str() {
        "webhook" => {
            if let Some(url) = config.notification_webhook_url.clone() {
                ::log::info!("Notifications delivered to {}", url);
                Ok(::std::sync::Arc::new(webhook::WebhookNotifier::new(
                    ::url::Url::parse(&url)?,
                )))
            } else {
                Err(anyhow::anyhow!(
                    "Missing notification webhook URL configuration"
                ))
            }
        }
        "noop" => {
            ::log::info!("No notification provider selected");
            Ok(::std::sync::Arc::new(noop::NoopNotifier::new()))
        }
        interface => Err(anyhow::anyhow!(
            "Unknown notification interface: {}",
            interface
        )),
    }
}
