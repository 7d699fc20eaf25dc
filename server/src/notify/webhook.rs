use crate::notify::{NotificationEvent, Notifier};

/// Posts each notification as JSON to a fixed URL from a spawned task.
pub struct WebhookNotifier {
    client: ::reqwest::Client,
    url: ::url::Url,
}

impl WebhookNotifier {
    pub fn new(url: ::url::Url) -> Self {
        Self {
            client: ::reqwest::Client::new(),
            url,
        }
    }
}

pub(crate) async fn deliver(
    client: &::reqwest::Client,
    url: &::url::Url,
    event: &NotificationEvent,
) -> ::anyhow::Result<()> {
    let op = || async {
        let result = client.post(url.clone()).json(event).send().await;

        match result {
            Ok(response) => {
                if response.status().is_client_error() {
                    Err(::backoff::Error::permanent(::anyhow::anyhow!(
                        "notification rejected with {}",
                        response.status()
                    )))
                } else if !response.status().is_success() {
                    ::log::warn!(
                        "temporary notification failure with status {:?}",
                        response.status(),
                    );

                    Err(::backoff::Error::transient(::anyhow::Error::msg(
                        "bad code",
                    )))
                } else {
                    Ok(())
                }
            }
            Err(err) => Err(::backoff::Error::transient(
                ::anyhow::Error::from(err),
            )),
        }
    };

    let backoff = ::backoff::ExponentialBackoff {
        max_elapsed_time: Some(::std::time::Duration::from_secs(60)),
        ..Default::default()
    };

    ::backoff::future::retry(backoff, op).await
}

impl Notifier for WebhookNotifier {
    fn notify(&self, event: NotificationEvent) {
        let client = self.client.clone();
        let url = self.url.clone();

        ::tokio::spawn(async move {
            if let Err(err) = deliver(&client, &url, &event).await {
                ::log::warn!(
                    "dropping notification {} after failure: {:?}",
                    event.event_kind,
                    err
                );
            }
        });
    }
}
