//! Best-effort notification fan-out.

use std::sync::Arc;

use super::error::{NotificationError, ProviderErrorCode};
use super::message::{NotificationEvent, Recipient};
use super::provider::{
    EmailMessage, EmailProvider, HttpEmailProvider, HttpSmsProvider, LogOnlyProvider,
    SmsMessage, SmsProvider,
};
use crate::config::NotificationConfig;
use crate::{log_notify_debug, log_notify_info, log_notify_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Email,
    Sms,
}

/// A message the provider accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub channel: Channel,
    pub recipient: String,
    pub receipt_id: String,
    /// Sent through the secondary email transport.
    pub via_fallback: bool,
}

/// A message that could not be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationFailed {
    pub channel: Channel,
    pub recipient: String,
    pub error: NotificationError,
}

/// Outcome of one `dispatch` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub event: &'static str,
    pub delivered: Vec<Delivery>,
    pub failures: Vec<NotificationFailed>,
}

impl DispatchReport {
    fn new(event: &'static str) -> Self {
        Self {
            event,
            delivered: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// True when nothing failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Sends event notifications over email and SMS.
///
/// Every recipient/channel pair is attempted independently. Failures are
/// logged and recorded in the returned report; `dispatch` itself never fails.
pub struct NotificationDispatcher {
    email: Option<Arc<dyn EmailProvider>>,
    email_fallback: Option<Arc<dyn EmailProvider>>,
    sms: Option<Arc<dyn SmsProvider>>,
    fallback_on_unverified_sender: bool,
}

impl NotificationDispatcher {
    pub fn new(
        email: Option<Arc<dyn EmailProvider>>,
        sms: Option<Arc<dyn SmsProvider>>,
    ) -> Self {
        Self {
            email,
            email_fallback: None,
            sms,
            fallback_on_unverified_sender: true,
        }
    }

    /// Secondary email transport, used once when the primary reports
    /// [`ProviderErrorCode::SenderNotVerified`].
    pub fn with_email_fallback(mut self, fallback: Arc<dyn EmailProvider>) -> Self {
        self.email_fallback = Some(fallback);
        self
    }

    pub fn fallback_on_unverified_sender(mut self, enabled: bool) -> Self {
        self.fallback_on_unverified_sender = enabled;
        self
    }

    /// Log-only email and SMS.
    pub fn log_only() -> Self {
        Self::new(Some(Arc::new(LogOnlyProvider)), Some(Arc::new(LogOnlyProvider)))
    }

    /// Builds HTTP providers for every configured endpoint. When
    /// notifications are disabled everything goes to the log instead.
    pub fn from_config(config: &NotificationConfig) -> Result<Self, NotificationError> {
        if !config.enabled {
            return Ok(Self::log_only());
        }

        let email = match &config.email {
            Some(endpoint) => {
                Some(Arc::new(HttpEmailProvider::new(endpoint.clone())?) as Arc<dyn EmailProvider>)
            }
            None => None,
        };
        let sms = match &config.sms {
            Some(endpoint) => {
                Some(Arc::new(HttpSmsProvider::new(endpoint.clone())?) as Arc<dyn SmsProvider>)
            }
            None => None,
        };

        let mut dispatcher = Self::new(email, sms)
            .fallback_on_unverified_sender(config.fallback_on_unverified_sender);
        if let Some(endpoint) = &config.email_fallback {
            dispatcher = dispatcher.with_email_fallback(Arc::new(HttpEmailProvider::new(
                endpoint.clone(),
            )?));
        }
        Ok(dispatcher)
    }

    pub async fn dispatch(
        &self,
        event: &NotificationEvent,
        recipients: &[Recipient],
    ) -> DispatchReport {
        let mut report = DispatchReport::new(event.name());

        for recipient in recipients {
            if let Some(address) = &recipient.email {
                self.send_email(event, recipient, address, &mut report).await;
            }
            if let Some(number) = &recipient.phone {
                self.send_sms(event, recipient, number, &mut report).await;
            }
        }

        if report.is_clean() {
            log_notify_debug!(
                "{} for {}: {} message(s) delivered",
                report.event,
                event.referral_number,
                report.delivered.len()
            );
        } else {
            log_notify_warn!(
                "{} for {}: {} delivered, {} failed",
                report.event,
                event.referral_number,
                report.delivered.len(),
                report.failures.len()
            );
        }
        report
    }

    async fn send_email(
        &self,
        event: &NotificationEvent,
        recipient: &Recipient,
        address: &str,
        report: &mut DispatchReport,
    ) {
        let who = recipient.describe();
        let Some(primary) = &self.email else {
            record_failure(
                report,
                Channel::Email,
                who,
                NotificationError::ChannelUnavailable("email"),
            );
            return;
        };

        let message = EmailMessage {
            to: address.to_string(),
            subject: event.subject(),
            body: event.body(),
        };

        let error = match primary.send(&message).await {
            Ok(receipt) => {
                report.delivered.push(Delivery {
                    channel: Channel::Email,
                    recipient: who,
                    receipt_id: receipt.id,
                    via_fallback: false,
                });
                return;
            }
            Err(error) => error,
        };

        let fallback = self
            .email_fallback
            .as_ref()
            .filter(|_| self.fallback_on_unverified_sender)
            .filter(|_| error.code == ProviderErrorCode::SenderNotVerified);

        match fallback {
            Some(secondary) => {
                log_notify_info!(
                    "Primary email provider {} rejected the sender for {}; retrying via {}",
                    primary.name(),
                    event.referral_number,
                    secondary.name()
                );
                match secondary.send(&message).await {
                    Ok(receipt) => report.delivered.push(Delivery {
                        channel: Channel::Email,
                        recipient: who,
                        receipt_id: receipt.id,
                        via_fallback: true,
                    }),
                    Err(error) => {
                        record_failure(report, Channel::Email, who, NotificationError::Email(error))
                    }
                }
            }
            None => record_failure(report, Channel::Email, who, NotificationError::Email(error)),
        }
    }

    async fn send_sms(
        &self,
        event: &NotificationEvent,
        recipient: &Recipient,
        number: &str,
        report: &mut DispatchReport,
    ) {
        let who = recipient.describe();
        let Some(provider) = &self.sms else {
            record_failure(
                report,
                Channel::Sms,
                who,
                NotificationError::ChannelUnavailable("SMS"),
            );
            return;
        };

        let message = SmsMessage {
            to: number.to_string(),
            body: event.sms_text(),
        };
        match provider.send(&message).await {
            Ok(receipt) => report.delivered.push(Delivery {
                channel: Channel::Sms,
                recipient: who,
                receipt_id: receipt.id,
                via_fallback: false,
            }),
            Err(error) => record_failure(report, Channel::Sms, who, NotificationError::Sms(error)),
        }
    }
}

fn record_failure(
    report: &mut DispatchReport,
    channel: Channel,
    recipient: String,
    error: NotificationError,
) {
    log_notify_warn!("Notification to {} failed: {}", recipient, error);
    report.failures.push(NotificationFailed {
        channel,
        recipient,
        error,
    });
}
