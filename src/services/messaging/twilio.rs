use anyhow::Context;
use async_trait::async_trait;

use super::{CustomerNotice, MessagingProvider};

/// Sends customer notices as SMS through the Twilio Messages API.
pub struct TwilioSmsProvider {
    account_sid: String,
    auth_token: String,
    from_number: String,
    client: reqwest::Client,
}

impl TwilioSmsProvider {
    pub fn new(account_sid: String, auth_token: String, from_number: String) -> Self {
        Self {
            account_sid,
            auth_token,
            from_number,
            client: reqwest::Client::new(),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        )
    }

    fn form<'a>(&'a self, notice: &'a CustomerNotice) -> [(&'static str, &'a str); 3] {
        [
            ("To", notice.phone.as_str()),
            ("From", self.from_number.as_str()),
            ("Body", notice.body.as_str()),
        ]
    }
}

#[async_trait]
impl MessagingProvider for TwilioSmsProvider {
    async fn send(&self, notice: &CustomerNotice) -> anyhow::Result<()> {
        if notice.phone.trim().is_empty() {
            tracing::debug!(booking_id = %notice.booking_id, "no customer phone on booking, notice skipped");
            return Ok(());
        }

        self.client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&self.form(notice))
            .send()
            .await
            .context("failed to send booking notice over Twilio")?
            .error_for_status()
            .context("Twilio API returned error")?;

        tracing::debug!(booking_id = %notice.booking_id, kind = ?notice.kind, "booking notice sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::messaging::NoticeKind;

    #[test]
    fn test_request_shape() {
        let provider = TwilioSmsProvider::new("AC123".into(), "secret".into(), "+15550000000".into());
        let notice = CustomerNotice {
            kind: NoticeKind::RefundInfo,
            booking_id: "bk-1".into(),
            phone: "+15551110000".into(),
            body: "refund".into(),
        };
        assert_eq!(
            provider.messages_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
        assert_eq!(
            provider.form(&notice),
            [("To", "+15551110000"), ("From", "+15550000000"), ("Body", "refund")]
        );
    }

    #[tokio::test]
    async fn test_missing_phone_is_skipped() {
        let provider = TwilioSmsProvider::new("AC123".into(), "secret".into(), "+15550000000".into());
        let notice = CustomerNotice {
            kind: NoticeKind::BookingConfirmed,
            booking_id: "bk-1".into(),
            phone: String::new(),
            body: "hi".into(),
        };
        assert!(provider.send(&notice).await.is_ok());
    }
}
