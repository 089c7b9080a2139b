//! Signup flow page objects
//!
//! Thin fluent layer over the action executor. All synchronization lives
//! below; these methods just say which element does what, by semantic
//! name.

use tracing::info;
use uuid::Uuid;

use crate::action::ActionExecutor;
use crate::locators;
use crate::poll::Condition;
use crate::session::Session;
use crate::{Error, Result};

/// Account details the flow signs up with
#[derive(Debug, Clone)]
pub struct SignupDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub subscribe_newsletter: bool,
}

impl SignupDetails {
    /// Fresh details with a unique email, so repeated runs never collide
    pub fn generated() -> Self {
        let token = Uuid::new_v4().simple().to_string();
        Self {
            first_name: "Ada".to_string(),
            last_name: "Probe".to_string(),
            email: format!("probe-{}@example.com", &token[..12]),
            password: format!("Pw!{}", &token[..16]),
            subscribe_newsletter: false,
        }
    }
}

/// The signup form
pub struct SignupPage<'a> {
    executor: &'a ActionExecutor,
    session: &'a Session,
}

impl<'a> SignupPage<'a> {
    /// Navigate to the signup URL and wait for the form to render
    pub async fn open(
        executor: &'a ActionExecutor,
        session: &'a Session,
        url: &str,
    ) -> Result<SignupPage<'a>> {
        info!("Opening signup page at {}", url);
        executor.goto(session, url).await?;
        executor
            .wait_until(session, &Condition::visible(locators::selector("signup.email")?))
            .await?;
        Ok(Self { executor, session })
    }

    /// Fill every account field
    pub async fn fill(&self, details: &SignupDetails) -> Result<&Self> {
        let fields = [
            ("signup.first_name", details.first_name.as_str()),
            ("signup.last_name", details.last_name.as_str()),
            ("signup.email", details.email.as_str()),
            ("signup.password", details.password.as_str()),
            ("signup.confirm_password", details.password.as_str()),
        ];

        for (name, value) in fields {
            self.executor
                .type_text(self.session, locators::selector(name)?, value)
                .await?;
        }

        self.executor
            .toggle(self.session, locators::selector("signup.terms_checkbox")?)
            .await?;

        if details.subscribe_newsletter {
            self.executor
                .toggle(
                    self.session,
                    locators::selector("signup.newsletter_checkbox")?,
                )
                .await?;
        }

        Ok(self)
    }

    /// Submit the form, wait out the loading indicator, and land on the
    /// confirmation page.
    pub async fn submit(self) -> Result<ConfirmationPage<'a>> {
        self.executor
            .click(self.session, locators::selector("signup.submit_button")?)
            .await?;

        // The SPA swaps views behind a spinner; wait for it to leave
        // before asserting anything about the next page.
        self.executor
            .wait_until(
                self.session,
                &Condition::absent(locators::selector("signup.loading_spinner")?),
            )
            .await?;
        self.executor
            .wait_until(
                self.session,
                &Condition::visible(locators::selector("confirmation.heading")?),
            )
            .await?;

        Ok(ConfirmationPage {
            executor: self.executor,
            session: self.session,
        })
    }
}

/// The post-signup confirmation page
pub struct ConfirmationPage<'a> {
    executor: &'a ActionExecutor,
    session: &'a Session,
}

impl ConfirmationPage<'_> {
    /// Heading text of the confirmation view
    pub async fn heading(&self) -> Result<String> {
        self.executor
            .read_text(self.session, locators::selector("confirmation.heading")?)
            .await
    }

    /// Verify the account was created for the email we signed up with
    pub async fn verify_account_email(&self, expected: &str) -> Result<()> {
        let shown = self
            .executor
            .read_text(
                self.session,
                locators::selector("confirmation.account_email")?,
            )
            .await?;

        if shown != expected {
            return Err(Error::verification(format!(
                "confirmation shows '{}', signed up as '{}'",
                shown, expected
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdp::mock::{MockCdpClient, ScriptedEval};
    use crate::config::{BrowserKind, Config};
    use crate::report::RecordingSink;
    use crate::session::traits::{SessionState, SessionTransport};
    use std::sync::Arc;

    fn harness() -> (Arc<Session>, Arc<MockCdpClient>, ActionExecutor) {
        let client = Arc::new(MockCdpClient::new());
        let session = Session::new(
            "w1",
            BrowserKind::Chrome,
            true,
            SessionTransport {
                client: client.clone(),
                browser: None,
            },
        );
        session.advance(SessionState::Ready).unwrap();

        let config = Config {
            poll_interval_ms: 10,
            retry_delay_ms: 2,
            screenshot_on_failure: false,
            ..Default::default()
        };
        let executor = ActionExecutor::new(
            &config,
            Arc::new(RecordingSink::new()) as Arc<dyn crate::report::EventSink>,
        );

        (Arc::new(session), client, executor)
    }

    fn ready() -> ScriptedEval {
        ScriptedEval::Value(serde_json::json!({ "status": "satisfied" }))
    }

    fn element() -> ScriptedEval {
        ScriptedEval::Value(serde_json::json!({
            "status": "satisfied",
            "tag": "input",
            "rect": { "x": 10.0, "y": 10.0, "width": 100.0, "height": 20.0 }
        }))
    }

    fn ok() -> ScriptedEval {
        ScriptedEval::Value(serde_json::json!({ "status": "ok", "x": 60.0, "y": 20.0 }))
    }

    #[tokio::test]
    async fn test_open_navigates_and_waits_for_form() {
        let (session, client, executor) = harness();
        // Page-ready, then email field visible
        client.push_evals([ready(), element()]).await;

        let url = "https://qa.example.com/signup";
        SignupPage::open(&executor, &session, url).await.unwrap();

        assert_eq!(client.navigations().await, vec![url]);
        assert_eq!(client.eval_count(), 2);
    }

    #[tokio::test]
    async fn test_fill_types_all_fields_and_accepts_terms() {
        let (session, client, executor) = harness();
        client.push_evals([ready(), element()]).await;
        let page = SignupPage::open(&executor, &session, "https://qa.example.com/signup")
            .await
            .unwrap();

        // Five typed fields, then the terms checkbox
        for _ in 0..5 {
            client.push_evals([element(), ok()]).await;
        }
        client.push_evals([element(), ok()]).await;

        let details = SignupDetails::generated();
        page.fill(&details).await.unwrap();

        let methods = client.called_methods().await;
        let typed: usize = methods.iter().filter(|m| *m == "Input.insertText").count();
        let expected = details.first_name.len()
            + details.last_name.len()
            + details.email.len()
            + details.password.len() * 2;
        assert_eq!(typed, expected);

        // Terms checkbox clicked natively
        assert_eq!(
            methods
                .iter()
                .filter(|m| *m == "Input.dispatchMouseEvent")
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn test_submit_waits_out_spinner_then_confirms() {
        let (session, client, executor) = harness();
        client.push_evals([ready(), element()]).await;
        let page = SignupPage::open(&executor, &session, "https://qa.example.com/signup")
            .await
            .unwrap();

        client
            .push_evals([
                // Submit click
                element(),
                ok(),
                // Spinner still up once, then gone
                ScriptedEval::Value(serde_json::json!({ "status": "lingering" })),
                ScriptedEval::Value(serde_json::json!({ "status": "absent" })),
                // Confirmation heading renders
                element(),
            ])
            .await;

        let confirmation = page.submit().await.unwrap();

        // Read back the heading
        client
            .push_evals([
                element(),
                ScriptedEval::Value(serde_json::json!({ "status": "ok", "text": "You're in!" })),
            ])
            .await;
        assert_eq!(confirmation.heading().await.unwrap(), "You're in!");
    }

    #[tokio::test]
    async fn test_verify_account_email_mismatch() {
        let (session, client, executor) = harness();
        client.push_evals([ready(), element()]).await;
        let page = SignupPage::open(&executor, &session, "https://qa.example.com/signup")
            .await
            .unwrap();

        client
            .push_evals([
                element(),
                ok(),
                ScriptedEval::Value(serde_json::json!({ "status": "absent" })),
                element(),
            ])
            .await;
        let confirmation = page.submit().await.unwrap();

        client
            .push_evals([
                element(),
                ScriptedEval::Value(
                    serde_json::json!({ "status": "ok", "text": "other@example.com" }),
                ),
            ])
            .await;

        let err = confirmation
            .verify_account_email("ada@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Verification(_)));
    }

    #[test]
    fn test_generated_details_are_unique() {
        let a = SignupDetails::generated();
        let b = SignupDetails::generated();
        assert_ne!(a.email, b.email);
        assert_ne!(a.password, b.password);
    }
}
