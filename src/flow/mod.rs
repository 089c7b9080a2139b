//! # 流程层
//!
//! 注册流程的页面对象与端到端校验入口。只描述"哪个元素做什么"，等待与
//! 重试全部由下层的动作执行器承担。

pub mod signup;

pub use signup::{ConfirmationPage, SignupDetails, SignupPage};

use tracing::info;

use crate::action::ActionExecutor;
use crate::session::SessionRegistry;
use crate::Result;

/// Drive the whole signup verification for one worker.
///
/// The session is scoped: it is released on every exit path, including
/// when any step fails.
pub async fn verify_signup(
    registry: &SessionRegistry,
    executor: &ActionExecutor,
    worker_id: &str,
    details: &SignupDetails,
) -> Result<()> {
    let url = registry.config().signup_url();
    let kind = registry.config().browser;
    let details = details.clone();

    registry
        .scoped(worker_id, kind, |session| async move {
            let page = SignupPage::open(executor, &session, &url).await?;
            page.fill(&details).await?;
            let confirmation = page.submit().await?;
            confirmation.verify_account_email(&details.email).await?;
            info!("Signup verified for {}", details.email);
            Ok(())
        })
        .await
}
