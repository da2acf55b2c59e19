//! Account Commands
//!
//! 계정 등록/삭제

use crate::accounts;
use crate::commands::{AppContext, LoginArgs};
use crate::error::CommandResult;
use crate::models::UserAccount;

/// 계정 등록
pub fn register_account(ctx: &AppContext, args: &LoginArgs) -> CommandResult<UserAccount> {
    Ok(accounts::register(&ctx.db, &args.email, &args.password)?)
}

/// 계정 삭제 (저장된 시크릿도 함께 삭제)
pub fn delete_account(ctx: &AppContext, args: &LoginArgs) -> CommandResult<()> {
    let account = ctx.login(args)?;
    ctx.db.delete_user(&account.id)?;
    tracing::info!(account_id = %account.id, "Account deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{context, login};

    #[test]
    fn test_register_and_delete() {
        let ctx = context("MAILWISE_TEST_KEY_ACCOUNT_CMD");
        let account = register_account(&ctx, &login("ana@example.com")).unwrap();
        assert_eq!(account.email, "ana@example.com");

        let dup = register_account(&ctx, &login("ana@example.com")).unwrap_err();
        assert_eq!(dup.code, "ACCOUNT_EXISTS");

        let mut wrong = login("ana@example.com");
        wrong.password = "nope".to_string();
        assert_eq!(delete_account(&ctx, &wrong).unwrap_err().code, "INVALID_CREDENTIALS");

        delete_account(&ctx, &login("ana@example.com")).unwrap();
        assert!(ctx.db.find_user_by_email("ana@example.com").unwrap().is_none());
    }
}
