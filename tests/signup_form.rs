use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use blockflow::error::{IdentityError, SubmitError};
use blockflow::forms::{
    COUNTRY_ERROR, GENERAL_ERROR, LoginField, LoginForm, PASSWORD_ERROR, SignupField, SignupForm,
};
use blockflow::identity::{AccountService, LocalIdentity, Principal, Session};

/// Records every call; optionally rejects them.
#[derive(Default)]
struct RecordingAccounts {
    calls: Mutex<Vec<String>>,
    reject: bool,
}

impl RecordingAccounts {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn respond(&self, call: String, principal: &str) -> Result<Session, IdentityError> {
        self.calls.lock().unwrap().push(call);
        if self.reject {
            return Err(IdentityError::Rejected("EMAIL_EXISTS".into()));
        }
        Ok(Session {
            principal: Principal::new(principal),
            id_token: Some("id-token".into()),
            anonymous: false,
        })
    }
}

#[async_trait]
impl AccountService for RecordingAccounts {
    async fn register(
        &self,
        username: &str,
        email: &str,
        _password: &str,
    ) -> Result<Session, IdentityError> {
        self.respond(format!("register {} {}", username, email), username)
    }

    async fn sign_in(&self, identifier: &str, _password: &str) -> Result<Session, IdentityError> {
        self.respond(format!("sign_in {}", identifier), identifier)
    }
}

fn filled_signup() -> SignupForm {
    SignupForm {
        username: "maker01".into(),
        email: "maker@example.org".into(),
        password: "blocks2024".into(),
        country: "Philippines".into(),
    }
}

#[tokio::test]
async fn test_invalid_signup_never_calls_service() -> Result<()> {
    let service = RecordingAccounts::default();
    let mut form = filled_signup();
    form.set(SignupField::Password, "abcdefgh");

    match form.submit(&service).await {
        Err(SubmitError::Invalid(errors)) => {
            assert_eq!(errors.get(SignupField::Password), Some(PASSWORD_ERROR));
            assert!(errors.get(SignupField::Username).is_none());
            assert!(errors.get(SignupField::Email).is_none());
            assert!(errors.get(SignupField::Country).is_none());
            assert_eq!(errors.general(), Some(GENERAL_ERROR));
        }
        other => panic!("expected validation failure, got {:?}", other),
    }
    assert!(service.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unselected_country_never_calls_service() -> Result<()> {
    let service = RecordingAccounts::default();
    let mut form = filled_signup();
    form.set(SignupField::Country, "Select");

    match form.submit(&service).await {
        Err(SubmitError::Invalid(errors)) => {
            assert_eq!(errors.get(SignupField::Country), Some(COUNTRY_ERROR));
            assert!(errors.get(SignupField::Password).is_none());
        }
        other => panic!("expected validation failure, got {:?}", other),
    }
    assert!(service.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_valid_signup_registers_once() -> Result<()> {
    let service = RecordingAccounts::default();
    let session = filled_signup().submit(&service).await?;
    assert_eq!(session.principal.id(), "maker01");
    assert_eq!(service.calls(), vec!["register maker01 maker@example.org"]);
    Ok(())
}

#[tokio::test]
async fn test_service_rejection_is_surfaced() -> Result<()> {
    let service = RecordingAccounts {
        reject: true,
        ..RecordingAccounts::default()
    };
    let err = filled_signup().submit(&service).await.unwrap_err();
    assert!(matches!(err, SubmitError::Service(IdentityError::Rejected(_))));
    assert_eq!(service.calls().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_login_validation_and_submit() -> Result<()> {
    let service = RecordingAccounts::default();
    let short = LoginForm {
        identifier: "abc".into(),
        password: "12345678".into(),
    };
    match short.submit(&service).await {
        Err(SubmitError::Invalid(errors)) => {
            assert!(errors.get(LoginField::Identifier).is_some());
            assert!(errors.get(LoginField::Password).is_none());
        }
        other => panic!("expected validation failure, got {:?}", other),
    }
    assert!(service.calls().is_empty());

    let form = LoginForm {
        identifier: "maker@example.org".into(),
        password: "12345678".into(),
    };
    let session = form.submit(&service).await?;
    assert_eq!(session.principal.id(), "maker@example.org");
    assert_eq!(service.calls(), vec!["sign_in maker@example.org"]);
    Ok(())
}

#[tokio::test]
async fn test_local_accounts_accept_valid_forms() -> Result<()> {
    let session = filled_signup().submit(&LocalIdentity).await?;
    assert_eq!(session.principal.id(), "maker01");
    assert!(!session.anonymous);
    Ok(())
}
