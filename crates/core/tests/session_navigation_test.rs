// Session lifecycle driving the navigator end to end.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bizdesk_core::{
    CredentialError, CredentialValidator, GateDecision, Identity, NavigationOutcome, Navigator,
    PersistedCredential, Role, RouteTable, SessionState, SessionStore,
};
use tokio::sync::Notify;
use uuid::Uuid;

/// Validator that waits for a signal, then answers with a fixed outcome.
struct GatedValidator {
    release: Arc<Notify>,
    accept_as: Option<Role>,
}

#[async_trait]
impl CredentialValidator for GatedValidator {
    async fn validate(
        &self,
        _credential: &PersistedCredential,
    ) -> Result<Identity, CredentialError> {
        self.release.notified().await;
        match self.accept_as {
            Some(role) => Ok(Identity::new(Uuid::now_v7(), "restored", role)),
            None => Err(CredentialError::rejected("token revoked")),
        }
    }
}

fn navigator() -> Navigator {
    Navigator::new(
        Arc::new(SessionStore::new()),
        Arc::new(RouteTable::business_default()),
    )
}

#[tokio::test]
async fn test_pending_is_replaced_by_login_redirect_never_by_content() {
    let nav = navigator();
    let release = Arc::new(Notify::new());

    let init = {
        let store = nav.store().clone();
        let validator = GatedValidator {
            release: release.clone(),
            accept_as: None,
        };
        tokio::spawn(async move {
            store
                .init(&validator, Some(PersistedCredential::new("revoked")))
                .await
        })
    };

    // While validation is in flight every protected navigation is pending.
    for _ in 0..3 {
        tokio::task::yield_now().await;
        assert!(matches!(
            nav.navigate("/customers"),
            NavigationOutcome::Pending { .. }
        ));
    }

    let settled = {
        let nav = nav.clone();
        tokio::spawn(async move { nav.navigate_settled("/customers").await })
    };

    release.notify_one();
    assert_eq!(init.await.unwrap().unwrap(), SessionState::Anonymous);

    let outcome = settled.await.unwrap();
    assert!(!outcome.is_render());
    assert_eq!(outcome.location(), Some("/login?redirect=%2Fcustomers"));
}

#[tokio::test]
async fn test_restored_session_renders_after_settlement() {
    let nav = navigator();
    let release = Arc::new(Notify::new());
    let validator = GatedValidator {
        release: release.clone(),
        accept_as: Some(Role::Storekeeper),
    };

    let store = nav.store().clone();
    let (state, outcome) = tokio::join!(
        async {
            store
                .init(&validator, Some(PersistedCredential::new("valid")))
                .await
        },
        async {
            tokio::task::yield_now().await;
            release.notify_one();
            nav.navigate_settled("/stock/42").await
        }
    );

    assert!(state.unwrap().is_authenticated());
    assert!(outcome.is_render());
    assert_eq!(
        nav.navigate("/cash-flow").location(),
        Some("/unauthorized")
    );
}

#[tokio::test]
async fn test_anonymous_login_round_trip_returns_to_customers() {
    let nav = navigator();
    let validator = GatedValidator {
        release: Arc::new(Notify::new()),
        accept_as: None,
    };
    nav.store().init(&validator, None).await.unwrap();

    let NavigationOutcome::Redirect {
        decision: GateDecision::RedirectToLogin { return_to },
        location,
        ..
    } = nav.navigate("/customers")
    else {
        panic!("expected a login redirect");
    };
    assert_eq!(location, "/login?redirect=%2Fcustomers");
    assert_eq!(return_to.as_str(), "/customers");

    let manager = Identity::new(Uuid::now_v7(), "mina", Role::Manager);
    let outcome = nav.complete_login(manager, &return_to).unwrap();
    assert!(outcome.is_render());
    assert_eq!(outcome.path(), "/customers");
}

#[tokio::test]
async fn test_expiry_sends_the_user_back_to_login() {
    let nav = navigator();
    nav.store()
        .login(Identity::new(Uuid::now_v7(), "ana", Role::Accountant))
        .unwrap();
    assert!(nav.navigate("/cash-flow").is_render());

    assert!(nav.store().expire());
    assert_eq!(
        nav.navigate("/cash-flow").location(),
        Some("/login?redirect=%2Fcash-flow")
    );
}

#[tokio::test(start_paused = true)]
async fn test_hung_validation_fails_closed() {
    let store = Arc::new(SessionStore::new().with_validation_timeout(Duration::from_secs(2)));
    let nav = Navigator::new(store.clone(), Arc::new(RouteTable::business_default()));
    let validator = GatedValidator {
        release: Arc::new(Notify::new()),
        accept_as: Some(Role::Admin),
    };

    let state = store
        .init(&validator, Some(PersistedCredential::new("valid")))
        .await
        .unwrap();
    assert_eq!(state, SessionState::Anonymous);
    assert!(!nav.navigate("/users").is_render());
}
