use cyder_tools::log::debug;

use crate::service::prefs::onboarding::{OnboardingFlags, OnboardingFlow};
use crate::service::prefs::KvError;
use crate::service::session::SessionSnapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Prompts,
    MegaPrompts,
    Tools,
    Prompt(String),
    Upload,
    Auth,
    Admin,
    About,
    Privacy,
    Terms,
    Instructions,
    Profile,
    Pricing,
    BecomeCreator,
    Creator(String),
    NotFound(String),
}

impl Route {
    /// Query string and fragment are ignored, as is a trailing slash.
    pub fn parse(path: &str) -> Route {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [] => Route::Home,
            ["prompts"] => Route::Prompts,
            ["mega-prompts"] | ["super-prompts"] => Route::MegaPrompts,
            ["tools"] => Route::Tools,
            ["prompt", id] => Route::Prompt(id.to_string()),
            ["upload"] => Route::Upload,
            ["auth"] => Route::Auth,
            ["admin"] => Route::Admin,
            ["about"] => Route::About,
            ["privacy"] => Route::Privacy,
            ["terms"] => Route::Terms,
            ["instructions"] => Route::Instructions,
            ["profile"] => Route::Profile,
            ["pricing"] => Route::Pricing,
            ["become-creator"] => Route::BecomeCreator,
            ["creator", id] => Route::Creator(id.to_string()),
            _ => Route::NotFound(path.to_string()),
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Prompts => "/prompts".to_string(),
            Route::MegaPrompts => "/mega-prompts".to_string(),
            Route::Tools => "/tools".to_string(),
            Route::Prompt(id) => format!("/prompt/{}", id),
            Route::Upload => "/upload".to_string(),
            Route::Auth => "/auth".to_string(),
            Route::Admin => "/admin".to_string(),
            Route::About => "/about".to_string(),
            Route::Privacy => "/privacy".to_string(),
            Route::Terms => "/terms".to_string(),
            Route::Instructions => "/instructions".to_string(),
            Route::Profile => "/profile".to_string(),
            Route::Pricing => "/pricing".to_string(),
            Route::BecomeCreator => "/become-creator".to_string(),
            Route::Creator(id) => format!("/creator/{}", id),
            Route::NotFound(path) => path.clone(),
        }
    }

    pub fn requires_session(&self) -> bool {
        matches!(self, Route::Upload | Route::Admin | Route::Profile | Route::BecomeCreator)
    }

    pub fn requires_admin(&self) -> bool {
        matches!(self, Route::Admin)
    }

    /// Page-specific introduction shown once per device.
    pub fn onboarding_flow(&self) -> Option<OnboardingFlow> {
        match self {
            Route::Upload => Some(OnboardingFlow::Upload),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Render(Route),
    /// Show the flow first, then continue to `then`.
    Onboarding { flow: OnboardingFlow, then: Route },
    Redirect(Route),
}

pub fn resolve_navigation(
    path: &str,
    session: &SessionSnapshot,
    flags: &OnboardingFlags,
) -> Result<Navigation, KvError> {
    let route = Route::parse(path);
    if !flags.has_seen(OnboardingFlow::Welcome)? {
        debug!("first visit, showing welcome before {}", route.path());
        return Ok(Navigation::Onboarding { flow: OnboardingFlow::Welcome, then: route });
    }
    if route.requires_session() && !session.is_signed_in() {
        return Ok(Navigation::Redirect(Route::Auth));
    }
    if route.requires_admin() && !session.is_admin() {
        return Ok(Navigation::Redirect(Route::Home));
    }
    if let Some(flow) = route.onboarding_flow() {
        if !flags.has_seen(flow)? {
            return Ok(Navigation::Onboarding { flow, then: route });
        }
    }
    Ok(Navigation::Render(route))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SharedToken;
    use crate::service::prefs::MemoryKv;
    use crate::service::session::tests::{context, seeded_store};
    use std::sync::Arc;

    #[test]
    fn test_parse_and_path() {
        assert_eq!(Route::parse("/"), Route::Home);
        assert_eq!(Route::parse(""), Route::Home);
        assert_eq!(Route::parse("/super-prompts"), Route::MegaPrompts);
        assert_eq!(Route::parse("/mega-prompts/"), Route::MegaPrompts);
        assert_eq!(Route::parse("/prompt/abc?ref=home#top"), Route::Prompt("abc".to_string()));
        assert_eq!(Route::parse("/creator/c1").path(), "/creator/c1");
        assert_eq!(Route::parse("/prompt"), Route::NotFound("/prompt".to_string()));
        assert_eq!(Route::parse("/nope/x").path(), "/nope/x");
        assert_eq!(Route::MegaPrompts.path(), "/mega-prompts");
    }

    #[test]
    fn test_guards() {
        assert!(Route::Upload.requires_session());
        assert!(!Route::Pricing.requires_session());
        assert!(Route::Admin.requires_admin());
        assert!(!Route::Profile.requires_admin());
    }

    #[tokio::test]
    async fn test_first_visit_goes_through_welcome() {
        let flags = OnboardingFlags::new(Arc::new(MemoryKv::new()));
        let signed_out = SessionSnapshot::default();

        let nav = resolve_navigation("/pricing", &signed_out, &flags).unwrap();
        assert_eq!(nav, Navigation::Onboarding { flow: OnboardingFlow::Welcome, then: Route::Pricing });

        flags.mark_seen(OnboardingFlow::Welcome).unwrap();
        assert_eq!(resolve_navigation("/pricing", &signed_out, &flags).unwrap(), Navigation::Render(Route::Pricing));
        assert_eq!(resolve_navigation("/upload", &signed_out, &flags).unwrap(), Navigation::Redirect(Route::Auth));
    }

    #[tokio::test]
    async fn test_admin_and_upload_gates() {
        let flags = OnboardingFlags::new(Arc::new(MemoryKv::new()));
        flags.mark_seen(OnboardingFlow::Welcome).unwrap();

        let session = context(seeded_store(), SharedToken::default());
        session.sign_in("bo@test", "password").await.unwrap();
        let bo = session.snapshot();
        assert_eq!(resolve_navigation("/admin", &bo, &flags).unwrap(), Navigation::Redirect(Route::Home));
        assert_eq!(
            resolve_navigation("/upload", &bo, &flags).unwrap(),
            Navigation::Onboarding { flow: OnboardingFlow::Upload, then: Route::Upload }
        );
        flags.mark_seen(OnboardingFlow::Upload).unwrap();
        assert_eq!(resolve_navigation("/upload", &bo, &flags).unwrap(), Navigation::Render(Route::Upload));

        session.sign_in("ana@test", "password").await.unwrap();
        assert_eq!(
            resolve_navigation("/admin", &session.snapshot(), &flags).unwrap(),
            Navigation::Render(Route::Admin)
        );
    }
}
