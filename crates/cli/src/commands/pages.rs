// Page navigation commands

use crate::client::ClientError;
use crate::output::{print_field, print_table_header, print_table_row, OutputFormat};
use crate::session::Shell;
use anyhow::Result;
use bizdesk_core::{decide, GateDecision, Identity, NavigationOutcome};
use serde::{Deserialize, Serialize};

/// Page descriptor served by the API for an allowed page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageView {
    pub path: String,
    #[serde(default)]
    pub title: Option<String>,
    pub guard: String,
    #[serde(default)]
    pub viewer: Option<Identity>,
    #[serde(default)]
    pub return_to: Option<String>,
}

/// Where a navigation ended, in printable form
#[derive(Debug, Clone, Serialize)]
pub struct NavigationReport {
    pub path: String,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl From<&NavigationOutcome> for NavigationReport {
    fn from(outcome: &NavigationOutcome) -> Self {
        let (label, title) = match outcome {
            NavigationOutcome::NotFound { .. } => ("not_found", None),
            NavigationOutcome::Pending { .. } => ("pending", None),
            NavigationOutcome::Render { route, .. } => ("render", route.title.clone()),
            NavigationOutcome::Redirect { .. } => ("redirect", None),
        };
        Self {
            path: outcome.path().to_string(),
            outcome: label,
            location: outcome.location().map(str::to_string),
            title,
        }
    }
}

pub fn print_outcome(outcome: &NavigationOutcome, output: OutputFormat) -> Result<()> {
    let report = NavigationReport::from(outcome);
    if !output.is_text() {
        return output.print_value(&report);
    }

    match outcome {
        NavigationOutcome::NotFound { path } => println!("No page at {}", path),
        NavigationOutcome::Pending { path } => println!("Session still loading, {} not decided", path),
        NavigationOutcome::Render { path, route } => {
            print_field("Page", path);
            print_field("Title", route.title.as_deref().unwrap_or("-"));
            print_field("Access", &route.guard.to_string());
        }
        NavigationOutcome::Redirect { path, location, .. } => {
            println!("{} -> {}", path, location);
        }
    }
    Ok(())
}

/// Open a page: decide locally, then load it from the server when allowed.
pub async fn open(shell: &Shell, output: OutputFormat, path: &str) -> Result<()> {
    let outcome = shell.open(path).await;
    if !outcome.is_render() {
        return print_outcome(&outcome, output);
    }

    let page: PageView = match shell.authorized_client().get(path).await {
        Ok(page) => page,
        Err(ClientError::NotFound) => anyhow::bail!("Server has no page at {}", path),
        Err(e) => return Err(e.into()),
    };

    if page.path != outcome.path().split(['?', '#']).next().unwrap_or_default() {
        tracing::warn!(requested = path, served = %page.path, "Server redirected the page");
    }

    if output.is_text() {
        print_field("Page", &page.path);
        print_field("Title", page.title.as_deref().unwrap_or("-"));
        print_field("Access", &page.guard);
        if let Some(viewer) = &page.viewer {
            print_field("Viewer", &format!("{} ({})", viewer.username, viewer.role));
        }
        Ok(())
    } else {
        output.print_value(&page)
    }
}

#[derive(Debug, Serialize)]
struct RouteAccess {
    path: String,
    title: Option<String>,
    guard: String,
    access: String,
}

fn describe(decision: &GateDecision) -> String {
    match decision {
        GateDecision::Render => "allowed".to_string(),
        GateDecision::Pending => "pending".to_string(),
        other => format!("-> {}", other.location().unwrap_or_default()),
    }
}

/// List declared routes and what the current session gets for each.
pub async fn routes(shell: &Shell, output: OutputFormat) -> Result<()> {
    let state = shell.navigator().store().ready().await;
    let rows: Vec<RouteAccess> = shell
        .navigator()
        .routes()
        .iter()
        .map(|route| RouteAccess {
            path: route.path.clone(),
            title: route.title.clone(),
            guard: route.guard.to_string(),
            access: describe(&decide(&state, &route.guard, &route.path)),
        })
        .collect();

    if !output.is_text() {
        return output.print_value(&rows);
    }

    print_table_header(&[("PATH", 16), ("TITLE", 16), ("GUARD", 36), ("ACCESS", 28)]);
    for row in &rows {
        print_table_row(&[
            (&row.path, 16),
            (row.title.as_deref().unwrap_or("-"), 16),
            (&row.guard, 36),
            (&row.access, 28),
        ]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bizdesk_core::{RouteDeclaration, RouteGuard};

    #[test]
    fn test_report_carries_redirect_location() {
        let outcome = NavigationOutcome::Redirect {
            path: "/cash-flow".to_string(),
            location: "/unauthorized".to_string(),
            decision: GateDecision::RedirectToUnauthorized,
        };
        let report = NavigationReport::from(&outcome);
        assert_eq!(report.outcome, "redirect");
        assert_eq!(report.location.as_deref(), Some("/unauthorized"));

        let rendered = NavigationOutcome::Render {
            path: "/".to_string(),
            route: RouteDeclaration::new("/", RouteGuard::Authenticated).titled("Dashboard"),
        };
        let report = NavigationReport::from(&rendered);
        assert_eq!(report.outcome, "render");
        assert_eq!(report.title.as_deref(), Some("Dashboard"));
        assert!(report.location.is_none());
    }

    #[test]
    fn test_describe_decisions() {
        assert_eq!(describe(&GateDecision::Render), "allowed");
        assert_eq!(
            describe(&GateDecision::RedirectToUnauthorized),
            "-> /unauthorized"
        );
    }
}
