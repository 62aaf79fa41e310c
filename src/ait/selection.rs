use crate::types::{AitEvent, ApplicationEntry, HbbTvAppUrl, NoUrlReason};

/// Reduces one AIT's application list to a single outcome.
///
/// Only HTTP entries with a usable URL are eligible. The first autostart
/// entry in broadcast order wins; without one, the first eligible entry.
pub fn select_application(apps: &[ApplicationEntry]) -> AitEvent {
    if apps.is_empty() {
        return AitEvent::PresentButNoUrl {
            reason: NoUrlReason::NoApplications,
        };
    }

    let eligible: Vec<(&ApplicationEntry, String)> = apps
        .iter()
        .filter(|a| a.is_http())
        .filter_map(|a| a.url().map(|url| (a, url)))
        .collect();

    let chosen = eligible
        .iter()
        .find(|(a, _)| a.autostart())
        .or_else(|| eligible.first());

    match chosen {
        Some((app, url)) => AitEvent::UrlFound(HbbTvAppUrl {
            url: url.clone(),
            autostart: app.autostart(),
            app_id: app.application_id,
            org_id: app.organisation_id,
        }),
        None => AitEvent::PresentButNoUrl {
            reason: NoUrlReason::NoHttpApplications,
        },
    }
}
