//! Installed app listing: search and alphabetical sections

use blockade_api::InstalledApp;

/// Apps whose label or package contains `query`, ignoring case.
///
/// An empty or missing query matches everything.
pub fn filter_apps<'a>(apps: &'a [InstalledApp], query: Option<&str>) -> Vec<&'a InstalledApp> {
    let query = query.map(str::trim).unwrap_or_default().to_lowercase();

    apps.iter()
        .filter(|app| {
            query.is_empty()
                || app.label.to_lowercase().contains(&query)
                || app.package.as_str().to_lowercase().contains(&query)
        })
        .collect()
}

/// Sort by label and group under each label's section letter
pub fn sections<'a>(mut apps: Vec<&'a InstalledApp>) -> Vec<(char, Vec<&'a InstalledApp>)> {
    apps.sort_by(|a, b| {
        a.label
            .to_lowercase()
            .cmp(&b.label.to_lowercase())
            .then_with(|| a.package.cmp(&b.package))
    });

    let mut sections: Vec<(char, Vec<&InstalledApp>)> = Vec::new();
    let mut other = Vec::new();
    for app in apps {
        let key = app.section_key();
        if key == '#' {
            other.push(app);
            continue;
        }
        match sections.last_mut() {
            Some((last, group)) if *last == key => group.push(app),
            _ => sections.push((key, vec![app])),
        }
    }

    // Non-letters go last, in one section
    if !other.is_empty() {
        sections.push(('#', other));
    }

    sections
}
