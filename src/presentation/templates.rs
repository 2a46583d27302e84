//! Template name resolution for rendered widgets.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    List,
    Item,
}

impl TemplateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::List => "list",
            TemplateKind::Item => "item",
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candidate template names, highest priority first.
///
/// Framework-specific variants come before every generic name; a custom
/// template always wins.
pub fn template_candidates(
    app: &str,
    content_type: &str,
    channel: Option<&str>,
    kind: TemplateKind,
    css_framework: Option<&str>,
    custom: Option<&str>,
) -> Vec<String> {
    let mut generic = Vec::with_capacity(4);
    if let Some(channel) = channel {
        generic.push(format!("dalec/{app}/{content_type}-{channel}-{kind}.html"));
    }
    generic.push(format!("dalec/{app}/{content_type}-{kind}.html"));
    generic.push(format!("dalec/{app}/{kind}.html"));
    generic.push(format!("dalec/default/{kind}.html"));

    let mut names = Vec::with_capacity(generic.len() * 2 + 1);
    if let Some(custom) = custom.filter(|custom| !custom.is_empty()) {
        names.push(format!("dalec/{app}/{custom}-{kind}.html"));
    }
    if let Some(framework) = css_framework.filter(|framework| !framework.is_empty()) {
        names.extend(generic.iter().map(|name| with_framework(name, framework)));
    }
    names.extend(generic);
    names
}

fn with_framework(name: &str, framework: &str) -> String {
    match name.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/{framework}/{file}"),
        None => format!("{framework}/{name}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_candidates_follow_priority() {
        let names = template_candidates("gitlab", "issue", None, TemplateKind::List, None, None);
        assert_eq!(
            names,
            [
                "dalec/gitlab/issue-list.html",
                "dalec/gitlab/list.html",
                "dalec/default/list.html",
            ]
        );
    }

    #[test]
    fn channel_and_framework_variants_come_first() {
        let names = template_candidates(
            "gitlab",
            "issue",
            Some("project"),
            TemplateKind::Item,
            Some("bootstrap"),
            Some("compact"),
        );
        assert_eq!(
            names,
            [
                "dalec/gitlab/compact-item.html",
                "dalec/gitlab/bootstrap/issue-project-item.html",
                "dalec/gitlab/bootstrap/issue-item.html",
                "dalec/gitlab/bootstrap/item.html",
                "dalec/default/bootstrap/item.html",
                "dalec/gitlab/issue-project-item.html",
                "dalec/gitlab/issue-item.html",
                "dalec/gitlab/item.html",
                "dalec/default/item.html",
            ]
        );
    }
}
