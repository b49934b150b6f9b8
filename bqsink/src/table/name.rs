use std::fmt::{self, Write};
use std::sync::Arc;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};

use crate::bail;
use crate::error::{ErrorKind, SinkResult};
use crate::sink_error;

/// .NET custom date tokens and their strftime equivalents, longest first.
const DOTNET_TOKENS: [(&str, &str); 7] = [
    ("yyyy", "%Y"),
    ("yy", "%y"),
    ("MM", "%m"),
    ("dd", "%d"),
    ("HH", "%H"),
    ("mm", "%M"),
    ("ss", "%S"),
];

/// Source of the time table names are rendered for.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Result of one [`TableNameExpander::expand`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNameExpansion {
    pub name: String,
    /// Whether the name differs from the previously resolved one.
    pub changed: bool,
}

#[derive(Debug, Clone)]
struct TemplateSpan {
    prefix: String,
    format: String,
    suffix: String,
}

impl TemplateSpan {
    fn render(&self, now: DateTime<Utc>) -> SinkResult<String> {
        let mut name = String::with_capacity(self.prefix.len() + self.suffix.len() + 16);
        name.push_str(&self.prefix);
        write!(name, "{}", now.format(&self.format)).map_err(|_| {
            sink_error!(
                ErrorKind::InvalidTableName,
                "Failed to render table name pattern",
                format!("pattern `{}`", self.format)
            )
        })?;
        name.push_str(&self.suffix);

        Ok(name)
    }
}

/// Resolves a table template such as `access_{%Y%m%d}` or `access_{yyyyMMdd}` to a concrete
/// table name using the current UTC time.
///
/// The span runs from the first `{` to the last `}`. A pattern containing `%` is a chrono
/// strftime pattern, anything else is read as a .NET custom date pattern where `yyyy`, `yy`,
/// `MM`, `dd`, `HH`, `mm` and `ss` are substituted and other characters are kept.
#[derive(Clone)]
pub struct TableNameExpander {
    template: String,
    span: Option<TemplateSpan>,
    resolved: Option<String>,
    clock: Clock,
}

impl TableNameExpander {
    /// Parses `template`, failing when its time pattern is invalid.
    pub fn new(template: impl Into<String>) -> SinkResult<Self> {
        let template = template.into();
        let span = parse_span(&template)?;

        Ok(Self {
            template,
            span,
            resolved: None,
            clock: Arc::new(Utc::now),
        })
    }

    /// Replaces the UTC wall clock used by [`Self::expand`].
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Whether the template has a time pattern and may resolve to different names over time.
    pub fn is_expandable(&self) -> bool {
        self.span.is_some()
    }

    /// Resolves the table name for the time reported by the clock.
    pub fn expand(&mut self, force: bool) -> SinkResult<TableNameExpansion> {
        let now = (self.clock)();
        self.expand_at(force, now)
    }

    /// Resolves the table name for `now`.
    ///
    /// The first call always renders. Later calls render again only when the template is
    /// expandable or `force` is set.
    pub fn expand_at(&mut self, force: bool, now: DateTime<Utc>) -> SinkResult<TableNameExpansion> {
        if let Some(resolved) = &self.resolved {
            if !force && self.span.is_none() {
                return Ok(TableNameExpansion {
                    name: resolved.clone(),
                    changed: false,
                });
            }
        }

        let name = match &self.span {
            Some(span) => span.render(now)?,
            None => self.template.clone(),
        };

        let changed = self.resolved.as_deref() != Some(name.as_str());
        self.resolved = Some(name.clone());

        Ok(TableNameExpansion { name, changed })
    }
}

impl fmt::Debug for TableNameExpander {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableNameExpander")
            .field("template", &self.template)
            .field("span", &self.span)
            .field("resolved", &self.resolved)
            .finish()
    }
}

fn parse_span(template: &str) -> SinkResult<Option<TemplateSpan>> {
    let (Some(start), Some(end)) = (template.find('{'), template.rfind('}')) else {
        return Ok(None);
    };
    if end <= start + 1 {
        return Ok(None);
    }

    let pattern = &template[start + 1..end];
    let format = if pattern.contains('%') {
        pattern.to_owned()
    } else {
        dotnet_to_strftime(pattern)
    };

    if StrftimeItems::new(&format).any(|item| matches!(item, Item::Error)) {
        bail!(
            ErrorKind::ConfigError,
            "Invalid time pattern in table name template",
            format!("template `{template}`, pattern `{pattern}`")
        );
    }

    Ok(Some(TemplateSpan {
        prefix: template[..start].to_owned(),
        format,
        suffix: template[end + 1..].to_owned(),
    }))
}

fn dotnet_to_strftime(pattern: &str) -> String {
    let mut format = String::with_capacity(pattern.len() * 2);
    let mut rest = pattern;

    'outer: while !rest.is_empty() {
        for (token, replacement) in DOTNET_TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                format.push_str(replacement);
                rest = tail;
                continue 'outer;
            }
        }

        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            format.push(c);
        }
        rest = chars.as_str();
    }

    format
}
