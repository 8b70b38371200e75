//! Serialization of action stacks as named, hand-editable recipes. The
//! canonical form is line-oriented with a fixed key order; the reader also
//! accepts blank lines and `#` comments, which the writer never emits.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::schema::ColumnType;
use crate::transform::{ActionStack, FilterOperator, MorphAction};
use crate::{Error, MorphResult};

/// A named, persistable wrapper around an action stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub name: String,
    pub description: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub actions: ActionStack,
}

impl Recipe {
    pub fn new(name: impl Into<String>, actions: ActionStack) -> Self {
        Self {
            name: name.into(),
            description: None,
            last_modified: None,
            actions,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = Some(last_modified);
        self
    }

    /// Refresh `last_modified` to now; callers saving an edited stack do
    /// this right before [`Self::to_file`].
    pub fn touch(&mut self) {
        self.last_modified = Some(Utc::now());
    }

    /// Write the canonical form: UTF-8, `\n` endings, no BOM.
    pub fn to_file(&self, path: impl AsRef<Path>) -> MorphResult<()> {
        std::fs::write(path, serialize(self))?;
        Ok(())
    }

    pub fn from_file(path: impl AsRef<Path>) -> MorphResult<Self> {
        deserialize(&std::fs::read_to_string(path)?)
    }
}

/// Emit the canonical text form. Key order is always `name`, `description`,
/// `last_modified`, `actions`; absent optional keys are omitted entirely.
pub fn serialize(recipe: &Recipe) -> String {
    let mut out = String::new();
    out.push_str("name: ");
    out.push_str(&quote(&recipe.name));
    out.push('\n');
    if let Some(description) = &recipe.description {
        out.push_str("description: ");
        out.push_str(&quote(description));
        out.push('\n');
    }
    if let Some(last_modified) = &recipe.last_modified {
        out.push_str("last_modified: ");
        out.push_str(&quote(&last_modified.to_rfc3339()));
        out.push('\n');
    }
    if recipe.actions.is_empty() {
        out.push_str("actions: []\n");
        return out;
    }
    out.push_str("actions:\n");
    for action in recipe.actions.iter() {
        match action {
            MorphAction::Rename { old_name, new_name } => {
                out.push_str("  - type: rename\n");
                push_field(&mut out, "old_name", &quote(old_name));
                push_field(&mut out, "new_name", &quote(new_name));
            }
            MorphAction::Delete { column_name } => {
                out.push_str("  - type: delete\n");
                push_field(&mut out, "column_name", &quote(column_name));
            }
            MorphAction::Cast {
                column_name,
                target_type,
            } => {
                out.push_str("  - type: cast\n");
                push_field(&mut out, "column_name", &quote(column_name));
                push_field(&mut out, "target_type", target_type.as_ref());
            }
            MorphAction::Filter {
                column_name,
                operator,
                value,
            } => {
                out.push_str("  - type: filter\n");
                push_field(&mut out, "column_name", &quote(column_name));
                push_field(&mut out, "operator", operator.as_ref());
                push_field(&mut out, "value", &quote(value));
            }
        }
    }
    out
}

fn push_field(out: &mut String, key: &str, value: &str) {
    out.push_str("    ");
    out.push_str(key);
    out.push_str(": ");
    out.push_str(value);
    out.push('\n');
}

fn quote(s: &str) -> String {
    let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// An action item being assembled by the parser.
struct PendingAction {
    action_type: String,
    fields: Vec<(String, String)>,
}

impl PendingAction {
    fn required_string(&self, key: &str) -> MorphResult<String> {
        self.raw_field(key).map(unquote)
    }

    fn required_enum<T: FromStr>(&self, key: &str) -> MorphResult<T> {
        let raw = self.raw_field(key)?;
        T::from_str(raw).map_err(|_| Error::RecipeBadEnumValue {
            field: key.to_string(),
            value: raw.to_string(),
        })
    }

    fn raw_field(&self, key: &str) -> MorphResult<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .ok_or_else(|| Error::RecipeMissingField {
                action: self.action_type.clone(),
                field: key.to_string(),
            })
    }

    fn build(self) -> MorphResult<MorphAction> {
        match self.action_type.as_str() {
            "rename" => Ok(MorphAction::Rename {
                old_name: self.required_string("old_name")?,
                new_name: self.required_string("new_name")?,
            }),
            "delete" => Ok(MorphAction::Delete {
                column_name: self.required_string("column_name")?,
            }),
            "cast" => Ok(MorphAction::Cast {
                column_name: self.required_string("column_name")?,
                target_type: self.required_enum::<ColumnType>("target_type")?,
            }),
            "filter" => Ok(MorphAction::Filter {
                column_name: self.required_string("column_name")?,
                operator: self.required_enum::<FilterOperator>("operator")?,
                value: self.required_string("value")?,
            }),
            other => Err(Error::RecipeUnknownActionType(other.to_string())),
        }
    }
}

fn finalize(
    pending: &mut Option<PendingAction>,
    actions: &mut Vec<MorphAction>,
) -> MorphResult<()> {
    if let Some(item) = pending.take() {
        actions.push(item.build()?);
    }
    Ok(())
}

/// Parse the canonical text form back into a [`Recipe`]. Blank lines and `#`
/// comments are skipped; indentation is otherwise strict: top-level pairs at
/// column 0, action items as `  - type: …`, action fields behind four spaces.
pub fn deserialize(text: &str) -> MorphResult<Recipe> {
    #[derive(PartialEq)]
    enum State {
        Root,
        Actions,
        ActionItem,
    }

    let mut state = State::Root;
    let mut name: Option<String> = None;
    let mut description: Option<String> = None;
    let mut last_modified: Option<DateTime<Utc>> = None;
    let mut actions: Vec<MorphAction> = Vec::new();
    let mut pending: Option<PendingAction> = None;

    for (index, line) in text.lines().enumerate() {
        let lineno = index + 1;
        let stripped = line.trim_start();
        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }

        if let Some(item) = line.strip_prefix("  - ") {
            if state == State::Root {
                return Err(Error::RecipeBadIndentation { line: lineno });
            }
            finalize(&mut pending, &mut actions)?;
            let (key, value) = split_pair(item, lineno)?;
            if key != "type" {
                return Err(Error::RecipeMissingField {
                    action: "action item".to_string(),
                    field: "type".to_string(),
                });
            }
            pending = Some(PendingAction {
                action_type: value.to_string(),
                fields: Vec::new(),
            });
            state = State::ActionItem;
        } else if let Some(field) = line.strip_prefix("    ") {
            if field.starts_with(' ') || state != State::ActionItem {
                return Err(Error::RecipeBadIndentation { line: lineno });
            }
            let Some(item) = pending.as_mut() else {
                return Err(Error::RecipeBadIndentation { line: lineno });
            };
            let (key, value) = split_pair(field, lineno)?;
            item.fields.push((key.to_string(), value.to_string()));
        } else if !line.starts_with(' ') {
            finalize(&mut pending, &mut actions)?;
            let (key, value) = split_pair(line, lineno)?;
            match key {
                "actions" if value == "[]" => state = State::Root,
                "actions" if value.is_empty() => state = State::Actions,
                "actions" => {
                    return Err(Error::generic(format!(
                        "unexpected value for actions: `{value}`"
                    )))
                }
                other => {
                    state = State::Root;
                    match other {
                        "name" => name = Some(unquote(value)),
                        "description" => description = Some(unquote(value)),
                        "last_modified" => {
                            let raw = unquote(value);
                            let parsed = DateTime::parse_from_rfc3339(&raw).map_err(|e| {
                                Error::generic(format!("invalid last_modified timestamp: {e}"))
                            })?;
                            last_modified = Some(parsed.with_timezone(&Utc));
                        }
                        // unknown top-level keys are tolerated, like comments
                        _ => {}
                    }
                }
            }
        } else {
            return Err(Error::RecipeBadIndentation { line: lineno });
        }
    }
    finalize(&mut pending, &mut actions)?;

    let Some(name) = name else {
        return Err(Error::RecipeMissingName);
    };
    debug!(name = %name, actions = actions.len(), "parsed recipe");
    Ok(Recipe {
        name,
        description,
        last_modified,
        actions: actions.into_iter().collect(),
    })
}

fn split_pair(line: &str, lineno: usize) -> MorphResult<(&str, &str)> {
    match line.split_once(':') {
        Some((key, value)) => Ok((key.trim(), value.trim())),
        None => Err(Error::RecipeBadIndentation { line: lineno }),
    }
}

fn unquote(value: &str) -> String {
    let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) else {
        return value.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
