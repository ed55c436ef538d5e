pub const DEFAULT_BODY_ALIASES: &[&str] = &["body", "email text", "message", "text_combined"];
pub const DEFAULT_LABEL_ALIASES: &[&str] = &["label", "email type", "category", "type"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub index: usize,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaMapping {
    pub body: Option<ColumnRef>,
    pub label: Option<ColumnRef>,
}

impl SchemaMapping {
    /// Both roles resolved, as `(body, label)`.
    pub fn resolved(&self) -> Option<(&ColumnRef, &ColumnRef)> {
        match (&self.body, &self.label) {
            (Some(body), Some(label)) => Some((body, label)),
            _ => None,
        }
    }

    /// Human readable reason for an unresolved mapping.
    pub fn missing_roles(&self) -> Option<String> {
        match (&self.body, &self.label) {
            (Some(_), Some(_)) => None,
            (None, Some(_)) => Some("no text/body column".to_string()),
            (Some(_), None) => Some("no label column".to_string()),
            (None, None) => Some("no text/body column and no label column".to_string()),
        }
    }
}

/// Maps a file's arbitrary column names onto the canonical body/label pair.
#[derive(Debug, Clone)]
pub struct SchemaMapper {
    body_aliases: Vec<String>,
    label_aliases: Vec<String>,
}

impl SchemaMapper {
    pub fn new<B, L>(body_aliases: B, label_aliases: L) -> Self
    where
        B: IntoIterator,
        B::Item: AsRef<str>,
        L: IntoIterator,
        L::Item: AsRef<str>,
    {
        Self {
            body_aliases: body_aliases.into_iter().map(|a| canonical(a.as_ref())).collect(),
            label_aliases: label_aliases.into_iter().map(|a| canonical(a.as_ref())).collect(),
        }
    }

    /// Columns are scanned in declared order; the first match for each role wins.
    pub fn map_schema<I, S>(&self, columns: I) -> SchemaMapping
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut mapping = SchemaMapping::default();

        for (index, column) in columns.into_iter().enumerate() {
            let name = column.as_ref();
            let key = canonical(name);

            if mapping.body.is_none() && self.body_aliases.contains(&key) {
                mapping.body = Some(ColumnRef {
                    index,
                    name: name.to_string(),
                });
            } else if mapping.label.is_none() && self.label_aliases.contains(&key) {
                mapping.label = Some(ColumnRef {
                    index,
                    name: name.to_string(),
                });
            }
        }

        mapping
    }
}

impl Default for SchemaMapper {
    fn default() -> Self {
        Self::new(DEFAULT_BODY_ALIASES, DEFAULT_LABEL_ALIASES)
    }
}

fn canonical(name: &str) -> String {
    name.trim().trim_start_matches('\u{feff}').trim().to_lowercase()
}
