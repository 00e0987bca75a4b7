//! Cleanup and routing of free text returned by the query agent.

const FENCE: &str = "```";
const SQL_FENCE: &str = "```sql";

/// What the agent's output turned out to be after sanitizing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputClass {
    /// Cleaned text begins with `SELECT`; run it.
    Sql(String),
    /// Anything else; hand it back to the user as-is.
    Prose(String),
}

impl OutputClass {
    pub fn text(&self) -> &str {
        match self {
            Self::Sql(text) | Self::Prose(text) => text,
        }
    }
}

/// Removes every markdown code-fence marker (```` ``` ```` and ```` ```sql ````,
/// any case) and trims surrounding whitespace. Total and idempotent.
pub fn sanitize_sql(text: &str) -> String {
    let mut current = strip_fences(text);
    // Removing a marker can splice two backtick runs into a new one.
    loop {
        let next = strip_fences(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current.trim().to_string()
}

fn strip_fences(text: &str) -> String {
    remove_ignore_ascii_case(text, SQL_FENCE).replace(FENCE, "")
}

fn remove_ignore_ascii_case(text: &str, needle: &str) -> String {
    // ASCII lowercasing keeps byte offsets identical to `text`.
    let lower = text.to_ascii_lowercase();
    let mut output = String::with_capacity(text.len());
    let mut start = 0;

    while let Some(offset) = lower[start..].find(needle) {
        let position = start + offset;
        output.push_str(&text[start..position]);
        start = position + needle.len();
    }

    output.push_str(&text[start..]);
    output
}

/// `true` when the statement starts with `SELECT`, ignoring case and leading
/// whitespace.
pub fn is_select(sql: &str) -> bool {
    sql.trim_start().get(..6).is_some_and(|prefix| prefix.eq_ignore_ascii_case("select"))
}

pub fn classify(text: &str) -> OutputClass {
    let cleaned = sanitize_sql(text);
    if is_select(&cleaned) {
        OutputClass::Sql(cleaned)
    } else {
        OutputClass::Prose(cleaned)
    }
}
