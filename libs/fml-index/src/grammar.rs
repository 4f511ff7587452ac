//! Line-oriented recognition of FML `uses` and `group` declarations.
//!
//! This is not an FML parser. It finds the two declaration shapes completion depends on:
//!
//! ```text
//! uses "http://hl7.org/fhir/StructureDefinition/Patient" alias Patient as source
//! group PatientToBundle(source src : Patient, target tgt : Bundle)
//! ```
//!
//! The indexer only talks to [`DeclarationSyntax`], so a real tokenizer can replace
//! [`LineTokenSyntax`] without touching the caching logic.

/// A `uses` declaration. `alias` is `None` when the line has no `alias` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsesDecl {
    pub url: String,
    pub alias: Option<String>,
    pub role: String,
}

/// One parameter of a `group` line: `<role> <name> : <alias>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupParam {
    pub role: String,
    pub name: String,
    pub alias: String,
}

/// Declarations found in one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declarations {
    pub uses: Vec<UsesDecl>,
    /// Parameters of the first `group` line only.
    pub group: Vec<GroupParam>,
}

/// Whether the first whitespace-delimited token of `line` is exactly `keyword`.
fn starts_with_keyword(line: &str, keyword: &str) -> bool {
    line.split_whitespace().next() == Some(keyword)
}

pub trait DeclarationSyntax: Send + Sync {
    /// `None` if `line` is not a well-formed `uses` declaration.
    fn parse_uses(&self, line: &str) -> Option<UsesDecl>;

    /// Parameters of a `group` line; malformed parameters are left out.
    fn parse_group(&self, line: &str) -> Vec<GroupParam>;

    fn is_uses_line(&self, line: &str) -> bool {
        starts_with_keyword(line, "uses")
    }

    fn is_group_line(&self, line: &str) -> bool {
        starts_with_keyword(line, "group")
    }

    fn declarations(&self, text: &str) -> Declarations {
        let mut found = Declarations::default();
        let mut group_seen = false;

        for line in text.lines() {
            if self.is_uses_line(line) {
                match self.parse_uses(line) {
                    Some(decl) => found.uses.push(decl),
                    None => tracing::debug!(line = %line, "Ignoring malformed uses declaration"),
                }
            } else if !group_seen && self.is_group_line(line) {
                group_seen = true;
                found.group = self.parse_group(line);
            }
        }

        found
    }
}

/// Whitespace-token recognizer for single-line declarations.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineTokenSyntax;

impl DeclarationSyntax for LineTokenSyntax {
    fn parse_uses(&self, line: &str) -> Option<UsesDecl> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let mut url = None;
        let mut alias = None;
        let mut role = None;

        for (index, token) in tokens.iter().enumerate() {
            let next = tokens.get(index + 1).copied();
            match token.to_ascii_lowercase().as_str() {
                "uses" => url = next.map(strip_quotes),
                "alias" => alias = next.map(str::to_string),
                "as" => role = next.map(str::to_string),
                _ => {}
            }
        }

        let url = url.filter(|url| !url.is_empty())?;
        Some(UsesDecl {
            url,
            alias,
            role: role.unwrap_or_default(),
        })
    }

    fn parse_group(&self, line: &str) -> Vec<GroupParam> {
        let Some(params) = parenthesized(line) else {
            return Vec::new();
        };

        params
            .split(',')
            .filter_map(|param| {
                let param = param.trim();
                let (role, rest) = param.split_once(char::is_whitespace)?;
                if role != "source" && role != "target" {
                    return None;
                }
                let (name, alias) = rest.split_once(':')?;
                let name: String = name.split_whitespace().collect();
                let alias: String = alias.split_whitespace().collect();
                if name.is_empty() || alias.is_empty() {
                    return None;
                }
                Some(GroupParam {
                    role: role.to_string(),
                    name,
                    alias,
                })
            })
            .collect()
    }
}

fn strip_quotes(token: &str) -> String {
    token.trim_matches(|c| c == '"' || c == '\'').to_string()
}

/// Text between the first `(` and the next `)`.
fn parenthesized(line: &str) -> Option<&str> {
    let start = line.find('(')? + 1;
    let len = line[start..].find(')')?;
    Some(&line[start..start + len])
}
