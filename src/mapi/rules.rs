/*!
Rule enum: the vulnerability checks mapi can include or ignore.

The enum is the single table of rules. Deserialization (kebab-case), the JSON
schema advertised to clients and the `--include-rule=` / `--ignore-rule=`
arguments all come from it. It lists only identifiers confirmed for mapi's
`--include-rule` / `--ignore-rule`; extend it as more are confirmed.
*/

use rmcp::schemars;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema,
)]
#[serde(rename_all = "kebab-case")]
pub enum Rule {
    SqlInjection,
    Ssrf,
    Xss,
}

impl Rule {
    /// Identifier as mapi expects it on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Rule::SqlInjection => "sql-injection",
            Rule::Ssrf => "ssrf",
            Rule::Xss => "xss",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
