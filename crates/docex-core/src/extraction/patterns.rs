//! Regex patterns for the enumerated value formats.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Contact and network identifiers
    pub static ref EMAIL: Regex = Regex::new(
        r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$"
    ).unwrap();

    pub static ref URL: Regex = Regex::new(
        r"(?i)^(?:https?|ftp)://[^\s/$.?#][^\s]*$"
    ).unwrap();

    pub static ref DOMAIN: Regex = Regex::new(
        r"(?i)^(?:[a-z0-9](?:[a-z0-9\-]{0,61}[a-z0-9])?\.)+[a-z]{2,63}\.?$"
    ).unwrap();

    // File hashes
    pub static ref MD5: Regex = Regex::new(r"^[A-Fa-f0-9]{32}$").unwrap();

    pub static ref SHA1: Regex = Regex::new(r"^[A-Fa-f0-9]{40}$").unwrap();

    pub static ref SHA256: Regex = Regex::new(r"^[A-Fa-f0-9]{64}$").unwrap();

    // Vulnerability identifiers (CVE-YYYY-NNNN+)
    pub static ref CVE: Regex = Regex::new(r"(?i)^CVE-\d{4}-\d{4,}$").unwrap();

    // Defanged indicators: hxxp://, example[.]com, 10[.]0[.]0[.]1
    pub static ref DEFANGED_DOT: Regex = Regex::new(r"\[\.\]|\(\.\)|\{\.\}").unwrap();

    pub static ref DEFANGED_SCHEME: Regex = Regex::new(r"(?i)^hxxp(s?)://").unwrap();

    // Characters stripped from numbers before range checks
    pub static ref NUMERIC_NOISE: Regex = Regex::new(
        r"[\s\u{00a0},_'$€£¥]|(?i:\b(?:USD|EUR|GBP|JPY|PLN)\b)"
    ).unwrap();
}

/// Date layouts accepted by the `date` format.
pub const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d.%m.%Y",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%d-%m-%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
];

/// Undo common indicator defanging so values validate as their real form.
pub fn refang(value: &str) -> String {
    let value = DEFANGED_DOT.replace_all(value, ".");
    DEFANGED_SCHEME.replace(&value, "http$1://").into_owned()
}
