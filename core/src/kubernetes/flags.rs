//! The kubectl flag group and the flag map that carries it to the daemons.
//!
//! Only flags that the user changed on the command line end up in the flag
//! map. Defaults are left to the daemon, which may know better ones.

use std::collections::BTreeMap;

use clap::parser::ValueSource;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};

/// Flag name → value, as changed by the user.
pub type FlagMap = BTreeMap<String, String>;

/// Name of the global context flag. It is not part of the kubectl group.
pub const CONTEXT_FLAG: &str = "context";

/// Kind of value a kubectl flag takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    Text,
    List,
    Bool,
}

/// One kubectl flag.
#[derive(Debug, Clone, Copy)]
pub struct KubeFlag {
    pub name: &'static str,
    pub short: Option<char>,
    pub kind: FlagKind,
    pub default: Option<&'static str>,
    pub help: &'static str,
}

const fn text(name: &'static str, help: &'static str) -> KubeFlag {
    KubeFlag {
        name,
        short: None,
        kind: FlagKind::Text,
        default: None,
        help,
    }
}

/// The kubectl flags the CLI understands.
pub const KUBE_FLAGS: &[KubeFlag] = &[
    text("kubeconfig", "Path to the kubeconfig file to use for CLI requests"),
    text("cache-dir", "Default cache directory"),
    text("certificate-authority", "Path to a cert file for the certificate authority"),
    text("client-certificate", "Path to a client certificate file for TLS"),
    text("client-key", "Path to a client key file for TLS"),
    text("token", "Bearer token for authentication to the API server"),
    text("as", "Username to impersonate for the operation"),
    KubeFlag {
        name: "as-group",
        short: None,
        kind: FlagKind::List,
        default: None,
        help: "Group to impersonate for the operation, can be repeated",
    },
    text("as-uid", "UID to impersonate for the operation"),
    text("username", "Username for basic authentication to the API server"),
    text("password", "Password for basic authentication to the API server"),
    KubeFlag {
        name: "server",
        short: Some('s'),
        kind: FlagKind::Text,
        default: None,
        help: "The address and port of the Kubernetes API server",
    },
    text("tls-server-name", "Server name to use for server certificate validation"),
    KubeFlag {
        name: "insecure-skip-tls-verify",
        short: None,
        kind: FlagKind::Bool,
        default: Some("false"),
        help: "If true, the server's certificate will not be checked for validity",
    },
    text("cluster", "The name of the kubeconfig cluster to use"),
    text("user", "The name of the kubeconfig user to use"),
    KubeFlag {
        name: "namespace",
        short: Some('n'),
        kind: FlagKind::Text,
        default: None,
        help: "If present, the namespace scope for this CLI request",
    },
    KubeFlag {
        name: "request-timeout",
        short: None,
        kind: FlagKind::Text,
        default: Some("0"),
        help: "The length of time to wait before giving up on a single server request",
    },
    KubeFlag {
        name: "disable-compression",
        short: None,
        kind: FlagKind::Bool,
        default: Some("false"),
        help: "If true, opt-out of response compression for all requests to the server",
    },
];

/// Looks up a kubectl flag by name.
pub fn lookup(name: &str) -> Option<&'static KubeFlag> {
    KUBE_FLAGS.iter().find(|f| f.name == name)
}

/// Registers the kubectl flag group on a command.
pub struct KubeFlagSet;

impl KubeFlagSet {
    pub const HEADING: &'static str = "Kubernetes flags";

    /// Adds every kubectl flag to `cmd`.
    pub fn augment(cmd: Command) -> Command {
        KUBE_FLAGS.iter().fold(cmd, |cmd, flag| cmd.arg(to_arg(flag)))
    }

    /// Collects the flags whose value came from the command line.
    pub fn changed(matches: &ArgMatches) -> FlagMap {
        let mut map = FlagMap::new();
        for flag in KUBE_FLAGS {
            if matches.value_source(flag.name) != Some(ValueSource::CommandLine) {
                continue;
            }
            let value = match flag.kind {
                FlagKind::Text => matches.get_one::<String>(flag.name).cloned(),
                FlagKind::List => matches
                    .get_many::<String>(flag.name)
                    .map(|values| encode_csv(values.map(String::as_str))),
                FlagKind::Bool => matches.get_one::<bool>(flag.name).map(|b| b.to_string()),
            };
            if let Some(value) = value {
                map.insert(flag.name.to_string(), value);
            }
        }
        map
    }
}

fn to_arg(flag: &KubeFlag) -> Arg {
    let mut arg = Arg::new(flag.name)
        .long(flag.name)
        .help(flag.help)
        .help_heading(KubeFlagSet::HEADING);
    if let Some(short) = flag.short {
        arg = arg.short(short);
    }
    arg = match flag.kind {
        FlagKind::Text => arg.action(ArgAction::Set).value_name("VALUE"),
        FlagKind::List => arg
            .action(ArgAction::Append)
            .value_delimiter(',')
            .value_name("VALUE"),
        FlagKind::Bool => arg
            .action(ArgAction::Set)
            .num_args(0..=1)
            .require_equals(true)
            .default_missing_value("true")
            .value_parser(value_parser!(bool)),
    };
    if let Some(default) = flag.default {
        arg = arg.default_value(default);
    }
    arg
}

// ============================================================================
// CSV encoding of list values
// ============================================================================

/// Joins values into one CSV record. Values that contain a comma, a quote or
/// a line break are quoted so that [`decode_csv`] gives them back unchanged.
pub fn encode_csv<'a>(values: impl IntoIterator<Item = &'a str>) -> String {
    values
        .into_iter()
        .map(|v| {
            if v.contains([',', '"', '\n', '\r']) {
                format!("\"{}\"", v.replace('"', "\"\""))
            } else {
                v.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Splits one CSV record into its values.
pub fn decode_csv(record: &str) -> Result<Vec<String>, String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut chars = record.chars().peekable();
    let mut quoted = false;
    let mut at_field_start = true;

    while let Some(c) = chars.next() {
        if quoted {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    quoted = false;
                    if !matches!(chars.peek(), None | Some(',')) {
                        return Err(format!("unexpected character after quote in {:?}", record));
                    }
                }
            } else {
                current.push(c);
            }
            continue;
        }
        match c {
            '"' if at_field_start => {
                quoted = true;
                at_field_start = false;
            }
            '"' => return Err(format!("bare quote in field of {:?}", record)),
            ',' => {
                values.push(std::mem::take(&mut current));
                at_field_start = true;
            }
            _ => {
                current.push(c);
                at_field_start = false;
            }
        }
    }
    if quoted {
        return Err(format!("unterminated quote in {:?}", record));
    }
    values.push(current);
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> Command {
        KubeFlagSet::augment(Command::new("test"))
    }

    #[test]
    fn test_changed_ignores_defaults() {
        let matches = command().get_matches_from(["test"]);
        let map = KubeFlagSet::changed(&matches);
        assert!(map.is_empty());
        assert!(!map.contains_key("request-timeout"));
        assert!(!map.contains_key("insecure-skip-tls-verify"));
    }

    #[test]
    fn test_changed_captures_command_line_values() {
        let matches = command().get_matches_from([
            "test",
            "-n",
            "apps",
            "--kubeconfig",
            "/tmp/kc",
            "--as-group",
            "devs,ops",
            "--as-group",
            "admins",
            "--insecure-skip-tls-verify",
        ]);
        let map = KubeFlagSet::changed(&matches);
        assert_eq!(map.get("namespace").unwrap(), "apps");
        assert_eq!(map.get("kubeconfig").unwrap(), "/tmp/kc");
        assert_eq!(map.get("as-group").unwrap(), "devs,ops,admins");
        assert_eq!(map.get("insecure-skip-tls-verify").unwrap(), "true");
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn test_changed_records_explicit_default_value() {
        let matches = command().get_matches_from(["test", "--request-timeout", "0"]);
        let map = KubeFlagSet::changed(&matches);
        assert_eq!(map.get("request-timeout").unwrap(), "0");
    }

    #[test]
    fn test_csv_quotes_commas() {
        let encoded = encode_csv(["plain", "a,b", "say \"hi\""]);
        assert_eq!(encoded, "plain,\"a,b\",\"say \"\"hi\"\"\"");
        assert_eq!(
            decode_csv(&encoded).unwrap(),
            vec!["plain", "a,b", "say \"hi\""]
        );
    }

    #[test]
    fn test_csv_decode_errors() {
        assert!(decode_csv("\"open").is_err());
        assert!(decode_csv("a\"b").is_err());
        assert!(decode_csv("\"a\"b").is_err());
        assert_eq!(decode_csv("").unwrap(), vec![""]);
    }

    #[test]
    fn test_lookup() {
        assert_eq!(lookup("as-group").unwrap().kind, FlagKind::List);
        assert!(lookup(CONTEXT_FLAG).is_none());
        assert!(lookup("bogus").is_none());
    }
}
