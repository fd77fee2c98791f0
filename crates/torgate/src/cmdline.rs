//! Implement a configuration source based on command-line arguments.

use config::{ConfigError, Source, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Alias for the Result type from config.
type Result<T> = std::result::Result<T, ConfigError>;

/// A CmdLine holds a set of `key=value` overrides given on the
/// command line, to be applied on top of any configuration files.
///
/// The overrides are formatted in toml, and concatenated into a
/// single toml document.  For arguments of the form "key=bareword",
/// the bareword is quoted for convenience.
#[derive(Debug, Clone, Default)]
pub struct CmdLine {
    /// List of toml lines as given on the command line.
    contents: Vec<String>,
}

impl CmdLine {
    /// Make a new empty command-line.
    pub fn new() -> Self {
        CmdLine::default()
    }

    /// Add a single line of toml to the configuration.
    pub fn push_toml_line(&mut self, line: String) {
        self.contents.push(line);
    }

    /// Try to adjust the contents of a toml deserialization error so
    /// that it refers to a single command-line argument, not to a line
    /// of a toml document nobody ever sees.
    fn convert_toml_error(&self, s: &str, pos: Option<(usize, usize)>) -> String {
        /// Regex to match an error message from the toml crate.
        static RE: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"^(.*?) at line [0-9]+ column [0-9]+$").expect("Can't compile regex")
        });
        let msg = match RE.captures(s) {
            Some(c) => c
                .get(1)
                .expect("mismatched regex: no capture group")
                .as_str(),
            None => s,
        };

        let location = match pos {
            Some((line, _col)) if line < self.contents.len() => {
                format!(" in {:?}", self.contents[line])
            }
            _ => " on command line".to_string(),
        };

        format!("{}{}", msg, location)
    }

    /// Compose the lines of this cmdline into a single toml string.
    fn build_toml(&self) -> String {
        let mut toml_s = String::new();
        for line in self.contents.iter() {
            toml_s.push_str(tweak_toml_bareword(line).as_ref().unwrap_or(line));
            toml_s.push('\n');
        }
        toml_s
    }
}

impl Source for CmdLine {
    fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
        Box::new(self.clone())
    }

    fn collect(&self) -> Result<HashMap<String, Value>> {
        let toml_s = self.build_toml();
        let toml_v: toml::Value = match toml::from_str(&toml_s) {
            Err(e) => {
                return Err(ConfigError::Message(
                    self.convert_toml_error(&e.to_string(), e.line_col()),
                ))
            }
            Ok(v) => v,
        };

        toml_v
            .try_into()
            .map_err(|e| ConfigError::Foreign(Box::new(e)))
    }
}

/// If `s` is a string of the form "key=bareword", return a new string
/// where `bareword` is quoted. Otherwise return None.
///
/// This isn't a smart transformation outside the context of 'config',
/// since most serde formats complain when they get a string where
/// they wanted a number.  But 'config' is pretty happy to convert
/// strings to other stuff.
///
/// Our options live in one flat table, so dotted keys aren't accepted
/// here.
fn tweak_toml_bareword(s: &str) -> Option<String> {
    /// Regex to match a key=bareword item.
    static RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r#"(?x:
               ^
                [ \t]*
                # first capture group: a single undotted key
                ([a-zA-Z0-9_\-]+)
                [ \t]*=[ \t]*
                # second group: one bareword without hyphens
                ([a-zA-Z0-9_]+)
                [ \t]*
                $)"#,
        )
        .expect("Built-in regex compilation failed")
    });

    RE.captures(s).map(|c| format!("{}=\"{}\"", &c[1], &c[2]))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bareword_expansion() {
        assert_eq!(tweak_toml_bareword("barewordonly"), None);
        assert_eq!(tweak_toml_bareword("=99"), None);
        assert_eq!(tweak_toml_bareword("w=[1,2,3]"), None);
        assert_eq!(tweak_toml_bareword("tor_host=b-c"), None);
        assert_eq!(tweak_toml_bareword("tor.daemon=localhost"), None);

        assert_eq!(
            tweak_toml_bareword("tor_host=localhost"),
            Some("tor_host=\"localhost\"".into())
        );
        assert_eq!(
            tweak_toml_bareword("listen_port = 8118"),
            Some("listen_port=\"8118\"".into())
        );
        assert_eq!(
            tweak_toml_bareword("trace=true"),
            Some("trace=\"true\"".into())
        );
    }

    #[test]
    fn conv_toml_error() {
        let mut cl = CmdLine::new();
        cl.push_toml_line("tor_host=localhost".to_string());
        cl.push_toml_line("tor_port=9150".to_string());
        cl.push_toml_line("trace=true".to_string());

        assert_eq!(
            &cl.convert_toml_error("Bad mojo at line 1 column 1", Some((0, 1))),
            "Bad mojo in \"tor_host=localhost\""
        );

        assert_eq!(
            &cl.convert_toml_error("Bad mojo at line 1 column 1", Some((7, 1))),
            "Bad mojo on command line"
        );

        assert_eq!(
            &cl.convert_toml_error("Bad mojo with no location", Some((0, 1))),
            "Bad mojo with no location in \"tor_host=localhost\""
        );
    }

    #[test]
    fn parse_good() {
        let mut cl = CmdLine::default();
        cl.push_toml_line("listen_port=13010".to_string());
        cl.push_toml_line("tor_host=localhost".to_string());
        cl.push_toml_line("greeting=\"hi there\"".to_string());
        cl.push_toml_line("w=[1,2,3]".to_string());

        let v = cl.collect().unwrap();
        assert_eq!(v["listen_port"], "13010".into());
        assert_eq!(v["tor_host"], "localhost".into());
        assert_eq!(v["greeting"], "hi there".into());
        assert_eq!(v["w"], vec![1, 2, 3].into());
    }
}
