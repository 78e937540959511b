use clap::ValueEnum;
use owo_colors::OwoColorize;
use std::io::IsTerminal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorPolicy {
    Auto,
    Always,
    Never,
}

impl ColorPolicy {
    pub fn enabled(self) -> bool {
        self.resolve(std::io::stdout().is_terminal(), |key| std::env::var(key).ok())
    }

    /// Decides whether to emit ANSI styles. `var` looks up an environment
    /// variable by name.
    pub fn resolve(self, stdout_is_tty: bool, var: impl Fn(&str) -> Option<String>) -> bool {
        match self {
            Self::Always => return true,
            Self::Never => return false,
            Self::Auto => {}
        }

        if var("NO_COLOR").is_some() {
            return false;
        }

        let is = |key: &str, want: &str| var(key).as_deref() == Some(want);
        if is("CLICOLOR", "0") || is("TERM", "dumb") {
            return false;
        }
        if is("CLICOLOR_FORCE", "1") || is("FORCE_COLOR", "1") {
            return true;
        }

        stdout_is_tty
    }
}

/// Styles for the console summary. A disabled `Paint` returns text as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paint {
    on: bool,
}

impl Paint {
    pub fn new(policy: ColorPolicy) -> Self {
        Self { on: policy.enabled() }
    }

    pub fn plain() -> Self {
        Self { on: false }
    }

    pub fn heading(self, text: &str) -> String {
        if self.on { text.bold().cyan().to_string() } else { text.to_string() }
    }

    pub fn path(self, text: &str) -> String {
        if self.on { text.blue().to_string() } else { text.to_string() }
    }

    pub fn good(self, text: &str) -> String {
        if self.on { text.green().to_string() } else { text.to_string() }
    }

    pub fn warn(self, text: &str) -> String {
        if self.on { text.yellow().to_string() } else { text.to_string() }
    }

    pub fn bad(self, text: &str) -> String {
        if self.on { text.red().to_string() } else { text.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::{ColorPolicy, Paint};

    fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string())
    }

    #[test]
    fn auto_follows_tty() {
        assert!(ColorPolicy::Auto.resolve(true, env(&[])));
        assert!(!ColorPolicy::Auto.resolve(false, env(&[])));
    }

    #[test]
    fn explicit_policies_ignore_environment() {
        assert!(!ColorPolicy::Never.resolve(true, env(&[("FORCE_COLOR", "1")])));
        assert!(ColorPolicy::Always.resolve(false, env(&[("NO_COLOR", "1")])));
    }

    #[test]
    fn auto_respects_opt_outs() {
        assert!(!ColorPolicy::Auto.resolve(true, env(&[("NO_COLOR", "")])));
        assert!(!ColorPolicy::Auto.resolve(true, env(&[("CLICOLOR", "0")])));
        assert!(!ColorPolicy::Auto.resolve(true, env(&[("TERM", "dumb")])));
    }

    #[test]
    fn auto_respects_force() {
        assert!(ColorPolicy::Auto.resolve(false, env(&[("FORCE_COLOR", "1")])));
        assert!(ColorPolicy::Auto.resolve(false, env(&[("CLICOLOR_FORCE", "1")])));
    }

    #[test]
    fn plain_paint_has_no_escapes() {
        let p = Paint::plain();
        assert_eq!(p.heading("Summary"), "Summary");
        assert_eq!(p.bad("x"), "x");
        assert!(!p.path("site/a.css").contains('\u{1b}'));
    }
}
