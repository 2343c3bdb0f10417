use super::Command;
use crate::error::Error;
use async_trait::async_trait;
use eyre::Result;
use std::io::Write;
use std::path::PathBuf;
use toolshare_core::preferences::Preferences;

pub struct PreferencesCommand {
    pub action: PreferencesAction,
    /// Preferences file the command reads and writes.
    pub path: PathBuf,
}

pub enum PreferencesAction {
    Show,
    Reset,
}

#[async_trait]
impl Command for PreferencesCommand {
    async fn execute(&self) -> Result<()> {
        let mut stdout = std::io::stdout();
        self.run(&mut stdout).map_err(Into::into)
    }
}

impl PreferencesCommand {
    fn run(&self, out: &mut impl Write) -> std::result::Result<(), Error> {
        match &self.action {
            PreferencesAction::Show => {
                let prefs = Preferences::load_from(&self.path)?;
                writeln!(out, "Preferences file: {}", self.path.display())?;
                writeln!(out, "\n{}", toml::to_string_pretty(&prefs)?)?;
            }
            PreferencesAction::Reset => {
                Preferences::default().save_to(&self.path)?;
                tracing::info!(path = %self.path.display(), "Preferences reset");
                writeln!(out, "Preferences reset to defaults")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use toolshare_core::notify::TransportKind;

    fn run(action: PreferencesAction, path: PathBuf) -> String {
        let mut out = Vec::new();
        PreferencesCommand { action, path }.run(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn show_prints_path_and_effective_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preferences.toml");
        std::fs::write(&path, "[notifications]\ntransport = \"log\"\n").unwrap();

        let out = run(PreferencesAction::Show, path.clone());

        assert!(out.starts_with(&format!("Preferences file: {}", path.display())));
        assert!(out.contains("transport = \"log\""), "{out}");
        assert!(out.contains("quota_bytes = 5242880"), "{out}");
    }

    #[test]
    fn reset_writes_defaults_over_an_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config").join("preferences.toml");
        let mut custom = Preferences::default();
        custom.notifications.transport = TransportKind::Off;
        custom.save_to(&path).unwrap();

        let out = run(PreferencesAction::Reset, path.clone());

        assert_eq!(out, "Preferences reset to defaults\n");
        assert_eq!(Preferences::load_from(&path).unwrap(), Preferences::default());
    }
}
