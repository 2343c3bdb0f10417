use super::Command;
use crate::error::Error;
use crate::settings::Settings;
use async_trait::async_trait;
use eyre::Result;
use std::io::Write;
use toolshare_core::DurableStore;

pub struct StoreCommand {
    pub action: StoreAction,
    pub settings: Settings,
}

pub enum StoreAction {
    List,
    Get { key: String },
    Delete { key: String },
}

#[async_trait]
impl Command for StoreCommand {
    async fn execute(&self) -> Result<()> {
        let store = self.settings.open_store().map_err(Error::from)?;
        let mut stdout = std::io::stdout();
        self.run(&store, &mut stdout).map_err(Into::into)
    }
}

impl StoreCommand {
    fn run(&self, store: &dyn DurableStore, out: &mut impl Write) -> std::result::Result<(), Error> {
        match &self.action {
            StoreAction::List => {
                let keys = store.keys()?;
                if keys.is_empty() {
                    writeln!(out, "Store is empty.")?;
                }
                for key in &keys {
                    writeln!(out, "{key}")?;
                }
                if !keys.is_empty() {
                    writeln!(out, "({} keys, {} bytes used)", keys.len(), store.used_bytes()?)?;
                }
            }
            StoreAction::Get { key } => match store.read(key)? {
                Some(value) => writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?,
                None => writeln!(out, "No value stored under {key}")?,
            },
            StoreAction::Delete { key } => {
                store.delete(key)?;
                tracing::info!(key, "Deleted stored document");
                writeln!(out, "Deleted {key}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;
    use toolshare_core::InMemoryStore;
    use toolshare_core::notify::{PermissionState, TransportKind};

    fn command(action: StoreAction) -> StoreCommand {
        StoreCommand {
            action,
            settings: Settings {
                store_dir: PathBuf::from("unused"),
                quota: None,
                transport: TransportKind::Off,
                permission: PermissionState::Denied,
                channel_capacity: 16,
            },
        }
    }

    fn output(action: StoreAction, store: &InMemoryStore) -> String {
        let mut out = Vec::new();
        command(action).run(store, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn list_prints_sorted_keys() {
        let store = InMemoryStore::new();
        store.write("memo_text", &json!("hi")).unwrap();
        store.write("calendar_events", &json!({})).unwrap();

        assert_eq!(
            output(StoreAction::List, &store),
            "calendar_events\nmemo_text\n(2 keys, 30 bytes used)\n"
        );
    }

    #[test]
    fn get_pretty_prints_or_reports_missing() {
        let store = InMemoryStore::new();
        store.write("memo_text", &json!("hi")).unwrap();

        assert_eq!(
            output(StoreAction::Get { key: "memo_text".to_string() }, &store),
            "\"hi\"\n"
        );
        assert_eq!(
            output(StoreAction::Get { key: "nope".to_string() }, &store),
            "No value stored under nope\n"
        );
    }

    #[test]
    fn delete_removes_key() {
        let store = InMemoryStore::new();
        store.write("memo_text", &json!("hi")).unwrap();

        output(StoreAction::Delete { key: "memo_text".to_string() }, &store);

        assert_eq!(store.read("memo_text").unwrap(), None);
    }
}
