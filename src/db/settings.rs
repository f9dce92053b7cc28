use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::Database;

impl Database {
    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM app_settings WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO app_settings (key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete_setting(&self, key: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM app_settings WHERE key = ?1", [key])?;
        Ok(rows > 0)
    }

    /// Delete several keys in one transaction.
    pub fn delete_settings(&self, keys: &[&str]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut removed = 0;
        for key in keys {
            removed += tx.execute("DELETE FROM app_settings WHERE key = ?1", [*key])?;
        }
        tx.commit()?;
        Ok(removed)
    }

    /// Store several keys in one transaction.
    pub fn set_settings(&self, entries: &[(&str, &str)]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for (key, value) in entries {
            tx.execute(
                "INSERT INTO app_settings (key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_setting(key)? {
            Some(raw) => {
                let value = serde_json::from_str(&raw)
                    .with_context(|| format!("Corrupt value stored under '{}'", key))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set_setting(key, &serde_json::to_string(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_delete() {
        let db = Database::open_memory().unwrap();
        assert!(db.get_setting("api_url").unwrap().is_none());

        db.set_setting("api_url", "http://a").unwrap();
        db.set_setting("api_url", "http://b").unwrap();
        assert_eq!(db.get_setting("api_url").unwrap().as_deref(), Some("http://b"));

        assert!(db.delete_setting("api_url").unwrap());
        assert!(!db.delete_setting("api_url").unwrap());
    }

    #[test]
    fn delete_settings_removes_all_keys() {
        let db = Database::open_memory().unwrap();
        db.set_settings(&[("a", "1"), ("b", "2"), ("c", "3")]).unwrap();

        assert_eq!(db.delete_settings(&["a", "b", "missing"]).unwrap(), 2);
        assert!(db.get_setting("a").unwrap().is_none());
        assert_eq!(db.get_setting("c").unwrap().as_deref(), Some("3"));
    }

    #[test]
    fn json_round_trip_and_corrupt_value() {
        let db = Database::open_memory().unwrap();
        db.set_json("list", &vec![1, 2, 3]).unwrap();
        let list: Option<Vec<i32>> = db.get_json("list").unwrap();
        assert_eq!(list, Some(vec![1, 2, 3]));

        db.set_setting("list", "not json").unwrap();
        let err = db.get_json::<Vec<i32>>("list").unwrap_err();
        assert!(err.to_string().contains("Corrupt"));
    }
}
