//! JSON snapshots of a user's cards together with their schedules, and restoring them
//! into a store.
//! Ease factors survive a save/load cycle bit for bit.

use crate::database::{CardStore, StoreError};
use crate::models::Card;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeckSnapshot {
    pub user_id: String,
    pub exported_at: DateTime<Utc>,
    pub cards: Vec<Card>,
}

impl DeckSnapshot {
    pub fn capture<S: CardStore + ?Sized>(
        store: &S,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, ExportError> {
        Ok(Self {
            user_id: user_id.to_string(),
            exported_at: now,
            cards: store.fetch_all(user_id)?,
        })
    }

    /// Adds every card of the snapshot to `store` for `user_id`, schedules unchanged.
    /// Cards get fresh ids; returns them in snapshot order.
    pub fn restore<S: CardStore + ?Sized>(
        &self,
        store: &S,
        user_id: &str,
    ) -> Result<Vec<i64>, ExportError> {
        let ids = self
            .cards
            .iter()
            .map(|card| store.import_card(user_id, card))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::info!(user_id, cards = ids.len(), "restored deck snapshot");
        Ok(ids)
    }
}

/// Writes `snapshot` as pretty-printed JSON to `path`.
pub fn export_json_to_path(snapshot: &DeckSnapshot, path: impl AsRef<Path>) -> Result<(), ExportError> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer_pretty(&mut writer, snapshot)?;
    writer.flush()?;
    tracing::info!(
        path = %path.as_ref().display(),
        cards = snapshot.cards.len(),
        "exported deck snapshot"
    );
    Ok(())
}

pub fn import_json(path: impl AsRef<Path>) -> Result<DeckSnapshot, ExportError> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let snapshot: DeckSnapshot = serde_json::from_reader(reader)?;
    tracing::info!(
        path = %path.as_ref().display(),
        cards = snapshot.cards.len(),
        "imported deck snapshot"
    );
    Ok(snapshot)
}
