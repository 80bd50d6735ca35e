use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::ids::AttemptId;

//
// ─── ATTEMPT RECORD ────────────────────────────────────────────────────────────
//

/// One attempt at an assessment item, or a partial update to one.
///
/// Before the server has persisted an attempt it has no `id` and is identified
/// by `item`. `correct`, `answer`, `simple_answer` and `replace` are write-once
/// once the attempt has an id: later updates only change them when they carry
/// `replace: true`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<AttemptId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hinted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simple_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace: Option<bool>,
    /// Fields this client does not interpret (e.g. `time_spent`, `hinted` details).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AttemptRecord {
    /// A fresh, not yet persisted attempt at `item`.
    #[must_use]
    pub fn for_item(item: impl Into<String>) -> Self {
        Self {
            item: Some(item.into()),
            ..Self::default()
        }
    }

    /// An update to an attempt the server already knows about.
    #[must_use]
    pub fn for_id(id: impl Into<AttemptId>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_answer(mut self, answer: Value) -> Self {
        self.answer = Some(answer);
        self
    }

    #[must_use]
    pub fn with_correct(mut self, correct: f64) -> Self {
        self.correct = Some(correct);
        self
    }

    #[must_use]
    pub fn with_complete(mut self, complete: bool) -> Self {
        self.complete = Some(complete);
        self
    }

    #[must_use]
    pub fn with_simple_answer(mut self, simple_answer: impl Into<String>) -> Self {
        self.simple_answer = Some(simple_answer.into());
        self
    }

    #[must_use]
    pub fn with_hinted(mut self, hinted: bool) -> Self {
        self.hinted = Some(hinted);
        self
    }

    /// Allow this update to overwrite write-once fields.
    #[must_use]
    pub fn replacing(mut self) -> Self {
        self.replace = Some(true);
        self
    }

    fn requests_replace(&self) -> bool {
        self.replace == Some(true)
    }

    /// Copy over every field `update` sets.
    pub fn overwrite_with(&mut self, update: &AttemptRecord) {
        overwrite(&mut self.id, &update.id);
        overwrite(&mut self.item, &update.item);
        overwrite(&mut self.answer, &update.answer);
        overwrite(&mut self.correct, &update.correct);
        overwrite(&mut self.complete, &update.complete);
        overwrite(&mut self.hinted, &update.hinted);
        overwrite(&mut self.simple_answer, &update.simple_answer);
        overwrite(&mut self.error, &update.error);
        overwrite(&mut self.replace, &update.replace);
        for (key, value) in &update.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }

    /// Merge `update` into this attempt, leaving write-once fields that are
    /// already set untouched unless `update` requests a replace.
    pub fn merge_from(&mut self, update: &AttemptRecord) {
        let replace = update.requests_replace();
        overwrite(&mut self.id, &update.id);
        overwrite(&mut self.item, &update.item);
        overwrite(&mut self.complete, &update.complete);
        overwrite(&mut self.hinted, &update.hinted);
        overwrite(&mut self.error, &update.error);
        write_once(&mut self.answer, &update.answer, replace);
        write_once(&mut self.correct, &update.correct, replace);
        write_once(&mut self.simple_answer, &update.simple_answer, replace);
        write_once(&mut self.replace, &update.replace, replace);
        for (key, value) in &update.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }
}

fn overwrite<T: Clone>(field: &mut Option<T>, update: &Option<T>) {
    if let Some(value) = update {
        *field = Some(value.clone());
    }
}

fn write_once<T: Clone>(field: &mut Option<T>, update: &Option<T>, replace: bool) {
    if field.is_none() || replace {
        overwrite(field, update);
    }
}

//
// ─── ATTEMPT HISTORY ───────────────────────────────────────────────────────────
//

/// How recording an attempt changed the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptChange {
    /// A new attempt was added.
    Created,
    /// An existing attempt was updated in place.
    Merged,
}

/// Past attempts for the current session with O(1) lookup by id.
///
/// Stored oldest first so indices in `by_id` stay stable; `most_recent_first`
/// presents them newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttemptHistory {
    attempts: Vec<AttemptRecord>,
    by_id: HashMap<AttemptId, usize>,
}

impl AttemptHistory {
    /// Build from a server list ordered most recent first.
    #[must_use]
    pub fn from_most_recent_first(attempts: Vec<AttemptRecord>) -> Self {
        let mut history = Self::default();
        for attempt in attempts.into_iter().rev() {
            history.push(attempt);
        }
        history
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &AttemptId) -> Option<&AttemptRecord> {
        self.by_id.get(id).map(|&index| &self.attempts[index])
    }

    /// Attempts ordered most recent first.
    pub fn most_recent_first(&self) -> impl Iterator<Item = &AttemptRecord> {
        self.attempts.iter().rev()
    }

    /// Record a locally submitted interaction.
    ///
    /// Without an id, the interaction is folded into the pending (id-less)
    /// attempt for the same item, or starts a new attempt. With an id it is
    /// merged like a server record.
    pub fn record(&mut self, interaction: &AttemptRecord) -> AttemptChange {
        if interaction.id.is_some() {
            return self.merge_identified(interaction);
        }
        match self.pending_index(interaction.item.as_deref()) {
            Some(index) => {
                self.attempts[index].overwrite_with(interaction);
                AttemptChange::Merged
            }
            None => {
                self.push(interaction.clone());
                AttemptChange::Created
            }
        }
    }

    /// Merge a record that carries an id.
    ///
    /// Matches by id first, then adopts the pending attempt for the same item
    /// (the server has just assigned it an id). Unknown attempts are added.
    pub fn merge_identified(&mut self, record: &AttemptRecord) -> AttemptChange {
        let Some(id) = record.id.clone() else {
            return self.record(record);
        };
        if let Some(&index) = self.by_id.get(&id) {
            self.attempts[index].merge_from(record);
            return AttemptChange::Merged;
        }
        if let Some(index) = self.pending_index(record.item.as_deref()) {
            self.attempts[index].merge_from(record);
            self.by_id.insert(id, index);
            return AttemptChange::Merged;
        }
        self.push(record.clone());
        AttemptChange::Created
    }

    fn pending_index(&self, item: Option<&str>) -> Option<usize> {
        let item = item?;
        self.attempts
            .iter()
            .rposition(|attempt| attempt.id.is_none() && attempt.item.as_deref() == Some(item))
    }

    fn push(&mut self, attempt: AttemptRecord) {
        if let Some(id) = attempt.id.clone() {
            self.by_id.insert(id, self.attempts.len());
        }
        self.attempts.push(attempt);
    }
}
