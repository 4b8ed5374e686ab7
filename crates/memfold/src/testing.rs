//! Test utilities for memfold - in-process store and scripted model
//!
//! This module provides stand-ins for the external collaborators so the
//! pipeline can be exercised without a vector database or model endpoint:
//! - `InMemoryStore`: word-overlap similarity with failure injection
//! - `ScriptedModel`: replays canned replies and records every prompt

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::error::{MemfoldError, Result};
use crate::llm::CompletionProvider;
use crate::memory::types::{Fact, MemoryId, RelatedMemory, StoredMemory};
use crate::storage::MemoryStore;
use crate::user::UserId;

/// Distance between two texts: 1 - Jaccard similarity of their lowercase words.
/// Identical word sets are 0.0, disjoint ones 1.0.
pub fn word_distance(a: &str, b: &str) -> f32 {
    let words = |s: &str| -> HashSet<String> {
        s.split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase())
            .collect()
    };
    let (a, b) = (words(a), words(b));
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    1.0 - a.intersection(&b).count() as f32 / union as f32
}

/// Memory store kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    memories: Mutex<HashMap<UserId, Vec<StoredMemory>>>,
    fail_queries: AtomicBool,
    /// Ids whose delete always fails
    undeletable: Mutex<HashSet<MemoryId>>,
    /// Remaining adds before every further add fails; `None` never fails
    adds_before_failure: Mutex<Option<usize>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a memory with a fixed id and timestamp
    pub fn insert(&self, user: &UserId, id: &str, fact: Fact) {
        let mut memories = self.memories.lock().unwrap_or_else(|e| e.into_inner());
        memories.entry(user.clone()).or_default().push(StoredMemory {
            id: MemoryId::new(id),
            fact,
        });
    }

    /// Make every query fail with a retrieval error
    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Make deletes of `id` fail with a store error
    pub fn fail_deletes_of(&self, id: &str) {
        self.undeletable
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(MemoryId::new(id));
    }

    /// Let `n` more adds succeed, then fail all later ones
    pub fn fail_adds_after(&self, n: usize) {
        *self
            .adds_before_failure
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(n);
    }

    /// Snapshot of a user's memories in insertion order
    pub fn memories(&self, user: &UserId) -> Vec<StoredMemory> {
        self.memories
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(user)
            .cloned()
            .unwrap_or_default()
    }

    /// Texts of a user's memories in insertion order
    pub fn texts(&self, user: &UserId) -> Vec<String> {
        self.memories(user).into_iter().map(|m| m.fact.text).collect()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn add(&self, user: &UserId, text: &str) -> Result<StoredMemory> {
        {
            let mut remaining = self
                .adds_before_failure
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            match remaining.as_mut() {
                Some(0) => return Err(MemfoldError::Store("injected add failure".to_string())),
                Some(n) => *n -= 1,
                None => {}
            }
        }

        let stored = StoredMemory {
            id: MemoryId::new(Uuid::new_v4().to_string()),
            fact: Fact::new(text, Utc::now()),
        };
        let mut memories = self.memories.lock().unwrap_or_else(|e| e.into_inner());
        memories
            .entry(user.clone())
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn query(&self, user: &UserId, text: &str, k: usize) -> Result<Vec<RelatedMemory>> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(MemfoldError::Retrieval("injected query failure".to_string()));
        }

        let mut related: Vec<RelatedMemory> = self
            .memories(user)
            .into_iter()
            .map(|m| RelatedMemory {
                distance: word_distance(text, &m.fact.text),
                id: m.id,
                fact: m.fact.text,
                created_at: m.fact.created_at,
            })
            .collect();
        related.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        related.truncate(k);
        Ok(related)
    }

    async fn delete(&self, user: &UserId, id: &MemoryId) -> Result<()> {
        if self
            .undeletable
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(id)
        {
            return Err(MemfoldError::Store(format!("injected delete failure for {id}")));
        }

        let mut memories = self.memories.lock().unwrap_or_else(|e| e.into_inner());
        let list = memories.entry(user.clone()).or_default();
        let before = list.len();
        list.retain(|m| &m.id != id);
        if list.len() == before {
            return Err(MemfoldError::Store(format!("memory {id} not found")));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}

/// A prompt pair received by `ScriptedModel`
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub system: String,
    pub user: String,
}

/// Completion provider that answers from a fixed script.
///
/// Each call pops the next scripted result; an exhausted script answers
/// with an upstream error.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<String>>>,
    calls: Mutex<Vec<RecordedCall>>,
    closes: Mutex<usize>,
}

impl ScriptedModel {
    /// Script of successful replies, answered in order
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_results(replies.into_iter().map(|r| Ok(r.into())))
    }

    /// Script mixing replies and failures
    pub fn from_results(results: impl IntoIterator<Item = Result<String>>) -> Self {
        Self {
            script: Mutex::new(results.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Model whose first call fails with `error`
    pub fn failing(error: MemfoldError) -> Self {
        Self::from_results([Err(error)])
    }

    /// Every prompt pair received so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// How many times `close` was called
    pub fn close_count(&self) -> usize {
        *self.closes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CompletionProvider for ScriptedModel {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedCall {
                system: system_prompt.to_string(),
                user: user_prompt.to_string(),
            });

        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Err(MemfoldError::Upstream("script exhausted".to_string())))
    }

    async fn close(&self) {
        *self.closes.lock().unwrap_or_else(|e| e.into_inner()) += 1;
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
