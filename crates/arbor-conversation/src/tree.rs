// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation tree reconstruction.
//!
//! A conversation is stored as a flat list of responses linked by
//! `parent_id`. This module indexes that list as an arena and walks it:
//! ancestry chains become message sequences, subtrees are collected
//! breadth-first, and the whole tree can be checked for integrity.

use std::collections::{HashMap, HashSet, VecDeque};

use arbor_core::ArborError;
use arbor_core::types::{ChatMessage, InlineAttachment, MessageAnnotations, MessageRole, Response};
use tracing::warn;

/// Responses of one conversation indexed by id, with child lists.
pub struct Arena<'a> {
    by_id: HashMap<&'a str, &'a Response>,
    children: HashMap<&'a str, Vec<&'a Response>>,
}

impl<'a> Arena<'a> {
    pub fn new(responses: &'a [Response]) -> Self {
        let mut by_id = HashMap::with_capacity(responses.len());
        let mut children: HashMap<&str, Vec<&Response>> = HashMap::new();
        for r in responses {
            by_id.insert(r.id.as_str(), r);
            if let Some(parent) = r.parent_id.as_deref() {
                children.entry(parent).or_default().push(r);
            }
        }
        Self { by_id, children }
    }

    pub fn get(&self, id: &str) -> Option<&'a Response> {
        self.by_id.get(id).copied()
    }

    fn require(&self, id: &str) -> Result<&'a Response, ArborError> {
        self.get(id).ok_or_else(|| ArborError::NotFound {
            entity: "response",
            id: id.to_string(),
        })
    }

    pub fn children(&self, id: &str) -> &[&'a Response] {
        self.children.get(id).map_or(&[], Vec::as_slice)
    }

    /// Nodes from the root down to `start_id`, inclusive.
    ///
    /// A parent missing from the arena ends the walk (it was deleted on its
    /// own). A revisited node or a parent in another conversation is an
    /// integrity error.
    pub fn ancestry(&self, start_id: &str) -> Result<Vec<&'a Response>, ArborError> {
        let start = self.require(start_id)?;
        let mut chain = vec![start];
        let mut visited: HashSet<&str> = HashSet::from([start.id.as_str()]);
        let mut current = start;

        while let Some(parent_id) = current.parent_id.as_deref() {
            let Some(parent) = self.get(parent_id) else {
                warn!(
                    response_id = %current.id,
                    parent_id,
                    "parent missing, treating node as root"
                );
                break;
            };
            if parent.conversation_id != start.conversation_id {
                return Err(ArborError::Integrity(format!(
                    "response {} has parent {} in conversation {}",
                    current.id, parent.id, parent.conversation_id
                )));
            }
            if !visited.insert(parent.id.as_str()) {
                return Err(ArborError::Integrity(format!(
                    "parent cycle detected at response {}",
                    parent.id
                )));
            }
            chain.push(parent);
            current = parent;
        }

        chain.reverse();
        Ok(chain)
    }

    /// `root_id` and all of its descendants in breadth-first order.
    pub fn subtree(&self, root_id: &str) -> Result<Vec<&'a Response>, ArborError> {
        let root = self.require(root_id)?;
        let mut out = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue = VecDeque::from([root]);

        while let Some(node) = queue.pop_front() {
            if !visited.insert(node.id.as_str()) {
                continue;
            }
            out.push(node);
            queue.extend(self.children(&node.id).iter().copied());
        }
        Ok(out)
    }
}

fn annotations(r: &Response) -> MessageAnnotations {
    MessageAnnotations {
        response_id: r.id.clone(),
        conversation_id: r.conversation_id.clone(),
        parent_id: r.parent_id.clone(),
        provider: r.provider.clone(),
        model: r.model.clone(),
        temperature: r.temperature,
        top_p: r.top_p,
        max_tokens: r.max_tokens,
    }
}

/// The user and assistant messages recorded by one node.
pub fn node_messages(r: &Response) -> [ChatMessage; 2] {
    [
        ChatMessage {
            role: MessageRole::User,
            content: r.prompt.clone(),
            attachments: r.attachments.clone(),
            annotations: Some(annotations(r)),
        },
        ChatMessage {
            role: MessageRole::Assistant,
            content: r.response_text.clone(),
            attachments: Vec::new(),
            annotations: Some(annotations(r)),
        },
    ]
}

/// Message sequence from the root to `start_id`: two messages per node.
pub fn build_chain(responses: &[Response], start_id: &str) -> Result<Vec<ChatMessage>, ArborError> {
    let arena = Arena::new(responses);
    Ok(arena
        .ancestry(start_id)?
        .into_iter()
        .flat_map(node_messages)
        .collect())
}

/// `root_id` and every descendant, breadth-first.
pub fn collect_subtree<'a>(
    responses: &'a [Response],
    root_id: &str,
) -> Result<Vec<&'a Response>, ArborError> {
    Arena::new(responses).subtree(root_id)
}

/// What a new turn needs to branch off an existing node.
#[derive(Debug, Clone, PartialEq)]
pub struct Continuation {
    /// Parent of the new turn.
    pub parent_id: Option<String>,
    /// History plus the final user message to send.
    pub messages: Vec<ChatMessage>,
    pub prompt: String,
    pub attachments: Vec<InlineAttachment>,
}

/// Context for regenerating `response_id`: the same prompt, sent again as
/// a sibling of the original node.
pub fn regeneration_context(
    responses: &[Response],
    response_id: &str,
) -> Result<Continuation, ArborError> {
    let mut messages = build_chain(responses, response_id)?;
    messages.pop();
    let node = Arena::new(responses).require(response_id)?;
    Ok(Continuation {
        parent_id: node.parent_id.clone(),
        messages,
        prompt: node.prompt.clone(),
        attachments: node.attachments.clone(),
    })
}

/// Context for editing the prompt of `response_id`: the history above the
/// node, then `new_prompt` as a fresh user message. Attachments carry over.
pub fn edit_context(
    responses: &[Response],
    response_id: &str,
    new_prompt: &str,
) -> Result<Continuation, ArborError> {
    let mut messages = build_chain(responses, response_id)?;
    messages.truncate(messages.len().saturating_sub(2));
    let node = Arena::new(responses).require(response_id)?;
    messages.push(ChatMessage {
        attachments: node.attachments.clone(),
        ..ChatMessage::user(new_prompt)
    });
    Ok(Continuation {
        parent_id: node.parent_id.clone(),
        messages,
        prompt: new_prompt.to_string(),
        attachments: node.attachments.clone(),
    })
}

/// Check that every node reaches a root without a cycle and that no parent
/// lives in another conversation. Dangling parents are allowed.
pub fn validate_tree(responses: &[Response]) -> Result<(), ArborError> {
    let arena = Arena::new(responses);
    for r in responses {
        arena.ancestry(&r.id)?;
    }
    Ok(())
}
