//! Read-only views of a learner's completion set against the curriculum.
//!
//! Nothing here mutates the completion set; marking topics done or undone
//! belongs to whoever owns it.

use serde::Serialize;

use crate::catalog::Curriculum;
use crate::models::{
    CompletionSet, StudyProgress, TimeSummary, TopicId, TopicNode, TopicStatus,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicOverview {
    pub topic: TopicId,
    pub status: TopicStatus,
    pub exam_weight: Option<u32>,
    pub mastery_minutes: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleOverview {
    pub module: TopicNode,
    pub completed: usize,
    pub total: usize,
    pub topics: Vec<TopicOverview>,
}

/// True when every direct prerequisite of `topic` is complete.
///
/// Only one level is inspected: a prerequisite counts as soon as it is in
/// `completed`, whether or not its own prerequisites are.
pub fn check_prerequisites(
    curriculum: &Curriculum,
    topic: &str,
    completed: &CompletionSet,
) -> bool {
    curriculum
        .prerequisites(topic)
        .iter()
        .all(|dep| completed.contains(dep))
}

pub fn topic_status(
    curriculum: &Curriculum,
    topic: &str,
    completed: &CompletionSet,
) -> TopicStatus {
    if completed.contains(topic) {
        TopicStatus::Completed
    } else if check_prerequisites(curriculum, topic, completed) {
        TopicStatus::Available
    } else {
        TopicStatus::Locked
    }
}

/// How far along a named study path the learner is. `None` for an unknown path.
pub fn study_progress(
    curriculum: &Curriculum,
    completed: &CompletionSet,
    path_name: &str,
) -> Option<StudyProgress> {
    let Some(path) = curriculum.path(path_name) else {
        log::warn!("Unknown study path '{}'", path_name);
        return None;
    };

    let done = path
        .sequence
        .iter()
        .filter(|topic| completed.contains(*topic))
        .count();
    let total = path.sequence.len();
    let percentage = if total == 0 {
        0
    } else {
        ((done as f64 / total as f64) * 100.0).round() as u32
    };
    let next_topic = path
        .sequence
        .iter()
        .find(|topic| !completed.contains(*topic))
        .cloned();

    Some(StudyProgress {
        completed: done,
        total,
        percentage,
        next_topic,
    })
}

/// Minutes left across the whole course, regardless of which path is being followed.
pub fn remaining_study_time(curriculum: &Curriculum, completed: &CompletionSet) -> TimeSummary {
    let total_minutes = curriculum
        .mastery_time
        .iter()
        .filter(|(topic, _)| !completed.contains(*topic))
        .map(|(_, time)| time.total)
        .sum();
    TimeSummary::from_minutes(total_minutes)
}

pub fn module_for_topic<'a>(curriculum: &'a Curriculum, topic: &str) -> Option<&'a TopicNode> {
    curriculum
        .modules
        .iter()
        .find(|m| m.topics.iter().any(|t| t == topic))
}

/// The topic after `current` in the named path, if there is one.
pub fn next_topic<'a>(
    curriculum: &'a Curriculum,
    current: &str,
    path_name: &str,
) -> Option<&'a TopicId> {
    let sequence = &curriculum.path(path_name)?.sequence;
    let index = sequence.iter().position(|t| t == current)?;
    sequence.get(index + 1)
}

pub fn module_progress(module: &TopicNode, completed: &CompletionSet) -> (usize, usize) {
    let done = module.topics.iter().filter(|t| completed.contains(*t)).count();
    (done, module.topics.len())
}

/// Every module that has topics, with per-topic status.
pub fn topic_overview(curriculum: &Curriculum, completed: &CompletionSet) -> Vec<ModuleOverview> {
    curriculum
        .modules
        .iter()
        .filter(|m| !m.topics.is_empty())
        .map(|m| {
            let (done, total) = module_progress(m, completed);
            let topics = m
                .topics
                .iter()
                .map(|topic| TopicOverview {
                    topic: topic.clone(),
                    status: topic_status(curriculum, topic, completed),
                    exam_weight: curriculum.exam_weight(topic),
                    mastery_minutes: curriculum.mastery_time(topic).map(|t| t.total),
                })
                .collect();
            ModuleOverview {
                module: m.clone(),
                completed: done,
                total,
                topics,
            }
        })
        .collect()
}
