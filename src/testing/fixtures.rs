//! Sample work unit documents.
//!
//! Each fixture has a distinct identifier so several can share a store.

/// A unit without tasks, freshly created.
pub const SIMPLE_UNIT: &str = "# Work Unit: Write onboarding guide

## Metadata
- **ID**: WU-001
- **Type**: Documentation
- **Status**: Proposed
- **Completion**: 0%
- **Created**: 2026-03-01
- **Last Updated**: 2026-03-01
- **Relationship Type**: Independent
- **Dependencies**: None

## Description
Explain how new contributors set up the project.

## Changelog

- **2026-03-01 09:00**: Work unit created
";

/// A consistent unit with two tasks in progress.
///
/// Task 1.1 is at 75% (one subtask done, one in progress), task 1.2 has not
/// started, so the unit sits at 37%.
pub const TASKED_UNIT: &str = "# Work Unit: Add caching layer

## Metadata
- **ID**: WU-002
- **Type**: Feature
- **Status**: In Progress
- **Completion**: 37%
- **Created**: 2026-03-02
- **Last Updated**: 2026-03-04
- **Relationship Type**: Independent
- **Dependencies**: None

## Description
Cache expensive lookups in memory.

## Objectives
- Faster reads

## Requirements

### 1.1 Read cache
- **Status**: In Progress
- **Completion**: 75%
- **Implementation Details**:
  - [✓] Read path - [US-1](stories.md#us-1)
  - [~] Invalidation - [US-2](stories.md#us-2)

### 1.2 Metrics
- **Status**: Not Started
- **Completion**: 0%
- **Implementation Details**:
  - [ ] Hit ratio

## Related Components
- Cache Layer

## Changelog

- **2026-03-04 16:30**: Read path done
- **2026-03-02 10:00**: Work unit created
";

/// A hand-edited unit whose stored values disagree with its subtasks.
///
/// The unit claims completion while one subtask is still open, task 1.1 has
/// an unparsable completion and task 1.2 has none.
pub const DRIFTED_UNIT: &str = "# Work Unit: Retry failed uploads

## Metadata
- **ID**: WU-003
- **Type**: Bug Fix
- **Status**: Completed
- **Completion**: 100%
- **Last Updated**: 2026-02-20

## Description
Uploads that fail are retried with backoff.

## Requirements

### 1.1 Backoff
- **Status**: Completed
- **Completion**: done
- **Implementation Details**:
  - [✓] Exponential delay
  - [ ] Jitter

### 1.2 Tests
- **Status**: In Progress
- **Implementation Details**:
  - [✓] Unit tests
  - [✓] Integration tests

## Changelog

- **2026-02-20 11:00**: Marked complete
";

/// A unit whose subtasks use verb notation, one of them over two lines.
pub const VERB_NOTATION_UNIT: &str = "# Work Unit: Export reports

## Metadata
- **ID**: WU-004
- **Type**: Enhancement
- **Status**: In Progress
- **Completion**: 50%

## Requirements

### 1.1 CSV export
- **Status**: In Progress
- **Completion**: 50%
- **Implementation Details**:
  - Header row - Implements [US-7](stories.md#us-7)
  - Streaming writer
    - Will implement [US-8](stories.md#us-8)
";
